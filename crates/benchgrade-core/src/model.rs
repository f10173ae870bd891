//! Core data model types for benchgrade.
//!
//! The raw gradebook records (school years, marking periods, courses,
//! categories, items, marks) are owned by the surrounding school system and
//! are read-only here. [`Gradebook`] is an indexed snapshot of them.
//! [`Aggregate`] and [`LegacyGrade`] are the mutable rows the engine writes
//! through the store traits.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{GradebookError, Result};
use crate::rules::CalculationRule;

pub type SchoolYearId = u32;
pub type MarkingPeriodId = u32;
pub type DepartmentId = u32;
pub type StudentId = u32;
pub type CourseId = u32;
pub type CategoryId = u32;
pub type ItemId = u32;
pub type MarkId = u32;
pub type RuleId = u32;
pub type AggregateId = u64;

/// A school year, optionally graded with calculation rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolYear {
    pub id: SchoolYearId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Whether this year uses rule-based ("benchmark") grading.
    #[serde(default)]
    pub benchmark_grade: bool,
}

/// A grading term within a school year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkingPeriod {
    pub id: MarkingPeriodId,
    pub name: String,
    pub school_year: SchoolYearId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Whether report cards are produced for this period.
    #[serde(default = "default_true")]
    pub show_reports: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
}

/// A course section, spanning one or more marking periods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    #[serde(default)]
    pub department: Option<DepartmentId>,
    /// Credits for the whole course; `None` keeps the course out of GPAs.
    #[serde(default)]
    pub credits: Option<Decimal>,
    /// Marking periods in chronological order.
    #[serde(default)]
    pub marking_periods: Vec<MarkingPeriodId>,
    #[serde(default = "default_true")]
    pub graded: bool,
    /// Enrolled students.
    #[serde(default)]
    pub students: Vec<StudentId>,
}

impl Course {
    /// Credits earned per marking period the course runs in.
    pub fn credits_per_marking_period(&self) -> Option<Decimal> {
        let credits = self.credits?;
        if self.marking_periods.is_empty() {
            return None;
        }
        credits.checked_div(Decimal::from(self.marking_periods.len()))
    }

    pub fn runs_in(&self, marking_period: MarkingPeriodId) -> bool {
        self.marking_periods.contains(&marking_period)
    }

    pub fn is_enrolled(&self, student: StudentId) -> bool {
        self.students.contains(&student)
    }
}

/// A grading bucket such as "Standards" or "Engagement".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Students may attempt an item repeatedly; only the best mark counts.
    #[serde(default)]
    pub allow_multiple_demonstrations: bool,
    /// Scale used when displaying averages (e.g. 100 for percentages).
    #[serde(default)]
    pub display_scale: Option<Decimal>,
    #[serde(default)]
    pub display_symbol: String,
}

/// A gradable unit of a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub course: CourseId,
    pub category: CategoryId,
    #[serde(default)]
    pub marking_period: Option<MarkingPeriodId>,
    /// Items without points never contribute to an average.
    #[serde(default)]
    pub points_possible: Option<Decimal>,
}

/// A student's score on an item. `mark = None` means ungraded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mark {
    pub id: MarkId,
    pub item: ItemId,
    pub student: StudentId,
    #[serde(default)]
    pub mark: Option<Decimal>,
    #[serde(default)]
    pub description: String,
}

/// Cache key of an aggregate.
///
/// `course = None` is a category-as-course aggregate, `category = None` a
/// course average, `marking_period = None` spans the whole course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateKey {
    pub student: StudentId,
    pub course: Option<CourseId>,
    pub category: Option<CategoryId>,
    pub marking_period: Option<MarkingPeriodId>,
}

impl AggregateKey {
    pub fn course_category(
        student: StudentId,
        course: CourseId,
        category: CategoryId,
        marking_period: Option<MarkingPeriodId>,
    ) -> Self {
        Self {
            student,
            course: Some(course),
            category: Some(category),
            marking_period,
        }
    }

    pub fn course(
        student: StudentId,
        course: CourseId,
        marking_period: Option<MarkingPeriodId>,
    ) -> Self {
        Self {
            student,
            course: Some(course),
            category: None,
            marking_period,
        }
    }

    pub fn category_as_course(
        student: StudentId,
        category: CategoryId,
        marking_period: MarkingPeriodId,
    ) -> Self {
        Self {
            student,
            course: None,
            category: Some(category),
            marking_period: Some(marking_period),
        }
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |v: Option<u32>| v.map_or_else(|| "-".to_string(), |id| id.to_string());
        write!(
            f,
            "student={} course={} category={} marking_period={}",
            self.student,
            part(self.course),
            part(self.category),
            part(self.marking_period)
        )
    }
}

/// A cached computed score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Row id; `None` until the row is first saved.
    #[serde(default)]
    pub id: Option<AggregateId>,
    pub key: AggregateKey,
    #[serde(default)]
    pub name: String,
    /// Normalized value on the 4.0-equivalent scale.
    #[serde(default)]
    pub cached_value: Option<Decimal>,
    /// Display override such as "INC".
    #[serde(default)]
    pub cached_substitution: Option<String>,
}

impl Aggregate {
    /// A blank, unsaved aggregate.
    pub fn new(key: AggregateKey) -> Self {
        Self {
            id: None,
            key,
            name: String::new(),
            cached_value: None,
            cached_substitution: None,
        }
    }
}

/// The legacy per-marking-period grade record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyGrade {
    pub student: StudentId,
    pub course: CourseId,
    #[serde(default)]
    pub marking_period: Option<MarkingPeriodId>,
    /// A final grade entered by hand, overriding the computed one.
    #[serde(default)]
    pub override_final: bool,
    #[serde(default)]
    pub grade: Option<Decimal>,
    #[serde(default)]
    pub letter_grade: Option<String>,
}

impl LegacyGrade {
    pub fn new(student: StudentId, course: CourseId, marking_period: MarkingPeriodId) -> Self {
        Self {
            student,
            course,
            marking_period: Some(marking_period),
            override_final: false,
            grade: None,
            letter_grade: None,
        }
    }

    /// Whether this row occupies the same slot as `other`.
    pub fn same_slot(&self, other: &LegacyGrade) -> bool {
        self.student == other.student
            && self.course == other.course
            && self.marking_period == other.marking_period
            && self.override_final == other.override_final
    }
}

fn default_true() -> bool {
    true
}

/// Indexed, read-only snapshot of the gradebook records.
#[derive(Debug, Clone, Default)]
pub struct Gradebook {
    pub name: String,
    school_years: BTreeMap<SchoolYearId, SchoolYear>,
    marking_periods: BTreeMap<MarkingPeriodId, MarkingPeriod>,
    departments: BTreeMap<DepartmentId, Department>,
    students: BTreeMap<StudentId, Student>,
    courses: BTreeMap<CourseId, Course>,
    categories: BTreeMap<CategoryId, Category>,
    items: BTreeMap<ItemId, Item>,
    marks: BTreeMap<MarkId, Mark>,
    rules: Vec<CalculationRule>,
    legacy_grades: Vec<LegacyGrade>,
}

impl Gradebook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    // -- insertion; each returns the record previously stored under the id --

    pub fn insert_school_year(&mut self, year: SchoolYear) -> Option<SchoolYear> {
        self.school_years.insert(year.id, year)
    }

    pub fn insert_marking_period(&mut self, period: MarkingPeriod) -> Option<MarkingPeriod> {
        self.marking_periods.insert(period.id, period)
    }

    pub fn insert_department(&mut self, department: Department) -> Option<Department> {
        self.departments.insert(department.id, department)
    }

    pub fn insert_student(&mut self, student: Student) -> Option<Student> {
        self.students.insert(student.id, student)
    }

    pub fn insert_course(&mut self, course: Course) -> Option<Course> {
        self.courses.insert(course.id, course)
    }

    pub fn insert_category(&mut self, category: Category) -> Option<Category> {
        self.categories.insert(category.id, category)
    }

    pub fn insert_item(&mut self, item: Item) -> Option<Item> {
        self.items.insert(item.id, item)
    }

    pub fn insert_mark(&mut self, mark: Mark) -> Option<Mark> {
        self.marks.insert(mark.id, mark)
    }

    pub fn push_rule(&mut self, rule: CalculationRule) {
        self.rules.push(rule);
    }

    pub fn push_legacy_grade(&mut self, grade: LegacyGrade) {
        self.legacy_grades.push(grade);
    }

    /// Change a mark in place, returning the previous value.
    pub fn set_mark(&mut self, mark: MarkId, value: Option<Decimal>) -> Result<Option<Decimal>> {
        let record = self
            .marks
            .get_mut(&mark)
            .ok_or_else(|| GradebookError::unknown("mark", mark))?;
        Ok(std::mem::replace(&mut record.mark, value))
    }

    // -- lookups --

    pub fn school_year(&self, id: SchoolYearId) -> Result<&SchoolYear> {
        self.school_years
            .get(&id)
            .ok_or_else(|| GradebookError::unknown("school year", id))
    }

    pub fn marking_period(&self, id: MarkingPeriodId) -> Result<&MarkingPeriod> {
        self.marking_periods
            .get(&id)
            .ok_or_else(|| GradebookError::unknown("marking period", id))
    }

    pub fn department(&self, id: DepartmentId) -> Result<&Department> {
        self.departments
            .get(&id)
            .ok_or_else(|| GradebookError::unknown("department", id))
    }

    pub fn student(&self, id: StudentId) -> Result<&Student> {
        self.students
            .get(&id)
            .ok_or_else(|| GradebookError::unknown("student", id))
    }

    pub fn course(&self, id: CourseId) -> Result<&Course> {
        self.courses
            .get(&id)
            .ok_or_else(|| GradebookError::unknown("course", id))
    }

    pub fn category(&self, id: CategoryId) -> Result<&Category> {
        self.categories
            .get(&id)
            .ok_or_else(|| GradebookError::unknown("category", id))
    }

    pub fn item(&self, id: ItemId) -> Result<&Item> {
        self.items
            .get(&id)
            .ok_or_else(|| GradebookError::unknown("item", id))
    }

    pub fn mark(&self, id: MarkId) -> Result<&Mark> {
        self.marks
            .get(&id)
            .ok_or_else(|| GradebookError::unknown("mark", id))
    }

    pub fn school_years(&self) -> impl Iterator<Item = &SchoolYear> {
        self.school_years.values()
    }

    pub fn marking_periods(&self) -> impl Iterator<Item = &MarkingPeriod> {
        self.marking_periods.values()
    }

    pub fn students(&self) -> impl Iterator<Item = &Student> {
        self.students.values()
    }

    pub fn courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn marks(&self) -> impl Iterator<Item = &Mark> {
        self.marks.values()
    }

    pub fn rules(&self) -> &[CalculationRule] {
        &self.rules
    }

    pub fn legacy_grades(&self) -> &[LegacyGrade] {
        &self.legacy_grades
    }

    /// Items of a course in a category. `marking_period = None` spans the
    /// whole course.
    pub fn items_for(
        &self,
        course: CourseId,
        category: CategoryId,
        marking_period: Option<MarkingPeriodId>,
    ) -> impl Iterator<Item = &Item> {
        self.items.values().filter(move |item| {
            item.course == course
                && item.category == category
                && (marking_period.is_none() || item.marking_period == marking_period)
        })
    }

    pub fn items_in_course(&self, course: CourseId) -> impl Iterator<Item = &Item> {
        self.items.values().filter(move |item| item.course == course)
    }

    /// All marks of a student on an item, including repeated demonstrations.
    pub fn marks_for(&self, student: StudentId, item: ItemId) -> impl Iterator<Item = &Mark> {
        self.marks
            .values()
            .filter(move |mark| mark.student == student && mark.item == item)
    }

    /// The student's best non-null mark on an item.
    pub fn best_mark(&self, student: StudentId, item: ItemId) -> Option<Decimal> {
        self.marks_for(student, item).filter_map(|m| m.mark).max()
    }

    pub fn courses_for_student(&self, student: StudentId) -> impl Iterator<Item = &Course> {
        self.courses
            .values()
            .filter(move |course| course.is_enrolled(student))
    }

    /// The school year of a course: that of its first marking period.
    pub fn course_school_year(&self, course: &Course) -> Result<&SchoolYear> {
        let first = course
            .marking_periods
            .first()
            .ok_or_else(|| GradebookError::CourseWithoutMarkingPeriod(course.name.clone()))?;
        let period = self.marking_period(*first)?;
        self.school_year(period.school_year)
    }

    /// A human-readable name for an aggregate key.
    pub fn describe(&self, key: &AggregateKey) -> String {
        let student = self
            .student(key.student)
            .map_or_else(|_| format!("#{}", key.student), |s| s.name.clone());
        let course = match key.course {
            Some(id) => self
                .course(id)
                .map_or_else(|_| format!("#{id}"), |c| c.name.clone()),
            None => "All Courses".to_string(),
        };
        let category = match key.category {
            Some(id) => self
                .category(id)
                .map_or_else(|_| format!("#{id}"), |c| c.name.clone()),
            None => "Course Average".to_string(),
        };
        let period = match key.marking_period {
            Some(id) => self
                .marking_period(id)
                .map_or_else(|_| format!("#{id}"), |p| p.name.clone()),
            None => "All Marking Periods".to_string(),
        };
        format!("{student} - {category} ({course}, {period})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{d, sample_gradebook};

    #[test]
    fn credits_per_marking_period_splits_credits() {
        let book = sample_gradebook();
        let algebra = book.course(10).unwrap();
        assert_eq!(algebra.credits_per_marking_period(), Some(d("0.5")));

        let mut no_credit = algebra.clone();
        no_credit.credits = None;
        assert_eq!(no_credit.credits_per_marking_period(), None);
    }

    #[test]
    fn items_for_filters_by_marking_period() {
        let book = sample_gradebook();
        let q1: Vec<_> = book.items_for(10, 1, Some(1)).map(|i| i.id).collect();
        let all: Vec<_> = book.items_for(10, 1, None).map(|i| i.id).collect();
        assert_eq!(q1, vec![100, 101]);
        assert!(all.len() > q1.len());
    }

    #[test]
    fn best_mark_ignores_ungraded() {
        let book = sample_gradebook();
        assert_eq!(book.best_mark(1, 102), Some(d("4")));
        assert_eq!(book.best_mark(2, 102), None);
    }

    #[test]
    fn course_school_year_needs_a_marking_period() {
        let book = sample_gradebook();
        let mut course = book.course(10).unwrap().clone();
        assert_eq!(book.course_school_year(&course).unwrap().id, 2013);
        course.marking_periods.clear();
        assert!(matches!(
            book.course_school_year(&course),
            Err(GradebookError::CourseWithoutMarkingPeriod(_))
        ));
    }

    #[test]
    fn describe_names_every_part() {
        let book = sample_gradebook();
        let key = AggregateKey::course_category(1, 10, 1, None);
        assert_eq!(
            book.describe(&key),
            "Ada Park - Standards (Algebra I, All Marking Periods)"
        );
        let key = AggregateKey::category_as_course(1, 2, 1);
        assert_eq!(book.describe(&key), "Ada Park - Engagement (All Courses, Q1)");
    }

    #[test]
    fn set_mark_replaces_value() {
        let mut book = sample_gradebook();
        let previous = book.set_mark(1000, Some(d("9"))).unwrap();
        assert_eq!(previous, Some(d("8")));
        assert_eq!(book.mark(1000).unwrap().mark, Some(d("9")));
        assert!(book.set_mark(9999, None).is_err());
    }
}
