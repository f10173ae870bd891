//! Student follow-up lists built alongside report cards.
//!
//! Two views over a school year: the courses where a student holds a given
//! substitution (typically "INC" on standards), and students with many items
//! at a given best mark across their courses.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::engine::BenchmarkEngine;
use crate::error::Result;
use crate::model::{Category, CategoryId, CourseId, MarkingPeriod, StudentId};
use crate::statistics::round_half_up;
use crate::traits::{AggregateStore, LegacyGradeStore};

/// Students holding a substitution in some course of the school year.
#[derive(Debug, Clone, Serialize)]
pub struct IncompleteReport {
    pub for_date: NaiveDate,
    pub school_year: String,
    pub category: String,
    pub substitution: String,
    /// Sorted by name. In inverse mode the students without any match, with
    /// no courses listed.
    pub students: Vec<StudentIncompleteCourses>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentIncompleteCourses {
    pub student: StudentId,
    pub name: String,
    pub courses: Vec<IncompleteCourse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncompleteCourse {
    pub course: CourseId,
    pub name: String,
    /// Marking periods holding the substitution, by start date.
    pub marking_periods: Vec<String>,
}

/// What `count_items_by_category` looks for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemCountCriteria {
    /// Categories counted over the whole school year.
    pub year_categories: Vec<String>,
    /// Categories counted in the current marking period only.
    pub current_period_categories: Vec<String>,
    /// The best mark an item must have to count as matching.
    pub best_mark: Decimal,
    /// Whole percentage of matching items that flags a course.
    pub percentage_threshold: Decimal,
    /// Flagged courses needed to list a student.
    pub course_threshold: usize,
}

impl ItemCountCriteria {
    /// Standards over the year and daily practice this marking period, at a
    /// best mark of zero.
    pub fn zero_standards() -> Self {
        Self {
            year_categories: vec!["Standards".to_string()],
            current_period_categories: vec!["Daily Practice".to_string()],
            best_mark: Decimal::ZERO,
            percentage_threshold: Decimal::from(20),
            course_threshold: 3,
        }
    }
}

impl Default for ItemCountCriteria {
    fn default() -> Self {
        Self::zero_standards()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemCountReport {
    pub for_date: NaiveDate,
    pub school_year: String,
    pub marking_period: String,
    /// Names of the counted categories, in column order.
    pub categories: Vec<String>,
    pub students: Vec<StudentItemCounts>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentItemCounts {
    pub student: StudentId,
    pub name: String,
    /// Flagged courses; empty in inverse mode.
    pub courses: Vec<CourseItemCounts>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseItemCounts {
    pub course: CourseId,
    pub name: String,
    pub combined: ItemCount,
    pub categories: Vec<CategoryItemCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryItemCount {
    pub category: CategoryId,
    pub name: String,
    #[serde(flatten)]
    pub count: ItemCount,
}

/// Graded items and how many of them match, with the whole percentage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItemCount {
    pub matching: u32,
    pub total: u32,
    /// 0 when nothing was graded.
    pub percentage: Decimal,
}

impl ItemCount {
    fn new(matching: u32, total: u32) -> Self {
        let percentage = if total == 0 {
            Decimal::ZERO
        } else {
            round_half_up(
                Decimal::from(matching) / Decimal::from(total) * Decimal::ONE_HUNDRED,
                0,
            )
        };
        Self {
            matching,
            total,
            percentage,
        }
    }
}

impl<'a, S> BenchmarkEngine<'a, S>
where
    S: AggregateStore + LegacyGradeStore,
{
    /// Students whose per-period aggregate in the named category holds
    /// `substitution` in some course of the school year current at
    /// `for_date`. Missing aggregates are computed and cached.
    pub fn incomplete_courses(
        &mut self,
        for_date: NaiveDate,
        category_name: &str,
        substitution: &str,
        inverse: bool,
    ) -> Result<IncompleteReport> {
        let book = self.book;
        let school_year = book.reporting_school_year(for_date)?;
        let categories: Vec<CategoryId> = book
            .categories()
            .filter(|category| category.name == category_name)
            .map(|category| category.id)
            .collect();

        let mut students: Vec<_> = book.students().collect();
        students.sort_by(|a, b| a.name.cmp(&b.name));

        let mut listed = Vec::new();
        for student in students {
            let mut courses = Vec::new();
            for course in book.courses_for_student(student.id) {
                let mut periods: Vec<&MarkingPeriod> = course
                    .marking_periods
                    .iter()
                    .map(|id| book.marking_period(*id))
                    .collect::<Result<_>>()?;
                periods.retain(|period| period.school_year == school_year.id);
                if periods.is_empty() {
                    continue;
                }
                periods.sort_by_key(|period| period.start_date);

                let mut matched = Vec::new();
                for period in periods {
                    for &category in &categories {
                        if book.items_for(course.id, category, Some(period.id)).next().is_none() {
                            continue;
                        }
                        let aggregate =
                            self.period_category_aggregate(student.id, course.id, category, period.id)?;
                        if aggregate.cached_substitution.as_deref() == Some(substitution) {
                            matched.push(period.name.clone());
                            break;
                        }
                    }
                }
                if !matched.is_empty() {
                    courses.push(IncompleteCourse {
                        course: course.id,
                        name: course.name.clone(),
                        marking_periods: matched,
                    });
                }
            }

            if courses.is_empty() == inverse {
                courses.sort_by(|a, b| a.name.cmp(&b.name));
                listed.push(StudentIncompleteCourses {
                    student: student.id,
                    name: student.name.clone(),
                    courses,
                });
            }
        }

        tracing::debug!(
            school_year = %school_year.name,
            category = category_name,
            substitution,
            inverse,
            students = listed.len(),
            "listed incomplete courses"
        );
        Ok(IncompleteReport {
            for_date,
            school_year: school_year.name.clone(),
            category: category_name.to_string(),
            substitution: substitution.to_string(),
            students: listed,
        })
    }

    /// Students with at least `course_threshold` courses where the share of
    /// graded items at `best_mark` reaches `percentage_threshold`, either
    /// over all counted categories together or within one of them.
    ///
    /// With `inverse`, lists the students below the course threshold
    /// instead.
    pub fn count_items_by_category(
        &self,
        for_date: NaiveDate,
        criteria: &ItemCountCriteria,
        inverse: bool,
    ) -> Result<ItemCountReport> {
        let book = self.book;
        let school_year = book.reporting_school_year(for_date)?;
        let marking_period = book.reporting_marking_period(school_year, for_date)?;
        let categories: Vec<&Category> = book
            .categories()
            .filter(|category| {
                criteria.year_categories.contains(&category.name)
                    || criteria.current_period_categories.contains(&category.name)
            })
            .collect();

        let mut students: Vec<_> = book.students().collect();
        students.sort_by(|a, b| a.name.cmp(&b.name));

        let mut listed = Vec::new();
        for student in students {
            let mut flagged = Vec::new();
            for course in book.courses_for_student(student.id) {
                let in_year = course
                    .marking_periods
                    .iter()
                    .map(|id| book.marking_period(*id))
                    .collect::<Result<Vec<_>>>()?
                    .iter()
                    .any(|period| period.school_year == school_year.id);
                if !in_year {
                    continue;
                }

                // (category, best mark) of every graded item counted
                let graded: Vec<(CategoryId, Decimal)> = book
                    .items_in_course(course.id)
                    .filter(|item| {
                        categories.iter().any(|category| {
                            category.id == item.category
                                && (criteria.year_categories.contains(&category.name)
                                    || item.marking_period == Some(marking_period.id))
                        })
                    })
                    .filter_map(|item| {
                        book.best_mark(student.id, item.id)
                            .map(|best| (item.category, best))
                    })
                    .collect();
                if graded.is_empty() {
                    continue;
                }

                let count = |category: Option<CategoryId>| {
                    let mut total = 0;
                    let mut matching = 0;
                    for (item_category, best) in &graded {
                        if category.is_some_and(|c| c != *item_category) {
                            continue;
                        }
                        total += 1;
                        if *best == criteria.best_mark {
                            matching += 1;
                        }
                    }
                    ItemCount::new(matching, total)
                };

                let combined = count(None);
                let per_category: Vec<CategoryItemCount> = categories
                    .iter()
                    .map(|category| CategoryItemCount {
                        category: category.id,
                        name: category.name.clone(),
                        count: count(Some(category.id)),
                    })
                    .collect();
                let threshold = criteria.percentage_threshold;
                let is_flagged = combined.percentage >= threshold
                    || per_category.iter().any(|c| c.count.percentage >= threshold);
                if is_flagged {
                    flagged.push(CourseItemCounts {
                        course: course.id,
                        name: course.name.clone(),
                        combined,
                        categories: per_category,
                    });
                }
            }

            let reaches_threshold = flagged.len() >= criteria.course_threshold;
            if reaches_threshold != inverse {
                listed.push(StudentItemCounts {
                    student: student.id,
                    name: student.name.clone(),
                    courses: if inverse { Vec::new() } else { flagged },
                });
            }
        }

        tracing::debug!(
            school_year = %school_year.name,
            marking_period = %marking_period.name,
            inverse,
            students = listed.len(),
            "counted items by category"
        );
        Ok(ItemCountReport {
            for_date,
            school_year: school_year.name.clone(),
            marking_period: marking_period.name.clone(),
            categories: categories.iter().map(|category| category.name.clone()).collect(),
            students: listed,
        })
    }
}
