//! GPA roll-up across benchmark and legacy school years.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::engine::BenchmarkEngine;
use crate::error::{GradebookError, Result};
use crate::model::{
    CategoryId, Course, CourseId, Gradebook, MarkingPeriod, MarkingPeriodId, StudentId,
};
use crate::rules::CalculationRule;
use crate::statistics::{round_half_up, WeightedSum, POINT_SCALE};
use crate::traits::{
    AggregateStore, LegacyCourseGrade, LegacyGradeCalculator, LegacyGradeStore,
};

/// A grade point average, or "N/A" when no credits contributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gpa {
    Value(Decimal),
    NotAvailable,
}

impl Gpa {
    pub fn value(self) -> Option<Decimal> {
        match self {
            Gpa::Value(value) => Some(value),
            Gpa::NotAvailable => None,
        }
    }
}

impl fmt::Display for Gpa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gpa::Value(value) => write!(f, "{value}"),
            Gpa::NotAvailable => f.write_str("N/A"),
        }
    }
}

impl Serialize for Gpa {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'a, S> BenchmarkEngine<'a, S>
where
    S: AggregateStore + LegacyGradeStore,
{
    /// Credit-weighted GPA of a student over `courses`.
    ///
    /// `marking_period` restricts the roll-up to a single period;
    /// otherwise every period the courses run in counts, limited to those
    /// ending on or before `date_report` when given. Benchmark years read
    /// the cached aggregates, computing the missing ones; legacy years go
    /// through the legacy grade calculator.
    pub fn calculate_grade_for_courses(
        &mut self,
        student: StudentId,
        courses: &[CourseId],
        marking_period: Option<MarkingPeriodId>,
        date_report: Option<NaiveDate>,
    ) -> Result<Gpa> {
        let book = self.book;
        let course_ids: BTreeSet<CourseId> = courses.iter().copied().collect();
        let courses = course_ids
            .iter()
            .map(|id| book.course(*id))
            .collect::<Result<Vec<_>>>()?;

        let periods: Vec<&MarkingPeriod> = match marking_period {
            Some(id) => vec![book.marking_period(id)?],
            None => {
                let ids: BTreeSet<MarkingPeriodId> = courses
                    .iter()
                    .flat_map(|course| course.marking_periods.iter().copied())
                    .collect();
                ids.into_iter()
                    .map(|id| book.marking_period(id))
                    .collect::<Result<Vec<_>>>()?
                    .into_iter()
                    .filter(|period| date_report.map_or(true, |date| period.end_date <= date))
                    .collect()
            }
        };

        let mut benchmark_periods = Vec::new();
        let mut legacy_periods = Vec::new();
        for period in periods {
            if book.school_year(period.school_year)?.benchmark_grade {
                benchmark_periods.push(period);
            } else {
                legacy_periods.push(period);
            }
        }

        let mut total = WeightedSum::default();
        for period in benchmark_periods {
            if let Some((average, credits)) = self.marking_period_average(student, &courses, period)? {
                total.add(average, credits);
            }
        }

        let legacy_courses = courses.iter().filter(|course| {
            course.credits.is_some()
                && legacy_periods.iter().any(|period| course.runs_in(period.id))
        });
        for course in legacy_courses {
            match self.legacy.calculate_grade_for_single_course(
                book,
                &self.store,
                student,
                course.id,
                marking_period,
                date_report,
            ) {
                Ok(LegacyCourseGrade { grade, credits }) => total.add(grade, credits),
                Err(e) => tracing::warn!(
                    student,
                    course = course.id,
                    marking_period = ?marking_period,
                    date_report = ?date_report,
                    "legacy course grade calculation failed: {e:#}"
                ),
            }
        }

        Ok(match total.ratio() {
            Some(gpa) => Gpa::Value(round_half_up(gpa, self.config.gpa_decimal_places)),
            None => Gpa::NotAvailable,
        })
    }

    /// GPA over every graded course the student is enrolled in.
    pub fn student_gpa(
        &mut self,
        student: StudentId,
        marking_period: Option<MarkingPeriodId>,
        date_report: Option<NaiveDate>,
    ) -> Result<Gpa> {
        let courses: Vec<CourseId> = self
            .book
            .courses_for_student(student)
            .filter(|course| course.graded)
            .map(|course| course.id)
            .collect();
        self.calculate_grade_for_courses(student, &courses, marking_period, date_report)
    }

    /// Average of one benchmark marking period on the 4.0 scale, with the
    /// course credits it carries.
    ///
    /// Categories scored as courses add a flat weight of 1 to the period
    /// average but no credits to the returned weight.
    fn marking_period_average(
        &mut self,
        student: StudentId,
        courses: &[&Course],
        period: &MarkingPeriod,
    ) -> Result<Option<(Decimal, Decimal)>> {
        let book = self.book;
        let rule = book.find_calculation_rule(period.school_year)?;
        let mut period_sum = WeightedSum::default();

        for course in courses.iter().filter(|course| course.runs_in(period.id)) {
            let Some(credits) = course.credits_per_marking_period() else {
                continue;
            };
            let mut course_sum = WeightedSum::default();
            for entry in rule.per_course_categories_for(course.department) {
                if let Some(value) =
                    self.normalized_category_value(student, course.id, entry.category, period.id, rule)?
                {
                    course_sum.add(value, entry.weight);
                }
            }
            if let Some(course_average) = course_sum.ratio() {
                period_sum.add(course_average, credits);
            }
        }

        let credits_before_categories = period_sum.denominator;
        for entry in &rule.categories_as_courses {
            let mut category_sum = WeightedSum::default();
            let contributing = courses.iter().filter(|course| {
                course.runs_in(period.id)
                    && course
                        .department
                        .is_some_and(|d| entry.include_departments.contains(&d))
            });
            for course in contributing {
                let Some(credits) = course.credits_per_marking_period() else {
                    continue;
                };
                if let Some(value) =
                    self.normalized_category_value(student, course.id, entry.category, period.id, rule)?
                {
                    category_sum.add(value, credits);
                }
            }
            if let Some(category_average) = category_sum.ratio() {
                period_sum.add_raw(category_average, Decimal::ONE);
            }
        }

        Ok(period_sum
            .ratio()
            .and_then(|average| average.checked_mul(POINT_SCALE))
            .map(|average| (average, credits_before_categories)))
    }

    /// A course-category value divided by the rule's point scale.
    fn normalized_category_value(
        &mut self,
        student: StudentId,
        course: CourseId,
        category: CategoryId,
        marking_period: MarkingPeriodId,
        rule: &CalculationRule,
    ) -> Result<Option<Decimal>> {
        let value = self
            .period_category_aggregate(student, course, category, marking_period)?
            .cached_value;
        // assumes a scale starting at 0
        Ok(value.and_then(|value| value.checked_div(rule.points_possible)))
    }
}

/// Legacy course grades read from stored [`LegacyGrade`](crate::model::LegacyGrade) rows.
///
/// A final grade entered by hand wins when no marking period is requested.
/// Otherwise the numeric grades of the marking periods in scope are averaged.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredLegacyGrades;

impl LegacyGradeCalculator for StoredLegacyGrades {
    fn calculate_grade_for_single_course(
        &self,
        book: &Gradebook,
        grades: &dyn LegacyGradeStore,
        student: StudentId,
        course: CourseId,
        marking_period: Option<MarkingPeriodId>,
        date_report: Option<NaiveDate>,
    ) -> anyhow::Result<LegacyCourseGrade> {
        let course_record = book.course(course)?;
        let credits = course_record
            .credits
            .ok_or_else(|| anyhow::anyhow!("course {} has no credits", course_record.name))?;
        let rows = grades.legacy_grades(student, course)?;

        if marking_period.is_none() {
            if let Some(grade) = rows
                .iter()
                .filter(|row| row.override_final)
                .find_map(|row| row.grade)
            {
                return Ok(LegacyCourseGrade { grade, credits });
            }
        }

        let in_scope: Vec<MarkingPeriodId> = match marking_period {
            Some(id) => vec![id],
            None => course_record
                .marking_periods
                .iter()
                .copied()
                .filter(|id| match (date_report, book.marking_period(*id)) {
                    (None, _) => true,
                    (Some(date), Ok(period)) => period.end_date <= date,
                    (Some(_), Err(_)) => false,
                })
                .collect(),
        };

        let mut sum = WeightedSum::default();
        for row in rows.iter().filter(|row| !row.override_final) {
            let (Some(period), Some(grade)) = (row.marking_period, row.grade) else {
                continue;
            };
            if in_scope.contains(&period) {
                sum.add(grade, Decimal::ONE);
            }
        }

        let grade = sum.ratio().ok_or_else(|| {
            let student = book
                .student(student)
                .map_or_else(|_| format!("#{student}"), |s| s.name.clone());
            GradebookError::NoLegacyGrade {
                student,
                course: course_record.name.clone(),
            }
        })?;
        Ok(LegacyCourseGrade { grade, credits })
    }
}
