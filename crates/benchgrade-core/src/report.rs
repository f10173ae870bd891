//! Report-card data assembly.
//!
//! Builds the per-student tree of course averages, per-category item counts
//! and GPAs that report renderers consume.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::engine::{BenchmarkEngine, PrettyAverage};
use crate::error::{GradebookError, Result};
use crate::gpa::Gpa;
use crate::model::{
    CategoryId, Course, CourseId, Gradebook, ItemId, MarkingPeriod, MarkingPeriodId, SchoolYear,
    StudentId,
};
use crate::rules::CalculationRule;
use crate::statistics::round_half_up;
use crate::traits::{AggregateStore, LegacyGradeStore};

/// Report cards for a set of students as of one date.
#[derive(Debug, Clone, Serialize)]
pub struct ReportCardSet {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub for_date: NaiveDate,
    pub school_year: String,
    /// The current reportable marking period.
    pub marking_period: String,
    pub students: Vec<StudentReport>,
}

impl ReportCardSet {
    /// Save the report cards as JSON to a file.
    pub fn save_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report cards")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report cards to {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentReport {
    pub student: StudentId,
    pub name: String,
    pub courses: Vec<CourseReport>,
    /// Item counts summed over every course, keyed by category name.
    pub category_counts: BTreeMap<String, CategoryCounts>,
    /// GPA of the current marking period.
    pub session_gpa: Gpa,
    /// GPA over every marking period ended by the report date.
    pub cumulative_gpa: Gpa,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseReport {
    pub course: CourseId,
    pub name: String,
    pub department: Option<String>,
    pub average: Option<PrettyAverage>,
    /// The average shows a substitution the rule asks to highlight.
    pub flagged: bool,
    /// Names of the course's marking periods started by the report date.
    pub marking_periods: Vec<String>,
    pub categories: Vec<CategoryReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: CategoryId,
    pub name: String,
    /// Rule weight as a whole percentage; 0 when the category is unweighted.
    pub weight_percentage: Decimal,
    pub periods: Vec<CategoryPeriodReport>,
    pub overall: CategoryCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryPeriodReport {
    pub marking_period: MarkingPeriodId,
    pub name: String,
    pub average: Option<PrettyAverage>,
    pub flagged: bool,
    pub counts: CategoryCounts,
    pub item_groups: Vec<ItemGroup>,
}

/// Graded items split by whether their best mark reaches the passing grade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub total: u32,
    pub missing: u32,
    pub passing: u32,
    /// Whole percentage of passing items; `None` when nothing was graded.
    pub percentage: Option<Decimal>,
}

impl CategoryCounts {
    fn merge(&mut self, other: &CategoryCounts) {
        self.total += other.total;
        self.missing += other.missing;
        self.passing += other.passing;
    }

    fn with_percentage(mut self) -> Self {
        self.percentage = (self.total > 0).then(|| {
            round_half_up(
                Decimal::from(self.passing) / Decimal::from(self.total) * Decimal::ONE_HUNDRED,
                0,
            )
        });
        self
    }
}

/// Items sharing a name, e.g. repeated "Participation" entries.
#[derive(Debug, Clone, Serialize)]
pub struct ItemGroup {
    pub name: String,
    pub items: Vec<ItemSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemSummary {
    pub item: ItemId,
    pub best_mark: Decimal,
    pub points_possible: Option<Decimal>,
}

fn is_flagged(rule: &CalculationRule, average: &Option<PrettyAverage>) -> bool {
    match average {
        Some(PrettyAverage::Substitution(text)) => rule.flags_visually(text),
        _ => false,
    }
}

impl Gradebook {
    /// The latest school year starting before `for_date`.
    pub fn reporting_school_year(&self, for_date: NaiveDate) -> Result<&SchoolYear> {
        self.school_years()
            .filter(|year| year.start_date < for_date)
            .max_by_key(|year| year.start_date)
            .ok_or(GradebookError::NoReportingPeriod(for_date))
    }

    /// The latest reportable marking period of `school_year` started before
    /// `for_date`.
    pub fn reporting_marking_period(
        &self,
        school_year: &SchoolYear,
        for_date: NaiveDate,
    ) -> Result<&MarkingPeriod> {
        self.marking_periods()
            .filter(|period| {
                period.school_year == school_year.id
                    && period.show_reports
                    && period.start_date < for_date
            })
            .max_by_key(|period| period.start_date)
            .ok_or(GradebookError::NoReportingPeriod(for_date))
    }
}

impl<'a, S> BenchmarkEngine<'a, S>
where
    S: AggregateStore + LegacyGradeStore,
{
    /// Assemble report cards as of `for_date`.
    ///
    /// The school year is the latest one starting before the date, and the
    /// current marking period is its latest reportable one that has started.
    pub fn build_report_cards(
        &mut self,
        for_date: NaiveDate,
        students: &[StudentId],
    ) -> Result<ReportCardSet> {
        let book = self.book;
        let school_year = book.reporting_school_year(for_date)?;
        let rule = book.find_calculation_rule(school_year.id)?;
        let marking_period = book.reporting_marking_period(school_year, for_date)?;

        tracing::debug!(
            school_year = %school_year.name,
            marking_period = %marking_period.name,
            students = students.len(),
            "building report cards"
        );

        let mut reports = Vec::with_capacity(students.len());
        for &student in students {
            reports.push(self.student_report(student, for_date, rule, marking_period)?);
        }

        Ok(ReportCardSet {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            for_date,
            school_year: school_year.name.clone(),
            marking_period: marking_period.name.clone(),
            students: reports,
        })
    }

    fn student_report(
        &mut self,
        student: StudentId,
        for_date: NaiveDate,
        rule: &CalculationRule,
        marking_period: &MarkingPeriod,
    ) -> Result<StudentReport> {
        let book = self.book;
        let name = book.student(student)?.name.clone();

        let mut courses: Vec<&Course> = book
            .courses_for_student(student)
            .filter(|course| course.graded && course.runs_in(marking_period.id))
            .collect();
        courses.sort_by_key(|course| (course.department.is_none(), course.department));

        let mut course_reports = Vec::with_capacity(courses.len());
        let mut category_counts: BTreeMap<String, CategoryCounts> = BTreeMap::new();
        for course in courses {
            let report = self.course_report(student, course, for_date, rule, marking_period)?;
            for category in &report.categories {
                category_counts
                    .entry(category.name.clone())
                    .or_default()
                    .merge(&category.overall);
            }
            course_reports.push(report);
        }
        let category_counts = category_counts
            .into_iter()
            .map(|(name, counts)| (name, counts.with_percentage()))
            .collect();

        let session_gpa = self.student_gpa(student, Some(marking_period.id), None)?;
        let cumulative_gpa = self.student_gpa(student, None, Some(for_date))?;

        Ok(StudentReport {
            student,
            name,
            courses: course_reports,
            category_counts,
            session_gpa,
            cumulative_gpa,
        })
    }

    fn course_report(
        &mut self,
        student: StudentId,
        course: &Course,
        for_date: NaiveDate,
        rule: &CalculationRule,
        marking_period: &MarkingPeriod,
    ) -> Result<CourseReport> {
        let book = self.book;
        let average = self.get_average(student, course.id, None, Some(marking_period.id), None)?;

        let mut periods = course
            .marking_periods
            .iter()
            .map(|id| book.marking_period(*id))
            .collect::<Result<Vec<_>>>()?;
        periods.retain(|period| period.start_date < for_date);
        periods.sort_by_key(|period| period.start_date);

        // categories the student has marks in, graded or not
        let mut category_ids: Vec<CategoryId> = book
            .items_in_course(course.id)
            .filter(|item| book.marks_for(student, item.id).next().is_some())
            .map(|item| item.category)
            .collect();
        category_ids.sort_unstable();
        category_ids.dedup();

        let mut categories = Vec::with_capacity(category_ids.len());
        for category_id in category_ids {
            let category = book.category(category_id)?;
            let weight_percentage = rule
                .per_course_category(category_id, course.department)
                .and_then(|entry| entry.weight.checked_mul(Decimal::ONE_HUNDRED))
                .map_or(Decimal::ZERO, |weight| round_half_up(weight, 0));

            let mut overall = CategoryCounts::default();
            let mut period_reports = Vec::with_capacity(periods.len());
            for period in &periods {
                let average =
                    self.get_average(student, course.id, Some(category_id), Some(period.id), None)?;

                let graded: Vec<(&str, ItemSummary)> = book
                    .items_for(course.id, category_id, Some(period.id))
                    .filter_map(|item| {
                        book.best_mark(student, item.id).map(|best_mark| {
                            (
                                item.name.as_str(),
                                ItemSummary {
                                    item: item.id,
                                    best_mark,
                                    points_possible: item.points_possible,
                                },
                            )
                        })
                    })
                    .collect();

                let passing = graded
                    .iter()
                    .filter(|(_, summary)| summary.best_mark >= self.config.passing_grade)
                    .count() as u32;
                let counts = CategoryCounts {
                    total: graded.len() as u32,
                    missing: graded.len() as u32 - passing,
                    passing,
                    percentage: None,
                }
                .with_percentage();
                overall.merge(&counts);

                let mut item_groups: Vec<ItemGroup> = Vec::new();
                for (item_name, summary) in graded {
                    match item_groups.iter_mut().find(|group| group.name == item_name) {
                        Some(group) => group.items.push(summary),
                        None => item_groups.push(ItemGroup {
                            name: item_name.to_string(),
                            items: vec![summary],
                        }),
                    }
                }

                period_reports.push(CategoryPeriodReport {
                    marking_period: period.id,
                    name: period.name.clone(),
                    flagged: is_flagged(rule, &average),
                    average,
                    counts,
                    item_groups,
                });
            }

            categories.push(CategoryReport {
                category: category_id,
                name: category.name.clone(),
                weight_percentage,
                periods: period_reports,
                overall: overall.with_percentage(),
            });
        }

        let department = match course.department {
            Some(id) => Some(book.department(id)?.name.clone()),
            None => None,
        };

        Ok(CourseReport {
            course: course.id,
            name: course.name.clone(),
            department,
            flagged: is_flagged(rule, &average),
            average,
            marking_periods: periods.iter().map(|period| period.name.clone()).collect(),
            categories,
        })
    }
}
