//! Benchmark aggregation engine.
//!
//! Computes category, course and category-as-course aggregates from marks,
//! caches them through the injected store, and pushes recalculations when
//! items or marks change.

use std::collections::BTreeSet;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

use crate::cache::{self, CacheLookup};
use crate::error::{GradebookError, Result};
use crate::gpa::StoredLegacyGrades;
use crate::model::{
    Aggregate, AggregateKey, Category, CategoryId, Course, CourseId, Gradebook, ItemId,
    LegacyGrade, MarkId, MarkingPeriodId, StudentId,
};
use crate::rules::CalculationRule;
use crate::statistics::{normalize_stored, round_half_up, WeightedSum, POINT_SCALE};
use crate::traits::{AggregateStore, LegacyGradeCalculator, LegacyGradeStore};

/// Configuration for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Width of the legacy letter-grade column; substitutions are truncated.
    pub letter_grade_max_length: usize,
    /// Decimal places of a GPA.
    pub gpa_decimal_places: u32,
    /// Best marks at or above this count as passing on report cards.
    pub passing_grade: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            letter_grade_max_length: 2,
            gpa_decimal_places: 2,
            passing_grade: Decimal::from(3),
        }
    }
}

/// An average formatted for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrettyAverage {
    /// A substitution code such as "INC".
    Substitution(String),
    /// A value rescaled onto the category's display scale, with its symbol.
    Scaled(String),
    /// The aggregate value rounded to the rule's decimal places.
    Value(Decimal),
}

impl fmt::Display for PrettyAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrettyAverage::Substitution(text) | PrettyAverage::Scaled(text) => f.write_str(text),
            PrettyAverage::Value(value) => write!(f, "{value}"),
        }
    }
}

impl Serialize for PrettyAverage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The aggregation engine over one gradebook snapshot and one store.
pub struct BenchmarkEngine<'a, S> {
    pub(crate) book: &'a Gradebook,
    pub(crate) store: S,
    pub(crate) config: EngineConfig,
    pub(crate) legacy: Box<dyn LegacyGradeCalculator>,
}

impl<'a, S> BenchmarkEngine<'a, S>
where
    S: AggregateStore + LegacyGradeStore,
{
    pub fn new(book: &'a Gradebook, store: S, config: EngineConfig) -> Self {
        Self {
            book,
            store,
            config,
            legacy: Box::new(StoredLegacyGrades),
        }
    }

    /// Replace the legacy per-course grade calculator.
    pub fn with_legacy_calculator(mut self, calculator: impl LegacyGradeCalculator + 'static) -> Self {
        self.legacy = Box::new(calculator);
        self
    }

    pub fn gradebook(&self) -> &'a Gradebook {
        self.book
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// The calculation rule governing a course.
    pub fn course_rule(&self, course: &Course) -> Result<&'a CalculationRule> {
        let book = self.book;
        let year = book.course_school_year(course)?;
        book.find_calculation_rule(year.id)
    }

    /// Cached aggregate under `key`, or a blank unsaved one.
    fn fetch_or_blank(&mut self, key: AggregateKey) -> Result<(Aggregate, bool)> {
        // a blank aggregate is not saved up front, so a one-off computation
        // never leaves an empty row behind
        Ok(match cache::repair_or_fetch(&mut self.store, &key)? {
            CacheLookup::Found(aggregate) => (aggregate, false),
            CacheLookup::Repaired { .. } | CacheLookup::NotFound => (Aggregate::new(key), true),
        })
    }

    /// The course-category aggregate of one marking period, computed and
    /// cached when it is missing.
    pub(crate) fn period_category_aggregate(
        &mut self,
        student: StudentId,
        course: CourseId,
        category: CategoryId,
        marking_period: MarkingPeriodId,
    ) -> Result<Aggregate> {
        let key = AggregateKey::course_category(student, course, category, Some(marking_period));
        match cache::repair_or_fetch(&mut self.store, &key)? {
            CacheLookup::Found(found) => Ok(found),
            CacheLookup::Repaired { .. } | CacheLookup::NotFound => Ok(self
                .calculate_course_category_aggregate(student, course, category, Some(marking_period), None)?
                .0),
        }
    }

    // -----------------------------------------------------------------------
    // Aggregators
    // -----------------------------------------------------------------------

    /// Compute a student's aggregate for one category of a course.
    ///
    /// `marking_period = None` considers items across the whole course.
    /// Passing an explicit `items` subset computes a one-off value that is
    /// never persisted.
    pub fn calculate_course_category_aggregate(
        &mut self,
        student: StudentId,
        course: CourseId,
        category: CategoryId,
        marking_period: Option<MarkingPeriodId>,
        items: Option<&[ItemId]>,
    ) -> Result<(Aggregate, bool)> {
        let book = self.book;
        let course_record = book.course(course)?;
        let category_record = book.category(category)?;
        let rule = self.course_rule(course_record)?;
        let save = items.is_none();

        let key = AggregateKey::course_category(student, course, category, marking_period);
        let (mut aggregate, created) = self.fetch_or_blank(key)?;
        aggregate.name = book.describe(&key);
        aggregate.cached_substitution = None;

        let department = course_record.department;
        let mut sum = WeightedSum::default();
        let considered = book
            .items_for(course, category, marking_period)
            .filter(|item| items.map_or(true, |subset| subset.contains(&item.id)));

        if category_record.allow_multiple_demonstrations {
            // only the best of repeated demonstrations counts for an item
            for item in considered {
                let Some(points_possible) = item.points_possible else {
                    continue;
                };
                let Some(best) = book.best_mark(student, item.id) else {
                    continue;
                };
                let substituted = rule.substitute(department, Some(category), best);
                sum.add_raw(substituted.calculate_as, points_possible);
                // the last substitution wins
                if substituted.display_as.is_some() {
                    aggregate.cached_substitution = substituted.display_as;
                }
            }
        } else {
            for item in considered {
                let Some(points_possible) = item.points_possible else {
                    continue;
                };
                for mark in book.marks_for(student, item.id) {
                    let Some(value) = mark.mark else {
                        continue;
                    };
                    let substituted = rule.substitute(department, Some(category), value);
                    sum.add_raw(substituted.calculate_as, points_possible);
                    if substituted.display_as.is_some() {
                        aggregate.cached_substitution = substituted.display_as;
                    }
                }
            }
        }

        aggregate.cached_value = sum
            .ratio()
            .and_then(|ratio| ratio.checked_mul(POINT_SCALE))
            .map(normalize_stored);

        if save {
            self.store.save(&mut aggregate)?;
        }
        tracing::debug!(
            key = %key,
            value = ?aggregate.cached_value,
            substitution = ?aggregate.cached_substitution,
            saved = save,
            "calculated course category aggregate"
        );
        Ok((aggregate, created))
    }

    /// Combine the rule-weighted category aggregates of a course.
    ///
    /// Category aggregates are read from the cache and only recomputed when
    /// they were missing, when `recalculate_all_categories` is set, or when
    /// an item of the explicit `items` subset belongs to them.
    pub fn calculate_course_aggregate(
        &mut self,
        student: StudentId,
        course: CourseId,
        marking_period: Option<MarkingPeriodId>,
        items: Option<&[ItemId]>,
        recalculate_all_categories: bool,
    ) -> Result<(Aggregate, bool)> {
        let book = self.book;
        let course_record = book.course(course)?;
        let rule = self.course_rule(course_record)?;
        let save = items.is_none();
        let touched_categories: BTreeSet<CategoryId> = items
            .unwrap_or_default()
            .iter()
            .filter_map(|id| book.item(*id).ok())
            .map(|item| item.category)
            .collect();

        let key = AggregateKey::course(student, course, marking_period);
        let (mut aggregate, created) = self.fetch_or_blank(key)?;
        aggregate.name = book.describe(&key);
        aggregate.cached_substitution = None;

        let mut sum = WeightedSum::default();
        for entry in rule.per_course_categories_for(course_record.department) {
            let category_key =
                AggregateKey::course_category(student, course, entry.category, marking_period);
            let (mut category_aggregate, category_created) =
                cache::get_or_create(&mut self.store, &category_key)?;

            if category_created && items.is_some() {
                // fill the freshly created row with its full value before
                // computing the one-off subset value
                self.calculate_course_category_aggregate(
                    student,
                    course,
                    entry.category,
                    marking_period,
                    None,
                )?;
            }
            if category_created
                || recalculate_all_categories
                || touched_categories.contains(&entry.category)
            {
                category_aggregate = self
                    .calculate_course_category_aggregate(
                        student,
                        course,
                        entry.category,
                        marking_period,
                        items,
                    )?
                    .0;
            }

            if let Some(value) = category_aggregate.cached_value {
                sum.add(value, entry.weight);
                // the last substitution wins
                if category_aggregate.cached_substitution.is_some() {
                    aggregate.cached_substitution = category_aggregate.cached_substitution;
                }
            }
        }

        aggregate.cached_value = sum.ratio().map(normalize_stored);

        if save {
            self.store.save(&mut aggregate)?;
            if let Some(marking_period) = marking_period {
                self.write_legacy_grade(&aggregate, marking_period)?;
            }
        }
        tracing::debug!(
            key = %key,
            value = ?aggregate.cached_value,
            substitution = ?aggregate.cached_substitution,
            saved = save,
            "calculated course aggregate"
        );
        Ok((aggregate, created))
    }

    /// Mirror a course aggregate into the legacy grade table.
    fn write_legacy_grade(&mut self, aggregate: &Aggregate, marking_period: MarkingPeriodId) -> Result<()> {
        let (Some(course), student) = (aggregate.key.course, aggregate.key.student) else {
            return Ok(());
        };
        let mut grade = self
            .store
            .legacy_grades(student, course)?
            .into_iter()
            .find(|g| g.marking_period == Some(marking_period) && !g.override_final)
            .unwrap_or_else(|| LegacyGrade::new(student, course, marking_period));

        match &aggregate.cached_substitution {
            Some(substitution) => {
                // the letter grade column is narrower than some substitutions
                grade.letter_grade = Some(
                    substitution
                        .chars()
                        .take(self.config.letter_grade_max_length)
                        .collect(),
                );
                grade.grade = None;
            }
            None => {
                grade.grade = aggregate.cached_value;
                grade.letter_grade = None;
            }
        }
        self.store.save_legacy_grade(grade)
    }

    /// Compute a category scored across every course of a marking period,
    /// weighting each course by its credits per marking period.
    pub fn calculate_category_as_course_aggregate(
        &mut self,
        student: StudentId,
        category: CategoryId,
        marking_period: MarkingPeriodId,
    ) -> Result<(Aggregate, bool)> {
        let book = self.book;
        let period = book.marking_period(marking_period)?;
        let rule = book.find_calculation_rule(period.school_year)?;
        let entry = rule.category_as_course(category).ok_or_else(|| {
            GradebookError::CategoryNotCourseScored {
                category: book
                    .category(category)
                    .map_or_else(|_| format!("#{category}"), |c| c.name.clone()),
                school_year: book
                    .school_year(period.school_year)
                    .map_or_else(|_| format!("#{}", period.school_year), |y| y.name.clone()),
            }
        })?;

        let key = AggregateKey::category_as_course(student, category, marking_period);
        let (mut aggregate, created) = cache::get_or_create(&mut self.store, &key)?;
        aggregate.name = book.describe(&key);
        aggregate.cached_substitution = None;

        let mut sum = WeightedSum::default();
        let courses = book.courses_for_student(student).filter(|course| {
            course.runs_in(marking_period)
                && course
                    .department
                    .is_some_and(|d| entry.include_departments.contains(&d))
        });
        for course in courses {
            let Some(credits) = course.credits_per_marking_period() else {
                continue;
            };
            let course_aggregate =
                self.period_category_aggregate(student, course.id, category, marking_period)?;
            if let Some(value) = course_aggregate.cached_value {
                let substituted = rule.substitute(course.department, Some(category), value);
                sum.add(substituted.calculate_as, credits);
                // the last substitution wins
                if substituted.display_as.is_some() {
                    aggregate.cached_substitution = substituted.display_as;
                }
            }
        }

        aggregate.cached_value = sum.ratio().map(normalize_stored);
        self.store.save(&mut aggregate)?;
        tracing::debug!(
            key = %key,
            value = ?aggregate.cached_value,
            substitution = ?aggregate.cached_substitution,
            "calculated category-as-course aggregate"
        );
        Ok((aggregate, created))
    }

    // -----------------------------------------------------------------------
    // Recalculation triggers
    // -----------------------------------------------------------------------

    /// Recompute every aggregate an item feeds, for the given students or
    /// for everyone enrolled in the item's course.
    pub fn recalculate_on_item_change(
        &mut self,
        item: ItemId,
        students: Option<&[StudentId]>,
    ) -> Result<()> {
        let book = self.book;
        let item = book.item(item)?;
        let course = book.course(item.course)?;
        let rule = self.course_rule(course)?;
        let affects_overall_course = rule.feeds_course(item.category, course.department);
        let affects_overall_category =
            rule.feeds_category_as_course(item.category, course.department);
        let students = students.unwrap_or(&course.students);

        tracing::debug!(
            item = item.id,
            students = students.len(),
            affects_overall_course,
            affects_overall_category,
            "recalculating on item change"
        );

        for &student in students {
            self.calculate_course_category_aggregate(
                student,
                course.id,
                item.category,
                item.marking_period,
                None,
            )?;
            if affects_overall_course {
                self.calculate_course_aggregate(student, course.id, item.marking_period, None, false)?;
            }
            if affects_overall_category {
                if let Some(marking_period) = item.marking_period {
                    self.calculate_category_as_course_aggregate(student, item.category, marking_period)?;
                }
            }
            // the course-long aggregates
            self.calculate_course_category_aggregate(student, course.id, item.category, None, None)?;
            if affects_overall_course {
                self.calculate_course_aggregate(student, course.id, None, None, false)?;
            }
        }
        Ok(())
    }

    /// Recompute the aggregates a single mark feeds, for its student only.
    pub fn recalculate_on_mark_change(&mut self, mark: MarkId) -> Result<()> {
        let mark = self.book.mark(mark)?;
        self.recalculate_on_item_change(mark.item, Some(&[mark.student]))
    }

    /// Recompute every item of every course. Returns how many items were
    /// processed.
    pub fn recalculate_all(&mut self) -> Result<usize> {
        let book = self.book;
        let mut processed = 0;
        for item in book.items() {
            self.recalculate_on_item_change(item.id, None)?;
            processed += 1;
        }
        Ok(processed)
    }

    // -----------------------------------------------------------------------
    // Display
    // -----------------------------------------------------------------------

    /// A course or course-category average formatted for display.
    ///
    /// Reads the cached aggregate when possible; one-off item subsets are
    /// always computed.
    pub fn get_average(
        &mut self,
        student: StudentId,
        course: CourseId,
        category: Option<CategoryId>,
        marking_period: Option<MarkingPeriodId>,
        items: Option<&[ItemId]>,
    ) -> Result<Option<PrettyAverage>> {
        let book = self.book;
        let key = AggregateKey {
            student,
            course: Some(course),
            category,
            marking_period,
        };
        let cached = match items {
            Some(_) => None,
            None => cache::repair_or_fetch(&mut self.store, &key)?.into_found(),
        };
        let aggregate = match (cached, category) {
            (Some(aggregate), _) => aggregate,
            (None, None) => {
                self.calculate_course_aggregate(student, course, marking_period, items, false)?
                    .0
            }
            (None, Some(category)) => {
                self.calculate_course_category_aggregate(student, course, category, marking_period, items)?
                    .0
            }
        };

        let rule = self.course_rule(book.course(course)?)?;
        let category = category.map(|id| book.category(id)).transpose()?;
        Ok(prettify(&aggregate, rule, category))
    }

    /// A category-as-course average formatted for display.
    pub fn get_category_average(
        &mut self,
        student: StudentId,
        category: CategoryId,
        marking_period: MarkingPeriodId,
    ) -> Result<Option<PrettyAverage>> {
        let book = self.book;
        let key = AggregateKey::category_as_course(student, category, marking_period);
        let aggregate = match cache::repair_or_fetch(&mut self.store, &key)?.into_found() {
            Some(aggregate) => aggregate,
            None => {
                self.calculate_category_as_course_aggregate(student, category, marking_period)?
                    .0
            }
        };

        let period = book.marking_period(marking_period)?;
        let rule = book.find_calculation_rule(period.school_year)?;
        Ok(prettify(&aggregate, rule, Some(book.category(category)?)))
    }
}

fn prettify(
    aggregate: &Aggregate,
    rule: &CalculationRule,
    category: Option<&Category>,
) -> Option<PrettyAverage> {
    if let Some(substitution) = &aggregate.cached_substitution {
        return Some(PrettyAverage::Substitution(substitution.clone()));
    }
    let value = aggregate.cached_value?;
    match category.and_then(|c| c.display_scale.map(|scale| (scale, &c.display_symbol))) {
        Some((scale, symbol)) => {
            let scaled = (value / POINT_SCALE).checked_mul(scale)?;
            let scaled = round_half_up(scaled, rule.decimal_places);
            Some(PrettyAverage::Scaled(format!("{scaled}{symbol}")))
        }
        None => Some(PrettyAverage::Value(round_half_up(value, rule.decimal_places))),
    }
}
