//! Store and calculator seams the engine is built against.
//!
//! The engine never reaches for global state: the aggregate cache and the
//! legacy grade table are injected through these traits, and the legacy
//! per-course grade calculation is a pluggable [`LegacyGradeCalculator`].

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::model::{
    Aggregate, AggregateId, AggregateKey, CourseId, Gradebook, LegacyGrade, MarkingPeriodId,
    StudentId,
};

// ---------------------------------------------------------------------------
// Aggregate cache
// ---------------------------------------------------------------------------

/// Key-value storage for cached aggregates.
///
/// Implementations are not required to enforce key uniqueness; the engine
/// treats more than one row per key as corruption and repairs it.
pub trait AggregateStore {
    /// Every row stored under `key`.
    fn find(&self, key: &AggregateKey) -> Result<Vec<Aggregate>>;

    /// Insert the aggregate (when `id` is `None`) or overwrite the row with
    /// its id. Assigns and returns the row id.
    fn save(&mut self, aggregate: &mut Aggregate) -> Result<AggregateId>;

    /// Delete rows by id, returning how many were removed.
    fn delete(&mut self, ids: &[AggregateId]) -> Result<usize>;
}

// ---------------------------------------------------------------------------
// Legacy grades
// ---------------------------------------------------------------------------

/// Storage for legacy per-marking-period grade records.
pub trait LegacyGradeStore {
    /// All legacy grade rows of a student in a course.
    fn legacy_grades(&self, student: StudentId, course: CourseId) -> Result<Vec<LegacyGrade>>;

    /// Insert or replace the row occupying the same slot.
    fn save_legacy_grade(&mut self, grade: LegacyGrade) -> Result<()>;
}

/// A course grade from the legacy scheme with the credits it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyCourseGrade {
    pub grade: Decimal,
    pub credits: Decimal,
}

/// Per-course grade calculation for years without benchmark grading.
pub trait LegacyGradeCalculator {
    /// Grade and credits of one course, optionally restricted to a single
    /// marking period or to marking periods ending by `date_report`.
    fn calculate_grade_for_single_course(
        &self,
        book: &Gradebook,
        grades: &dyn LegacyGradeStore,
        student: StudentId,
        course: CourseId,
        marking_period: Option<MarkingPeriodId>,
        date_report: Option<NaiveDate>,
    ) -> anyhow::Result<LegacyCourseGrade>;
}
