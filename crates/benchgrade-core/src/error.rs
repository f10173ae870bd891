//! Gradebook error types.
//!
//! Fatal configuration problems (no rule for a year, dangling references)
//! surface through [`GradebookError`]. Cache corruption and legacy-grade
//! failures are handled inside the engine and never reach the caller.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the aggregation engine.
#[derive(Debug, Error)]
pub enum GradebookError {
    /// No calculation rule is effective for the school year.
    #[error("there is no suitable calculation rule for the school year {0}")]
    NoApplicableRule(String),

    /// A record referenced by id does not exist in the gradebook.
    #[error("unknown {kind} with id {id}")]
    UnknownRecord { kind: &'static str, id: u32 },

    /// The course has no marking periods, so its school year is unknown.
    #[error("course {0} has no marking periods")]
    CourseWithoutMarkingPeriod(String),

    /// The rule has no category-as-course entry for the category.
    #[error("category {category} is not scored as a course in {school_year}")]
    CategoryNotCourseScored {
        category: String,
        school_year: String,
    },

    /// No legacy grade could be found for a course.
    #[error("no legacy grade for student {student} in course {course}")]
    NoLegacyGrade { student: String, course: String },

    /// No reportable marking period starts before the report date.
    #[error("no reportable marking period before {0}")]
    NoReportingPeriod(NaiveDate),

    /// The backing store failed.
    #[error("aggregate store error: {0}")]
    Store(String),
}

impl GradebookError {
    pub(crate) fn unknown(kind: &'static str, id: u32) -> Self {
        GradebookError::UnknownRecord { kind, id }
    }
}

/// Result alias used throughout the engine.
pub type Result<T, E = GradebookError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_record() {
        let err = GradebookError::unknown("course", 7);
        assert_eq!(err.to_string(), "unknown course with id 7");
    }
}
