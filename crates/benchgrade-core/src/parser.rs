//! TOML gradebook parser.
//!
//! Loads gradebook snapshots from TOML files and directories, and validates
//! them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{
    Category, Course, Department, Gradebook, Item, LegacyGrade, Mark, MarkingPeriod, SchoolYear,
    Student,
};
use crate::rules::CalculationRule;

/// Intermediate TOML structure for parsing gradebook files.
#[derive(Debug, Deserialize)]
struct TomlGradebookFile {
    #[serde(default)]
    gradebook: Option<TomlGradebookHeader>,
    #[serde(default)]
    school_years: Vec<SchoolYear>,
    #[serde(default)]
    marking_periods: Vec<MarkingPeriod>,
    #[serde(default)]
    departments: Vec<Department>,
    #[serde(default)]
    students: Vec<Student>,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    courses: Vec<Course>,
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    marks: Vec<Mark>,
    #[serde(default)]
    rules: Vec<CalculationRule>,
    #[serde(default)]
    legacy_grades: Vec<LegacyGrade>,
}

#[derive(Debug, Deserialize)]
struct TomlGradebookHeader {
    name: String,
}

/// Parse a single TOML file into a `Gradebook`.
pub fn parse_gradebook(path: &Path) -> Result<Gradebook> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read gradebook file: {}", path.display()))?;

    parse_gradebook_str(&content, path)
}

/// Parse a TOML string into a `Gradebook` (useful for testing).
pub fn parse_gradebook_str(content: &str, source_path: &Path) -> Result<Gradebook> {
    let parsed: TomlGradebookFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let name = match parsed.gradebook {
        Some(header) => header.name,
        None => source_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "gradebook".to_string()),
    };
    let mut book = Gradebook::new(name);

    // Duplicate ids would silently shadow each other in the index.
    macro_rules! load {
        ($records:expr, $insert:ident, $kind:literal) => {
            for record in $records {
                let id = record.id;
                if book.$insert(record).is_some() {
                    anyhow::bail!(
                        "duplicate {} id {} in {}",
                        $kind,
                        id,
                        source_path.display()
                    );
                }
            }
        };
    }

    load!(parsed.school_years, insert_school_year, "school year");
    load!(parsed.marking_periods, insert_marking_period, "marking period");
    load!(parsed.departments, insert_department, "department");
    load!(parsed.students, insert_student, "student");
    load!(parsed.categories, insert_category, "category");
    load!(parsed.courses, insert_course, "course");
    load!(parsed.items, insert_item, "item");
    load!(parsed.marks, insert_mark, "mark");

    for rule in parsed.rules {
        book.push_rule(rule);
    }
    for grade in parsed.legacy_grades {
        book.push_legacy_grade(grade);
    }

    Ok(book)
}

/// Load all `.toml` gradebook files from a directory (non-recursive).
pub fn load_gradebook_directory(dir: &Path) -> Result<Vec<Gradebook>> {
    let mut books = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    for path in paths {
        match parse_gradebook(&path) {
            Ok(book) => books.push(book),
            Err(e) => {
                tracing::warn!("skipping {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(books)
}

/// A warning from gradebook validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The offending record (e.g. "item 104"), if applicable.
    pub record: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn on(record: String, message: impl Into<String>) -> Self {
        Self {
            record: Some(record),
            message: message.into(),
        }
    }
}

/// Validate a gradebook for dangling references and grading gaps.
pub fn validate_gradebook(book: &Gradebook) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for period in book.marking_periods() {
        if book.school_year(period.school_year).is_err() {
            warnings.push(ValidationWarning::on(
                format!("marking period {}", period.id),
                format!("unknown school year {}", period.school_year),
            ));
        }
    }

    for course in book.courses() {
        let record = format!("course {}", course.id);
        if course.marking_periods.is_empty() {
            warnings.push(ValidationWarning::on(record.clone(), "course has no marking periods"));
        }
        for period in &course.marking_periods {
            if book.marking_period(*period).is_err() {
                warnings.push(ValidationWarning::on(
                    record.clone(),
                    format!("unknown marking period {period}"),
                ));
            }
        }
        if let Some(department) = course.department {
            if book.department(department).is_err() {
                warnings.push(ValidationWarning::on(
                    record.clone(),
                    format!("unknown department {department}"),
                ));
            }
        }
        for student in &course.students {
            if book.student(*student).is_err() {
                warnings.push(ValidationWarning::on(
                    record.clone(),
                    format!("unknown student {student}"),
                ));
            }
        }
        if course.credits.is_none() {
            warnings.push(ValidationWarning::on(
                record,
                "course has no credits and will not count toward GPA",
            ));
        }
    }

    for item in book.items() {
        let record = format!("item {}", item.id);
        if book.course(item.course).is_err() {
            warnings.push(ValidationWarning::on(
                record.clone(),
                format!("unknown course {}", item.course),
            ));
        }
        if book.category(item.category).is_err() {
            warnings.push(ValidationWarning::on(
                record.clone(),
                format!("unknown category {}", item.category),
            ));
        }
        if let Some(period) = item.marking_period {
            if book.marking_period(period).is_err() {
                warnings.push(ValidationWarning::on(
                    record.clone(),
                    format!("unknown marking period {period}"),
                ));
            }
        }
        if item.points_possible.is_none() {
            warnings.push(ValidationWarning::on(
                record,
                "item has no points possible and will be ignored",
            ));
        }
    }

    for mark in book.marks() {
        let record = format!("mark {}", mark.id);
        if book.item(mark.item).is_err() {
            warnings.push(ValidationWarning::on(
                record.clone(),
                format!("unknown item {}", mark.item),
            ));
        }
        if book.student(mark.student).is_err() {
            warnings.push(ValidationWarning::on(
                record,
                format!("unknown student {}", mark.student),
            ));
        }
    }

    let mut seen_rule_ids = HashSet::new();
    for rule in book.rules() {
        let record = format!("rule {}", rule.id);
        if !seen_rule_ids.insert(rule.id) {
            warnings.push(ValidationWarning::on(
                record.clone(),
                format!("duplicate rule ID: {}", rule.id),
            ));
        }
        if rule.points_possible.is_zero() {
            warnings.push(ValidationWarning::on(
                record.clone(),
                "points_possible is zero; GPA normalization will skip this rule's aggregates",
            ));
        }
        for category in rule
            .per_course_categories
            .iter()
            .map(|entry| entry.category)
            .chain(rule.categories_as_courses.iter().map(|entry| entry.category))
        {
            if book.category(category).is_err() {
                warnings.push(ValidationWarning::on(
                    record.clone(),
                    format!("unknown category {category}"),
                ));
            }
        }
    }

    for year in book.school_years().filter(|year| year.benchmark_grade) {
        if book.find_calculation_rule(year.id).is_err() {
            warnings.push(ValidationWarning::on(
                format!("school year {}", year.id),
                format!("no calculation rule applies to {}", year.name),
            ));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_gradebook, SAMPLE_TOML};
    use std::path::PathBuf;

    #[test]
    fn parse_sample_gradebook() {
        let book = sample_gradebook();
        assert_eq!(book.name, "Sample High School");
        assert_eq!(book.students().count(), 2);
        assert_eq!(book.courses().count(), 4);
        assert_eq!(book.rules().len(), 1);
        assert_eq!(book.rules()[0].per_course_categories.len(), 2);
        assert_eq!(book.legacy_grades().len(), 1);
        assert!(book.category(1).unwrap().allow_multiple_demonstrations);
        assert_eq!(book.mark(1006).unwrap().mark, None);
    }

    #[test]
    fn sample_gradebook_validates_cleanly() {
        let warnings = validate_gradebook(&sample_gradebook());
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn name_falls_back_to_file_stem() {
        let toml = r#"
[[students]]
id = 1
name = "Solo"
"#;
        let book = parse_gradebook_str(toml, &PathBuf::from("dir/fall-term.toml")).unwrap();
        assert_eq!(book.name, "fall-term");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let toml = r#"
[[students]]
id = 1
name = "First"

[[students]]
id = 1
name = "Second"
"#;
        let err = parse_gradebook_str(toml, &PathBuf::from("dupes.toml")).unwrap_err();
        assert!(err.to_string().contains("duplicate student id 1"));
    }

    #[test]
    fn validate_reports_dangling_references() {
        let toml = r#"
[[school_years]]
id = 1
name = "2013-2014"
start_date = "2013-08-26"
end_date = "2014-06-13"
benchmark_grade = true

[[courses]]
id = 10
name = "Orphan"
department = 9

[[items]]
id = 100
name = "Quiz"
course = 10
category = 4
"#;
        let book = parse_gradebook_str(toml, &PathBuf::from("bad.toml")).unwrap();
        let warnings = validate_gradebook(&book);
        let messages: Vec<_> = warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.contains(&"course has no marking periods"));
        assert!(messages.contains(&"unknown department 9"));
        assert!(messages.contains(&"unknown category 4"));
        assert!(messages.contains(&"item has no points possible and will be ignored"));
        assert!(messages.iter().any(|m| m.contains("no calculation rule")));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_gradebook_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sample.toml"), SAMPLE_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "not = [toml").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let books = load_gradebook_directory(dir.path()).unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].name, "Sample High School");
    }
}
