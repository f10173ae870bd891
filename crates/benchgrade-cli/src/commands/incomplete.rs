//! The `benchgrade incomplete` command.

use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::{Cell, Table};

use super::with_engine;
use crate::CommonArgs;

pub fn execute(
    common: &CommonArgs,
    date: NaiveDate,
    category: &str,
    substitution: &str,
    inverse: bool,
) -> Result<()> {
    let report = with_engine(common, |engine| {
        Ok(engine.incomplete_courses(date, category, substitution, inverse)?)
    })?;

    println!(
        "{}: {} {} {substitution}",
        report.school_year,
        if inverse { "without" } else { "with" },
        report.category
    );
    if report.students.is_empty() {
        println!("No students found");
        return Ok(());
    }

    let mut table = Table::new();
    if inverse {
        table.set_header(vec!["Student"]);
        for student in &report.students {
            table.add_row(vec![Cell::new(&student.name)]);
        }
    } else {
        table.set_header(vec!["Student", "Courses"]);
        for student in &report.students {
            let courses: Vec<String> = student
                .courses
                .iter()
                .map(|course| format!("{} ({})", course.name, course.marking_periods.join(", ")))
                .collect();
            table.add_row(vec![Cell::new(&student.name), Cell::new(courses.join("; "))]);
        }
    }
    println!("{table}");
    Ok(())
}
