//! The `benchgrade item-counts` command.

use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::{Cell, Table};

use benchgrade_core::analytics::{ItemCount, ItemCountCriteria};

use super::with_engine;
use crate::CommonArgs;

pub fn execute(
    common: &CommonArgs,
    date: NaiveDate,
    criteria: &ItemCountCriteria,
    inverse: bool,
) -> Result<()> {
    let report = with_engine(common, |engine| {
        Ok(engine.count_items_by_category(date, criteria, inverse)?)
    })?;

    println!("{} / {}", report.school_year, report.marking_period);
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
        println!("{table}");
        return Ok(());
    }

    let mut header = vec!["Student".to_string(), "Course".to_string(), "All".to_string()];
    header.extend(
        report
            .categories
            .iter()
            .map(|name| format!("{name} at {}", criteria.best_mark)),
    );
    table.set_header(header);
    for student in &report.students {
        for course in &student.courses {
            let mut row = vec![
                Cell::new(&student.name),
                Cell::new(&course.name),
                Cell::new(format_count(&course.combined)),
            ];
            row.extend(
                course
                    .categories
                    .iter()
                    .map(|category| Cell::new(format_count(&category.count))),
            );
            table.add_row(row);
        }
    }
    println!("{table}");
    Ok(())
}

fn format_count(count: &ItemCount) -> String {
    format!("{}/{} ({}%)", count.matching, count.total, count.percentage)
}
