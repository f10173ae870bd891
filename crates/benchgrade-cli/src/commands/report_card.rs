//! The `benchgrade report-card` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;

use benchgrade_report::html::write_html_report;

use super::with_engine;
use crate::CommonArgs;

pub fn execute(
    common: &CommonArgs,
    date: NaiveDate,
    students: Vec<u32>,
    output: PathBuf,
    format: String,
) -> Result<()> {
    let (write_json, write_html) = match format.as_str() {
        "json" => (true, false),
        "html" => (false, true),
        "all" => (true, true),
        other => anyhow::bail!("unknown format '{other}', expected json, html or all"),
    };

    let set = with_engine(common, |engine| {
        let students = if students.is_empty() {
            engine.gradebook().students().map(|s| s.id).collect()
        } else {
            students
        };
        Ok(engine.build_report_cards(date, &students)?)
    })?;

    std::fs::create_dir_all(&output)?;
    let stem = format!("report-cards-{}", date.format("%Y-%m-%d"));

    if write_json {
        let path = output.join(format!("{stem}.json"));
        set.save_json(&path)?;
        println!("Report cards saved to {}", path.display());
    }
    if write_html {
        let path = output.join(format!("{stem}.html"));
        write_html_report(&set, &path)?;
        println!("HTML report saved to {}", path.display());
    }

    print_summary(&set);
    Ok(())
}

fn print_summary(set: &benchgrade_core::report::ReportCardSet) {
    use comfy_table::{Cell, Table};

    println!("\n{} / {}", set.school_year, set.marking_period);
    let mut table = Table::new();
    table.set_header(vec!["Student", "Courses", "Session GPA", "Cumulative GPA"]);

    for student in &set.students {
        table.add_row(vec![
            Cell::new(&student.name),
            Cell::new(student.courses.len()),
            Cell::new(student.session_gpa),
            Cell::new(student.cumulative_gpa),
        ]);
    }

    println!("{table}");
}
