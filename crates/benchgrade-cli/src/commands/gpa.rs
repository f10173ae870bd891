//! The `benchgrade gpa` command.

use anyhow::Result;
use chrono::NaiveDate;

use super::with_engine;
use crate::CommonArgs;

pub fn execute(
    common: &CommonArgs,
    student: Option<u32>,
    courses: Vec<u32>,
    marking_period: Option<u32>,
    date: Option<NaiveDate>,
) -> Result<()> {
    with_engine(common, |engine| {
        let book = engine.gradebook();

        if let Some(student) = student {
            let name = &book.student(student)?.name;
            let gpa = if courses.is_empty() {
                engine.student_gpa(student, marking_period, date)?
            } else {
                engine.calculate_grade_for_courses(student, &courses, marking_period, date)?
            };
            println!("{name}: {gpa}");
            return Ok(());
        }

        use comfy_table::{Cell, Table};

        let mut table = Table::new();
        table.set_header(vec!["Student", "Courses", "GPA"]);
        for student in book.students() {
            let enrolled = book
                .courses_for_student(student.id)
                .filter(|course| course.graded)
                .count();
            let gpa = engine.student_gpa(student.id, marking_period, date)?;
            table.add_row(vec![
                Cell::new(&student.name),
                Cell::new(enrolled),
                Cell::new(gpa),
            ]);
        }
        println!("{table}");
        Ok(())
    })
}
