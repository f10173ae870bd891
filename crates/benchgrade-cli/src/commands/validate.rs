//! The `benchgrade validate` command.

use anyhow::Result;

use benchgrade_core::parser;

use super::load_config;
use crate::CommonArgs;

pub fn execute(common: &CommonArgs) -> Result<()> {
    let config = load_config(common)?;
    let path = &config.gradebook;

    let books = if path.is_dir() {
        parser::load_gradebook_directory(path)?
    } else {
        vec![parser::parse_gradebook(path)?]
    };

    let mut total_warnings = 0;

    for book in &books {
        println!(
            "Gradebook: {} ({} students, {} courses, {} items, {} marks, {} rules)",
            book.name,
            book.students().count(),
            book.courses().count(),
            book.items().count(),
            book.marks().count(),
            book.rules().len()
        );

        let warnings = parser::validate_gradebook(book);
        for w in &warnings {
            let prefix = w
                .record
                .as_ref()
                .map(|record| format!("  [{record}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All gradebooks valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
