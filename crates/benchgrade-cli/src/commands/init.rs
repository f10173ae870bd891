//! The `benchgrade init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create benchgrade.toml
    if std::path::Path::new("benchgrade.toml").exists() {
        println!("benchgrade.toml already exists, skipping.");
    } else {
        std::fs::write("benchgrade.toml", SAMPLE_CONFIG)?;
        println!("Created benchgrade.toml");
    }

    // Create example gradebook
    std::fs::create_dir_all("gradebooks")?;
    let example_path = std::path::Path::new("gradebooks/example.toml");
    if example_path.exists() {
        println!("gradebooks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_GRADEBOOK)?;
        println!("Created gradebooks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit gradebooks/example.toml or point benchgrade.toml at your own export");
    println!("  2. Run: benchgrade validate");
    println!("  3. Run: benchgrade recalculate");
    println!("  4. Run: benchgrade report-card --date 2013-11-15 --format all");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# benchgrade configuration

gradebook = "gradebooks/example.toml"
cache = "benchgrade-cache.json"

# Best marks at or above this count as passing on report cards
passing_grade = "3"

# Width of the legacy letter-grade column; longer substitutions are truncated
letter_grade_max_length = 2

gpa_decimal_places = 2
"#;

const EXAMPLE_GRADEBOOK: &str = include_str!("../../../../gradebooks/sample.toml");
