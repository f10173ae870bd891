//! benchgrade CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use benchgrade_core::analytics::ItemCountCriteria;

mod commands;

#[derive(Parser)]
#[command(
    name = "benchgrade",
    version,
    about = "Benchmark gradebook aggregation, GPAs and report cards"
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads a gradebook.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Gradebook TOML file (or directory for `validate`); overrides the config
    #[arg(long, global = true)]
    pub gradebook: Option<PathBuf>,

    /// Aggregate cache JSON file; overrides the config
    #[arg(long, global = true)]
    pub cache: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate gradebook TOML files
    Validate,

    /// Recompute cached aggregates
    Recalculate {
        /// Only the aggregates fed by this item
        #[arg(long, conflicts_with = "mark")]
        item: Option<u32>,

        /// Only the aggregates fed by this mark
        #[arg(long)]
        mark: Option<u32>,

        /// Restrict an item recalculation to these students (comma-separated)
        #[arg(long, value_delimiter = ',', requires = "item")]
        students: Vec<u32>,

        /// Drop every cached aggregate before recomputing all items
        #[arg(long, conflicts_with_all = ["item", "mark"])]
        rebuild: bool,
    },

    /// Show a course, category or category-as-course average
    Average {
        #[arg(long)]
        student: u32,

        /// Course; omit to read a category scored across courses
        #[arg(long)]
        course: Option<u32>,

        #[arg(long)]
        category: Option<u32>,

        #[arg(long)]
        marking_period: Option<u32>,

        /// Compute over these items only, without caching (comma-separated)
        #[arg(long, value_delimiter = ',', requires = "course")]
        items: Vec<u32>,
    },

    /// Show GPAs
    Gpa {
        /// Student; omit for every student
        #[arg(long)]
        student: Option<u32>,

        /// Courses to include (comma-separated); defaults to graded enrollments
        #[arg(long, value_delimiter = ',', requires = "student")]
        courses: Vec<u32>,

        /// Restrict to a single marking period
        #[arg(long, conflicts_with = "date")]
        marking_period: Option<u32>,

        /// Only marking periods ending on or before this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Build report cards as of a date
    ReportCard {
        /// Report date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Students to include (comma-separated); defaults to everyone
        #[arg(long, value_delimiter = ',')]
        students: Vec<u32>,

        /// Output directory
        #[arg(long, default_value = "./benchgrade-reports")]
        output: PathBuf,

        /// Output format: json, html, all
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// List students holding a substitution in some course this school year
    Incomplete {
        /// Report date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Category whose per-period averages are checked
        #[arg(long, default_value = "Standards")]
        category: String,

        /// Substitution text to look for
        #[arg(long, default_value = "INC")]
        substitution: String,

        /// List the students without any match instead
        #[arg(long)]
        inverse: bool,
    },

    /// List students with many items at a best mark across their courses
    ItemCounts {
        /// Report date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Categories counted over the school year (comma-separated)
        #[arg(long, value_delimiter = ',')]
        year_categories: Vec<String>,

        /// Categories counted in the current marking period (comma-separated)
        #[arg(long, value_delimiter = ',')]
        period_categories: Vec<String>,

        /// Best mark an item must have to match [default: 0]
        #[arg(long)]
        best_mark: Option<Decimal>,

        /// Percentage of matching items that flags a course [default: 20]
        #[arg(long)]
        percentage: Option<Decimal>,

        /// Flagged courses needed to list a student [default: 3]
        #[arg(long)]
        courses: Option<usize>,

        /// List the students below the course threshold instead
        #[arg(long)]
        inverse: bool,
    },

    /// Create starter config and example gradebook
    Init,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("benchgrade=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let common = cli.common;

    let result = match cli.command {
        Commands::Validate => commands::validate::execute(&common),
        Commands::Recalculate {
            item,
            mark,
            students,
            rebuild,
        } => commands::recalculate::execute(&common, item, mark, students, rebuild),
        Commands::Average {
            student,
            course,
            category,
            marking_period,
            items,
        } => commands::average::execute(&common, student, course, category, marking_period, items),
        Commands::Gpa {
            student,
            courses,
            marking_period,
            date,
        } => commands::gpa::execute(&common, student, courses, marking_period, date),
        Commands::ReportCard {
            date,
            students,
            output,
            format,
        } => commands::report_card::execute(&common, date, students, output, format),
        Commands::Incomplete {
            date,
            category,
            substitution,
            inverse,
        } => commands::incomplete::execute(&common, date, &category, &substitution, inverse),
        Commands::ItemCounts {
            date,
            year_categories,
            period_categories,
            best_mark,
            percentage,
            courses,
            inverse,
        } => {
            let mut criteria = ItemCountCriteria::zero_standards();
            if !year_categories.is_empty() || !period_categories.is_empty() {
                criteria.year_categories = year_categories;
                criteria.current_period_categories = period_categories;
            }
            if let Some(best_mark) = best_mark {
                criteria.best_mark = best_mark;
            }
            if let Some(percentage) = percentage {
                criteria.percentage_threshold = percentage;
            }
            if let Some(courses) = courses {
                criteria.course_threshold = courses;
            }
            commands::item_counts::execute(&common, date, &criteria, inverse)
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
