//! The `benchgrade average` command.

use anyhow::{Context, Result};

use super::with_engine;
use crate::CommonArgs;

pub fn execute(
    common: &CommonArgs,
    student: u32,
    course: Option<u32>,
    category: Option<u32>,
    marking_period: Option<u32>,
    items: Vec<u32>,
) -> Result<()> {
    with_engine(common, |engine| {
        let average = match course {
            Some(course) => {
                let items = (!items.is_empty()).then_some(items.as_slice());
                engine.get_average(student, course, category, marking_period, items)?
            }
            None => {
                let category = category
                    .context("--category is required when no --course is given")?;
                let marking_period = marking_period
                    .context("--marking-period is required when no --course is given")?;
                engine.get_category_average(student, category, marking_period)?
            }
        };

        match average {
            Some(average) => println!("{average}"),
            None => println!("No average"),
        }
        Ok(())
    })
}
