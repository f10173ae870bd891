//! The `benchgrade recalculate` command.

use anyhow::Result;

use super::with_engine;
use crate::CommonArgs;

pub fn execute(
    common: &CommonArgs,
    item: Option<u32>,
    mark: Option<u32>,
    students: Vec<u32>,
    rebuild: bool,
) -> Result<()> {
    with_engine(common, |engine| {
        if rebuild {
            let dropped = engine.store().aggregates().len();
            engine.store_mut().clear_aggregates();
            println!("Dropped {dropped} cached aggregate(s)");
        }
        match (item, mark) {
            (_, Some(mark)) => {
                engine.recalculate_on_mark_change(mark)?;
                println!("Recalculated mark {mark}");
            }
            (Some(item), None) => {
                let subset = (!students.is_empty()).then_some(students.as_slice());
                engine.recalculate_on_item_change(item, subset)?;
                match subset {
                    Some(students) => {
                        println!("Recalculated item {item} for {} student(s)", students.len())
                    }
                    None => println!("Recalculated item {item}"),
                }
            }
            (None, None) => {
                let processed = engine.recalculate_all()?;
                println!("Recalculated {processed} item(s)");
            }
        }
        println!("{} aggregate(s) cached", engine.store().aggregates().len());
        Ok(())
    })
}
