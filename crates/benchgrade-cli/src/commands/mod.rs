pub mod average;
pub mod gpa;
pub mod incomplete;
pub mod init;
pub mod item_counts;
pub mod recalculate;
pub mod report_card;
pub mod validate;

use anyhow::Result;

use benchgrade_core::config::{load_config_from, BenchgradeConfig};
use benchgrade_core::engine::BenchmarkEngine;
use benchgrade_core::memory::MemoryStore;
use benchgrade_core::parser::parse_gradebook;
use benchgrade_core::traits::LegacyGradeStore;

use crate::CommonArgs;

pub fn load_config(common: &CommonArgs) -> Result<BenchgradeConfig> {
    let mut config = load_config_from(common.config.as_deref())?;
    if let Some(gradebook) = &common.gradebook {
        config.gradebook = gradebook.clone();
    }
    if let Some(cache) = &common.cache {
        config.cache = cache.clone();
    }
    Ok(config)
}

/// Load the gradebook and cache, run `f` against an engine, then persist the
/// cache.
pub fn with_engine<T>(
    common: &CommonArgs,
    f: impl FnOnce(&mut BenchmarkEngine<'_, MemoryStore>) -> Result<T>,
) -> Result<T> {
    let config = load_config(common)?;
    let book = parse_gradebook(&config.gradebook)?;

    let mut store = if config.cache.exists() {
        MemoryStore::load_json(&config.cache)?
    } else {
        MemoryStore::new()
    };
    // legacy grades entered in the gradebook since the cache was written
    for grade in book.legacy_grades() {
        let existing = store.legacy_grades(grade.student, grade.course)?;
        if !existing.iter().any(|row| row.same_slot(grade)) {
            store.save_legacy_grade(grade.clone())?;
        }
    }
    tracing::debug!(
        gradebook = %config.gradebook.display(),
        cache = %config.cache.display(),
        aggregates = store.aggregates().len(),
        "opened gradebook"
    );

    let mut engine = BenchmarkEngine::new(&book, store, config.engine_config());
    let output = f(&mut engine)?;
    engine.into_store().save_json(&config.cache)?;
    Ok(output)
}
