//! Shared fixtures for unit tests.

use std::path::Path;

use rust_decimal::Decimal;

use crate::engine::{BenchmarkEngine, EngineConfig};
use crate::memory::MemoryStore;
use crate::model::Gradebook;
use crate::parser::parse_gradebook_str;

pub(crate) const SAMPLE_TOML: &str = include_str!("../../../gradebooks/sample.toml");

pub(crate) fn sample_gradebook() -> Gradebook {
    parse_gradebook_str(SAMPLE_TOML, Path::new("sample.toml")).unwrap()
}

pub(crate) fn d(value: &str) -> Decimal {
    value.parse().unwrap()
}

/// An engine over `book` with an empty store seeded from the book's legacy
/// grades.
pub(crate) fn engine(book: &Gradebook) -> BenchmarkEngine<'_, MemoryStore> {
    let store = MemoryStore::with_legacy_grades(book.legacy_grades().iter().cloned());
    BenchmarkEngine::new(book, store, EngineConfig::default())
}
