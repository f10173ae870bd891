//! In-memory store with JSON snapshot persistence.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error;
use crate::model::{Aggregate, AggregateId, AggregateKey, CourseId, LegacyGrade, StudentId};
use crate::traits::{AggregateStore, LegacyGradeStore};

/// Aggregate cache and legacy grade table held in memory.
///
/// Rows are kept in insertion order and keys are not unique, mirroring a
/// relational table without a uniqueness constraint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    next_id: AggregateId,
    #[serde(default)]
    aggregates: Vec<Aggregate>,
    #[serde(default)]
    legacy_grades: Vec<LegacyGrade>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with legacy grade rows.
    pub fn with_legacy_grades(grades: impl IntoIterator<Item = LegacyGrade>) -> Self {
        Self {
            legacy_grades: grades.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn aggregates(&self) -> &[Aggregate] {
        &self.aggregates
    }

    pub fn legacy_grade_rows(&self) -> &[LegacyGrade] {
        &self.legacy_grades
    }

    /// Append a row without looking for an existing one under its key.
    pub fn insert_raw(&mut self, mut aggregate: Aggregate) -> AggregateId {
        let id = self.allocate_id();
        aggregate.id = Some(id);
        self.aggregates.push(aggregate);
        id
    }

    /// Drop every cached aggregate, keeping legacy grades.
    pub fn clear_aggregates(&mut self) {
        self.aggregates.clear();
    }

    fn allocate_id(&mut self) -> AggregateId {
        self.next_id += 1;
        self.next_id
    }

    /// Save the store as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize cache")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write cache to {}", path.display()))?;
        Ok(())
    }

    /// Load a store from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cache from {}", path.display()))?;
        let store: MemoryStore =
            serde_json::from_str(&content).context("failed to parse cache JSON")?;
        Ok(store)
    }
}

impl AggregateStore for MemoryStore {
    fn find(&self, key: &AggregateKey) -> error::Result<Vec<Aggregate>> {
        Ok(self
            .aggregates
            .iter()
            .filter(|row| row.key == *key)
            .cloned()
            .collect())
    }

    fn save(&mut self, aggregate: &mut Aggregate) -> error::Result<AggregateId> {
        if let Some(id) = aggregate.id {
            if let Some(row) = self.aggregates.iter_mut().find(|row| row.id == Some(id)) {
                *row = aggregate.clone();
                return Ok(id);
            }
        }
        let id = self.insert_raw(aggregate.clone());
        aggregate.id = Some(id);
        Ok(id)
    }

    fn delete(&mut self, ids: &[AggregateId]) -> error::Result<usize> {
        let before = self.aggregates.len();
        self.aggregates
            .retain(|row| !row.id.is_some_and(|id| ids.contains(&id)));
        Ok(before - self.aggregates.len())
    }
}

impl LegacyGradeStore for MemoryStore {
    fn legacy_grades(&self, student: StudentId, course: CourseId) -> error::Result<Vec<LegacyGrade>> {
        Ok(self
            .legacy_grades
            .iter()
            .filter(|g| g.student == student && g.course == course)
            .cloned()
            .collect())
    }

    fn save_legacy_grade(&mut self, grade: LegacyGrade) -> error::Result<()> {
        match self.legacy_grades.iter_mut().find(|g| g.same_slot(&grade)) {
            Some(existing) => *existing = grade,
            None => self.legacy_grades.push(grade),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::d;

    #[test]
    fn save_updates_in_place() {
        let mut store = MemoryStore::new();
        let key = AggregateKey::course(1, 10, None);
        let mut aggregate = Aggregate::new(key);
        let id = store.save(&mut aggregate).unwrap();
        assert_eq!(aggregate.id, Some(id));

        aggregate.cached_value = Some(d("2.5"));
        store.save(&mut aggregate).unwrap();
        assert_eq!(store.aggregates().len(), 1);
        assert_eq!(store.find(&key).unwrap()[0].cached_value, Some(d("2.5")));
    }

    #[test]
    fn delete_removes_only_listed_rows() {
        let mut store = MemoryStore::new();
        let key = AggregateKey::course(1, 10, None);
        let a = store.insert_raw(Aggregate::new(key));
        let b = store.insert_raw(Aggregate::new(key));
        assert_ne!(a, b);
        assert_eq!(store.delete(&[a]).unwrap(), 1);
        assert_eq!(store.find(&key).unwrap().len(), 1);
        assert_eq!(store.delete(&[a]).unwrap(), 0);
    }

    #[test]
    fn clear_aggregates_keeps_legacy_grades() {
        let mut store = MemoryStore::with_legacy_grades(vec![LegacyGrade::new(1, 20, 5)]);
        let first = store.insert_raw(Aggregate::new(AggregateKey::course(1, 10, None)));
        store.clear_aggregates();
        assert!(store.aggregates().is_empty());
        assert_eq!(store.legacy_grade_rows().len(), 1);

        // ids keep increasing after a clear
        let mut aggregate = Aggregate::new(AggregateKey::course(1, 10, None));
        assert!(store.save(&mut aggregate).unwrap() > first);
    }

    #[test]
    fn legacy_grade_upserts_by_slot() {
        let mut store = MemoryStore::new();
        let mut grade = LegacyGrade::new(1, 10, 1);
        grade.grade = Some(d("3.1"));
        store.save_legacy_grade(grade.clone()).unwrap();
        grade.grade = Some(d("3.4"));
        store.save_legacy_grade(grade).unwrap();

        let mut override_final = LegacyGrade::new(1, 10, 1);
        override_final.override_final = true;
        store.save_legacy_grade(override_final).unwrap();

        let rows = store.legacy_grades(1, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].grade, Some(d("3.4")));
        assert!(store.legacy_grades(2, 10).unwrap().is_empty());
    }

    #[test]
    fn json_snapshot_preserves_rows_and_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("store.json");

        let mut store = MemoryStore::with_legacy_grades(vec![LegacyGrade::new(1, 20, 5)]);
        let mut aggregate = Aggregate::new(AggregateKey::course(1, 10, Some(1)));
        aggregate.cached_value = Some(d("3.35"));
        aggregate.cached_substitution = Some("INC".into());
        store.save(&mut aggregate).unwrap();
        store.save_json(&path).unwrap();

        let mut loaded = MemoryStore::load_json(&path).unwrap();
        assert_eq!(loaded.aggregates(), store.aggregates());
        assert_eq!(loaded.legacy_grade_rows().len(), 1);

        // ids keep counting from where the snapshot left off
        let next = loaded.insert_raw(Aggregate::new(AggregateKey::course(2, 10, None)));
        assert!(next > aggregate.id.unwrap());
    }
}
