//! Aggregate cache accessor with duplicate-row repair.
//!
//! Concurrent recalculations of the same key can race and leave more than
//! one row behind. Rather than guess which one is right, every row for the
//! key is deleted and the caller recomputes.

use crate::error::Result;
use crate::model::{Aggregate, AggregateKey};
use crate::traits::AggregateStore;

/// Outcome of reading one aggregate from the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Exactly one row was stored under the key.
    Found(Aggregate),
    /// Duplicate rows were found and purged; the value must be recomputed.
    Repaired { purged: usize },
    /// Nothing is cached under the key.
    NotFound,
}

impl CacheLookup {
    /// The cached aggregate, treating a repair like a miss.
    pub fn into_found(self) -> Option<Aggregate> {
        match self {
            CacheLookup::Found(aggregate) => Some(aggregate),
            CacheLookup::Repaired { .. } | CacheLookup::NotFound => None,
        }
    }
}

/// Read the single aggregate stored under `key`, purging duplicates.
pub fn repair_or_fetch<S>(store: &mut S, key: &AggregateKey) -> Result<CacheLookup>
where
    S: AggregateStore + ?Sized,
{
    let mut rows = store.find(key)?;
    match rows.len() {
        0 => Ok(CacheLookup::NotFound),
        1 => Ok(CacheLookup::Found(rows.remove(0))),
        found => {
            tracing::error!("expected at most 1 aggregate for {key} but found {found}; flushing them all");
            let ids: Vec<_> = rows.iter().filter_map(|row| row.id).collect();
            let purged = store.delete(&ids)?;
            Ok(CacheLookup::Repaired { purged })
        }
    }
}

/// Read the aggregate stored under `key`, inserting a blank one if absent.
///
/// Returns the aggregate and whether it was created by this call.
pub fn get_or_create<S>(store: &mut S, key: &AggregateKey) -> Result<(Aggregate, bool)>
where
    S: AggregateStore + ?Sized,
{
    match repair_or_fetch(store, key)? {
        CacheLookup::Found(aggregate) => Ok((aggregate, false)),
        CacheLookup::Repaired { .. } | CacheLookup::NotFound => {
            let mut aggregate = Aggregate::new(*key);
            store.save(&mut aggregate)?;
            Ok((aggregate, true))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::testing::d;

    fn key() -> AggregateKey {
        AggregateKey::course_category(1, 10, 1, Some(1))
    }

    #[test]
    fn missing_key_is_not_found() {
        let mut store = MemoryStore::new();
        assert_eq!(repair_or_fetch(&mut store, &key()).unwrap(), CacheLookup::NotFound);
    }

    #[test]
    fn single_row_is_found() {
        let mut store = MemoryStore::new();
        let mut aggregate = Aggregate::new(key());
        aggregate.cached_value = Some(d("3.5"));
        store.save(&mut aggregate).unwrap();

        let found = repair_or_fetch(&mut store, &key()).unwrap().into_found().unwrap();
        assert_eq!(found.cached_value, Some(d("3.5")));
        assert_eq!(found.id, aggregate.id);
    }

    #[test]
    fn duplicate_rows_are_purged() {
        let mut store = MemoryStore::new();
        store.insert_raw(Aggregate::new(key()));
        store.insert_raw(Aggregate::new(key()));
        store.insert_raw(Aggregate::new(AggregateKey::course(1, 10, Some(1))));

        let lookup = repair_or_fetch(&mut store, &key()).unwrap();
        assert_eq!(lookup, CacheLookup::Repaired { purged: 2 });
        assert!(lookup.into_found().is_none());
        assert!(store.find(&key()).unwrap().is_empty());
        assert_eq!(store.aggregates().len(), 1);
    }

    #[test]
    fn get_or_create_inserts_once() {
        let mut store = MemoryStore::new();
        let (first, created) = get_or_create(&mut store, &key()).unwrap();
        assert!(created);
        assert!(first.id.is_some());
        assert_eq!(first.cached_value, None);

        let (second, created) = get_or_create(&mut store, &key()).unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
    }

    #[test]
    fn get_or_create_replaces_duplicates() {
        let mut store = MemoryStore::new();
        let stale = store.insert_raw(Aggregate::new(key()));
        store.insert_raw(Aggregate::new(key()));

        let (fresh, created) = get_or_create(&mut store, &key()).unwrap();
        assert!(created);
        assert_ne!(fresh.id, Some(stale));
        assert_eq!(store.find(&key()).unwrap().len(), 1);
    }
}
