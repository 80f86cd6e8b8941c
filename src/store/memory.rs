//! In-memory storage adapter.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;

use super::{Mutation, Predicate, StoreError, UniqueKey, VersionedRecord, VersionedStore};

/// Constraint reported when an insert reuses an existing id.
const PRIMARY_KEY: &str = "primary_key";

struct Tables<R: VersionedRecord> {
    rows: HashMap<R::Id, R>,
    /// (constraint, value) -> owning record
    unique: HashMap<(&'static str, String), R::Id>,
}

impl<R: VersionedRecord> Tables<R> {
    fn check_unique(&self, id: R::Id, keys: &[UniqueKey]) -> Result<(), StoreError> {
        for key in keys {
            match self.unique.get(&(key.constraint, key.value.clone())) {
                Some(owner) if *owner != id => {
                    return Err(StoreError::UniqueViolation {
                        constraint: key.constraint,
                        field: key.field,
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn index(&mut self, id: R::Id, keys: Vec<UniqueKey>) {
        for key in keys {
            self.unique.insert((key.constraint, key.value), id);
        }
    }

    fn unindex(&mut self, keys: Vec<UniqueKey>) {
        for key in keys {
            self.unique.remove(&(key.constraint, key.value));
        }
    }
}

/// A [`VersionedStore`] held entirely in memory.
///
/// Every mutating call runs under a single write lock, so the conditional
/// update and the uniqueness checks are atomic. No lock is held across an
/// `.await`.
pub struct MemoryStore<R: VersionedRecord> {
    tables: RwLock<Tables<R>>,
}

impl<R: VersionedRecord> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                rows: HashMap::new(),
                unique: HashMap::new(),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.tables.read().rows.len()
    }
}

impl<R: VersionedRecord> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: VersionedRecord> VersionedStore<R> for MemoryStore<R> {
    async fn insert(&self, mut record: R) -> Result<R, StoreError> {
        let id = record.id();
        let keys = record.unique_keys();
        let mut tables = self.tables.write();

        if tables.rows.contains_key(&id) {
            return Err(StoreError::UniqueViolation {
                constraint: PRIMARY_KEY,
                field: "id",
            });
        }
        tables.check_unique(id, &keys)?;

        record.set_version(1);
        tables.index(id, keys);
        tables.rows.insert(id, record.clone());
        trace!(id = %id, "Record inserted");
        Ok(record)
    }

    async fn fetch(&self, id: R::Id) -> Result<Option<R>, StoreError> {
        Ok(self.tables.read().rows.get(&id).cloned())
    }

    async fn update_if_version(
        &self,
        id: R::Id,
        expected_version: i32,
        mutation: Mutation<R>,
    ) -> Result<Option<i32>, StoreError> {
        let mut tables = self.tables.write();

        let current = match tables.rows.get(&id) {
            Some(current) if current.version() == expected_version => current,
            _ => return Ok(None),
        };

        let mut next = current.clone();
        let old_keys = current.unique_keys();
        mutation(&mut next);
        if next.id() != id {
            return Err(StoreError::Rejected(format!("record {} changed its id", id)));
        }

        let new_version = expected_version
            .checked_add(1)
            .ok_or_else(|| StoreError::Rejected(format!("record {} version overflow", id)))?;
        next.set_version(new_version);

        let new_keys = next.unique_keys();
        tables.check_unique(id, &new_keys)?;
        tables.unindex(old_keys);
        tables.index(id, new_keys);
        tables.rows.insert(id, next);

        trace!(id = %id, version = new_version, "Record updated");
        Ok(Some(new_version))
    }

    async fn remove(&self, id: R::Id) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        match tables.rows.remove(&id) {
            Some(record) => {
                tables.unindex(record.unique_keys());
                trace!(id = %id, "Record removed");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find(&self, predicate: Predicate<'_, R>) -> Result<Vec<R>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .rows
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect())
    }
}
