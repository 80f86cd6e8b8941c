//! Versioned record storage.
//!
//! The storage boundary exposes one atomic conditional-write primitive
//! ([`VersionedStore::update_if_version`]). Optimistic concurrency is built on
//! top of it by [`OptimisticConcurrencyController`]; nothing above the store
//! holds a lock across a read-modify-write.

mod controller;
mod memory;

pub use controller::OptimisticConcurrencyController;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use thiserror::Error;

use crate::error::MarqueeError;

/// A record carrying an explicit version counter.
///
/// `version` starts at 1 on insert and is bumped by exactly one on every
/// successful conditional update. `id` never changes after creation.
pub trait VersionedRecord: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + Ord + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static;

    fn id(&self) -> Self::Id;

    fn version(&self) -> i32;

    /// Only the store calls this.
    fn set_version(&mut self, version: i32);

    /// Values that must be unique across all stored records.
    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }
}

/// A value covered by a uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueKey {
    /// Constraint name, e.g. `users_email_key`
    pub constraint: &'static str,
    /// Field reported back to the caller on violation
    pub field: &'static str,
    pub value: String,
}

/// Failures reported by a storage adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend could not be reached or failed mid-operation
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// A write would duplicate a unique value
    #[error("unique constraint {constraint} violated on {field}")]
    UniqueViolation {
        constraint: &'static str,
        field: &'static str,
    },

    /// A write tried to break a record invariant
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl From<StoreError> for MarqueeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { field, .. } => MarqueeError::DuplicateValue { field },
            StoreError::Unavailable(detail) | StoreError::Rejected(detail) => {
                MarqueeError::Transient(detail)
            }
        }
    }
}

/// In-place change applied to a record by a conditional write.
pub type Mutation<R> = Box<dyn FnOnce(&mut R) + Send>;

/// Record filter evaluated by the store.
pub type Predicate<'a, R> = &'a (dyn Fn(&R) -> bool + Send + Sync);

/// Storage adapter for versioned records.
#[async_trait]
pub trait VersionedStore<R: VersionedRecord>: Send + Sync {
    /// Store a new record at version 1 and return it as stored.
    async fn insert(&self, record: R) -> Result<R, StoreError>;

    async fn fetch(&self, id: R::Id) -> Result<Option<R>, StoreError>;

    /// Apply `mutation` only if the stored version equals `expected_version`.
    ///
    /// Atomic with respect to every other write. Returns the new version, or
    /// `None` when no record matched `(id, expected_version)`.
    async fn update_if_version(
        &self,
        id: R::Id,
        expected_version: i32,
        mutation: Mutation<R>,
    ) -> Result<Option<i32>, StoreError>;

    /// Remove the record with `id`. Returns whether one existed.
    async fn remove(&self, id: R::Id) -> Result<bool, StoreError>;

    /// All records matching `predicate`, in no particular order.
    async fn find(&self, predicate: Predicate<'_, R>) -> Result<Vec<R>, StoreError>;
}

/// A store shared between the request layer, query engine and controller.
pub type SharedStore<R> = Arc<dyn VersionedStore<R>>;
