//! Version-checked writes against a [`VersionedStore`].

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::{Predicate, SharedStore, StoreError, VersionedRecord};
use crate::error::{MarqueeError, Result};

/// Guards records against lost updates with a compare-and-swap on `version`.
///
/// The controller never caches a record and never retries. A caller reads the
/// record, passes the version it saw as `expected_version`, and on
/// `EditConflict` re-reads and decides whether to try again.
///
/// Every store call runs under `deadline`. An expired call is reported as
/// `Transient`; since the store commits atomically, an abandoned write has
/// either fully happened or not happened at all.
pub struct OptimisticConcurrencyController<R: VersionedRecord> {
    store: SharedStore<R>,
    deadline: Duration,
}

impl<R: VersionedRecord> OptimisticConcurrencyController<R> {
    pub fn new(store: SharedStore<R>, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    /// Store a new record. It starts at version 1.
    pub async fn insert(&self, record: R) -> Result<R> {
        self.bounded("insert", self.store.insert(record)).await
    }

    /// Read the current state of a record.
    pub async fn fetch(&self, id: R::Id) -> Result<R> {
        self.bounded("fetch", self.store.fetch(id))
            .await?
            .ok_or(MarqueeError::NotFound)
    }

    /// The first record matching `predicate`, in no particular order.
    pub async fn find_one(&self, predicate: Predicate<'_, R>) -> Result<R> {
        self.bounded("find", self.store.find(predicate))
            .await?
            .into_iter()
            .next()
            .ok_or(MarqueeError::NotFound)
    }

    /// Apply `mutation` if the record is still at `expected_version`.
    ///
    /// Returns the new version (`expected_version + 1`). Fails with
    /// `EditConflict` if the version has moved on *or* the record does not
    /// exist; the conditional write cannot tell these apart.
    pub async fn update<F>(&self, id: R::Id, expected_version: i32, mutation: F) -> Result<i32>
    where
        F: FnOnce(&mut R) + Send + 'static,
    {
        let outcome = self
            .bounded(
                "update",
                self.store
                    .update_if_version(id, expected_version, Box::new(mutation)),
            )
            .await?;

        match outcome {
            Some(version) => {
                debug!(id = %id, version, "Record updated");
                Ok(version)
            }
            None => {
                debug!(id = %id, expected_version, "Edit conflict");
                Err(MarqueeError::EditConflict)
            }
        }
    }

    /// Remove a record regardless of its version.
    pub async fn delete(&self, id: R::Id) -> Result<()> {
        if self.bounded("delete", self.store.remove(id)).await? {
            debug!(id = %id, "Record deleted");
            Ok(())
        } else {
            Err(MarqueeError::NotFound)
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result.map_err(MarqueeError::from),
            Err(_) => Err(MarqueeError::Transient(format!(
                "{} exceeded deadline of {:?}",
                operation, self.deadline
            ))),
        }
    }
}
