//! Match persistence seam.
//!
//! HTTP handlers talk to a [`MatchStore`]; the binary wires in
//! [`InMemoryMatchStore`].

use async_trait::async_trait;
use chrono::Utc;
use matchcast_core::matches::{Match, NewMatch};
use parking_lot::Mutex;
use thiserror::Error;

/// Errors from a match store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store refused or failed the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for matches.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Persist a validated match and return the stored record.
    async fn create(&self, new_match: NewMatch) -> Result<Match, StoreError>;

    /// Newest-first listing, at most `limit` records.
    async fn list(&self, limit: usize) -> Result<Vec<Match>, StoreError>;
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    rows: Vec<Match>,
}

/// Process-local store. Ids start at 1 and increase monotonically.
#[derive(Default)]
pub struct InMemoryMatchStore {
    inner: Mutex<Inner>,
}

impl InMemoryMatchStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored matches.
    pub fn len(&self) -> usize {
        self.inner.lock().rows.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn create(&self, new_match: NewMatch) -> Result<Match, StoreError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let record = new_match.into_match(inner.next_id, Utc::now());
        inner.rows.push(record.clone());
        Ok(record)
    }

    async fn list(&self, limit: usize) -> Result<Vec<Match>, StoreError> {
        let inner = self.inner.lock();
        // rows are kept in creation order
        Ok(inner.rows.iter().rev().take(limit).cloned().collect())
    }
}
