// src/store/mod.rs
//! Persistence gateway for `NewsRecord`s.
//!
//! Contract every backend must keep:
//! - `insert` is insert-or-ignore on `dedup_key`; an existing row is never overwritten.
//! - `select_all` returns newest first (`created_at` desc, then `id` desc).
//! - Each call commits on its own; there are no multi-record transactions.

pub mod memory;
pub mod supabase;

use crate::record::{NewNewsRecord, NewsRecord};

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode storage response: {0}")]
    Decode(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Result of a successful `insert` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    /// A row with the same `dedup_key` already exists.
    Duplicate,
}

#[async_trait::async_trait]
pub trait NewsStore: Send + Sync {
    async fn insert(&self, record: &NewNewsRecord) -> Result<InsertOutcome, StorageError>;

    async fn select_all(&self) -> Result<Vec<NewsRecord>, StorageError>;

    async fn select_by_id(&self, id: i64) -> Result<Option<NewsRecord>, StorageError>;

    fn name(&self) -> &'static str;
}

/// Newest first; ties broken by id so equal timestamps keep insertion order reversed.
pub(crate) fn sort_newest_first(rows: &mut [NewsRecord]) {
    rows.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
