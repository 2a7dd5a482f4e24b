// src/lib.rs
// Public library surface for the service binary, the replay tool and integration tests.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod fetch;
pub mod ingest;
pub mod metrics;
pub mod record;
pub mod registry;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::ingest::{IngestOutcome, Ingestor};
pub use crate::record::{NewNewsRecord, NewsRecord};
