// src/fetch/mod.rs
pub mod parallel;

use crate::ingest::types::EventGroup;

/// Failure modes of a single event-group fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("event group not found: {monitor_id}/{event_group_id}")]
    NotFound {
        monitor_id: String,
        event_group_id: String,
    },

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Auth(_) => "auth",
            FetchError::NotFound { .. } => "not_found",
            FetchError::Status { .. } => "status",
            FetchError::MalformedResponse(_) => "malformed",
        }
    }
}

/// Retrieves the events behind an event-group notification. Single attempt, no retry.
#[async_trait::async_trait]
pub trait EventFetcher: Send + Sync {
    async fn fetch_event_group(
        &self,
        monitor_id: &str,
        event_group_id: &str,
    ) -> Result<EventGroup, FetchError>;

    fn name(&self) -> &'static str;
}

// --- Test helper ---
/// Returns a fixed group (or a fixed failure) and records every call.
pub struct StaticFetcher {
    result: Result<EventGroup, String>,
    pub calls: std::sync::Mutex<Vec<(String, String)>>,
}

impl StaticFetcher {
    pub fn with_group(group: EventGroup) -> Self {
        Self {
            result: Ok(group),
            calls: std::sync::Mutex::new(vec![]),
        }
    }

    /// Every call fails with `FetchError::Status { status: 503, .. }`.
    pub fn failing(body: &str) -> Self {
        Self {
            result: Err(body.to_string()),
            calls: std::sync::Mutex::new(vec![]),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl EventFetcher for StaticFetcher {
    async fn fetch_event_group(
        &self,
        monitor_id: &str,
        event_group_id: &str,
    ) -> Result<EventGroup, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((monitor_id.to_string(), event_group_id.to_string()));
        }
        match &self.result {
            Ok(group) => Ok(group.clone()),
            Err(body) => Err(FetchError::Status {
                status: 503,
                body: body.clone(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
