//! Canonical `NewsRecord` schema shared by the ingestion core and every reader.
//!
//! Field names are the storage column names (`news_date`, `source_urls`).
//! Bump [`SCHEMA_VERSION`] when the shape changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::ingest::types::RawEvent;

pub const SCHEMA_VERSION: u16 = 1;

/// Category used when neither the payload nor the registry names one.
pub const FALLBACK_MONITOR_TYPE: &str = "general";

/// A record ready to be written; storage assigns `id` and `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewNewsRecord {
    /// Notification receipt time (RFC 3339, UTC).
    pub timestamp: String,
    pub event_type: String,
    pub event_group_id: String,
    pub monitor_id: String,
    pub monitor_type: String,
    pub news_output: String,
    pub news_date: Option<String>,
    pub source_urls: Vec<String>,
    /// The whole inbound notification, kept for audit and replay.
    pub full_data: Value,
    pub dedup_key: String,
    pub schema_version: u16,
}

/// A persisted record as returned by the read side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsRecord {
    pub id: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub timestamp: String,
    pub event_type: String,
    pub event_group_id: String,
    pub monitor_id: String,
    #[serde(default = "fallback_monitor_type")]
    pub monitor_type: String,
    pub news_output: String,
    #[serde(default)]
    pub news_date: Option<String>,
    #[serde(default)]
    pub source_urls: Vec<String>,
    #[serde(default)]
    pub full_data: Value,
    #[serde(default)]
    pub dedup_key: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
}

fn fallback_monitor_type() -> String {
    FALLBACK_MONITOR_TYPE.to_string()
}

fn default_schema_version() -> u16 {
    SCHEMA_VERSION
}

/// Identity of the notification a batch of records derives from.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    pub received_at: DateTime<Utc>,
    pub event_type: &'a str,
    pub monitor_id: &'a str,
    pub event_group_id: &'a str,
    pub monitor_type: &'a str,
    pub full_data: &'a Value,
}

impl NewNewsRecord {
    /// Normalize one raw event. `output`, `event_date` and `source_urls` are copied verbatim.
    pub fn from_event(ctx: &RecordContext<'_>, ev: &RawEvent) -> Self {
        let dedup_key = dedup_key(
            ctx.monitor_id,
            ctx.event_group_id,
            ev.event_date.as_deref(),
            &ev.output,
        );
        Self {
            timestamp: ctx.received_at.to_rfc3339(),
            event_type: ctx.event_type.to_string(),
            event_group_id: ctx.event_group_id.to_string(),
            monitor_id: ctx.monitor_id.to_string(),
            monitor_type: ctx.monitor_type.to_string(),
            news_output: ev.output.clone(),
            news_date: ev.event_date.clone(),
            source_urls: ev.source_urls.clone(),
            full_data: ctx.full_data.clone(),
            dedup_key,
            schema_version: SCHEMA_VERSION,
        }
    }

    /// Attach storage-assigned fields.
    pub fn into_stored(self, id: i64, created_at: DateTime<Utc>) -> NewsRecord {
        NewsRecord {
            id,
            created_at: Some(created_at),
            timestamp: self.timestamp,
            event_type: self.event_type,
            event_group_id: self.event_group_id,
            monitor_id: self.monitor_id,
            monitor_type: self.monitor_type,
            news_output: self.news_output,
            news_date: self.news_date,
            source_urls: self.source_urls,
            full_data: self.full_data,
            dedup_key: self.dedup_key,
            schema_version: self.schema_version,
        }
    }
}

/// Natural idempotency key: hex SHA-256 over monitor, group, date and text.
/// Fields are separated by U+001F so that adjacent values cannot run together.
pub fn dedup_key(
    monitor_id: &str,
    event_group_id: &str,
    news_date: Option<&str>,
    news_output: &str,
) -> String {
    let mut hasher = Sha256::new();
    for part in [monitor_id, event_group_id, news_date.unwrap_or(""), news_output] {
        hasher.update(part.as_bytes());
        hasher.update([0x1fu8]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
