// src/ingest/mod.rs
//! Webhook ingestion core.
//!
//! `Ingestor::handle_notification` never fails: every path ends in an
//! [`IngestOutcome`] that is logged and counted, and the HTTP layer always
//! acknowledges. Records are written one by one; a failed insert does not stop
//! the rest of the group.

pub mod types;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::fetch::EventFetcher;
use crate::record::{NewNewsRecord, RecordContext, FALLBACK_MONITOR_TYPE};
use crate::registry::{MonitorMap, MonitorRegistry};
use crate::store::{InsertOutcome, NewsStore};
use types::InboundNotification;

/// Register HELP text for every ingest series with the current recorder.
/// Descriptions sent before a recorder is installed are lost, so
/// [`crate::metrics::Metrics::init`] calls this again after installing.
pub fn describe_metrics() {
    describe_counter!(
        "ingest_notifications_total",
        "Webhook notifications handled, by outcome."
    );
    describe_counter!(
        "ingest_records_inserted_total",
        "News records newly written to storage."
    );
    describe_counter!(
        "ingest_records_duplicate_total",
        "News records skipped because the dedup key already existed."
    );
    describe_counter!(
        "ingest_records_failed_total",
        "News record inserts that failed."
    );
    describe_counter!(
        "ingest_fetch_errors_total",
        "Event-group fetch failures, by kind."
    );
    describe_histogram!("ingest_fetch_ms", "Event-group fetch time in milliseconds.");
    describe_gauge!(
        "monitor_registry_entries",
        "Entries in the current monitor map."
    );
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_metrics);
}

/// Internal classification of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Not a `monitor.event.detected` notification.
    Ignored { event_type: Option<String> },
    /// Target type, but the body is unusable (not JSON, missing ids).
    Malformed { reason: String },
    FetchFailed {
        monitor_id: String,
        event_group_id: String,
        error: String,
    },
    /// Every insert succeeded (or was a known duplicate).
    Stored { inserted: usize, duplicates: usize },
    /// At least one insert failed.
    PartiallyStored {
        inserted: usize,
        duplicates: usize,
        failed: usize,
    },
}

impl IngestOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            IngestOutcome::Ignored { .. } => "ignored",
            IngestOutcome::Malformed { .. } => "malformed",
            IngestOutcome::FetchFailed { .. } => "fetch_failed",
            IngestOutcome::Stored { .. } => "stored",
            IngestOutcome::PartiallyStored { .. } => "partially_stored",
        }
    }
}

/// Where the resolved `monitor_type` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorTypeSource {
    Payload,
    Registry,
    Fallback,
}

/// Priority: payload metadata → registry → `"general"`.
pub fn resolve_monitor_type(
    metadata_type: Option<&str>,
    monitor_id: &str,
    map: &MonitorMap,
) -> (String, MonitorTypeSource) {
    if let Some(t) = metadata_type.map(str::trim).filter(|t| !t.is_empty()) {
        return (t.to_string(), MonitorTypeSource::Payload);
    }
    if let Some(t) = map.resolve(monitor_id) {
        return (t.to_string(), MonitorTypeSource::Registry);
    }
    (FALLBACK_MONITOR_TYPE.to_string(), MonitorTypeSource::Fallback)
}

/// Everything a delivery needs: registry, fetcher, store.
#[derive(Clone)]
pub struct Ingestor {
    registry: MonitorRegistry,
    fetcher: Arc<dyn EventFetcher>,
    store: Arc<dyn NewsStore>,
}

impl Ingestor {
    pub fn new(
        registry: MonitorRegistry,
        fetcher: Arc<dyn EventFetcher>,
        store: Arc<dyn NewsStore>,
    ) -> Self {
        ensure_metrics_described();
        Self {
            registry,
            fetcher,
            store,
        }
    }

    pub fn registry(&self) -> &MonitorRegistry {
        &self.registry
    }

    pub fn store(&self) -> Arc<dyn NewsStore> {
        self.store.clone()
    }

    /// Entry point for a raw HTTP body.
    pub async fn handle_notification(&self, raw: &[u8]) -> IngestOutcome {
        self.handle_notification_at(raw, Utc::now()).await
    }

    pub async fn handle_notification_at(
        &self,
        raw: &[u8],
        received_at: DateTime<Utc>,
    ) -> IngestOutcome {
        let outcome = match serde_json::from_slice::<Value>(raw) {
            Ok(payload) => self.process(&payload, received_at).await,
            Err(e) => IngestOutcome::Malformed {
                reason: format!("body is not JSON: {e}"),
            },
        };
        record_outcome(&outcome);
        outcome
    }

    /// Count and log a body that never reached the parser.
    pub fn reject_body(&self, reason: impl Into<String>) -> IngestOutcome {
        let outcome = IngestOutcome::Malformed {
            reason: reason.into(),
        };
        record_outcome(&outcome);
        outcome
    }

    /// Same as [`Ingestor::handle_notification`] for an already decoded body.
    pub async fn handle_value(&self, payload: &Value, received_at: DateTime<Utc>) -> IngestOutcome {
        let outcome = self.process(payload, received_at).await;
        record_outcome(&outcome);
        outcome
    }

    async fn process(&self, payload: &Value, received_at: DateTime<Utc>) -> IngestOutcome {
        let note = InboundNotification::from_value(payload);
        if !note.is_event_detected() {
            return IngestOutcome::Ignored {
                event_type: note.kind().map(str::to_string),
            };
        }

        let (monitor_id, event_group_id) = match (note.monitor_id(), note.event_group_id()) {
            (Some(m), Some(g)) => (m, g),
            (m, g) => {
                let mut missing = Vec::new();
                if m.is_none() {
                    missing.push("data.monitor_id");
                }
                if g.is_none() {
                    missing.push("data.event.event_group_id");
                }
                return IngestOutcome::Malformed {
                    reason: format!("missing {}", missing.join(", ")),
                };
            }
        };

        // Hold one snapshot for the whole delivery.
        let map = self.registry.snapshot();
        let (monitor_type, source) =
            resolve_monitor_type(note.metadata_monitor_type(), monitor_id, &map);
        if source == MonitorTypeSource::Fallback {
            tracing::warn!(
                target: "ingest",
                monitor_id,
                "monitor not in registry; using '{}'",
                FALLBACK_MONITOR_TYPE
            );
        }

        let t0 = Instant::now();
        let fetched = self
            .fetcher
            .fetch_event_group(monitor_id, event_group_id)
            .await;
        histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1000.0);

        let group = match fetched {
            Ok(g) => g,
            Err(e) => {
                counter!("ingest_fetch_errors_total", "kind" => e.kind()).increment(1);
                return IngestOutcome::FetchFailed {
                    monitor_id: monitor_id.to_string(),
                    event_group_id: event_group_id.to_string(),
                    error: e.to_string(),
                };
            }
        };

        tracing::debug!(
            target: "ingest",
            monitor_id,
            event_group_id,
            monitor_type = %monitor_type,
            events = group.len(),
            fetcher = self.fetcher.name(),
            "event group fetched"
        );

        let ctx = RecordContext {
            received_at,
            event_type: types::EVENT_DETECTED,
            monitor_id,
            event_group_id,
            monitor_type: &monitor_type,
            full_data: payload,
        };

        let (mut inserted, mut duplicates, mut failed) = (0usize, 0usize, 0usize);
        for (idx, ev) in group.events.iter().enumerate() {
            let record = NewNewsRecord::from_event(&ctx, ev);
            match self.store.insert(&record).await {
                Ok(InsertOutcome::Inserted(id)) => {
                    inserted += 1;
                    tracing::debug!(target: "ingest", id, idx, "news record stored");
                }
                Ok(InsertOutcome::Duplicate) => {
                    duplicates += 1;
                    tracing::debug!(target: "ingest", idx, dedup_key = %record.dedup_key, "duplicate news record skipped");
                }
                Err(e) => {
                    failed += 1;
                    tracing::error!(
                        target: "ingest",
                        error = %e,
                        idx,
                        monitor_id,
                        event_group_id,
                        store = self.store.name(),
                        "news record insert failed; continuing with the rest of the group"
                    );
                }
            }
        }

        counter!("ingest_records_inserted_total").increment(inserted as u64);
        counter!("ingest_records_duplicate_total").increment(duplicates as u64);
        counter!("ingest_records_failed_total").increment(failed as u64);

        if failed > 0 {
            IngestOutcome::PartiallyStored {
                inserted,
                duplicates,
                failed,
            }
        } else {
            IngestOutcome::Stored {
                inserted,
                duplicates,
            }
        }
    }
}

fn record_outcome(outcome: &IngestOutcome) {
    counter!("ingest_notifications_total", "outcome" => outcome.label()).increment(1);
    match outcome {
        IngestOutcome::Ignored { event_type } => {
            tracing::debug!(target: "ingest", event_type = ?event_type, "notification ignored");
        }
        IngestOutcome::Malformed { reason } => {
            tracing::warn!(target: "ingest", %reason, "malformed notification dropped");
        }
        IngestOutcome::FetchFailed {
            monitor_id,
            event_group_id,
            error,
        } => {
            tracing::error!(target: "ingest", %monitor_id, %event_group_id, %error, "event group fetch failed");
        }
        IngestOutcome::Stored {
            inserted,
            duplicates,
        } => {
            tracing::info!(target: "ingest", inserted, duplicates, "notification ingested");
        }
        IngestOutcome::PartiallyStored {
            inserted,
            duplicates,
            failed,
        } => {
            tracing::warn!(target: "ingest", inserted, duplicates, failed, "notification partially ingested");
        }
    }
}
