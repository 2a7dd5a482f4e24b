//! Re-run ingestion for one event group, e.g. after a fetch outage.
//!
//! Usage: replay_event_group <monitor_id> <event_group_id> [monitor_type]
//!
//! Uses the same config, fetcher and store as the service. Records that were
//! already stored are reported as duplicates, so repeated runs are harmless.

use anyhow::{bail, Result};
use chrono::Utc;
use krux_news_ingest::{bootstrap, config::ServiceConfig, IngestOutcome};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    bootstrap::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (monitor_id, event_group_id) = match args.as_slice() {
        [m, g, ..] => (m.clone(), g.clone()),
        _ => bail!("usage: replay_event_group <monitor_id> <event_group_id> [monitor_type]"),
    };

    let mut data = json!({
        "monitor_id": monitor_id,
        "event": { "event_group_id": event_group_id },
    });
    if let Some(t) = args.get(2) {
        data["metadata"] = json!({ "monitor_type": t });
    }
    let now = Utc::now();
    let payload = json!({
        "type": "monitor.event.detected",
        "timestamp": now.to_rfc3339(),
        "data": data,
        "replayed": true,
    });

    let cfg = ServiceConfig::from_env()?;
    let state = bootstrap::build_state(&cfg)?;
    let outcome = state.ingestor.handle_value(&payload, now).await;

    println!("{outcome:?}");
    match outcome {
        IngestOutcome::Stored { .. } => Ok(()),
        other => bail!("replay did not complete: {}", other.label()),
    }
}
