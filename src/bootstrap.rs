// src/bootstrap.rs
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::api::AppState;
use crate::config::ServiceConfig;
use crate::fetch::{parallel::ParallelClient, EventFetcher};
use crate::ingest::Ingestor;
use crate::registry::{MonitorMap, MonitorRegistry};
use crate::store::{MemoryStore, NewsStore, SupabaseStore};

/// Install a tracing subscriber: EnvFilter (default `info`), compact or JSON
/// (`LOG_FORMAT=json`). A subscriber installed earlier by the runtime wins.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

pub fn build_fetcher(cfg: &ServiceConfig) -> Result<Arc<dyn EventFetcher>> {
    if cfg.parallel_api_key.is_empty() {
        warn!("PARALLEL_API_KEY is not set; event-group fetches will fail");
    }
    let client = ParallelClient::new(
        &cfg.parallel_base_url,
        &cfg.parallel_api_key,
        cfg.fetch_timeout,
    )
    .context("building Parallel API client")?;
    Ok(Arc::new(client))
}

pub fn build_store(cfg: &ServiceConfig) -> Result<Arc<dyn NewsStore>> {
    match &cfg.supabase {
        Some(s) => {
            let store = SupabaseStore::new(&s.url, &s.key, &s.table, cfg.store_timeout)
                .context("building Supabase client")?;
            info!(table = %s.table, "using Supabase store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("no Supabase credentials; news records are kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Wire registry, fetcher and store from config. Registry load never fails.
pub fn build_state(cfg: &ServiceConfig) -> Result<AppState> {
    let registry = MonitorRegistry::new(MonitorMap::load_or_empty(&cfg.monitor_map_path));
    let ingestor = Ingestor::new(registry, build_fetcher(cfg)?, build_store(cfg)?);
    info!(
        route = %cfg.webhook_path,
        monitors = ingestor.registry().snapshot().len(),
        "ingestion core ready"
    );
    Ok(AppState {
        ingestor,
        monitor_map_path: cfg.monitor_map_path.clone(),
        webhook_path: cfg.webhook_path.clone(),
    })
}
