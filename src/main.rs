//! Krux news ingestion service: binary entrypoint.
//! Boots the Axum HTTP server: webhook route, read endpoints, metrics.

use krux_news_ingest::{
    api, bootstrap, config::ServiceConfig, metrics::Metrics, registry::start_hot_reload_thread,
};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    bootstrap::init_tracing();

    let cfg = ServiceConfig::from_env()?;

    // Recorder first: the registry gauge is published while state is built.
    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = %e, "metrics disabled");
            None
        }
    };
    let state = bootstrap::build_state(&cfg)?;

    // Optional file watcher (MONITOR_MAP_HOT_RELOAD=1)
    start_hot_reload_thread(
        state.ingestor.registry().clone(),
        cfg.monitor_map_path.clone(),
    );

    let mut router = api::create_router(state);
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }

    Ok(router.into())
}
