use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and describe the ingest series.
    /// Fails if one is already installed. Call before building any state that
    /// publishes gauges.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        crate::ingest::describe_metrics();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
