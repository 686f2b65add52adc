use std::net::SocketAddr;

pub const INGEST_RUNS: &str = "restaurants_ingest_runs_total";
pub const ROWS_PROCESSED: &str = "restaurants_rows_processed_total";
pub const ROWS_SKIPPED: &str = "restaurants_rows_skipped_total";
pub const ROWS_INSERTED: &str = "restaurants_rows_inserted_total";
pub const INGEST_DURATION: &str = "restaurants_ingest_duration_seconds";
pub const RECOMMENDATION_REQUESTS: &str = "restaurants_recommendation_requests_total";
pub const LLM_FALLBACKS: &str = "restaurants_llm_fallbacks_total";

/// Install the Prometheus exporter on `0.0.0.0:port`.
///
/// A second install (tests, embedded servers) fails inside the exporter; that is
/// logged and ignored.
pub fn init_metrics(port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    tracing::info!("Installing Prometheus exporter on {}", addr);
    match builder.install() {
        Ok(()) => {
            tracing::info!("Prometheus exporter listening on http://{}/metrics", addr);
        }
        Err(e) => {
            tracing::warn!("Prometheus exporter install failed (possibly already installed): {}", e);
        }
    }
}
