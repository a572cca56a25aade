//! Application state

use geospy_core::CacheManager;
use std::sync::Arc;

/// Prometheus recorder handle used to render `/metrics`
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub caches: Arc<CacheManager>,
}

impl AppState {
    pub fn new(caches: Arc<CacheManager>) -> Self {
        Self { caches }
    }
}
