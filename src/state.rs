use std::sync::Arc;

use crate::distance::DistanceResolver;
use crate::observability::metrics::Metrics;
use crate::store::OrderStore;

/// Handles shared by every request. Built once in `main` and closed on shutdown.
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub resolver: Arc<dyn DistanceResolver>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(store: Arc<dyn OrderStore>, resolver: Arc<dyn DistanceResolver>) -> Self {
        Self {
            store,
            resolver,
            metrics: Metrics::new(),
        }
    }
}
