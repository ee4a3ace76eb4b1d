use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::{config::Config, pipeline::SegmentationEngine};

/// Shared state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<SegmentationEngine>,
    /// Caps concurrently running decode/encode jobs
    pub jobs: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let jobs = Arc::new(Semaphore::new(config.server.max_concurrent_jobs));
        let engine = Arc::new(SegmentationEngine::new(config.clone()));
        Self {
            config: Arc::new(config),
            engine,
            jobs,
        }
    }
}
