use std::sync::Arc;

use config::Config;
use middleware::RateLimiter;
use orchestrator::AnalysisOrchestrator;

pub mod analysis;
pub mod cache;
pub mod config;
pub mod error;
pub mod limiter;
pub mod middleware;
pub mod models;
pub mod orchestrator;
pub mod queue;
pub mod retry;
pub mod routes;
pub mod upstream;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let orchestrator = AnalysisOrchestrator::from_config(&config)?;
        Ok(Self::with_orchestrator(config, orchestrator))
    }

    pub fn with_orchestrator(config: Config, orchestrator: AnalysisOrchestrator) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(&config));
        Self {
            config,
            orchestrator: Arc::new(orchestrator),
            rate_limiter,
        }
    }
}
