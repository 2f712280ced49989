use crate::domain::forecast::ForecastBundle;

pub mod artifacts;
pub mod gate;
pub mod models;
pub mod orchestrator;
pub mod train;

/// Request-level failures. Everything else (model failures, artifact misses,
/// per-strategy errors) is recovered below this boundary.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("no price data available for {0}")]
    DataUnavailable(String),

    #[error("horizon must be a positive number of steps (got {0})")]
    InvalidHorizon(u32),
}

/// The net forecasting contract exposed to callers: fast/slow branching and
/// all internal fallback is invisible except through latency.
#[async_trait::async_trait]
pub trait Forecast: Send + Sync {
    async fn run_forecast(
        &self,
        ticker: &str,
        horizon: u32,
    ) -> Result<ForecastBundle, ForecastError>;
}
