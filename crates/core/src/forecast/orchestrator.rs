use crate::domain::forecast::{ForecastBundle, ModelResult};
use crate::forecast::models::{backtest, ModelRunner};
use crate::forecast::ForecastError;
use crate::market::MarketData;
use std::collections::BTreeMap;
use std::sync::Arc;

const DEFAULT_LOOKBACK_DAYS: u32 = 1095;

/// Runs every registered strategy against one freshly fetched series and
/// selects a winner by backtest error.
pub struct Forecaster {
    market: Arc<dyn MarketData>,
    runners: Vec<Arc<dyn ModelRunner>>,
    lookback_days: u32,
}

impl Forecaster {
    pub fn new(market: Arc<dyn MarketData>, runners: Vec<Arc<dyn ModelRunner>>) -> Self {
        let lookback_days = std::env::var("FORECAST_LOOKBACK_DAYS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_LOOKBACK_DAYS);
        Self {
            market,
            runners,
            lookback_days,
        }
    }

    pub fn with_lookback_days(mut self, lookback_days: u32) -> Self {
        self.lookback_days = lookback_days;
        self
    }

    /// The slow path: fetch, fit everything, pick a winner.
    ///
    /// An empty or unfetchable series is the one fatal condition here; a
    /// failing strategy only marks its own entry Failed.
    pub async fn run_realtime(
        &self,
        ticker: &str,
        horizon: u32,
    ) -> Result<ForecastBundle, ForecastError> {
        if horizon == 0 {
            return Err(ForecastError::InvalidHorizon(horizon));
        }

        let series = self
            .market
            .daily_series(ticker, self.lookback_days)
            .await
            .map_err(|err| {
                tracing::warn!(ticker, error = %err, "series fetch failed");
                ForecastError::DataUnavailable(format!("{ticker}: {err}"))
            })?;

        let Some(current_price) = series.last_close() else {
            return Err(ForecastError::DataUnavailable(format!(
                "{ticker}: empty series"
            )));
        };

        let closes = Arc::new(series.closes());

        // One blocking task per registered strategy; a panicking or failing
        // strategy is isolated into its own Failed entry.
        let mut handles = Vec::with_capacity(self.runners.len());
        for runner in &self.runners {
            let name = runner.name();
            let runner = Arc::clone(runner);
            let closes = Arc::clone(&closes);
            handles.push((
                name,
                tokio::task::spawn_blocking(move || backtest(runner.as_ref(), &closes, horizon)),
            ));
        }

        let mut ordered = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    tracing::error!(ticker, model = name, error = %join_err, "model task aborted");
                    ModelResult::failed(format!("model task aborted: {join_err}"))
                }
            };
            ordered.push((name.to_string(), result));
        }

        let best_model = select_best(&ordered);
        tracing::debug!(ticker, horizon, best_model = ?best_model, "realtime forecast complete");

        Ok(ForecastBundle {
            ticker: ticker.to_string(),
            horizon,
            results: ordered.into_iter().collect::<BTreeMap<_, _>>(),
            best_model,
            current_price: Some(current_price),
        })
    }
}

/// Pure min-by-error reduction over Success results; the first entry wins an
/// exact tie, so registration order is the tie-break priority.
pub fn select_best(ordered: &[(String, ModelResult)]) -> Option<String> {
    let mut best: Option<(&str, f64)> = None;
    for (name, result) in ordered {
        if !result.is_success() {
            continue;
        }
        let Some(err) = result.backtest_error else {
            continue;
        };
        match best {
            Some((_, best_err)) if err >= best_err => {}
            _ => best = Some((name, err)),
        }
    }
    best.map(|(name, _)| name.to_string())
}
