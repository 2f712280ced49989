use crate::domain::forecast::{ForecastBundle, ModelResult};
use crate::forecast::artifacts::{ArtifactStore, PRETRAINED_STRATEGIES};
use crate::forecast::orchestrator::Forecaster;
use crate::forecast::{Forecast, ForecastError};
use crate::market::MarketData;
use anyhow::Context;
use std::collections::BTreeMap;
use std::sync::Arc;

// The fast path reports this strategy as best rather than re-comparing
// backtest errors across loaded artifacts (preserved source behavior).
const PRETRAINED_DEFAULT_BEST: &str = "windowed";

const RECENT_LOOKBACK_DAYS: u32 = 90;

/// Ordered fallback over two forecasting capabilities: the pretrained
/// artifact path first, the realtime-training orchestrator second. Any
/// fast-path problem (a missing artifact, a load error, a predict error)
/// silently degrades to the slow path.
pub struct ForecastService {
    market: Arc<dyn MarketData>,
    artifacts: Arc<dyn ArtifactStore>,
    forecaster: Forecaster,
}

impl ForecastService {
    pub fn new(
        market: Arc<dyn MarketData>,
        artifacts: Arc<dyn ArtifactStore>,
        forecaster: Forecaster,
    ) -> Self {
        Self {
            market,
            artifacts,
            forecaster,
        }
    }

    async fn pretrained_bundle(
        &self,
        ticker: &str,
        horizon: u32,
    ) -> anyhow::Result<ForecastBundle> {
        anyhow::ensure!(horizon > 0, "horizon must be positive");

        let mut models = Vec::with_capacity(PRETRAINED_STRATEGIES.len());
        for strategy in PRETRAINED_STRATEGIES {
            let model = self
                .artifacts
                .load(ticker, strategy)
                .await?
                .with_context(|| format!("no pretrained {strategy} artifact for {ticker}"))?;
            models.push(model);
        }

        let series = self
            .market
            .daily_series(ticker, RECENT_LOOKBACK_DAYS)
            .await
            .context("recent series fetch failed")?;
        let current_price = series
            .last_close()
            .with_context(|| format!("empty recent series for {ticker}"))?;
        let closes = series.closes();

        let mut results = BTreeMap::new();
        for model in &models {
            let path = model.predict(&closes, horizon)?;
            results.insert(model.strategy().to_string(), ModelResult::pretrained(path));
        }

        Ok(ForecastBundle {
            ticker: ticker.to_string(),
            horizon,
            results,
            best_model: Some(PRETRAINED_DEFAULT_BEST.to_string()),
            current_price: Some(current_price),
        })
    }
}

#[async_trait::async_trait]
impl Forecast for ForecastService {
    async fn run_forecast(
        &self,
        ticker: &str,
        horizon: u32,
    ) -> Result<ForecastBundle, ForecastError> {
        match self.pretrained_bundle(ticker, horizon).await {
            Ok(bundle) => {
                tracing::debug!(ticker, horizon, "serving pretrained forecast");
                Ok(bundle)
            }
            Err(err) => {
                tracing::debug!(
                    ticker,
                    horizon,
                    error = %err,
                    "pretrained path unavailable; training in real time"
                );
                self.forecaster.run_realtime(ticker, horizon).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::forecast::{PricePoint, PriceSeries};
    use crate::forecast::artifacts::PretrainedModel;
    use crate::forecast::models::{default_runners, Ar, Holt, Windowed};
    use crate::market::{MarketDataError, MarketResult};
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    struct SeriesMarket {
        closes: Vec<f64>,
    }

    #[async_trait::async_trait]
    impl MarketData for SeriesMarket {
        fn provider_name(&self) -> &'static str {
            "series_mock"
        }

        async fn daily_series(
            &self,
            ticker: &str,
            _lookback_days: u32,
        ) -> MarketResult<PriceSeries> {
            if self.closes.is_empty() {
                return Err(MarketDataError::NoData(ticker.to_string()));
            }
            let start = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
            Ok(PriceSeries {
                ticker: ticker.to_string(),
                points: self
                    .closes
                    .iter()
                    .enumerate()
                    .map(|(i, close)| PricePoint {
                        date: start + chrono::Duration::days(i as i64),
                        close: *close,
                    })
                    .collect(),
            })
        }

        async fn latest_close(&self, ticker: &str) -> MarketResult<f64> {
            self.closes
                .last()
                .copied()
                .ok_or_else(|| MarketDataError::NoData(ticker.to_string()))
        }

        async fn batch_latest_close(
            &self,
            _tickers: &[String],
        ) -> MarketResult<std::collections::BTreeMap<String, f64>> {
            Ok(std::collections::BTreeMap::new())
        }
    }

    #[derive(Default)]
    struct MemArtifactStore {
        models: Mutex<HashMap<(String, String), PretrainedModel>>,
    }

    #[async_trait::async_trait]
    impl ArtifactStore for MemArtifactStore {
        async fn load(
            &self,
            ticker: &str,
            strategy: &str,
        ) -> anyhow::Result<Option<PretrainedModel>> {
            Ok(self
                .models
                .lock()
                .await
                .get(&(ticker.to_string(), strategy.to_string()))
                .cloned())
        }

        async fn save(&self, ticker: &str, model: &PretrainedModel) -> anyhow::Result<()> {
            self.models.lock().await.insert(
                (ticker.to_string(), model.strategy().to_string()),
                model.clone(),
            );
            Ok(())
        }
    }

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + 0.5 * i as f64).collect()
    }

    async fn store_all_artifacts(store: &MemArtifactStore, ticker: &str, closes: &[f64]) {
        store
            .save(ticker, &PretrainedModel::Ar(Ar::default().fit(closes).unwrap()))
            .await
            .unwrap();
        store
            .save(ticker, &PretrainedModel::Holt(Holt::default()))
            .await
            .unwrap();
        store
            .save(
                ticker,
                &PretrainedModel::Windowed(Windowed::default().fit(closes).unwrap()),
            )
            .await
            .unwrap();
    }

    fn service(closes: Vec<f64>, artifacts: Arc<MemArtifactStore>) -> ForecastService {
        let market = Arc::new(SeriesMarket { closes });
        let forecaster = Forecaster::new(market.clone(), default_runners());
        ForecastService::new(market, artifacts, forecaster)
    }

    #[tokio::test]
    async fn full_artifact_set_serves_the_fast_path() {
        let closes = ramp(200);
        let artifacts = Arc::new(MemArtifactStore::default());
        store_all_artifacts(&artifacts, "AAPL", &closes).await;

        let svc = service(closes.clone(), artifacts);
        let bundle = svc.run_forecast("AAPL", 5).await.unwrap();

        assert_eq!(bundle.best_model.as_deref(), Some("windowed"));
        assert_eq!(bundle.results.len(), 3);
        // Pretrained results are not re-scored.
        assert!(bundle
            .results
            .values()
            .all(|r| r.is_success() && r.backtest_error.is_none()));
        assert_eq!(bundle.current_price, closes.last().copied());
    }

    #[tokio::test]
    async fn one_missing_artifact_degrades_to_realtime() {
        let closes = ramp(200);
        let artifacts = Arc::new(MemArtifactStore::default());
        // Save two of the three required artifacts.
        artifacts
            .save("AAPL", &PretrainedModel::Holt(Holt::default()))
            .await
            .unwrap();
        artifacts
            .save(
                "AAPL",
                &PretrainedModel::Ar(Ar::default().fit(&closes).unwrap()),
            )
            .await
            .unwrap();

        let svc = service(closes, artifacts);
        let bundle = svc.run_forecast("AAPL", 5).await.unwrap();

        // The realtime path backtests all four registered strategies.
        assert_eq!(bundle.results.len(), 4);
        assert!(bundle
            .results
            .values()
            .any(|r| r.is_success() && r.backtest_error.is_some()));
    }

    #[tokio::test]
    async fn artifact_predict_error_also_degrades() {
        // Fit the windowed artifact on a long series, then serve a market
        // whose recent window is too short for it to predict.
        let long = ramp(200);
        let artifacts = Arc::new(MemArtifactStore::default());
        store_all_artifacts(&artifacts, "AAPL", &long).await;

        let short = ramp(40);
        let svc = service(short, artifacts);
        let bundle = svc.run_forecast("AAPL", 5).await.unwrap();

        // Realtime output: per-model backtest entries, not the fixed default.
        assert_eq!(bundle.results.len(), 4);
    }

    #[tokio::test]
    async fn no_data_on_both_paths_surfaces_data_unavailable() {
        let artifacts = Arc::new(MemArtifactStore::default());
        let svc = service(vec![], artifacts);
        let err = svc.run_forecast("AAPL", 5).await.unwrap_err();
        assert!(matches!(err, ForecastError::DataUnavailable(_)));
    }
}
