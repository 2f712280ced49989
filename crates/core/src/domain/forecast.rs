use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily close history for one ticker, ascending by date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.points.last().map(|p| p.close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Success,
    Failed,
}

/// Outcome of one forecasting strategy against one series.
///
/// Exactly one of `point_forecast` (success) or `failure_reason` (failed)
/// is present; the constructors are the only way these are built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResult {
    pub status: ModelStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backtest_error: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_forecast: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_path: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl ModelResult {
    pub fn success(backtest_error: f64, forecast_path: Vec<f64>) -> Self {
        let point_forecast = forecast_path.last().copied();
        Self {
            status: ModelStatus::Success,
            backtest_error: Some(backtest_error),
            point_forecast,
            forecast_path: Some(forecast_path),
            failure_reason: None,
        }
    }

    /// Success without a backtest error (pretrained artifacts are not
    /// re-scored against a holdout).
    pub fn pretrained(forecast_path: Vec<f64>) -> Self {
        let point_forecast = forecast_path.last().copied();
        Self {
            status: ModelStatus::Success,
            backtest_error: None,
            point_forecast,
            forecast_path: Some(forecast_path),
            failure_reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: ModelStatus::Failed,
            backtest_error: None,
            point_forecast: None,
            forecast_path: None,
            failure_reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ModelStatus::Success
    }
}

/// Aggregated per-model outcomes for one (ticker, horizon) request.
///
/// `best_model`, when present, names a Success entry whose backtest error is
/// minimal among all Success entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastBundle {
    pub ticker: String,
    pub horizon: u32,
    pub results: BTreeMap<String, ModelResult>,
    pub best_model: Option<String>,
    pub current_price: Option<f64>,
}

impl ForecastBundle {
    pub fn best_result(&self) -> Option<&ModelResult> {
        self.best_model
            .as_deref()
            .and_then(|name| self.results.get(name))
    }
}
