use crate::config::Settings;
use crate::domain::forecast::{PricePoint, PriceSeries};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub mod overview;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum MarketDataError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("market data HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("no data available for {0}")]
    NoData(String),
}

pub type MarketResult<T> = Result<T, MarketDataError>;

#[async_trait::async_trait]
pub trait MarketData: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Daily close history, ascending by date. Never guaranteed fresh.
    async fn daily_series(&self, ticker: &str, lookback_days: u32) -> MarketResult<PriceSeries>;

    async fn latest_close(&self, ticker: &str) -> MarketResult<f64>;

    async fn batch_latest_close(&self, tickers: &[String]) -> MarketResult<BTreeMap<String, f64>>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonMarketData {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailySeriesResponse {
    ticker: String,
    points: Vec<PricePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuoteResponse {
    ticker: String,
    close: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BatchQuotesResponse {
    quotes: BTreeMap<String, f64>,
}

impl HttpJsonMarketData {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_market_data_base_url()?.to_string();
        let api_key = settings.market_data_api_key.clone();

        let timeout_secs = std::env::var("MARKET_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> MarketResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            let value = HeaderValue::from_str(api_key)
                .map_err(|_| MarketDataError::Parse("invalid MARKET_DATA_API_KEY".to_string()))?;
            headers.insert("x-api-key", value);
        }
        Ok(headers)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> MarketResult<T> {
        let res = self
            .http
            .get(self.url(path))
            .headers(self.headers()?)
            .query(query)
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;

        if !status.is_success() {
            return Err(MarketDataError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        serde_json::from_str::<T>(&text)
            .map_err(|e| MarketDataError::Parse(format!("{e}: {text}")))
    }
}

fn validate_series(series: &PriceSeries, ticker: &str) -> MarketResult<()> {
    if series.points.is_empty() {
        return Err(MarketDataError::NoData(ticker.to_string()));
    }
    for pair in series.points.windows(2) {
        if pair[0].date >= pair[1].date {
            return Err(MarketDataError::Parse(format!(
                "series for {ticker} is not strictly ascending by date ({} >= {})",
                pair[0].date, pair[1].date
            )));
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl MarketData for HttpJsonMarketData {
    fn provider_name(&self) -> &'static str {
        "market_http_json"
    }

    async fn daily_series(&self, ticker: &str, lookback_days: u32) -> MarketResult<PriceSeries> {
        let path = format!("/v1/daily/{ticker}");
        let resp: DailySeriesResponse = self
            .get_json(&path, &[("lookback_days", lookback_days.to_string())])
            .await?;

        let series = PriceSeries {
            ticker: resp.ticker,
            points: resp.points,
        };
        validate_series(&series, ticker)?;
        Ok(series)
    }

    async fn latest_close(&self, ticker: &str) -> MarketResult<f64> {
        let path = format!("/v1/quote/{ticker}");
        let resp: QuoteResponse = self.get_json(&path, &[]).await?;
        if !resp.close.is_finite() || resp.close <= 0.0 {
            return Err(MarketDataError::NoData(ticker.to_string()));
        }
        Ok(resp.close)
    }

    async fn batch_latest_close(&self, tickers: &[String]) -> MarketResult<BTreeMap<String, f64>> {
        if tickers.is_empty() {
            return Ok(BTreeMap::new());
        }
        let resp: BatchQuotesResponse = self
            .get_json("/v1/quotes", &[("tickers", tickers.join(","))])
            .await?;
        Ok(resp.quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn point(y: i32, m: u32, d: u32, close: f64) -> PricePoint {
        PricePoint {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            close,
        }
    }

    #[test]
    fn parses_daily_series_response() {
        let v = json!({
            "ticker": "AAPL",
            "points": [
                {"date": "2026-08-03", "close": 187.5},
                {"date": "2026-08-04", "close": 189.1}
            ]
        });

        let parsed: DailySeriesResponse = serde_json::from_value(v).unwrap();
        assert_eq!(parsed.ticker, "AAPL");
        assert_eq!(parsed.points.len(), 2);
        assert_eq!(parsed.points[1].close, 189.1);
    }

    #[test]
    fn rejects_out_of_order_series() {
        let series = PriceSeries {
            ticker: "AAPL".to_string(),
            points: vec![point(2026, 8, 4, 189.1), point(2026, 8, 3, 187.5)],
        };
        let err = validate_series(&series, "AAPL").unwrap_err();
        assert!(matches!(err, MarketDataError::Parse(_)));
    }

    #[test]
    fn empty_series_is_no_data() {
        let series = PriceSeries {
            ticker: "AAPL".to_string(),
            points: vec![],
        };
        let err = validate_series(&series, "AAPL").unwrap_err();
        assert!(matches!(err, MarketDataError::NoData(_)));
    }
}
