use crate::domain::suggestion::{CachedSuggestions, Suggestion, SuggestionHistoryRecord};
use crate::forecast::Forecast;
use crate::market::MarketData;
use crate::suggest::history::{HistoryReportItem, HistoryStore};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

pub mod history;

pub const DEFAULT_UNIVERSE: [&str; 7] = ["AAPL", "MSFT", "GOOGL", "NVDA", "TSLA", "AMZN", "META"];

const DEFAULT_TTL_SECS: u64 = 4 * 60 * 60;
const TOP_N: usize = 3;

pub fn universe_from_env() -> Vec<String> {
    if let Ok(s) = std::env::var("SUGGESTION_UNIVERSE") {
        let tickers: Vec<String> = s
            .split(',')
            .map(|t| t.trim().to_ascii_uppercase())
            .filter(|t| !t.is_empty())
            .collect();
        if !tickers.is_empty() {
            return tickers;
        }
    }
    DEFAULT_UNIVERSE.iter().map(|t| t.to_string()).collect()
}

/// Staleness policy for the suggestions snapshot.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }
}

impl CachePolicy {
    pub fn from_env() -> Self {
        let ttl_secs = std::env::var("SUGGESTION_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TTL_SECS);
        Self {
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    pub fn is_fresh(&self, generated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let Ok(ttl) = chrono::Duration::from_std(self.ttl) else {
            return false;
        };
        now.signed_duration_since(generated_at) < ttl
    }
}

#[derive(Default)]
struct CacheState {
    snapshot: RwLock<Option<CachedSuggestions>>,
    refresh: Mutex<()>,
}

/// Scans the ticker universe, scores and ranks candidates, persists history
/// idempotently, and serves through a TTL-bounded snapshot.
pub struct SuggestionEngine {
    forecast: Arc<dyn Forecast>,
    market: Arc<dyn MarketData>,
    history: Arc<dyn HistoryStore>,
    universe: Vec<String>,
    policy: CachePolicy,
    cache: CacheState,
}

impl SuggestionEngine {
    pub fn new(
        forecast: Arc<dyn Forecast>,
        market: Arc<dyn MarketData>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            forecast,
            market,
            history,
            universe: universe_from_env(),
            policy: CachePolicy::from_env(),
            cache: CacheState::default(),
        }
    }

    pub fn with_universe(mut self, universe: Vec<String>) -> Self {
        self.universe = universe;
        self
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Cache-through entry point. The read path never blocks on a refresh in
    /// progress; the refresh mutex makes regeneration single-writer, and the
    /// re-check after acquiring it keeps two stale callers from both paying
    /// for the scan.
    pub async fn get_suggestions(&self, horizon: u32) -> anyhow::Result<Vec<Suggestion>> {
        if let Some(items) = self.cached().await {
            tracing::debug!("serving suggestions from cache");
            return Ok(items);
        }

        let _refresh = self.cache.refresh.lock().await;
        if let Some(items) = self.cached().await {
            return Ok(items);
        }

        tracing::info!("suggestions cache stale or empty; regenerating");
        let ranked = self.scan_and_rank(horizon).await?;
        self.persist(&ranked).await?;

        *self.cache.snapshot.write().await = Some(CachedSuggestions {
            generated_at: Utc::now(),
            items: ranked.clone(),
        });
        Ok(ranked)
    }

    async fn cached(&self) -> Option<Vec<Suggestion>> {
        let guard = self.cache.snapshot.read().await;
        let snapshot = guard.as_ref()?;
        if snapshot.items.is_empty() || !self.policy.is_fresh(snapshot.generated_at, Utc::now()) {
            return None;
        }
        Some(snapshot.items.clone())
    }

    /// Full universe scan, bypassing the cache (the worker's entry point).
    /// A failing ticker is skipped; a scan with zero usable tickers is the
    /// request-level failure.
    pub async fn scan_and_rank(&self, horizon: u32) -> anyhow::Result<Vec<Suggestion>> {
        let mut scored = Vec::with_capacity(self.universe.len());
        for ticker in &self.universe {
            match self.score_ticker(ticker, horizon).await {
                Ok(suggestion) => scored.push(suggestion),
                Err(err) => {
                    tracing::warn!(ticker = %ticker, error = %err, "could not analyze ticker; skipping");
                }
            }
        }
        anyhow::ensure!(!scored.is_empty(), "universe scan produced no usable tickers");

        scored.sort_by(|a, b| {
            b.suggestion_score
                .partial_cmp(&a.suggestion_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(TOP_N);
        for (i, suggestion) in scored.iter_mut().enumerate() {
            suggestion.rank = (i + 1) as i32;
        }
        Ok(scored)
    }

    async fn score_ticker(&self, ticker: &str, horizon: u32) -> anyhow::Result<Suggestion> {
        let current_price = self
            .market
            .latest_close(ticker)
            .await
            .with_context(|| format!("latest close fetch failed for {ticker}"))?;

        let bundle = self.forecast.run_forecast(ticker, horizon).await?;
        let best_model = bundle
            .best_model
            .clone()
            .with_context(|| format!("no viable model for {ticker}"))?;
        let predicted_price = bundle
            .best_result()
            .and_then(|r| r.point_forecast)
            .with_context(|| format!("winning model has no point forecast for {ticker}"))?;

        let growth = Suggestion::growth_percent(current_price, predicted_price);
        Ok(Suggestion {
            ticker: ticker.to_string(),
            current_price,
            predicted_price,
            horizon,
            best_model,
            predicted_growth_percent: growth,
            // Single-factor ranking for now; the score is its own field so a
            // multi-factor blend can slot in without touching callers.
            suggestion_score: growth,
            rank: 0,
        })
    }

    /// Writes one history row per ranked suggestion, keyed by today's date.
    /// Returns how many rows were actually inserted.
    pub async fn persist(&self, ranked: &[Suggestion]) -> anyhow::Result<u32> {
        let today = Utc::now().date_naive();
        let mut inserted = 0;
        for suggestion in ranked {
            if self.history.exists(&suggestion.ticker, today).await? {
                tracing::debug!(ticker = %suggestion.ticker, %today, "history row exists; skipping");
                continue;
            }
            let record = SuggestionHistoryRecord::from_suggestion(suggestion, today);
            self.history.insert(&record).await?;
            inserted += 1;
        }
        tracing::info!(inserted, total = ranked.len(), "persisted suggestion history");
        Ok(inserted)
    }

    /// Past suggestions joined with live prices. Rows whose ticker has no
    /// current quote are omitted.
    pub async fn history_report(&self) -> anyhow::Result<Vec<HistoryReportItem>> {
        let rows = self.history.list_all().await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut tickers: Vec<String> = rows.iter().map(|r| r.ticker.clone()).collect();
        tickers.sort();
        tickers.dedup();

        let prices = self
            .market
            .batch_latest_close(&tickers)
            .await
            .context("batch quote fetch failed for history report")?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(current_price) = prices.get(&row.ticker).copied() else {
                tracing::debug!(ticker = %row.ticker, "no live price for history row; skipping");
                continue;
            };
            let performance_percent =
                ((current_price - row.price_at_suggestion) / row.price_at_suggestion) * 100.0;
            out.push(HistoryReportItem {
                date_suggested: row.date_suggested,
                ticker: row.ticker,
                price_at_suggestion: row.price_at_suggestion,
                current_price,
                performance_percent,
            });
        }
        Ok(out)
    }
}
