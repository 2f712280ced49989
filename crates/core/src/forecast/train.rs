use crate::forecast::artifacts::{ArtifactStore, PretrainedModel};
use crate::forecast::models::{Ar, Holt, Windowed};
use crate::market::MarketData;
use anyhow::Context;

const DEFAULT_TRAIN_LOOKBACK_DAYS: u32 = 1825;

pub fn train_lookback_days() -> u32 {
    std::env::var("TRAIN_LOOKBACK_DAYS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_TRAIN_LOOKBACK_DAYS)
}

/// Fits every persisted strategy on a long lookback and writes the artifacts.
/// One call per ticker; callers decide whether a failure skips or aborts.
pub async fn train_ticker(
    market: &dyn MarketData,
    store: &dyn ArtifactStore,
    ticker: &str,
    lookback_days: u32,
) -> anyhow::Result<()> {
    let series = market
        .daily_series(ticker, lookback_days)
        .await
        .with_context(|| format!("training data fetch failed for {ticker}"))?;
    let closes = series.closes();
    anyhow::ensure!(!closes.is_empty(), "no training data for {ticker}");

    let ar = Ar::default()
        .fit(&closes)
        .with_context(|| format!("ar fit failed for {ticker}"))?;
    store.save(ticker, &PretrainedModel::Ar(ar)).await?;

    store
        .save(ticker, &PretrainedModel::Holt(Holt::default()))
        .await?;

    let windowed = Windowed::default()
        .fit(&closes)
        .with_context(|| format!("windowed fit failed for {ticker}"))?;
    store
        .save(ticker, &PretrainedModel::Windowed(windowed))
        .await?;

    tracing::info!(ticker, points = closes.len(), "trained and saved model artifacts");
    Ok(())
}
