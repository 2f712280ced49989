use crate::market::MarketData;
use serde::{Deserialize, Serialize};

pub const MAJOR_INDICES: [(&str, &str); 3] = [
    ("S&P 500", "^GSPC"),
    ("Nasdaq", "^IXIC"),
    ("Dow Jones", "^DJI"),
];

// Sample list of liquid names to compute daily movers from.
pub const MOVER_TICKERS: [&str; 16] = [
    "AAPL", "MSFT", "GOOGL", "NVDA", "TSLA", "AMZN", "META", "JPM", "V", "PG", "JNJ", "UNH", "HD",
    "MA", "BAC", "DIS",
];

const MOVER_TOP_N: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexQuote {
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub percent_change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mover {
    pub ticker: String,
    pub price: f64,
    pub percent_change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOverview {
    pub indices: Vec<IndexQuote>,
    pub gainers: Vec<Mover>,
    pub losers: Vec<Mover>,
}

/// Best-effort snapshot of the broad market. Symbols that cannot be fetched
/// (or have fewer than two closes) are skipped, never fatal.
pub async fn market_overview(market: &dyn MarketData) -> MarketOverview {
    let mut indices = Vec::with_capacity(MAJOR_INDICES.len());
    for (name, symbol) in MAJOR_INDICES {
        match day_change(market, symbol).await {
            Some((price, change, percent_change)) => indices.push(IndexQuote {
                name: name.to_string(),
                price,
                change,
                percent_change,
            }),
            None => tracing::warn!(symbol, "could not fetch index data; skipping"),
        }
    }

    let mut movers = Vec::with_capacity(MOVER_TICKERS.len());
    for ticker in MOVER_TICKERS {
        match day_change(market, ticker).await {
            Some((price, _, percent_change)) => movers.push(Mover {
                ticker: ticker.to_string(),
                price,
                percent_change,
            }),
            None => tracing::debug!(ticker, "could not fetch mover data; skipping"),
        }
    }

    movers.sort_by(|a, b| {
        b.percent_change
            .partial_cmp(&a.percent_change)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let gainers: Vec<Mover> = movers.iter().take(MOVER_TOP_N).cloned().collect();
    let losers: Vec<Mover> = movers.iter().rev().take(MOVER_TOP_N).cloned().collect();

    MarketOverview {
        indices,
        gainers,
        losers,
    }
}

async fn day_change(market: &dyn MarketData, symbol: &str) -> Option<(f64, f64, f64)> {
    let series = match market.daily_series(symbol, 5).await {
        Ok(s) => s,
        Err(err) => {
            tracing::debug!(symbol, error = %err, "daily series fetch failed");
            return None;
        }
    };

    let closes = series.closes();
    if closes.len() < 2 {
        return None;
    }
    let last = closes[closes.len() - 1];
    let prev = closes[closes.len() - 2];
    if prev == 0.0 {
        return None;
    }
    let change = last - prev;
    Some((last, change, (change / prev) * 100.0))
}
