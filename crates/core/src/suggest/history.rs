use crate::domain::suggestion::SuggestionHistoryRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Persistence seam for suggestion history. One row per (ticker, date);
/// `insert` on an existing key must be a no-op, not an error.
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    async fn exists(&self, ticker: &str, date_suggested: NaiveDate) -> anyhow::Result<bool>;

    async fn insert(&self, record: &SuggestionHistoryRecord) -> anyhow::Result<()>;

    /// All rows, most recent suggestion date first.
    async fn list_all(&self) -> anyhow::Result<Vec<SuggestionHistoryRecord>>;
}

/// One row of the performance report: how a past suggestion has done since.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryReportItem {
    pub date_suggested: NaiveDate,
    pub ticker: String,
    pub price_at_suggestion: f64,
    pub current_price: f64,
    pub performance_percent: f64,
}

/// Discards every write; backs dry runs that must not touch the database.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHistoryStore;

#[async_trait::async_trait]
impl HistoryStore for NullHistoryStore {
    async fn exists(&self, _ticker: &str, _date_suggested: NaiveDate) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn insert(&self, record: &SuggestionHistoryRecord) -> anyhow::Result<()> {
        tracing::debug!(ticker = %record.ticker, "null history store: dropping insert");
        Ok(())
    }

    async fn list_all(&self) -> anyhow::Result<Vec<SuggestionHistoryRecord>> {
        Ok(Vec::new())
    }
}
