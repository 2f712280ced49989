use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ranked entry from a universe scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub ticker: String,
    pub current_price: f64,
    pub predicted_price: f64,
    pub horizon: u32,
    pub best_model: String,
    pub predicted_growth_percent: f64,
    pub suggestion_score: f64,
    pub rank: i32,
}

impl Suggestion {
    pub fn growth_percent(current_price: f64, predicted_price: f64) -> f64 {
        ((predicted_price - current_price) / current_price) * 100.0
    }
}

/// Persisted record of a suggestion; one row per (ticker, date_suggested).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionHistoryRecord {
    pub id: Uuid,
    pub date_suggested: NaiveDate,
    pub ticker: String,
    pub price_at_suggestion: f64,
    pub predicted_price: f64,
    pub best_model: String,
}

impl SuggestionHistoryRecord {
    pub fn from_suggestion(suggestion: &Suggestion, date_suggested: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            date_suggested,
            ticker: suggestion.ticker.clone(),
            price_at_suggestion: suggestion.current_price,
            predicted_price: suggestion.predicted_price,
            best_model: suggestion.best_model.clone(),
        }
    }
}

/// Snapshot served out of the process-wide cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSuggestions {
    pub generated_at: DateTime<Utc>,
    pub items: Vec<Suggestion>,
}
