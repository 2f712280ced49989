use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadlineSentiment {
    pub title: String,
    pub label: SentimentLabel,
}

/// Aggregated news sentiment for one ticker.
///
/// `score` is the fraction of positive headlines, in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentVerdict {
    pub overall_label: SentimentLabel,
    pub score: f64,
    pub headlines: Vec<HeadlineSentiment>,
}

impl SentimentVerdict {
    /// Served when no usable headlines exist from any source.
    pub fn neutral_default() -> Self {
        Self {
            overall_label: SentimentLabel::Neutral,
            score: 0.5,
            headlines: vec![HeadlineSentiment {
                title: "No recent news found for this stock.".to_string(),
                label: SentimentLabel::Neutral,
            }],
        }
    }
}
