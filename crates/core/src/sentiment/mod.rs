use crate::config::Settings;
use crate::domain::sentiment::{HeadlineSentiment, SentimentLabel, SentimentVerdict};
use std::sync::Arc;

pub mod classifier;
pub mod news;

use classifier::{HttpClassifier, LazyClassifier, TextClassifier};
use news::{KeywordSearchNews, NewsSource, TickerNews};

const MAX_HEADLINES: usize = 8;
const POSITIVE_THRESHOLD: f64 = 0.6;
const NEGATIVE_THRESHOLD: f64 = 0.4;

/// Fetches headlines through an ordered source chain, classifies each one,
/// and reduces to a single verdict.
pub struct SentimentAnalyzer {
    sources: Vec<Arc<dyn NewsSource>>,
    classifier: LazyClassifier,
    max_headlines: usize,
}

impl SentimentAnalyzer {
    pub fn new(sources: Vec<Arc<dyn NewsSource>>, classifier: LazyClassifier) -> Self {
        Self {
            sources,
            classifier,
            max_headlines: MAX_HEADLINES,
        }
    }

    /// Production wiring: ticker-indexed feed first, keyword search second,
    /// classifier constructed lazily on first use.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let sources: Vec<Arc<dyn NewsSource>> = vec![
            Arc::new(TickerNews::from_settings(settings)?),
            Arc::new(KeywordSearchNews::from_settings(settings)?),
        ];

        let settings = settings.clone();
        let classifier = LazyClassifier::new(move || {
            tracing::info!("initializing sentiment classifier");
            Ok(Arc::new(HttpClassifier::from_settings(&settings)?) as Arc<dyn TextClassifier>)
        });

        Ok(Self::new(sources, classifier))
    }

    pub async fn analyze(&self, ticker: &str) -> anyhow::Result<SentimentVerdict> {
        let headlines = self.first_headlines(ticker).await;
        if headlines.is_empty() {
            tracing::info!(ticker, "no usable headlines from any source; serving neutral default");
            return Ok(SentimentVerdict::neutral_default());
        }

        let classifier = self.classifier.get().await?;

        let mut analyzed = Vec::with_capacity(headlines.len());
        let mut positive = 0usize;
        for title in headlines {
            let label = match classifier.classify(&title).await {
                Ok(classification) => classification.label,
                Err(err) => {
                    tracing::warn!(ticker, error = %err, "headline classification failed; treating as neutral");
                    SentimentLabel::Neutral
                }
            };
            if label == SentimentLabel::Positive {
                positive += 1;
            }
            analyzed.push(HeadlineSentiment { title, label });
        }

        let score = positive as f64 / analyzed.len() as f64;
        Ok(SentimentVerdict {
            overall_label: overall_label(score),
            score,
            headlines: analyzed,
        })
    }

    /// First-success-wins over the ordered source chain: the first source
    /// yielding a non-empty list decides; errors and empty lists both move on
    /// to the next source.
    async fn first_headlines(&self, ticker: &str) -> Vec<String> {
        for source in &self.sources {
            match source.headlines(ticker, self.max_headlines).await {
                Ok(headlines) if !headlines.is_empty() => {
                    tracing::debug!(
                        ticker,
                        source = source.source_name(),
                        count = headlines.len(),
                        "headlines fetched"
                    );
                    let mut headlines = headlines;
                    headlines.truncate(self.max_headlines);
                    return headlines;
                }
                Ok(_) => {
                    tracing::debug!(ticker, source = source.source_name(), "source empty; trying next");
                }
                Err(err) => {
                    tracing::warn!(ticker, source = source.source_name(), error = %err, "source failed; trying next");
                }
            }
        }
        Vec::new()
    }
}

fn overall_label(score: f64) -> SentimentLabel {
    if score > POSITIVE_THRESHOLD {
        SentimentLabel::Positive
    } else if score < NEGATIVE_THRESHOLD {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classifier::Classification;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticSource {
        name: &'static str,
        headlines: Vec<String>,
        fail: bool,
    }

    impl StaticSource {
        fn ok(name: &'static str, headlines: &[&str]) -> Arc<dyn NewsSource> {
            Arc::new(Self {
                name,
                headlines: headlines.iter().map(|s| s.to_string()).collect(),
                fail: false,
            })
        }

        fn failing(name: &'static str) -> Arc<dyn NewsSource> {
            Arc::new(Self {
                name,
                headlines: vec![],
                fail: true,
            })
        }
    }

    #[async_trait::async_trait]
    impl NewsSource for StaticSource {
        fn source_name(&self) -> &'static str {
            self.name
        }

        async fn headlines(&self, _ticker: &str, limit: usize) -> anyhow::Result<Vec<String>> {
            if self.fail {
                anyhow::bail!("source down");
            }
            Ok(self.headlines.iter().take(limit).cloned().collect())
        }
    }

    /// Labels by keyword, counts classify calls.
    struct KeywordClassifier {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl TextClassifier for KeywordClassifier {
        async fn classify(&self, text: &str) -> anyhow::Result<Classification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let label = if text.contains("up") {
                SentimentLabel::Positive
            } else if text.contains("down") {
                SentimentLabel::Negative
            } else {
                SentimentLabel::Neutral
            };
            Ok(Classification {
                label,
                confidence: 0.9,
            })
        }
    }

    fn analyzer(
        sources: Vec<Arc<dyn NewsSource>>,
    ) -> (SentimentAnalyzer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = LazyClassifier::eager(Arc::new(KeywordClassifier {
            calls: calls.clone(),
        }));
        (SentimentAnalyzer::new(sources, classifier), calls)
    }

    #[test]
    fn label_thresholds_match_the_contract() {
        assert_eq!(overall_label(0.75), SentimentLabel::Positive);
        assert_eq!(overall_label(0.6), SentimentLabel::Neutral);
        assert_eq!(overall_label(0.5), SentimentLabel::Neutral);
        assert_eq!(overall_label(0.4), SentimentLabel::Neutral);
        assert_eq!(overall_label(0.25), SentimentLabel::Negative);
    }

    #[tokio::test]
    async fn secondary_source_decides_when_primary_is_empty() {
        let (analyzer, calls) = analyzer(vec![
            StaticSource::ok("primary", &[]),
            StaticSource::ok("secondary", &["Stock up", "Stock down", "Stock flat"]),
        ]);

        let verdict = analyzer.analyze("AAPL").await.unwrap();
        assert_eq!(verdict.headlines.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!((verdict.score - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(verdict.overall_label, SentimentLabel::Negative);
    }

    #[tokio::test]
    async fn failing_primary_also_falls_through() {
        let (analyzer, _) = analyzer(vec![
            StaticSource::failing("primary"),
            StaticSource::ok("secondary", &["Shares up big", "Guidance up"]),
        ]);

        let verdict = analyzer.analyze("AAPL").await.unwrap();
        assert_eq!(verdict.overall_label, SentimentLabel::Positive);
        assert!((verdict.score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn no_headlines_anywhere_serves_the_neutral_default() {
        let (analyzer, calls) = analyzer(vec![
            StaticSource::ok("primary", &[]),
            StaticSource::failing("secondary"),
        ]);

        let verdict = analyzer.analyze("AAPL").await.unwrap();
        assert_eq!(verdict.overall_label, SentimentLabel::Neutral);
        assert!((verdict.score - 0.5).abs() < 1e-9);
        assert_eq!(verdict.headlines.len(), 1);
        assert_eq!(
            verdict.headlines[0].title,
            "No recent news found for this stock."
        );
        // Classifier never touched.
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn headline_count_is_capped() {
        let many: Vec<String> = (0..20).map(|i| format!("Headline {i} up")).collect();
        let many_refs: Vec<&str> = many.iter().map(|s| s.as_str()).collect();
        let (analyzer, calls) = analyzer(vec![StaticSource::ok("primary", &many_refs)]);

        let verdict = analyzer.analyze("AAPL").await.unwrap();
        assert_eq!(verdict.headlines.len(), 8);
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }
}
