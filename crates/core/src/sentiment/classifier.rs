use crate::config::Settings;
use crate::domain::sentiment::SentimentLabel;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Classification {
    pub label: SentimentLabel,
    pub confidence: f64,
}

#[async_trait::async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> anyhow::Result<Classification>;
}

type ClassifierInit = Box<dyn Fn() -> anyhow::Result<Arc<dyn TextClassifier>> + Send + Sync>;

/// At-most-once construction wrapper: the classifier backend is built on the
/// first `get` and reused for the life of the process.
pub struct LazyClassifier {
    cell: tokio::sync::OnceCell<Arc<dyn TextClassifier>>,
    init: ClassifierInit,
}

impl LazyClassifier {
    pub fn new(
        init: impl Fn() -> anyhow::Result<Arc<dyn TextClassifier>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            cell: tokio::sync::OnceCell::new(),
            init: Box::new(init),
        }
    }

    /// Pre-initialized wrapper (tests, or a caller that already owns one).
    pub fn eager(classifier: Arc<dyn TextClassifier>) -> Self {
        Self {
            cell: tokio::sync::OnceCell::new_with(Some(classifier)),
            init: Box::new(|| anyhow::bail!("eager classifier should never re-initialize")),
        }
    }

    pub async fn get(&self) -> anyhow::Result<Arc<dyn TextClassifier>> {
        let classifier = self
            .cell
            .get_or_try_init(|| async { (self.init)() })
            .await?;
        Ok(Arc::clone(classifier))
    }
}

/// Hosted text-classification endpoint speaking a small JSON contract:
/// POST /v1/classify {"text": ...} -> {"label": "positive", "score": 0.93}.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct ClassifyResponse {
    label: String,
    score: f64,
}

impl HttpClassifier {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings.require_classifier_base_url()?.to_string();
        let api_key = settings.classifier_api_key.clone();

        let timeout_secs = std::env::var("CLASSIFIER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build classifier http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }
}

fn parse_label(label: &str) -> anyhow::Result<SentimentLabel> {
    match label.to_ascii_lowercase().as_str() {
        "positive" => Ok(SentimentLabel::Positive),
        "negative" => Ok(SentimentLabel::Negative),
        "neutral" => Ok(SentimentLabel::Neutral),
        other => anyhow::bail!("unknown sentiment label: {other}"),
    }
}

#[async_trait::async_trait]
impl TextClassifier for HttpClassifier {
    async fn classify(&self, text: &str) -> anyhow::Result<Classification> {
        let url = format!("{}/v1/classify", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(self.headers()?)
            .json(&ClassifyRequest { text })
            .send()
            .await
            .context("classifier request failed")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("failed to read classifier response")?;
        if !status.is_success() {
            anyhow::bail!("classifier HTTP {status}: {body}");
        }

        let parsed: ClassifyResponse = serde_json::from_str(&body)
            .with_context(|| format!("invalid classifier response: {body}"))?;
        Ok(Classification {
            label: parse_label(&parsed.label)?,
            confidence: parsed.score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoopClassifier;

    #[async_trait::async_trait]
    impl TextClassifier for NoopClassifier {
        async fn classify(&self, _text: &str) -> anyhow::Result<Classification> {
            Ok(Classification {
                label: SentimentLabel::Neutral,
                confidence: 1.0,
            })
        }
    }

    #[test]
    fn parses_known_labels_case_insensitively() {
        assert_eq!(parse_label("Positive").unwrap(), SentimentLabel::Positive);
        assert_eq!(parse_label("NEGATIVE").unwrap(), SentimentLabel::Negative);
        assert_eq!(parse_label("neutral").unwrap(), SentimentLabel::Neutral);
        assert!(parse_label("bullish").is_err());
    }

    #[tokio::test]
    async fn lazy_classifier_initializes_exactly_once() {
        let inits = Arc::new(AtomicUsize::new(0));
        let counter = inits.clone();
        let lazy = LazyClassifier::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NoopClassifier) as Arc<dyn TextClassifier>)
        });

        lazy.get().await.unwrap();
        lazy.get().await.unwrap();
        lazy.get().await.unwrap();
        assert_eq!(inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn eager_classifier_never_runs_the_initializer() {
        let lazy = LazyClassifier::eager(Arc::new(NoopClassifier));
        assert!(lazy.get().await.is_ok());
    }
}
