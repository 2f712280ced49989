use crate::config::Settings;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn headlines(&self, ticker: &str, limit: usize) -> anyhow::Result<Vec<String>>;
}

fn build_http() -> anyhow::Result<reqwest::Client> {
    let timeout_secs = std::env::var("NEWS_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build news http client")
}

fn api_key_headers(api_key: Option<&str>) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = api_key {
        headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
    }
    Ok(headers)
}

/// Primary source: headlines indexed by ticker symbol.
#[derive(Debug, Clone)]
pub struct TickerNews {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TickerNewsResponse {
    headlines: Vec<String>,
}

impl TickerNews {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_http()?,
            base_url: settings.require_news_base_url()?.to_string(),
            api_key: settings.news_api_key.clone(),
        })
    }
}

#[async_trait::async_trait]
impl NewsSource for TickerNews {
    fn source_name(&self) -> &'static str {
        "ticker_news"
    }

    async fn headlines(&self, ticker: &str, limit: usize) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/v1/news/{ticker}", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .get(url)
            .headers(api_key_headers(self.api_key.as_deref())?)
            .query(&[("limit", limit.to_string())])
            .send()
            .await
            .context("ticker news request failed")?;

        let status = res.status();
        let body = res.text().await.context("failed to read news response")?;
        if !status.is_success() {
            anyhow::bail!("ticker news HTTP {status}: {body}");
        }

        let parsed: TickerNewsResponse = serde_json::from_str(&body)
            .with_context(|| format!("invalid ticker news response: {body}"))?;
        Ok(clean_titles(parsed.headlines, limit))
    }
}

/// Secondary source: keyword search over a general news feed, queried with
/// "<ticker> stock".
#[derive(Debug, Clone)]
pub struct KeywordSearchNews {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResult {
    title: String,
}

impl KeywordSearchNews {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_http()?,
            base_url: settings.require_news_base_url()?.to_string(),
            api_key: settings.news_api_key.clone(),
        })
    }
}

#[async_trait::async_trait]
impl NewsSource for KeywordSearchNews {
    fn source_name(&self) -> &'static str {
        "keyword_search_news"
    }

    async fn headlines(&self, ticker: &str, limit: usize) -> anyhow::Result<Vec<String>> {
        let query = format!("{ticker} stock");
        let url = format!(
            "{}/v1/search?q={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&query)
        );
        let res = self
            .http
            .get(url)
            .headers(api_key_headers(self.api_key.as_deref())?)
            .query(&[("limit", limit.to_string())])
            .send()
            .await
            .context("news search request failed")?;

        let status = res.status();
        let body = res.text().await.context("failed to read search response")?;
        if !status.is_success() {
            anyhow::bail!("news search HTTP {status}: {body}");
        }

        let parsed: SearchResponse = serde_json::from_str(&body)
            .with_context(|| format!("invalid news search response: {body}"))?;
        Ok(clean_titles(
            parsed.results.into_iter().map(|r| r.title).collect(),
            limit,
        ))
    }
}

fn clean_titles(titles: Vec<String>, limit: usize) -> Vec<String> {
    titles
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_titles_drops_blanks_and_caps_the_list() {
        let titles = vec![
            "  First headline ".to_string(),
            "".to_string(),
            "   ".to_string(),
            "Second".to_string(),
            "Third".to_string(),
        ];
        let cleaned = clean_titles(titles, 2);
        assert_eq!(cleaned, vec!["First headline".to_string(), "Second".to_string()]);
    }

    #[test]
    fn search_response_parses() {
        let body = r#"{"results": [{"title": "Apple rallies"}, {"title": "Chips up"}]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].title, "Apple rallies");
    }
}
