pub mod domain;
pub mod forecast;
pub mod market;
pub mod sentiment;
pub mod storage;
pub mod suggest;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub market_data_base_url: Option<String>,
        pub market_data_api_key: Option<String>,
        pub news_base_url: Option<String>,
        pub news_api_key: Option<String>,
        pub classifier_base_url: Option<String>,
        pub classifier_api_key: Option<String>,
        pub model_artifacts_dir: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                market_data_base_url: std::env::var("MARKET_DATA_BASE_URL").ok(),
                market_data_api_key: std::env::var("MARKET_DATA_API_KEY").ok(),
                news_base_url: std::env::var("NEWS_BASE_URL").ok(),
                news_api_key: std::env::var("NEWS_API_KEY").ok(),
                classifier_base_url: std::env::var("CLASSIFIER_BASE_URL").ok(),
                classifier_api_key: std::env::var("CLASSIFIER_API_KEY").ok(),
                model_artifacts_dir: std::env::var("MODEL_ARTIFACTS_DIR").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_market_data_base_url(&self) -> anyhow::Result<&str> {
            self.market_data_base_url
                .as_deref()
                .context("MARKET_DATA_BASE_URL is required")
        }

        pub fn require_news_base_url(&self) -> anyhow::Result<&str> {
            self.news_base_url
                .as_deref()
                .context("NEWS_BASE_URL is required")
        }

        pub fn require_classifier_base_url(&self) -> anyhow::Result<&str> {
            self.classifier_base_url
                .as_deref()
                .context("CLASSIFIER_BASE_URL is required")
        }
    }
}
