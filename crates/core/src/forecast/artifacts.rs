use crate::config::Settings;
use crate::forecast::models::{ArParams, Holt, ModelError, WindowedParams};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Strategies with persisted offline-trained artifacts. The fast path needs
/// all of them; the realtime path fits its own set.
pub const PRETRAINED_STRATEGIES: [&str; 3] = ["ar", "holt", "windowed"];

const DEFAULT_ARTIFACTS_DIR: &str = "./models";

/// Serialized fitted parameters for one (ticker, strategy) pair, replayable
/// against a fresh window of recent closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PretrainedModel {
    Ar(ArParams),
    Holt(Holt),
    Windowed(WindowedParams),
}

impl PretrainedModel {
    pub fn strategy(&self) -> &'static str {
        match self {
            PretrainedModel::Ar(_) => "ar",
            PretrainedModel::Holt(_) => "holt",
            PretrainedModel::Windowed(_) => "windowed",
        }
    }

    pub fn predict(&self, recent: &[f64], horizon: u32) -> Result<Vec<f64>, ModelError> {
        match self {
            PretrainedModel::Ar(params) => params.forecast(recent, horizon),
            PretrainedModel::Holt(model) => model.forecast(recent, horizon),
            PretrainedModel::Windowed(params) => params.forecast(recent, horizon),
        }
    }
}

#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    /// `Ok(None)` is a plain cache miss; `Err` is an actual load problem.
    /// Callers on the fast path treat both the same way.
    async fn load(&self, ticker: &str, strategy: &str) -> anyhow::Result<Option<PretrainedModel>>;

    async fn save(&self, ticker: &str, model: &PretrainedModel) -> anyhow::Result<()>;
}

/// Flat-directory JSON store: one `{ticker}_{strategy}.json` per artifact.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let dir = settings
            .model_artifacts_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_ARTIFACTS_DIR.to_string());
        Self::new(dir)
    }

    fn artifact_path(&self, ticker: &str, strategy: &str) -> PathBuf {
        self.dir.join(format!("{ticker}_{strategy}.json"))
    }
}

#[async_trait::async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn load(&self, ticker: &str, strategy: &str) -> anyhow::Result<Option<PretrainedModel>> {
        let path = self.artifact_path(ticker, strategy);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };

        let model: PretrainedModel = serde_json::from_str(&text)
            .with_context(|| format!("invalid model artifact at {}", path.display()))?;
        anyhow::ensure!(
            model.strategy() == strategy,
            "artifact at {} is for strategy {}, expected {strategy}",
            path.display(),
            model.strategy()
        );
        Ok(Some(model))
    }

    async fn save(&self, ticker: &str, model: &PretrainedModel) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let path = self.artifact_path(ticker, model.strategy());
        let json = serde_json::to_vec_pretty(model).context("failed to serialize artifact")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        tracing::info!(ticker, strategy = model.strategy(), path = %path.display(), "saved model artifact");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::models::{Ar, Windowed};

    fn temp_store() -> FsArtifactStore {
        let dir = std::env::temp_dir().join(format!("stockcast-artifacts-{}", uuid::Uuid::new_v4()));
        FsArtifactStore::new(dir)
    }

    #[tokio::test]
    async fn missing_artifact_is_a_plain_none() {
        let store = temp_store();
        let loaded = store.load("AAPL", "ar").await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = temp_store();
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + (i as f64) * 0.4).collect();

        let ar = Ar::default().fit(&closes).unwrap();
        store.save("AAPL", &PretrainedModel::Ar(ar)).await.unwrap();

        let loaded = store.load("AAPL", "ar").await.unwrap().unwrap();
        assert_eq!(loaded.strategy(), "ar");
        let path = loaded.predict(&closes, 3).unwrap();
        assert_eq!(path.len(), 3);
    }

    #[tokio::test]
    async fn strategy_mismatch_is_an_error() {
        let store = temp_store();
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + (i as f64) * 0.4).collect();
        let windowed = Windowed::default().fit(&closes).unwrap();
        store
            .save("AAPL", &PretrainedModel::Windowed(windowed))
            .await
            .unwrap();

        // Hand the windowed artifact the ar file name.
        let src = store.artifact_path("AAPL", "windowed");
        let dst = store.artifact_path("AAPL", "ar");
        tokio::fs::copy(&src, &dst).await.unwrap();

        assert!(store.load("AAPL", "ar").await.is_err());
    }
}
