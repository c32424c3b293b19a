//! Persisted configuration
//!
//! Optional JSON overrides read from `.beacon/config.json`, layered on top of
//! `CoordinatorConfig::default()` and under CLI flags.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use beacon_core::models::{LlmProvider, ModelConfig};
use beacon_core::{CoordinatorConfig, ExecutionMode};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = ".beacon/config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_mode: Option<ExecutionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_poll_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_retention_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_worker_providers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_worker_models: HashMap<String, String>,
}

impl PersistedConfig {
    /// Read overrides from `path`. A missing file means no overrides.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Overlay `other` on top of `self`; set fields in `other` win
    pub fn merge(&mut self, other: PersistedConfig) {
        if other.provider.is_some() {
            self.provider = other.provider;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.execution_mode.is_some() {
            self.execution_mode = other.execution_mode;
        }
        if other.worker_timeout_secs.is_some() {
            self.worker_timeout_secs = other.worker_timeout_secs;
        }
        if other.stream_poll_interval_ms.is_some() {
            self.stream_poll_interval_ms = other.stream_poll_interval_ms;
        }
        if other.session_retention_secs.is_some() {
            self.session_retention_secs = other.session_retention_secs;
        }
        if other.sweep_interval_secs.is_some() {
            self.sweep_interval_secs = other.sweep_interval_secs;
        }
        self.per_worker_providers.extend(other.per_worker_providers);
        self.per_worker_models.extend(other.per_worker_models);
    }

    /// Write the overrides into a coordinator config
    pub fn apply_to(&self, config: &mut CoordinatorConfig) -> Result<()> {
        if let Some(name) = &self.provider {
            let provider = parse_provider(name)?;
            if provider != config.model.provider {
                config.model = ModelConfig::for_provider(provider);
            }
        }
        if let Some(model) = &self.model {
            config.model.model = model.clone();
        }
        if let Some(url) = &self.base_url {
            config.model = config.model.clone().with_base_url(url.clone());
        }
        if let Some(mode) = self.execution_mode {
            config.execution_mode = mode;
        }
        if let Some(secs) = self.worker_timeout_secs {
            config.worker_timeout_secs = secs;
        }
        if let Some(ms) = self.stream_poll_interval_ms {
            config.stream_poll_interval_ms = ms;
        }
        if let Some(secs) = self.session_retention_secs {
            config.session_retention_secs = secs;
        }
        if let Some(secs) = self.sweep_interval_secs {
            config.sweep_interval_secs = secs;
        }
        for (worker, name) in &self.per_worker_providers {
            config
                .per_worker_providers
                .insert(worker.clone(), parse_provider(name)?);
        }
        for (worker, model) in &self.per_worker_models {
            config.per_worker_models.insert(worker.clone(), model.clone());
        }
        Ok(())
    }

    pub fn into_coordinator_config(self) -> Result<CoordinatorConfig> {
        let mut config = CoordinatorConfig::default();
        self.apply_to(&mut config)?;
        Ok(config)
    }
}

fn parse_provider(name: &str) -> Result<LlmProvider> {
    LlmProvider::parse(name).ok_or_else(|| anyhow!("Unknown LLM provider '{}'", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let config = PersistedConfig::load("does/not/exist.json").await.unwrap();
        assert_eq!(config, PersistedConfig::default());
    }

    #[test]
    fn test_merge_prefers_later_values() {
        let mut base: PersistedConfig =
            serde_json::from_str(r#"{ "provider": "openai", "worker_timeout_secs": 60 }"#).unwrap();
        base.merge(PersistedConfig {
            provider: Some("anthropic".to_string()),
            ..Default::default()
        });
        assert_eq!(base.provider.as_deref(), Some("anthropic"));
        assert_eq!(base.worker_timeout_secs, Some(60));
    }

    #[test]
    fn test_apply_to_coordinator_config() {
        let persisted: PersistedConfig = serde_json::from_str(
            r#"{
                "provider": "anthropic",
                "execution_mode": "sequential",
                "worker_timeout_secs": 45,
                "per_worker_models": { "planner": "claude-opus-4" },
                "per_worker_providers": { "researcher": "deepseek" }
            }"#,
        )
        .unwrap();
        let config = persisted.into_coordinator_config().unwrap();

        assert_eq!(config.model.provider, LlmProvider::Anthropic);
        assert_eq!(config.model.model, LlmProvider::Anthropic.default_model());
        assert_eq!(config.execution_mode, ExecutionMode::Sequential);
        assert_eq!(config.worker_timeout(), Duration::from_secs(45));
        assert_eq!(config.model_config_for("planner").model, "claude-opus-4");
        assert_eq!(
            config.model_config_for("researcher").provider,
            LlmProvider::DeepSeek
        );
    }

    #[test]
    fn test_unknown_provider_is_an_error() {
        let persisted = PersistedConfig {
            provider: Some("skynet".to_string()),
            ..Default::default()
        };
        let err = persisted.into_coordinator_config().unwrap_err();
        assert!(err.to_string().contains("skynet"));
    }
}
