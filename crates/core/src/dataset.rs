//! # Dataset
//!
//! Keyed situational data (shelters, supplies, conditions) per disaster
//! category. Loaded once at startup; a category that is not in the dataset
//! is rejected at submission.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

/// Errors raised while loading the dataset file
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("dataset must be a JSON object keyed by category")]
    NotAnObject,
}

/// Category → context payload lookup
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    entries: BTreeMap<String, Value>,
}

impl Dataset {
    /// Normalise a category key the same way for loading and lookup
    pub fn normalize(category: &str) -> String {
        category.trim().to_lowercase()
    }

    /// Load a JSON dataset file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DatasetError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let dataset = Self::from_json(&text)?;
        tracing::info!(
            path = %path.display(),
            categories = dataset.len(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    pub fn from_json(text: &str) -> Result<Self, DatasetError> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Ok(Self::from_entries(map)),
            _ => Err(DatasetError::NotAnObject),
        }
    }

    pub fn from_entries<K: AsRef<str>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (Self::normalize(k.as_ref()), v))
                .collect(),
        }
    }

    /// Context payload for a category, if recognised
    pub fn lookup(&self, category: &str) -> Option<&Value> {
        self.entries.get(&Self::normalize(category))
    }

    pub fn contains(&self, category: &str) -> bool {
        self.lookup(category).is_some()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
