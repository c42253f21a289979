use crate::error::StateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Progress of one crawl target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlProgress {
    /// Highest revision whose documents were handed to the sink
    pub last_revision: u64,
    /// Documents emitted across all recorded runs
    pub documents_indexed: usize,
    pub updated_at: DateTime<Utc>,
}

/// Persisted crawl progress, used to resume incremental crawls
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CrawlState {
    /// Map of `location#base_path` -> progress
    pub targets: HashMap<String, CrawlProgress>,
}

impl CrawlState {
    /// Get the default state file path
    pub fn default_path() -> PathBuf {
        crate::paths::PlatformPaths::default_state_path()
    }

    /// Key identifying a location and base path pair
    pub fn key(location: &str, base_path: &str) -> String {
        format!("{}#{}", location, base_path)
    }

    /// Load state from disk; a missing file is an empty state
    pub fn load(state_path: &Path) -> Result<Self, StateError> {
        if !state_path.exists() {
            tracing::debug!("Crawl state file not found, starting from scratch");
            return Ok(Self::default());
        }

        let load_failed = |reason: String| StateError::LoadFailed {
            path: state_path.display().to_string(),
            reason,
        };
        let content = fs::read_to_string(state_path).map_err(|e| load_failed(e.to_string()))?;
        let state: CrawlState =
            serde_json::from_str(&content).map_err(|e| load_failed(e.to_string()))?;

        tracing::info!("Loaded crawl state for {} targets", state.targets.len());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, state_path: &Path) -> Result<(), StateError> {
        let save_failed = |reason: String| StateError::SaveFailed {
            path: state_path.display().to_string(),
            reason,
        };

        if let Some(parent) = state_path.parent() {
            fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        fs::write(state_path, content).map_err(|e| save_failed(e.to_string()))?;

        tracing::debug!("Saved crawl state to {:?}", state_path);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&CrawlProgress> {
        self.targets.get(key)
    }

    /// First revision still to crawl for a target
    pub fn next_start(&self, key: &str) -> u64 {
        self.targets
            .get(key)
            .map(|progress| progress.last_revision + 1)
            .unwrap_or(1)
    }

    /// Record a finished run
    ///
    /// `last_revision` is the end of the range that was crawled, which may be
    /// past the last revision that produced documents. It never moves backwards.
    pub fn record(&mut self, key: impl Into<String>, last_revision: u64, documents: usize) {
        let now = Utc::now();
        self.targets
            .entry(key.into())
            .and_modify(|progress| {
                progress.last_revision = progress.last_revision.max(last_revision);
                progress.documents_indexed += documents;
                progress.updated_at = now;
            })
            .or_insert(CrawlProgress {
                last_revision,
                documents_indexed: documents,
                updated_at: now,
            });
    }

    /// Forget a target so the next crawl starts from revision 1
    pub fn reset(&mut self, key: &str) -> bool {
        self.targets.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.targets.clear();
    }

    /// Documents emitted across all targets
    pub fn total_documents(&self) -> usize {
        self.targets.values().map(|p| p.documents_indexed).sum()
    }
}
