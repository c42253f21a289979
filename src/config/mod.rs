/// Configuration system for revision-crawler
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::crawler::{Parameters, PathFilter, RevisionSpec};
use crate::error::{ConfigError, CrawlerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Repository to crawl
    #[serde(default)]
    pub repository: RepositoryConfig,

    /// Crawl range and document policy
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Resumable state
    #[serde(default)]
    pub state: StateConfig,
}

/// Repository configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Repository location (a path inside a git working tree)
    #[serde(default = "default_location")]
    pub location: String,
}

/// Crawl configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Path inside the repository the crawl is scoped to
    #[serde(default = "default_base_path")]
    pub base_path: String,

    #[serde(default = "default_start_revision")]
    pub start_revision: u64,

    /// Last revision to crawl; unset means the head at crawl time
    #[serde(default)]
    pub end_revision: Option<u64>,

    /// Largest file whose content is fetched (in bytes); unset means unbounded
    #[serde(default)]
    pub maximum_file_size: Option<u64>,

    /// Path patterns to skip (regex, or `glob:` prefixed)
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Threads fetching content within one revision
    #[serde(default = "default_fetch_workers")]
    pub fetch_workers: usize,

    /// Elide content that does not look like text
    #[serde(default = "default_detect_binary")]
    pub detect_binary: bool,
}

/// State configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Crawl state file path
    #[serde(default = "default_state_path")]
    pub path: PathBuf,

    /// Continue from the last recorded revision
    #[serde(default)]
    pub resume: bool,
}

// Default value functions
fn default_location() -> String {
    ".".to_string()
}

fn default_base_path() -> String {
    "/".to_string()
}

fn default_start_revision() -> u64 {
    1
}

fn default_fetch_workers() -> usize {
    1
}

fn default_detect_binary() -> bool {
    true
}

fn default_state_path() -> PathBuf {
    crate::paths::PlatformPaths::default_state_path()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            location: default_location(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            start_revision: default_start_revision(),
            end_revision: None,
            maximum_file_size: None,
            exclude_patterns: Vec::new(),
            fetch_workers: default_fetch_workers(),
            detect_binary: default_detect_binary(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
            resume: false,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, CrawlerError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, CrawlerError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), CrawlerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), CrawlerError> {
        if self.repository.location.trim().is_empty() {
            return Err(ConfigError::MissingRequired("repository.location".to_string()).into());
        }

        if self.crawl.fetch_workers == 0 {
            return Err(invalid("crawl.fetch_workers", "must be greater than 0"));
        }

        if self.crawl.maximum_file_size == Some(0) {
            return Err(invalid("crawl.maximum_file_size", "must be greater than 0"));
        }

        if let Some(end) = self.crawl.end_revision
            && end < self.crawl.start_revision
        {
            return Err(invalid(
                "crawl.end_revision",
                &format!(
                    "must not be before start_revision {}, got {}",
                    self.crawl.start_revision, end
                ),
            ));
        }

        if let Err(e) = PathFilter::new(self.crawl.exclude_patterns.as_slice()) {
            return Err(invalid("crawl.exclude_patterns", &e.to_string()));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(location) = std::env::var("REVISION_CRAWLER_LOCATION")
            && !location.is_empty()
        {
            self.repository.location = location;
        }

        if let Ok(base_path) = std::env::var("REVISION_CRAWLER_BASE_PATH")
            && !base_path.is_empty()
        {
            self.crawl.base_path = base_path;
        }

        if let Ok(size) = std::env::var("REVISION_CRAWLER_MAX_FILE_SIZE")
            && let Ok(size) = size.parse()
        {
            self.crawl.maximum_file_size = Some(size);
        }

        if let Ok(workers) = std::env::var("REVISION_CRAWLER_WORKERS")
            && let Ok(workers) = workers.parse()
        {
            self.crawl.fetch_workers = workers;
        }

        if let Ok(path) = std::env::var("REVISION_CRAWLER_STATE_PATH")
            && !path.is_empty()
        {
            self.state.path = PathBuf::from(path);
        }
    }

    /// Crawl parameters described by this configuration
    pub fn to_parameters(&self) -> Result<Parameters, CrawlerError> {
        Parameters::builder()
            .with_base_path(self.crawl.base_path.as_str())
            .with_start_revision(self.crawl.start_revision)
            .with_end_revision_spec(RevisionSpec::from(self.crawl.end_revision))
            .with_maximum_file_size(self.crawl.maximum_file_size)
            .with_exclude_patterns(self.crawl.exclude_patterns.iter().cloned())
            .with_fetch_workers(self.crawl.fetch_workers)
            .with_binary_detection(self.crawl.detect_binary)
            .build()
    }
}

fn invalid(key: &str, reason: &str) -> CrawlerError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests;
