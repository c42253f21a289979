/// Centralized error types for revision-crawler using thiserror
///
/// Provides domain-specific error types for better error handling and user-facing messages.
use thiserror::Error;

/// Main error type for the crawler
#[derive(Error, Debug)]
pub enum CrawlerError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors reported by a repository access backend
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    #[error("Path '{path}' does not exist at revision {revision}")]
    PathNotFound { path: String, revision: u64 },

    #[error("Content of '{path}' at revision {revision} is unavailable: {reason}")]
    ContentUnavailable {
        path: String,
        revision: u64,
        reason: String,
    },

    #[error("No such revision {revision} (latest is {latest})")]
    NoSuchRevision { revision: u64, latest: u64 },

    #[error("Repository backend failure: {0}")]
    Backend(String),
}

/// Errors that abort a crawl invocation
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Repository '{location}' cannot be opened: {reason}")]
    RepositoryUnavailable { location: String, reason: String },

    #[error("Invalid revision range: start {start} is after end {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("Crawl of '{location}' failed at revision {revision}: {source}")]
    RevisionFailed {
        location: String,
        revision: u64,
        #[source]
        source: RepositoryError,
    },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to input validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("{field} must be {constraint}, got {actual}")]
    ConstraintViolation {
        field: String,
        constraint: String,
        actual: String,
    },
}

/// Errors related to the persisted crawl state
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to load crawl state from '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Failed to save crawl state to '{path}': {reason}")]
    SaveFailed { path: String, reason: String },
}

impl From<git2::Error> for RepositoryError {
    fn from(err: git2::Error) -> Self {
        RepositoryError::Backend(err.message().to_string())
    }
}

// Conversion from anyhow::Error to CrawlerError
impl From<anyhow::Error> for CrawlerError {
    fn from(err: anyhow::Error) -> Self {
        CrawlerError::Other(format!("{:#}", err))
    }
}

impl CrawlerError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        CrawlerError::Other(msg.into())
    }

    /// Check if this is a user error (bad parameters or config) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            CrawlerError::Validation(_)
                | CrawlerError::Crawl(CrawlError::InvalidRange { .. })
                | CrawlerError::Config(ConfigError::InvalidValue { .. })
        )
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CrawlerError::Crawl(CrawlError::RepositoryUnavailable { .. })
                | CrawlerError::Crawl(CrawlError::RevisionFailed { .. })
                | CrawlerError::Repository(RepositoryError::Unavailable(_))
                | CrawlerError::Io(_)
        )
    }

    /// Revision a failed crawl was processing, i.e. where a retry should resume
    pub fn failed_revision(&self) -> Option<u64> {
        match self {
            CrawlerError::Crawl(CrawlError::RevisionFailed { revision, .. }) => Some(*revision),
            _ => None,
        }
    }
}

/// Result alias used across the crate
pub type Result<T, E = CrawlerError> = std::result::Result<T, E>;
