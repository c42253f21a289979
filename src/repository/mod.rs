//! Repository access layer
//!
//! The crawler only talks to version control through [`RepositoryAccess`], an
//! opaque read-only handle, and [`RepositoryOpener`], which resolves a location
//! into such a handle. Two backends are provided: an in-memory versioned tree
//! used by tests and benchmarks, and a git2-backed adapter.

/// git2-backed repository adapter
pub mod git;
/// In-memory versioned tree
pub mod memory;

pub use git::{GitOpener, GitRepository};
pub use memory::{MemoryOpener, MemoryRepository, MemoryRepositoryBuilder, Transaction};

use crate::error::RepositoryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kind of change recorded for a path in one revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Replaced,
}

/// Whether a path is a file or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    File,
    Directory,
}

/// A path that changed in a revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPath {
    /// Absolute repository path, e.g. `/module1/trunk/watchlist.txt`
    pub path: String,
    pub kind: ChangeKind,
    pub node_kind: NodeKind,
    /// Size at this revision, or the pre-deletion size for deletions when known
    pub size_bytes: Option<u64>,
    /// Source of a copy or rename as `(path, revision)`
    pub copied_from: Option<(String, u64)>,
}

/// An entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: String,
    pub node_kind: NodeKind,
    pub size_bytes: Option<u64>,
    pub last_changed_revision: u64,
}

/// Log metadata of one revision
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionInfo {
    pub revision: u64,
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

/// Read-only access to one opened repository
///
/// All paths are absolute repository paths with a leading `/`.
pub trait RepositoryAccess: Send + Sync {
    /// Location this handle was opened from
    fn location(&self) -> &str;

    /// Current head revision number
    fn latest_revision(&self) -> Result<u64, RepositoryError>;

    /// Author, date and message of a revision
    fn revision_info(&self, revision: u64) -> Result<RevisionInfo, RepositoryError>;

    /// Paths changed at `revision` that are equal to `base_path` or below it,
    /// plus the deletion of any ancestor of `base_path`
    fn changed_paths(
        &self,
        base_path: &str,
        revision: u64,
    ) -> Result<Vec<ChangedPath>, RepositoryError>;

    /// Byte content of a file at a revision
    fn fetch_content(&self, path: &str, revision: u64) -> Result<Vec<u8>, RepositoryError>;

    /// Entries of a directory at a revision; a file path yields itself
    fn list_directory(&self, path: &str, revision: u64) -> Result<Vec<DirEntry>, RepositoryError>;
}

impl<T: RepositoryAccess + ?Sized> RepositoryAccess for Arc<T> {
    fn location(&self) -> &str {
        (**self).location()
    }

    fn latest_revision(&self) -> Result<u64, RepositoryError> {
        (**self).latest_revision()
    }

    fn revision_info(&self, revision: u64) -> Result<RevisionInfo, RepositoryError> {
        (**self).revision_info(revision)
    }

    fn changed_paths(
        &self,
        base_path: &str,
        revision: u64,
    ) -> Result<Vec<ChangedPath>, RepositoryError> {
        (**self).changed_paths(base_path, revision)
    }

    fn fetch_content(&self, path: &str, revision: u64) -> Result<Vec<u8>, RepositoryError> {
        (**self).fetch_content(path, revision)
    }

    fn list_directory(&self, path: &str, revision: u64) -> Result<Vec<DirEntry>, RepositoryError> {
        (**self).list_directory(path, revision)
    }
}

/// Resolves repository locations into open handles
pub trait RepositoryOpener: Send + Sync {
    type Repository: RepositoryAccess;

    /// Open a repository, failing with [`RepositoryError::Unavailable`]
    fn open(&self, location: &str) -> Result<Self::Repository, RepositoryError>;
}

/// Normalize a repository path: leading `/`, no trailing `/` except for root
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Whether `path` is `base` itself or lies below it
///
/// Both arguments must already be normalized.
pub fn is_within(path: &str, base: &str) -> bool {
    if base == "/" {
        return true;
    }
    path == base
        || path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'))
}
