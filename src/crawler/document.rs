//! Documents: one path's state at one revision
//!
//! [`DocumentBuilder`] decides whether content is fetched and how elided
//! content is marked. The markers are stable strings so downstream consumers
//! can tell an elided document from an empty file.

use crate::repository::{ChangeKind, ChangedPath, DirEntry, NodeKind, RepositoryAccess};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Marker substring carried by documents whose content exceeded the size limit
pub const SIZE_TOO_BIG_MARKER: &str = "size too big";
/// Marker carried by documents whose content could not be read
pub const CONTENT_UNAVAILABLE_MARKER: &str = "content unavailable";
/// Marker carried by documents whose content looks binary
pub const BINARY_MARKER: &str = "[binary content not indexed]";
/// Marker carried by directory documents
pub const DIRECTORY_MARKER: &str = "[directory]";

/// Why a document carries no content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElisionReason {
    SizeExceeded,
    IsDirectory,
    IsBinaryUndetermined,
    ContentUnavailable,
}

/// A path at a revision, ready for indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Absolute repository path
    pub path: String,
    /// Last path segment
    pub name: String,
    pub revision: u64,
    pub change_kind: ChangeKind,
    pub content_present: bool,
    /// File text, or an elision marker when `content_present` is false
    pub content: Option<String>,
    pub size_bytes: Option<u64>,
    pub elision_reason: Option<ElisionReason>,
    /// `path@revision` the document was copied or renamed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copied_from: Option<String>,
    /// Hex SHA-256 of the content, present with the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_sha256: Option<String>,
}

impl Document {
    /// Flat JSON record for the indexing sink
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn is_elided(&self) -> bool {
        self.elision_reason.is_some()
    }

    fn stub(change: &ChangedPath, revision: u64) -> Self {
        let name = change
            .path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            path: change.path.clone(),
            name,
            revision,
            change_kind: change.kind,
            content_present: false,
            content: None,
            size_bytes: change.size_bytes,
            elision_reason: None,
            copied_from: change
                .copied_from
                .as_ref()
                .map(|(path, rev)| format!("{}@{}", path, rev)),
            content_sha256: None,
        }
    }

    fn elided(mut self, reason: ElisionReason, marker: String) -> Self {
        self.content_present = false;
        self.content = Some(marker);
        self.elision_reason = Some(reason);
        self
    }
}

/// Builds documents from changed paths, fetching content when policy allows
#[derive(Debug, Clone, Copy)]
pub struct DocumentBuilder {
    maximum_file_size: Option<u64>,
    detect_binary: bool,
}

impl DocumentBuilder {
    pub fn new(maximum_file_size: Option<u64>) -> Self {
        Self {
            maximum_file_size,
            detect_binary: true,
        }
    }

    /// Toggle eliding content that fails the text heuristic
    pub fn with_binary_detection(mut self, detect_binary: bool) -> Self {
        self.detect_binary = detect_binary;
        self
    }

    /// Build the document for one changed path
    ///
    /// Deleted paths, directories and oversized files never trigger a fetch.
    /// Everything else costs exactly one `fetch_content` call.
    pub fn build<R: RepositoryAccess + ?Sized>(
        &self,
        change: &ChangedPath,
        revision: u64,
        repository: &R,
    ) -> Document {
        let document = Document::stub(change, revision);

        if change.kind == ChangeKind::Deleted {
            return document;
        }

        if change.node_kind == NodeKind::Directory {
            return document.elided(ElisionReason::IsDirectory, DIRECTORY_MARKER.to_string());
        }

        if let Some(size) = change.size_bytes
            && self.exceeds_limit(size)
        {
            tracing::debug!("Eliding {}@{}: {} bytes", change.path, revision, size);
            return document.elided(ElisionReason::SizeExceeded, self.size_marker(size));
        }

        let bytes = match repository.fetch_content(&change.path, revision) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Recording {}@{} without content: {}", change.path, revision, e);
                return document.elided(
                    ElisionReason::ContentUnavailable,
                    format!("[{}: {}]", CONTENT_UNAVAILABLE_MARKER, e),
                );
            }
        };

        self.with_content(document, bytes)
    }

    /// Build a snapshot document for a listed file
    pub fn build_entry<R: RepositoryAccess + ?Sized>(
        &self,
        entry: &DirEntry,
        revision: u64,
        repository: &R,
    ) -> Document {
        let change = ChangedPath {
            path: entry.path.clone(),
            kind: ChangeKind::Added,
            node_kind: entry.node_kind,
            size_bytes: entry.size_bytes,
            copied_from: None,
        };
        self.build(&change, revision, repository)
    }

    fn with_content(&self, mut document: Document, bytes: Vec<u8>) -> Document {
        let size = bytes.len() as u64;
        document.size_bytes = Some(size);

        // Backends that do not report sizes up front are checked after the fetch
        if self.exceeds_limit(size) {
            return document.elided(ElisionReason::SizeExceeded, self.size_marker(size));
        }

        let text = match String::from_utf8(bytes) {
            Ok(text) if !self.detect_binary || is_text(&text) => text,
            Ok(_) => return document.elided(ElisionReason::IsBinaryUndetermined, BINARY_MARKER.to_string()),
            Err(e) if self.detect_binary => {
                tracing::debug!("{}@{} is not UTF-8: {}", document.path, document.revision, e);
                return document.elided(ElisionReason::IsBinaryUndetermined, BINARY_MARKER.to_string());
            }
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };

        document.content_sha256 = Some(calculate_hash(&text));
        document.content = Some(text);
        document.content_present = true;
        document
    }

    fn exceeds_limit(&self, size: u64) -> bool {
        self.maximum_file_size.is_some_and(|max| size > max)
    }

    fn size_marker(&self, size: u64) -> String {
        format!(
            "[{}: {} bytes exceeds the {} byte limit]",
            SIZE_TOO_BIG_MARKER,
            size,
            self.maximum_file_size.unwrap_or_default()
        )
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Heuristic: more than 30% control characters means binary
fn is_text(content: &str) -> bool {
    if content.is_empty() {
        return true;
    }
    let non_printable = content
        .bytes()
        .filter(|&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t')
        .count();
    (non_printable as f64 / content.len() as f64) < 0.3
}

fn calculate_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
