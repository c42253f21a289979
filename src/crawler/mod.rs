//! Revision history crawling
//!
//! [`RevisionCrawler`] walks a revision range in ascending order, collects the
//! changed paths of each revision under a base path, expands deleted
//! directories into the files they held, drops excluded paths and directories,
//! and turns the rest into [`Document`]s grouped by [`Revision`].
//!
//! Revisions are processed strictly one after another. Within one revision the
//! documents may be built on a bounded rayon pool; results keep the path order.

/// Documents and the content fetch policy
pub mod document;
/// Crawl parameters and their builder
pub mod parameters;
/// Exclusion patterns
pub mod path_filter;
/// Revision records
pub mod revision;

pub use document::{Document, DocumentBuilder, ElisionReason};
pub use parameters::{Parameters, ParametersBuilder, RevisionSpec};
pub use path_filter::{PathFilter, PathPattern, is_excluded};
pub use revision::{DocumentRecord, Revision, document_count};

use crate::error::{CrawlError, CrawlerError, RepositoryError};
use crate::repository::{
    ChangeKind, ChangedPath, NodeKind, RepositoryAccess, RepositoryOpener, is_within,
    normalize_path,
};
use rayon::prelude::*;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Crawls repositories resolved through a [`RepositoryOpener`]
pub struct RevisionCrawler<O> {
    opener: O,
}

impl<O: RepositoryOpener> RevisionCrawler<O> {
    pub fn new(opener: O) -> Self {
        Self { opener }
    }

    fn open(&self, location: &str) -> Result<O::Repository, CrawlError> {
        self.opener
            .open(location)
            .map_err(|e| unavailable(location, e))
    }

    /// Head revision of the repository at `location`
    pub fn latest_revision(&self, location: &str) -> Result<u64, CrawlerError> {
        let repository = self.open(location)?;
        let latest = repository
            .latest_revision()
            .map_err(|e| unavailable(location, e))?;
        Ok(latest)
    }

    /// Crawl the revision range described by `parameters`
    pub fn crawl(
        &self,
        location: &str,
        parameters: &Parameters,
    ) -> Result<Vec<Revision>, CrawlerError> {
        self.crawl_with_cancellation(location, parameters, &CancellationToken::new())
    }

    /// Crawl, stopping between revisions once `cancel` fires
    ///
    /// Cancellation returns the revisions finished so far; the caller resumes
    /// from the last returned revision + 1.
    pub fn crawl_with_cancellation(
        &self,
        location: &str,
        parameters: &Parameters,
        cancel: &CancellationToken,
    ) -> Result<Vec<Revision>, CrawlerError> {
        let repository = self.open(location)?;
        crawl_repository(&repository, parameters, cancel)
    }

    /// Snapshot of the files under `path` at one revision
    ///
    /// Uses the size, binary and exclusion policy of `parameters`; their base
    /// path and revision range are ignored. A missing path yields no documents.
    pub fn list_entries(
        &self,
        location: &str,
        path: &str,
        revision: RevisionSpec,
        parameters: &Parameters,
    ) -> Result<Vec<Document>, CrawlerError> {
        let repository = self.open(location)?;
        list_repository(&repository, path, revision, parameters)
    }
}

fn unavailable(location: &str, error: RepositoryError) -> CrawlError {
    CrawlError::RepositoryUnavailable {
        location: location.to_string(),
        reason: error.to_string(),
    }
}

fn revision_failed(location: &str, revision: u64, source: RepositoryError) -> CrawlError {
    CrawlError::RevisionFailed {
        location: location.to_string(),
        revision,
        source,
    }
}

/// Resolve the end bound once, against the head captured at crawl start
fn resolve_end(end: RevisionSpec, latest: u64) -> u64 {
    match end {
        RevisionSpec::Latest => latest,
        RevisionSpec::Number(end) if end > latest => {
            tracing::warn!(
                "End revision {} is beyond the head revision {}, stopping at the head",
                end,
                latest
            );
            latest
        }
        RevisionSpec::Number(end) => end,
    }
}

fn document_builder(parameters: &Parameters) -> DocumentBuilder {
    DocumentBuilder::new(parameters.maximum_file_size())
        .with_binary_detection(parameters.detect_binary())
}

/// Crawl an already opened repository
pub fn crawl_repository<R: RepositoryAccess + ?Sized>(
    repository: &R,
    parameters: &Parameters,
    cancel: &CancellationToken,
) -> Result<Vec<Revision>, CrawlerError> {
    let start_time = Instant::now();
    let location = repository.location();

    let latest = repository
        .latest_revision()
        .map_err(|e| unavailable(location, e))?;
    let start = parameters.start_revision();
    let end = resolve_end(parameters.end_revision(), latest);
    if start > end {
        return Err(CrawlError::InvalidRange { start, end }.into());
    }

    let base_path = parameters.base_path();
    let filter = parameters.filter();
    let builder = document_builder(parameters);
    let pool = if parameters.fetch_workers() > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parameters.fetch_workers())
            .build()
            .map_err(|e| CrawlerError::other(format!("Failed to build fetch pool: {}", e)))?;
        Some(pool)
    } else {
        None
    };

    tracing::info!(
        "Crawling {} revisions {}..={} under {}",
        location,
        start,
        end,
        base_path
    );

    let mut revisions = Vec::new();

    for number in start..=end {
        if cancel.is_cancelled() {
            tracing::info!(
                "Crawl cancelled before revision {}, returning {} revisions",
                number,
                revisions.len()
            );
            break;
        }

        let changes = match repository.changed_paths(base_path, number) {
            Ok(changes) => changes,
            Err(RepositoryError::PathNotFound { .. }) => {
                tracing::debug!("{} does not exist at revision {}", base_path, number);
                continue;
            }
            Err(e) => return Err(revision_failed(location, number, e).into()),
        };
        let mut changes = expand_deleted_directories(repository, changes, base_path, number)
            .map_err(|e| revision_failed(location, number, e))?;
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        changes.dedup_by(|a, b| a.path == b.path);

        let selected: Vec<&ChangedPath> = changes
            .iter()
            .filter(|change| {
                if filter.is_excluded(&change.path) {
                    tracing::debug!("Excluded {}@{}", change.path, number);
                    return false;
                }
                change.node_kind == NodeKind::File
            })
            .collect();

        if selected.is_empty() {
            tracing::debug!("Revision {} has no documents, skipping", number);
            continue;
        }

        // par_iter().collect() keeps input order, so output matches a sequential run
        let documents: Vec<Document> = match &pool {
            Some(pool) => pool.install(|| {
                selected
                    .par_iter()
                    .map(|change| builder.build(change, number, repository))
                    .collect()
            }),
            None => selected
                .iter()
                .map(|change| builder.build(change, number, repository))
                .collect(),
        };

        let info = repository
            .revision_info(number)
            .map_err(|e| revision_failed(location, number, e))?;

        tracing::debug!("Revision {}: {} documents", number, documents.len());
        revisions.push(Revision::new(location, info, documents));
    }

    tracing::info!(
        "Crawled {} revisions with {} documents in {}ms",
        revisions.len(),
        document_count(&revisions),
        start_time.elapsed().as_millis()
    );

    Ok(revisions)
}

/// Replace each deleted directory with a deletion per file it held
///
/// Files come from the tree at `revision - 1` and are kept only when they lie
/// under `base_path`. Nothing is fetched.
fn expand_deleted_directories<R: RepositoryAccess + ?Sized>(
    repository: &R,
    changes: Vec<ChangedPath>,
    base_path: &str,
    revision: u64,
) -> Result<Vec<ChangedPath>, RepositoryError> {
    let previous = revision.saturating_sub(1);
    let mut expanded = Vec::with_capacity(changes.len());

    for change in changes {
        if change.kind != ChangeKind::Deleted || change.node_kind != NodeKind::Directory {
            expanded.push(change);
            continue;
        }

        let mut pending = vec![change.path];
        while let Some(directory) = pending.pop() {
            let entries = match repository.list_directory(&directory, previous) {
                Ok(entries) => entries,
                Err(RepositoryError::PathNotFound { .. }) => continue,
                Err(e) => return Err(e),
            };
            for entry in entries {
                match entry.node_kind {
                    NodeKind::Directory if entry.path != directory => pending.push(entry.path),
                    NodeKind::Directory => {}
                    NodeKind::File if is_within(&entry.path, base_path) => {
                        expanded.push(ChangedPath {
                            path: entry.path,
                            kind: ChangeKind::Deleted,
                            node_kind: NodeKind::File,
                            size_bytes: entry.size_bytes,
                            copied_from: None,
                        });
                    }
                    NodeKind::File => {}
                }
            }
        }
    }

    Ok(expanded)
}

/// List the files under `path` of an already opened repository
pub fn list_repository<R: RepositoryAccess + ?Sized>(
    repository: &R,
    path: &str,
    revision: RevisionSpec,
    parameters: &Parameters,
) -> Result<Vec<Document>, CrawlerError> {
    let location = repository.location();
    let latest = repository
        .latest_revision()
        .map_err(|e| unavailable(location, e))?;
    let revision = match revision {
        RevisionSpec::Latest => latest,
        RevisionSpec::Number(number) if number > latest => {
            let source = RepositoryError::NoSuchRevision {
                revision: number,
                latest,
            };
            return Err(revision_failed(location, number, source).into());
        }
        RevisionSpec::Number(number) => number,
    };

    let filter = parameters.filter();
    let builder = document_builder(parameters);
    let mut documents = Vec::new();
    let mut pending = vec![normalize_path(path)];

    while let Some(directory) = pending.pop() {
        let entries = match repository.list_directory(&directory, revision) {
            Ok(entries) => entries,
            Err(RepositoryError::PathNotFound { .. }) => {
                tracing::debug!("{} does not exist at revision {}", directory, revision);
                continue;
            }
            Err(e) => return Err(revision_failed(location, revision, e).into()),
        };

        for entry in entries {
            if filter.is_excluded(&entry.path) {
                continue;
            }
            match entry.node_kind {
                // A file path lists as itself, so only descend into real children
                NodeKind::Directory if entry.path != directory => pending.push(entry.path),
                NodeKind::Directory => {}
                NodeKind::File => documents.push(builder.build_entry(&entry, revision, repository)),
            }
        }
    }

    documents.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::info!(
        "Listed {} documents under {} at revision {}",
        documents.len(),
        path,
        revision
    );
    Ok(documents)
}
