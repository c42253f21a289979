//! In-memory versioned tree implementing [`RepositoryAccess`]
//!
//! Every commit stores a full snapshot of the tree plus the list of changed
//! paths, which keeps lookups at arbitrary revisions trivial. Intended for
//! tests, benchmarks and demos rather than large histories.

use super::{
    ChangeKind, ChangedPath, DirEntry, NodeKind, RepositoryAccess, RepositoryOpener, RevisionInfo,
    is_within, normalize_path,
};
use crate::error::RepositoryError;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    content: Vec<u8>,
    last_changed: u64,
}

type Tree = BTreeMap<String, Node>;

#[derive(Debug)]
struct StoredRevision {
    info: RevisionInfo,
    changes: Vec<ChangedPath>,
    tree: Tree,
}

/// A repository whose whole history lives in memory
#[derive(Debug)]
pub struct MemoryRepository {
    location: String,
    revisions: Vec<StoredRevision>,
    failing_content: HashSet<(String, u64)>,
    failing_revisions: HashSet<u64>,
    fetches: AtomicUsize,
}

impl MemoryRepository {
    /// Start building a repository reachable under `location`
    pub fn builder(location: impl Into<String>) -> MemoryRepositoryBuilder {
        let root = Node {
            kind: NodeKind::Directory,
            content: Vec::new(),
            last_changed: 0,
        };
        let mut tree = Tree::new();
        tree.insert("/".to_string(), root);

        MemoryRepositoryBuilder {
            location: location.into(),
            revisions: vec![StoredRevision {
                info: RevisionInfo::default(),
                changes: Vec::new(),
                tree: tree.clone(),
            }],
            tree,
            start_time: DateTime::from_timestamp(1_356_998_400, 0).unwrap_or_default(),
            failing_content: HashSet::new(),
            failing_revisions: HashSet::new(),
        }
    }

    /// Number of `fetch_content` calls served so far, successful or not
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn stored(&self, revision: u64) -> Result<&StoredRevision, RepositoryError> {
        let latest = self.head();
        usize::try_from(revision)
            .ok()
            .and_then(|index| self.revisions.get(index))
            .ok_or(RepositoryError::NoSuchRevision { revision, latest })
    }

    fn head(&self) -> u64 {
        self.revisions.len().saturating_sub(1) as u64
    }
}

impl RepositoryAccess for MemoryRepository {
    fn location(&self) -> &str {
        &self.location
    }

    fn latest_revision(&self) -> Result<u64, RepositoryError> {
        Ok(self.head())
    }

    fn revision_info(&self, revision: u64) -> Result<RevisionInfo, RepositoryError> {
        Ok(self.stored(revision)?.info.clone())
    }

    fn changed_paths(
        &self,
        base_path: &str,
        revision: u64,
    ) -> Result<Vec<ChangedPath>, RepositoryError> {
        if self.failing_revisions.contains(&revision) {
            return Err(RepositoryError::Backend(format!(
                "simulated failure reading revision {}",
                revision
            )));
        }

        let base = normalize_path(base_path);
        let stored = self.stored(revision)?;

        // A path unknown both before and at this revision was never touched here
        let existed_before = revision > 0 && self.stored(revision - 1)?.tree.contains_key(&base);
        if !stored.tree.contains_key(&base) && !existed_before {
            return Err(RepositoryError::PathNotFound {
                path: base,
                revision,
            });
        }

        // Deleting an ancestor removes the base path too
        Ok(stored
            .changes
            .iter()
            .filter(|change| {
                is_within(&change.path, &base)
                    || (change.kind == ChangeKind::Deleted && is_within(&base, &change.path))
            })
            .cloned()
            .collect())
    }

    fn fetch_content(&self, path: &str, revision: u64) -> Result<Vec<u8>, RepositoryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let path = normalize_path(path);

        if self.failing_content.contains(&(path.clone(), revision)) {
            return Err(RepositoryError::ContentUnavailable {
                path,
                revision,
                reason: "simulated read failure".to_string(),
            });
        }

        match self.stored(revision)?.tree.get(&path) {
            Some(node) if node.kind == NodeKind::File => Ok(node.content.clone()),
            Some(_) => Err(RepositoryError::ContentUnavailable {
                path,
                revision,
                reason: "path is a directory".to_string(),
            }),
            None => Err(RepositoryError::PathNotFound { path, revision }),
        }
    }

    fn list_directory(&self, path: &str, revision: u64) -> Result<Vec<DirEntry>, RepositoryError> {
        let path = normalize_path(path);
        let tree = &self.stored(revision)?.tree;

        let node = tree.get(&path).ok_or_else(|| RepositoryError::PathNotFound {
            path: path.clone(),
            revision,
        })?;

        if node.kind == NodeKind::File {
            return Ok(vec![dir_entry(&path, node)]);
        }

        Ok(tree
            .iter()
            .filter(|(child, _)| is_direct_child(child, &path))
            .map(|(child, node)| dir_entry(child, node))
            .collect())
    }
}

fn dir_entry(path: &str, node: &Node) -> DirEntry {
    DirEntry {
        path: path.to_string(),
        node_kind: node.kind,
        size_bytes: (node.kind == NodeKind::File).then_some(node.content.len() as u64),
        last_changed_revision: node.last_changed,
    }
}

fn is_direct_child(candidate: &str, parent: &str) -> bool {
    if candidate == parent || !is_within(candidate, parent) {
        return false;
    }
    let rest = if parent == "/" {
        &candidate[1..]
    } else {
        &candidate[parent.len() + 1..]
    };
    !rest.contains('/')
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => path[..index].to_string(),
    }
}

/// Builder that replays scripted commits into a [`MemoryRepository`]
pub struct MemoryRepositoryBuilder {
    location: String,
    revisions: Vec<StoredRevision>,
    tree: Tree,
    start_time: DateTime<Utc>,
    failing_content: HashSet<(String, u64)>,
    failing_revisions: HashSet<u64>,
}

impl MemoryRepositoryBuilder {
    /// Timestamp of revision 1; each later revision is one hour after the previous
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    /// Make `fetch_content` fail for one path at one revision
    pub fn fail_content_at(mut self, path: &str, revision: u64) -> Self {
        self.failing_content.insert((normalize_path(path), revision));
        self
    }

    /// Make `changed_paths` fail for a revision
    pub fn fail_revision(mut self, revision: u64) -> Self {
        self.failing_revisions.insert(revision);
        self
    }

    /// Record one commit; the closure stages the changes
    pub fn commit<F>(mut self, author: &str, message: &str, stage: F) -> Result<Self, RepositoryError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<(), RepositoryError>,
    {
        let revision = self.revisions.len() as u64;
        let mut txn = Transaction {
            revision,
            tree: &mut self.tree,
            history: &self.revisions,
            changes: Vec::new(),
        };
        stage(&mut txn)?;
        let changes = txn.changes;

        let hours = i64::try_from(revision - 1).unwrap_or(i64::MAX);
        let info = RevisionInfo {
            revision,
            author: Some(author.to_string()),
            date: Some(self.start_time + Duration::hours(hours)),
            message: Some(message.to_string()),
        };

        self.revisions.push(StoredRevision {
            info,
            changes,
            tree: self.tree.clone(),
        });
        Ok(self)
    }

    pub fn build(self) -> MemoryRepository {
        MemoryRepository {
            location: self.location,
            revisions: self.revisions,
            failing_content: self.failing_content,
            failing_revisions: self.failing_revisions,
            fetches: AtomicUsize::new(0),
        }
    }
}

/// Changes staged for a single commit
pub struct Transaction<'a> {
    revision: u64,
    tree: &'a mut Tree,
    history: &'a [StoredRevision],
    changes: Vec<ChangedPath>,
}

impl Transaction<'_> {
    /// Create a directory; its parent must exist
    pub fn add_dir(&mut self, path: &str) -> Result<&mut Self, RepositoryError> {
        let path = self.check_new(path)?;
        self.insert(&path, NodeKind::Directory, Vec::new());
        self.record(&path, ChangeKind::Added, NodeKind::Directory, None, None);
        Ok(self)
    }

    /// Create a file; its parent must exist
    pub fn add_file(
        &mut self,
        path: &str,
        content: impl Into<Vec<u8>>,
    ) -> Result<&mut Self, RepositoryError> {
        let path = self.check_new(path)?;
        let content = content.into();
        let size = content.len() as u64;
        self.insert(&path, NodeKind::File, content);
        self.record(&path, ChangeKind::Added, NodeKind::File, Some(size), None);
        Ok(self)
    }

    /// Change the content of an existing file
    pub fn modify_file(
        &mut self,
        path: &str,
        content: impl Into<Vec<u8>>,
    ) -> Result<&mut Self, RepositoryError> {
        let path = self.check_file(path)?;
        let content = content.into();
        let size = content.len() as u64;
        self.insert(&path, NodeKind::File, content);
        self.record(&path, ChangeKind::Modified, NodeKind::File, Some(size), None);
        Ok(self)
    }

    /// Replace an existing file with unrelated content
    pub fn replace_file(
        &mut self,
        path: &str,
        content: impl Into<Vec<u8>>,
    ) -> Result<&mut Self, RepositoryError> {
        let path = self.check_file(path)?;
        let content = content.into();
        let size = content.len() as u64;
        self.insert(&path, NodeKind::File, content);
        self.record(&path, ChangeKind::Replaced, NodeKind::File, Some(size), None);
        Ok(self)
    }

    /// Delete a file or a whole directory subtree
    pub fn delete(&mut self, path: &str) -> Result<&mut Self, RepositoryError> {
        let path = normalize_path(path);
        let node = self.tree.get(&path).cloned().ok_or_else(|| {
            RepositoryError::PathNotFound {
                path: path.clone(),
                revision: self.revision,
            }
        })?;
        if path == "/" {
            return Err(RepositoryError::Backend(
                "the repository root cannot be deleted".to_string(),
            ));
        }

        self.tree.retain(|existing, _| !is_within(existing, &path));
        let size = (node.kind == NodeKind::File).then_some(node.content.len() as u64);
        self.record(&path, ChangeKind::Deleted, node.kind, size, None);
        Ok(self)
    }

    /// Copy a node (with its subtree) from an earlier revision
    ///
    /// Copying over an existing path replaces it.
    pub fn copy(
        &mut self,
        from: &str,
        from_revision: u64,
        to: &str,
    ) -> Result<&mut Self, RepositoryError> {
        let from = normalize_path(from);
        let to = normalize_path(to);
        let history = self.history;
        let latest = history.len().saturating_sub(1) as u64;
        let source_tree = usize::try_from(from_revision)
            .ok()
            .and_then(|index| history.get(index))
            .map(|stored| &stored.tree)
            .ok_or(RepositoryError::NoSuchRevision {
                revision: from_revision,
                latest,
            })?;
        let source = source_tree.get(&from).ok_or_else(|| RepositoryError::PathNotFound {
            path: from.clone(),
            revision: from_revision,
        })?;
        if !self.tree.contains_key(&parent_of(&to)) {
            return Err(RepositoryError::PathNotFound {
                path: parent_of(&to),
                revision: self.revision,
            });
        }

        let kind = if self.tree.contains_key(&to) {
            self.tree.retain(|existing, _| !is_within(existing, &to));
            ChangeKind::Replaced
        } else {
            ChangeKind::Added
        };

        let copied: Vec<(String, Node)> = source_tree
            .iter()
            .filter(|(path, _)| is_within(path, &from))
            .map(|(path, node)| {
                let target = format!("{}{}", to, &path[from.len()..]);
                let node = Node {
                    last_changed: self.revision,
                    ..node.clone()
                };
                (target, node)
            })
            .collect();
        self.tree.extend(copied);

        let size = (source.kind == NodeKind::File).then_some(source.content.len() as u64);
        self.record(&to, kind, source.kind, size, Some((from, from_revision)));
        Ok(self)
    }

    fn check_new(&self, path: &str) -> Result<String, RepositoryError> {
        let path = normalize_path(path);
        if self.tree.contains_key(&path) {
            return Err(RepositoryError::Backend(format!(
                "path '{}' already exists",
                path
            )));
        }
        let parent = parent_of(&path);
        match self.tree.get(&parent) {
            Some(node) if node.kind == NodeKind::Directory => Ok(path),
            _ => Err(RepositoryError::PathNotFound {
                path: parent,
                revision: self.revision,
            }),
        }
    }

    fn check_file(&self, path: &str) -> Result<String, RepositoryError> {
        let path = normalize_path(path);
        match self.tree.get(&path) {
            Some(node) if node.kind == NodeKind::File => Ok(path),
            Some(_) => Err(RepositoryError::Backend(format!(
                "path '{}' is a directory",
                path
            ))),
            None => Err(RepositoryError::PathNotFound {
                path,
                revision: self.revision,
            }),
        }
    }

    fn insert(&mut self, path: &str, kind: NodeKind, content: Vec<u8>) {
        self.tree.insert(
            path.to_string(),
            Node {
                kind,
                content,
                last_changed: self.revision,
            },
        );
    }

    fn record(
        &mut self,
        path: &str,
        kind: ChangeKind,
        node_kind: NodeKind,
        size_bytes: Option<u64>,
        copied_from: Option<(String, u64)>,
    ) {
        self.changes.push(ChangedPath {
            path: path.to_string(),
            kind,
            node_kind,
            size_bytes,
            copied_from,
        });
    }
}

/// Opener resolving locations to registered in-memory repositories
#[derive(Debug, Default, Clone)]
pub struct MemoryOpener {
    repositories: HashMap<String, Arc<MemoryRepository>>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository under its own location
    pub fn register(&mut self, repository: MemoryRepository) -> Arc<MemoryRepository> {
        let repository = Arc::new(repository);
        self.repositories
            .insert(repository.location.clone(), repository.clone());
        repository
    }

    /// Builder-style variant of [`MemoryOpener::register`]
    pub fn with(mut self, repository: MemoryRepository) -> Self {
        self.register(repository);
        self
    }
}

impl RepositoryOpener for MemoryOpener {
    type Repository = Arc<MemoryRepository>;

    fn open(&self, location: &str) -> Result<Self::Repository, RepositoryError> {
        self.repositories.get(location).cloned().ok_or_else(|| {
            RepositoryError::Unavailable(format!("no repository registered at '{}'", location))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryRepository {
        MemoryRepository::builder("mem://sample")
            .commit("alice", "initial layout", |txn| {
                txn.add_dir("/trunk")?;
                txn.add_file("/trunk/a.txt", "alpha")?;
                Ok(())
            })
            .unwrap()
            .commit("bob", "edit and add", |txn| {
                txn.modify_file("/trunk/a.txt", "alpha two")?;
                txn.add_dir("/trunk/docs")?;
                txn.add_file("/trunk/docs/b.txt", "beta")?;
                Ok(())
            })
            .unwrap()
            .commit("alice", "drop docs", |txn| {
                txn.delete("/trunk/docs")?;
                Ok(())
            })
            .unwrap()
            .build()
    }

    #[test]
    fn test_latest_revision() {
        let repo = sample();
        assert_eq!(repo.latest_revision().unwrap(), 3);
    }

    #[test]
    fn test_revision_zero_is_empty() {
        let repo = sample();
        assert!(repo.changed_paths("/", 0).unwrap().is_empty());
    }

    #[test]
    fn test_changed_paths_filtered_by_base() {
        let repo = sample();
        let changes = repo.changed_paths("/trunk/docs", 2).unwrap();
        let paths: Vec<_> = changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["/trunk/docs", "/trunk/docs/b.txt"]);
    }

    #[test]
    fn test_changed_paths_unknown_base_is_path_not_found() {
        let repo = sample();
        let err = repo.changed_paths("/trunk/docs", 1).unwrap_err();
        assert!(matches!(err, RepositoryError::PathNotFound { .. }));
    }

    #[test]
    fn test_changed_paths_on_deletion_revision() {
        let repo = sample();
        let changes = repo.changed_paths("/trunk/docs", 3).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Deleted);
        assert_eq!(changes[0].node_kind, NodeKind::Directory);
    }

    #[test]
    fn test_changed_paths_reports_deleted_ancestor() {
        let repo = sample();
        let changes = repo.changed_paths("/trunk/docs/b.txt", 3).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "/trunk/docs");
        assert_eq!(changes[0].kind, ChangeKind::Deleted);

        // Additions above the base are not reported
        let added = repo.changed_paths("/trunk/docs/b.txt", 2).unwrap();
        let paths: Vec<_> = added.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["/trunk/docs/b.txt"]);
    }

    #[test]
    fn test_start_time_spaces_revisions_hourly() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let repo = MemoryRepository::builder("mem://clock")
            .with_start_time(start)
            .commit("alice", "one", |txn| {
                txn.add_file("/a.txt", "a")?;
                Ok(())
            })
            .unwrap()
            .commit("alice", "two", |txn| {
                txn.modify_file("/a.txt", "b")?;
                Ok(())
            })
            .unwrap()
            .build();
        assert_eq!(repo.revision_info(1).unwrap().date, Some(start));
        assert_eq!(
            repo.revision_info(2).unwrap().date,
            Some(start + Duration::hours(1))
        );
    }

    #[test]
    fn test_replace_file_records_replacement() {
        let repo = MemoryRepository::builder("mem://replace")
            .commit("alice", "add", |txn| {
                txn.add_file("/a.txt", "one")?;
                Ok(())
            })
            .unwrap()
            .commit("alice", "replace", |txn| {
                txn.replace_file("/a.txt", "unrelated")?;
                Ok(())
            })
            .unwrap()
            .build();
        let changes = repo.changed_paths("/", 2).unwrap();
        assert_eq!(changes[0].kind, ChangeKind::Replaced);
        assert_eq!(changes[0].size_bytes, Some(9));
        assert_eq!(repo.fetch_content("/a.txt", 2).unwrap(), b"unrelated");
    }

    #[test]
    fn test_fetch_content_at_revision() {
        let repo = sample();
        assert_eq!(repo.fetch_content("/trunk/a.txt", 1).unwrap(), b"alpha");
        assert_eq!(repo.fetch_content("/trunk/a.txt", 3).unwrap(), b"alpha two");
        assert_eq!(repo.fetch_count(), 2);
    }

    #[test]
    fn test_fetch_content_missing_path() {
        let repo = sample();
        let err = repo.fetch_content("/trunk/docs/b.txt", 3).unwrap_err();
        assert!(matches!(err, RepositoryError::PathNotFound { .. }));
    }

    #[test]
    fn test_list_directory() {
        let repo = sample();
        let entries = repo.list_directory("/trunk", 2).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/trunk/a.txt", "/trunk/docs"]);
        assert_eq!(entries[0].size_bytes, Some(9));
        assert_eq!(entries[1].node_kind, NodeKind::Directory);
    }

    #[test]
    fn test_list_directory_of_file_yields_itself() {
        let repo = sample();
        let entries = repo.list_directory("/trunk/a.txt", 1).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].last_changed_revision, 1);
    }

    #[test]
    fn test_no_such_revision() {
        let repo = sample();
        let err = repo.revision_info(9).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::NoSuchRevision {
                revision: 9,
                latest: 3
            }
        ));
    }

    #[test]
    fn test_revision_info_metadata() {
        let repo = sample();
        let info = repo.revision_info(2).unwrap();
        assert_eq!(info.author.as_deref(), Some("bob"));
        assert_eq!(info.message.as_deref(), Some("edit and add"));
        let first = repo.revision_info(1).unwrap().date.unwrap();
        assert_eq!(info.date.unwrap() - first, Duration::hours(1));
    }

    #[test]
    fn test_copy_records_source_and_replaces() {
        let repo = MemoryRepository::builder("mem://copy")
            .commit("alice", "add", |txn| {
                txn.add_file("/a.txt", "one")?;
                txn.add_file("/b.txt", "two")?;
                Ok(())
            })
            .unwrap()
            .commit("alice", "copy over", |txn| {
                txn.copy("/a.txt", 1, "/b.txt")?;
                txn.copy("/a.txt", 1, "/c.txt")?;
                Ok(())
            })
            .unwrap()
            .build();

        let changes = repo.changed_paths("/", 2).unwrap();
        assert_eq!(changes[0].kind, ChangeKind::Replaced);
        assert_eq!(changes[1].kind, ChangeKind::Added);
        assert_eq!(changes[1].copied_from, Some(("/a.txt".to_string(), 1)));
        assert_eq!(repo.fetch_content("/b.txt", 2).unwrap(), b"one");
    }

    #[test]
    fn test_add_file_requires_parent() {
        let result = MemoryRepository::builder("mem://bad").commit("alice", "orphan", |txn| {
            txn.add_file("/missing/a.txt", "x")?;
            Ok(())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_injected_failures() {
        let repo = MemoryRepository::builder("mem://faulty")
            .commit("alice", "add", |txn| {
                txn.add_file("/a.txt", "one")?;
                Ok(())
            })
            .unwrap()
            .fail_content_at("/a.txt", 1)
            .fail_revision(1)
            .build();

        assert!(matches!(
            repo.fetch_content("/a.txt", 1),
            Err(RepositoryError::ContentUnavailable { .. })
        ));
        assert!(matches!(
            repo.changed_paths("/", 1),
            Err(RepositoryError::Backend(_))
        ));
    }

    #[test]
    fn test_opener_resolves_registered_location() {
        let opener = MemoryOpener::new().with(sample());
        assert!(opener.open("mem://sample").is_ok());
        assert!(matches!(
            opener.open("mem://other"),
            Err(RepositoryError::Unavailable(_))
        ));
    }
}
