use super::{
    ChangeKind, ChangedPath, DirEntry, NodeKind, RepositoryAccess, RepositoryOpener, RevisionInfo,
    is_within, normalize_path,
};
use crate::error::RepositoryError;
use chrono::DateTime;
use git2::{Delta, DiffFindOptions, ObjectType, Oid, Repository, Sort, Tree};
use std::path::Path;
use std::sync::Mutex;

/// Git repository exposed as a numbered revision history
///
/// The first-parent chain of `HEAD` is numbered oldest first, so the root
/// commit is revision 1. The chain is captured when the repository is opened.
pub struct GitRepository {
    repo: Mutex<Repository>,
    location: String,
    commits: Vec<Oid>,
}

impl GitRepository {
    /// Discover and open a git repository from any path within it
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        let location = path.display().to_string();

        let repo = Repository::discover(path).map_err(|e| {
            RepositoryError::Unavailable(format!("{}: {}", location, e.message()))
        })?;

        let commits = first_parent_history(&repo)?;

        tracing::info!(
            "Opened git repository at: {} ({} revisions)",
            location,
            commits.len()
        );

        Ok(Self {
            repo: Mutex::new(repo),
            location,
            commits,
        })
    }

    /// Commit id backing a revision number
    pub fn commit_id(&self, revision: u64) -> Option<Oid> {
        let index = usize::try_from(revision).ok()?.checked_sub(1)?;
        self.commits.get(index).copied()
    }

    fn with_repo<T>(
        &self,
        f: impl FnOnce(&Repository) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let repo = self
            .repo
            .lock()
            .map_err(|e| RepositoryError::Backend(format!("repository lock poisoned: {}", e)))?;
        f(&repo)
    }

    fn oid(&self, revision: u64) -> Result<Oid, RepositoryError> {
        self.commit_id(revision)
            .ok_or(RepositoryError::NoSuchRevision {
                revision,
                latest: self.commits.len() as u64,
            })
    }

    /// Trees of a revision and of its first parent (None for the root commit)
    fn trees<'r>(
        &self,
        repo: &'r Repository,
        revision: u64,
    ) -> Result<(Tree<'r>, Option<Tree<'r>>), RepositoryError> {
        let commit = repo.find_commit(self.oid(revision)?)?;
        let tree = commit.tree()?;
        let parent_tree = if commit.parent_count() > 0 {
            Some(commit.parent(0)?.tree()?)
        } else {
            None
        };
        Ok((tree, parent_tree))
    }
}

fn first_parent_history(repo: &Repository) -> Result<Vec<Oid>, RepositoryError> {
    // An unborn HEAD is an empty history, not an error
    if repo.head().is_err() {
        return Ok(Vec::new());
    }

    let mut revwalk = repo.revwalk()?;
    revwalk.push_head()?;
    revwalk.simplify_first_parent()?;
    revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;

    revwalk
        .map(|oid| oid.map_err(RepositoryError::from))
        .collect()
}

/// Repository-relative form of a normalized path, as git expects it
fn relative(path: &str) -> &str {
    path.trim_start_matches('/')
}

fn tree_contains(tree: &Tree<'_>, path: &str) -> bool {
    path == "/" || tree.get_path(Path::new(relative(path))).is_ok()
}

fn blob_size(repo: &Repository, id: Oid) -> Option<u64> {
    if id.is_zero() {
        return None;
    }
    repo.find_blob(id).ok().map(|blob| blob.size() as u64)
}

fn delta_path(file: &git2::DiffFile<'_>) -> Option<String> {
    file.path()
        .map(|p| normalize_path(&p.to_string_lossy()))
}

impl RepositoryAccess for GitRepository {
    fn location(&self) -> &str {
        &self.location
    }

    fn latest_revision(&self) -> Result<u64, RepositoryError> {
        Ok(self.commits.len() as u64)
    }

    fn revision_info(&self, revision: u64) -> Result<RevisionInfo, RepositoryError> {
        if revision == 0 {
            return Ok(RevisionInfo::default());
        }
        let oid = self.oid(revision)?;
        self.with_repo(|repo| {
            let commit = repo.find_commit(oid)?;
            let author = commit.author();
            Ok(RevisionInfo {
                revision,
                author: author.name().map(str::to_string),
                date: DateTime::from_timestamp(commit.time().seconds(), 0),
                message: commit.message().map(|m| m.trim_end().to_string()),
            })
        })
    }

    fn changed_paths(
        &self,
        base_path: &str,
        revision: u64,
    ) -> Result<Vec<ChangedPath>, RepositoryError> {
        if revision == 0 {
            return Ok(Vec::new());
        }
        let base = normalize_path(base_path);

        self.with_repo(|repo| {
            let (tree, parent_tree) = self.trees(repo, revision)?;

            let existed_before = parent_tree
                .as_ref()
                .is_some_and(|parent| tree_contains(parent, &base));
            if !tree_contains(&tree, &base) && !existed_before {
                return Err(RepositoryError::PathNotFound {
                    path: base.clone(),
                    revision,
                });
            }

            let mut diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
            diff.find_similar(Some(DiffFindOptions::new().renames(true).copies(true)))?;

            let mut changes = Vec::new();
            for delta in diff.deltas() {
                let old = delta_path(&delta.old_file());
                let new = delta_path(&delta.new_file());
                let old_size = || blob_size(repo, delta.old_file().id());
                let new_size = || blob_size(repo, delta.new_file().id());

                let mut push = |path: Option<String>,
                                kind: ChangeKind,
                                size_bytes: Option<u64>,
                                copied_from: Option<(String, u64)>| {
                    if let Some(path) = path {
                        changes.push(ChangedPath {
                            path,
                            kind,
                            node_kind: NodeKind::File,
                            size_bytes,
                            copied_from,
                        });
                    }
                };

                match delta.status() {
                    Delta::Added => push(new, ChangeKind::Added, new_size(), None),
                    Delta::Modified => push(new, ChangeKind::Modified, new_size(), None),
                    Delta::Deleted => push(old, ChangeKind::Deleted, old_size(), None),
                    Delta::Typechange => push(new, ChangeKind::Replaced, new_size(), None),
                    Delta::Renamed => {
                        let source = old.clone().map(|p| (p, revision - 1));
                        push(old, ChangeKind::Deleted, old_size(), None);
                        push(new, ChangeKind::Added, new_size(), source);
                    }
                    Delta::Copied => {
                        let source = old.map(|p| (p, revision - 1));
                        push(new, ChangeKind::Added, new_size(), source);
                    }
                    _ => {}
                }
            }

            changes.retain(|change| is_within(&change.path, &base));
            tracing::debug!(
                "Revision {} touches {} paths under {}",
                revision,
                changes.len(),
                base
            );
            Ok(changes)
        })
    }

    fn fetch_content(&self, path: &str, revision: u64) -> Result<Vec<u8>, RepositoryError> {
        let path = normalize_path(path);
        self.with_repo(|repo| {
            let (tree, _) = self.trees(repo, revision)?;
            let entry = tree
                .get_path(Path::new(relative(&path)))
                .map_err(|_| RepositoryError::PathNotFound {
                    path: path.clone(),
                    revision,
                })?;
            let object = entry.to_object(repo)?;
            let blob = object
                .as_blob()
                .ok_or_else(|| RepositoryError::ContentUnavailable {
                    path: path.clone(),
                    revision,
                    reason: "path is not a file".to_string(),
                })?;
            Ok(blob.content().to_vec())
        })
    }

    fn list_directory(&self, path: &str, revision: u64) -> Result<Vec<DirEntry>, RepositoryError> {
        let path = normalize_path(path);
        self.with_repo(|repo| {
            let (tree, _) = self.trees(repo, revision)?;

            // Git has no cheap per-path "last changed" lookup, so entries report the listed revision
            let entry_of = |entry: &git2::TreeEntry<'_>, entry_path: String| match entry.kind() {
                Some(ObjectType::Tree) => DirEntry {
                    path: entry_path,
                    node_kind: NodeKind::Directory,
                    size_bytes: None,
                    last_changed_revision: revision,
                },
                _ => DirEntry {
                    path: entry_path,
                    node_kind: NodeKind::File,
                    size_bytes: blob_size(repo, entry.id()),
                    last_changed_revision: revision,
                },
            };

            let listed = if path == "/" {
                tree
            } else {
                let entry = tree.get_path(Path::new(relative(&path))).map_err(|_| {
                    RepositoryError::PathNotFound {
                        path: path.clone(),
                        revision,
                    }
                })?;
                if entry.kind() != Some(ObjectType::Tree) {
                    return Ok(vec![entry_of(&entry, path.clone())]);
                }
                repo.find_tree(entry.id())?
            };

            let prefix = if path == "/" { String::new() } else { path.clone() };
            Ok(listed
                .iter()
                .map(|entry| {
                    let name = entry.name().unwrap_or_default();
                    entry_of(&entry, format!("{}/{}", prefix, name))
                })
                .collect())
        })
    }
}

/// Opens git repositories from filesystem locations
#[derive(Debug, Default, Clone, Copy)]
pub struct GitOpener;

impl RepositoryOpener for GitOpener {
    type Repository = GitRepository;

    fn open(&self, location: &str) -> Result<Self::Repository, RepositoryError> {
        GitRepository::discover(location)
    }
}
