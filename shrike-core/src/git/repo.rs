//! Git repository detection and revision-pinned file access

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use git2::{Diff, DiffFormat, DiffOptions, Repository};
use tokio::task;

use crate::error::{Error, Result};
use crate::services::FileSource;

/// Information about a git remote
#[derive(Debug, Clone)]
pub struct RemoteInfo {
    /// Name of the remote (e.g., "origin")
    pub name: String,
    /// URL of the remote
    pub url: String,
}

/// A local git repository wrapper
///
/// All operations here are synchronous; async callers go through
/// [`GitFileSource`], which runs them on the blocking pool.
pub struct GitRepo {
    /// The underlying git2 repository
    repo: Repository,
    /// Path to the repository root
    root: PathBuf,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl GitRepo {
    /// Open a git repository at the given path
    ///
    /// This will search upward from the given path to find the repository root.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let repo = Repository::discover(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::Config(format!(
                    "Not a git repository: {}. Run 'git init' first or navigate to a git repository.",
                    path.display()
                ))
            } else {
                Error::Git(e)
            }
        })?;

        let root = repo
            .workdir()
            .ok_or_else(|| Error::Config("Bare repositories are not supported".to_string()))?
            .to_path_buf();

        Ok(Self { repo, root })
    }

    /// Get the repository root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check if the given path is inside a git repository
    pub fn is_git_repo(path: impl AsRef<Path>) -> bool {
        Repository::discover(path.as_ref()).is_ok()
    }

    /// Resolve a revision to its full commit SHA
    pub fn resolve(&self, revision: &str) -> Result<String> {
        let commit = self.lookup(revision)?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    /// Read a file's content as it was at the given revision
    ///
    /// Returns `Ok(None)` when the path does not exist at that revision,
    /// or when the blob is not valid UTF-8.
    pub fn content_at(&self, revision: &str, path: &str) -> Result<Option<String>> {
        let tree = self.lookup(revision)?.peel_to_commit()?.tree()?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let object = entry.to_object(&self.repo)?;
        let Some(blob) = object.as_blob() else {
            return Ok(None);
        };
        match std::str::from_utf8(blob.content()) {
            Ok(text) => Ok(Some(text.to_string())),
            Err(_) => Ok(None),
        }
    }

    /// Produce a unified diff between two revisions
    pub fn diff_text(&self, base: &str, head: &str, context_lines: u32) -> Result<String> {
        let base_tree = self.lookup(base)?.peel_to_commit()?.tree()?;
        let head_tree = self.lookup(head)?.peel_to_commit()?.tree()?;

        let mut options = DiffOptions::new();
        options.context_lines(context_lines);
        let diff = self.repo.diff_tree_to_tree(
            Some(&base_tree),
            Some(&head_tree),
            Some(&mut options),
        )?;
        render_patch(&diff)
    }

    /// Get the default remote (usually "origin")
    pub fn default_remote(&self) -> Result<RemoteInfo> {
        if let Ok(remote) = self.repo.find_remote("origin") {
            if let Some(url) = remote.url() {
                return Ok(RemoteInfo {
                    name: "origin".to_string(),
                    url: url.to_string(),
                });
            }
        }

        // Fall back to the first available remote
        let remotes = self.repo.remotes()?;
        for remote_name in remotes.iter().flatten() {
            if let Ok(remote) = self.repo.find_remote(remote_name) {
                if let Some(url) = remote.url() {
                    return Ok(RemoteInfo {
                        name: remote_name.to_string(),
                        url: url.to_string(),
                    });
                }
            }
        }

        Err(Error::Config(
            "No remotes configured. Add a remote with 'git remote add origin <url>'".to_string(),
        ))
    }

    /// Get the default branch name (main or master)
    pub fn default_branch(&self) -> Result<String> {
        if self.repo.find_reference("refs/remotes/origin/main").is_ok() {
            return Ok("main".to_string());
        }
        if self
            .repo
            .find_reference("refs/remotes/origin/master")
            .is_ok()
        {
            return Ok("master".to_string());
        }
        if self.repo.find_reference("refs/heads/main").is_ok() {
            return Ok("main".to_string());
        }
        if self.repo.find_reference("refs/heads/master").is_ok() {
            return Ok("master".to_string());
        }
        Ok("main".to_string())
    }

    fn lookup(&self, revision: &str) -> Result<git2::Object<'_>> {
        self.repo.revparse_single(revision).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::Config(format!(
                    "Unknown revision '{revision}' in {}",
                    self.root.display()
                ))
            } else {
                Error::Git(e)
            }
        })
    }
}

fn render_patch(diff: &Diff<'_>) -> Result<String> {
    let mut text = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        match line.origin() {
            '+' | '-' | ' ' => text.push(line.origin()),
            _ => {}
        }
        text.push_str(&String::from_utf8_lossy(line.content()));
        true
    })?;
    Ok(text)
}

/// Extract `owner/name` from a git remote URL
///
/// Handles ssh (`git@host:owner/name.git`) and https
/// (`https://host/owner/name.git`) forms.
pub fn slug_from_remote(url: &str) -> Option<(String, String)> {
    let without_git = url.strip_suffix(".git").unwrap_or(url);
    let path = if let Some((_, rest)) = without_git.split_once("://") {
        rest.split_once('/')?.1
    } else if let Some((_, rest)) = without_git.split_once(':') {
        rest
    } else {
        return None;
    };
    let (owner, name) = path.rsplit_once('/')?;
    let owner = owner.rsplit('/').next()?;
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some((owner.to_string(), name.to_string()))
}

/// Async file access backed by a local repository
///
/// `git2::Repository` is Send but not Sync, so this holds only the
/// repository root and opens a fresh handle per call inside
/// `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct GitFileSource {
    root: PathBuf,
}

impl GitFileSource {
    /// Anchor the source at an already-opened repository
    pub fn new(repo: &GitRepo) -> Self {
        Self {
            root: repo.root().to_path_buf(),
        }
    }
}

#[async_trait]
impl FileSource for GitFileSource {
    async fn content_at(&self, revision: &str, path: &str) -> Result<Option<String>> {
        if revision.is_empty() {
            return Ok(None);
        }
        let root = self.root.clone();
        let revision = revision.to_string();
        let path = path.to_string();
        task::spawn_blocking(move || {
            let repo = GitRepo::open(&root)?;
            repo.content_at(&revision, &path)
        })
        .await
        .map_err(|e| Error::Other(format!("Blocking git task failed: {e}")))?
    }
}
