//! History and tag extraction via git2.
//!
//! Reads the full commit history, the repository's tags resolved to their
//! commits, and answers ancestry-range queries (`start..end`).

use std::path::Path;

use chrono::{DateTime, Utc};
use defectmine_core::{Commit, DefectmineError, Tag};
use git2::{Oid, Repository, Sort};

/// A history backend able to answer ancestry-range queries.
///
/// `commits_between(Some(start), end)` returns the commits reachable from
/// `end` but not from `start`, newest first. With `start = None` it returns
/// every commit reachable from `end`.
pub trait CommitSource {
    /// Commits in the range `start..end`.
    ///
    /// # Errors
    ///
    /// Returns [`DefectmineError::RangeQuery`] when either end of the range
    /// cannot be resolved or the walk fails.
    fn commits_between(&self, start: Option<&str>, end: &str)
        -> Result<Vec<Commit>, DefectmineError>;
}

/// A git repository opened for history mining.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use defectmine_history::mining::GitHistory;
///
/// let history = GitHistory::open(Path::new(".")).unwrap();
/// let commits = history.commits(None).unwrap();
/// let tags = history.tags().unwrap();
/// println!("{} commits, {} tags", commits.len(), tags.len());
/// ```
pub struct GitHistory {
    repo: Repository,
}

impl GitHistory {
    /// Open the repository at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DefectmineError::Git`] if `path` is not a git repository.
    pub fn open(path: &Path) -> Result<Self, DefectmineError> {
        let repo = Repository::open(path)
            .map_err(|e| DefectmineError::Git(format!("failed to open repository: {e}")))?;
        Ok(Self { repo })
    }

    /// Full history reachable from HEAD, or from `branch` when given.
    ///
    /// Returns commits in reverse chronological order (newest first) with
    /// their complete messages.
    ///
    /// # Errors
    ///
    /// Returns [`DefectmineError::Git`] if the branch cannot be resolved or
    /// the history cannot be walked.
    pub fn commits(&self, branch: Option<&str>) -> Result<Vec<Commit>, DefectmineError> {
        let mut revwalk = self
            .repo
            .revwalk()
            .map_err(|e| DefectmineError::Git(format!("failed to create revwalk: {e}")))?;
        revwalk.set_sorting(Sort::TIME).ok();

        if let Some(branch) = branch {
            let reference = self
                .repo
                .resolve_reference_from_short_name(branch)
                .map_err(|e| {
                    DefectmineError::Git(format!("failed to resolve branch '{branch}': {e}"))
                })?;
            let oid = reference
                .target()
                .ok_or_else(|| DefectmineError::Git("branch has no target".into()))?;
            revwalk
                .push(oid)
                .map_err(|e| DefectmineError::Git(format!("failed to push oid: {e}")))?;
        } else {
            revwalk
                .push_head()
                .map_err(|e| DefectmineError::Git(format!("failed to push HEAD: {e}")))?;
        }

        let mut commits = Vec::new();
        for oid_result in revwalk {
            let oid = oid_result.map_err(|e| DefectmineError::Git(format!("revwalk error: {e}")))?;
            commits.push(self.load_commit(oid).map_err(DefectmineError::Git)?);
        }

        tracing::debug!(count = commits.len(), "read commit history");
        Ok(commits)
    }

    /// All tags under `refs/tags/`, peeled to the commit they point at.
    ///
    /// Lightweight and annotated tags are both supported. Tags that do not
    /// resolve to a commit are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DefectmineError::Git`] if the references cannot be listed.
    pub fn tags(&self) -> Result<Vec<Tag>, DefectmineError> {
        let references = self
            .repo
            .references_glob("refs/tags/*")
            .map_err(|e| DefectmineError::Git(format!("failed to list tags: {e}")))?;

        let mut tags = Vec::new();
        for reference in references {
            let reference =
                reference.map_err(|e| DefectmineError::Git(format!("bad tag reference: {e}")))?;
            let Some(name) = reference.name() else {
                continue;
            };
            let commit = match reference.peel_to_commit() {
                Ok(commit) => commit,
                Err(e) => {
                    tracing::debug!(tag = name, error = %e, "tag does not point at a commit");
                    continue;
                }
            };
            let date = git_time(commit.author().when()).map_err(DefectmineError::Git)?;
            tags.push(Tag::new(name, commit.id().to_string(), date));
        }

        tracing::debug!(count = tags.len(), "read tags");
        Ok(tags)
    }

    fn load_commit(&self, oid: Oid) -> Result<Commit, String> {
        let commit = self
            .repo
            .find_commit(oid)
            .map_err(|e| format!("failed to find commit {oid}: {e}"))?;
        let author = commit.author();
        Ok(Commit {
            hash: oid.to_string(),
            author: author.name().unwrap_or("unknown").to_string(),
            timestamp: git_time(author.when())?,
            message: commit.message().unwrap_or("").to_string(),
        })
    }
}

impl CommitSource for GitHistory {
    fn commits_between(
        &self,
        start: Option<&str>,
        end: &str,
    ) -> Result<Vec<Commit>, DefectmineError> {
        let range = format!("{}..{end}", start.unwrap_or(""));
        let fail = |reason: String| DefectmineError::RangeQuery {
            range: range.clone(),
            reason,
        };

        let mut revwalk = self
            .repo
            .revwalk()
            .map_err(|e| fail(format!("failed to create revwalk: {e}")))?;
        revwalk.set_sorting(Sort::TIME).ok();

        let end_oid = Oid::from_str(end).map_err(|e| fail(format!("invalid end id: {e}")))?;
        revwalk
            .push(end_oid)
            .map_err(|e| fail(format!("unreachable end commit: {e}")))?;

        if let Some(start) = start {
            let start_oid =
                Oid::from_str(start).map_err(|e| fail(format!("invalid start id: {e}")))?;
            revwalk
                .hide(start_oid)
                .map_err(|e| fail(format!("unreachable start commit: {e}")))?;
        }

        let mut commits = Vec::new();
        for oid_result in revwalk {
            let oid = oid_result.map_err(|e| fail(format!("revwalk error: {e}")))?;
            commits.push(self.load_commit(oid).map_err(fail)?);
        }
        Ok(commits)
    }
}

fn git_time(time: git2::Time) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp(time.seconds(), 0)
        .ok_or_else(|| format!("timestamp out of range: {}", time.seconds()))
}
