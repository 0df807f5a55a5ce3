//! Per-release commit windows.
//!
//! Walks the matched releases in tag-date order and asks the history source
//! for `previous_tag..current_tag` each time, so every commit lands in the
//! window of the first release whose tag reaches it.

use defectmine_core::{Commit, DefectmineError, Release, Tag};
use serde::Serialize;

use crate::matching::MatchedRelease;
use crate::mining::CommitSource;

/// Commits belonging to one release's development cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseWindow {
    /// The release.
    pub release: Release,
    /// The tag bounding the window from above.
    pub tag: Tag,
    /// Commits in the window, newest first. May be empty.
    pub commits: Vec<Commit>,
}

/// Ordered release → commits map.
///
/// Only matched releases appear. A matched release with no commits is present
/// with an empty window, which [`PartitionMap::get`] distinguishes from an
/// absent release.
///
/// # Examples
///
/// ```
/// use defectmine_history::partition::PartitionMap;
///
/// let map = PartitionMap::default();
/// assert!(map.get("10010").is_none());
/// assert_eq!(map.commit_count(), 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PartitionMap {
    windows: Vec<ReleaseWindow>,
}

impl PartitionMap {
    /// Build a map from windows already in partition order.
    pub fn from_windows(windows: Vec<ReleaseWindow>) -> Self {
        Self { windows }
    }

    /// Commits of the release with id `release_id`, or `None` if the release
    /// was not partitioned.
    pub fn get(&self, release_id: &str) -> Option<&[Commit]> {
        self.windows
            .iter()
            .find(|w| w.release.id == release_id)
            .map(|w| w.commits.as_slice())
    }

    /// Windows in partition order.
    pub fn windows(&self) -> &[ReleaseWindow] {
        &self.windows
    }

    /// Number of partitioned releases.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// `true` if no release was partitioned.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Total commits across all windows.
    pub fn commit_count(&self) -> usize {
        self.windows.iter().map(|w| w.commits.len()).sum()
    }
}

/// A range query failed part-way through partitioning.
///
/// Windows computed for earlier releases are kept in `partial`; the caller
/// decides whether to use them.
#[derive(Debug, thiserror::Error)]
#[error("partitioning stopped at release {}: {source}", .release.name)]
pub struct PartitionError {
    /// The release whose range query failed.
    pub release: Release,
    /// Windows completed before the failure.
    pub partial: PartitionMap,
    /// The underlying failure.
    #[source]
    pub source: DefectmineError,
}

/// Split history into per-release windows.
///
/// `pairs` must be sorted by tag commit date, as produced by
/// [`match_releases_to_tags`](crate::matching::match_releases_to_tags). The
/// first window holds everything reachable from the first tag; each later
/// window holds the commits reachable from its tag but not from the previous
/// one.
///
/// # Errors
///
/// Returns [`PartitionError`] carrying the partial map when a range query fails.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use defectmine_core::Release;
/// use defectmine_history::{match_releases_to_tags, partition_commits, GitHistory};
///
/// let history = GitHistory::open(Path::new(".")).unwrap();
/// let releases: Vec<Release> = Vec::new();
/// let matches = match_releases_to_tags(&releases, &history.tags().unwrap());
/// let map = partition_commits(&matches.pairs, &history).unwrap();
/// println!("{} releases, {} commits", map.len(), map.commit_count());
/// ```
pub fn partition_commits<S>(
    pairs: &[MatchedRelease],
    source: &S,
) -> Result<PartitionMap, PartitionError>
where
    S: CommitSource + ?Sized,
{
    let (map, _) = pairs.iter().try_fold(
        (PartitionMap::default(), None::<&str>),
        |(mut map, previous), pair| {
            let current = pair.tag.commit_id.as_str();
            match source.commits_between(previous, current) {
                Ok(commits) => {
                    tracing::debug!(
                        release = %pair.release.name,
                        tag = %pair.tag.name,
                        commits = commits.len(),
                        "partitioned release"
                    );
                    map.windows.push(ReleaseWindow {
                        release: pair.release.clone(),
                        tag: pair.tag.clone(),
                        commits,
                    });
                    Ok((map, Some(current)))
                }
                Err(err) => Err(PartitionError {
                    release: pair.release.clone(),
                    partial: map,
                    source: err,
                }),
            }
        },
    )?;

    tracing::info!(
        releases = map.len(),
        commits = map.commit_count(),
        "partitioned commits by release"
    );
    Ok(map)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    use super::*;

    /// Linear history, oldest first.
    struct LinearHistory {
        commits: Vec<Commit>,
    }

    impl LinearHistory {
        fn new(n: usize) -> Self {
            let commits = (0..n)
                .map(|i| Commit {
                    hash: format!("c{i}"),
                    author: "alice".into(),
                    timestamp: day(i as u32 + 1),
                    message: format!("commit {i}"),
                })
                .collect();
            Self { commits }
        }

        fn position(&self, id: &str) -> Result<usize, DefectmineError> {
            self.commits
                .iter()
                .position(|c| c.hash == id)
                .ok_or_else(|| DefectmineError::RangeQuery {
                    range: id.into(),
                    reason: "unknown commit".into(),
                })
        }
    }

    impl CommitSource for LinearHistory {
        fn commits_between(
            &self,
            start: Option<&str>,
            end: &str,
        ) -> Result<Vec<Commit>, DefectmineError> {
            let end = self.position(end)?;
            let from = match start {
                Some(s) => self.position(s)? + 1,
                None => 0,
            };
            if from > end {
                return Ok(Vec::new());
            }
            Ok(self.commits[from..=end].iter().rev().cloned().collect())
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, d, 0, 0, 0).unwrap()
    }

    fn pair(name: &str, commit: &str, d: u32) -> MatchedRelease {
        MatchedRelease {
            release: Release::on_day(name, name, NaiveDate::from_ymd_opt(2020, 2, d).unwrap()),
            tag: Tag::new(&format!("v{name}"), commit, day(d)),
        }
    }

    #[test]
    fn windows_are_disjoint_and_cover_history() {
        let history = LinearHistory::new(6);
        let pairs = vec![pair("1.0", "c1", 2), pair("1.1", "c3", 4), pair("2.0", "c5", 6)];
        let map = partition_commits(&pairs, &history).unwrap();

        assert_eq!(map.len(), 3);
        let ids = |release: &str| -> Vec<String> {
            map.get(release)
                .unwrap()
                .iter()
                .map(|c| c.hash.clone())
                .collect()
        };
        assert_eq!(ids("1.0"), ["c1", "c0"]);
        assert_eq!(ids("1.1"), ["c3", "c2"]);
        assert_eq!(ids("2.0"), ["c5", "c4"]);

        let mut seen = HashSet::new();
        for window in map.windows() {
            for commit in &window.commits {
                assert!(seen.insert(commit.hash.clone()), "{} in two windows", commit.hash);
            }
        }
        let reachable = history.commits_between(None, "c5").unwrap();
        assert_eq!(seen.len(), reachable.len());
    }

    #[test]
    fn release_sharing_previous_tag_commit_gets_empty_window() {
        let history = LinearHistory::new(3);
        let pairs = vec![pair("1.0", "c1", 2), pair("1.0-final", "c1", 2)];
        let map = partition_commits(&pairs, &history).unwrap();
        assert_eq!(map.get("1.0-final"), Some(&[][..]));
        assert!(map.get("9.9").is_none());
    }

    #[test]
    fn no_pairs_gives_empty_map() {
        let map = partition_commits(&[], &LinearHistory::new(2)).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn failure_keeps_earlier_windows() {
        let history = LinearHistory::new(4);
        let pairs = vec![pair("1.0", "c1", 2), pair("2.0", "missing", 3), pair("3.0", "c3", 4)];
        let err = partition_commits(&pairs, &history).unwrap_err();
        assert_eq!(err.release.name, "2.0");
        assert_eq!(err.partial.len(), 1);
        assert_eq!(err.partial.get("1.0").unwrap().len(), 2);
        assert!(matches!(err.source, DefectmineError::RangeQuery { .. }));
        assert!(err.to_string().contains("2.0"));
    }

    #[test]
    fn partition_map_serializes_as_window_list() {
        let history = LinearHistory::new(2);
        let map = partition_commits(&[pair("1.0", "c1", 2)], &history).unwrap();
        let json = serde_json::to_value(&map).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["release"]["name"], "1.0");
        assert_eq!(json[0]["commits"].as_array().unwrap().len(), 2);
    }
}
