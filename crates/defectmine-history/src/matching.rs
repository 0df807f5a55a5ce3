//! Release-to-tag matching by name containment.
//!
//! A release is paired with the first tag (in tag-list order) whose name
//! contains the release name or is contained in it. The match is a heuristic:
//! `"1.0"` also matches a tag named `"1.0.1"` when that tag comes first.

use std::collections::HashSet;

use defectmine_core::{Release, Tag};
use serde::Serialize;

/// A release paired with the tag that marks it in version control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedRelease {
    /// The tracker release.
    pub release: Release,
    /// The matching tag.
    pub tag: Tag,
}

/// Result of matching releases to tags.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagMatches {
    /// Matched pairs, ascending by the tagged commit's date.
    pub pairs: Vec<MatchedRelease>,
    /// Releases that found no tag, in input order.
    pub unmatched: Vec<Release>,
}

/// Pair each release with at most one tag.
///
/// For every release the first tag satisfying
/// `release.name.contains(tag.name) || tag.name.contains(release.name)` wins.
/// A release name that already produced a match is not matched again.
/// Releases without a tag end up in [`TagMatches::unmatched`] and are logged;
/// this is not an error.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, TimeZone, Utc};
/// use defectmine_core::{Release, Tag};
/// use defectmine_history::matching::match_releases_to_tags;
///
/// let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
/// let releases = vec![
///     Release::on_day("1", "Version 2.1.0", day),
///     Release::on_day("2", "3.0.0", day),
/// ];
/// let date = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
/// let tags = vec![Tag::new("2.1.0", "abc", date)];
///
/// let matches = match_releases_to_tags(&releases, &tags);
/// assert_eq!(matches.pairs.len(), 1);
/// assert_eq!(matches.pairs[0].tag.name, "2.1.0");
/// assert_eq!(matches.unmatched[0].name, "3.0.0");
/// ```
pub fn match_releases_to_tags(releases: &[Release], tags: &[Tag]) -> TagMatches {
    let mut matched_names: HashSet<&str> = HashSet::new();
    let mut result = TagMatches::default();

    for release in releases {
        if matched_names.contains(release.name.as_str()) {
            tracing::debug!(release = %release.name, "release name already matched; skipping");
            result.unmatched.push(release.clone());
            continue;
        }

        let found = tags
            .iter()
            .find(|tag| release.name.contains(&tag.name) || tag.name.contains(&release.name));

        match found {
            Some(tag) => {
                tracing::debug!(release = %release.name, tag = %tag.name, "matched release to tag");
                matched_names.insert(release.name.as_str());
                result.pairs.push(MatchedRelease {
                    release: release.clone(),
                    tag: tag.clone(),
                });
            }
            None => {
                tracing::warn!(release = %release.name, "no tag matches release");
                result.unmatched.push(release.clone());
            }
        }
    }

    result.pairs.sort_by_key(|pair| pair.tag.commit_date);
    result
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    use super::*;

    fn release(id: &str, name: &str) -> Release {
        Release::on_day(id, name, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
    }

    fn date(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn release_name_containing_tag_matches() {
        let releases = vec![release("1", "release-4.2.0")];
        let tags = vec![Tag::new("4.2.0", "c1", date(1))];
        let matches = match_releases_to_tags(&releases, &tags);
        assert_eq!(matches.pairs.len(), 1);
        assert!(matches.unmatched.is_empty());
    }

    #[test]
    fn tag_name_containing_release_matches() {
        let releases = vec![release("1", "4.2.0")];
        let tags = vec![Tag::new("refs/tags/bookkeeper-4.2.0", "c1", date(1))];
        let matches = match_releases_to_tags(&releases, &tags);
        assert_eq!(matches.pairs[0].tag.name, "bookkeeper-4.2.0");
    }

    #[test]
    fn first_match_wins_not_best_match() {
        let releases = vec![release("1", "1.0")];
        let tags = vec![
            Tag::new("1.0.1", "c2", date(2)),
            Tag::new("1.0", "c1", date(1)),
        ];
        let matches = match_releases_to_tags(&releases, &tags);
        assert_eq!(matches.pairs.len(), 1);
        assert_eq!(matches.pairs[0].tag.name, "1.0.1");
    }

    #[test]
    fn pairs_sorted_by_tag_commit_date() {
        let releases = vec![release("2", "2.0"), release("1", "1.0")];
        let tags = vec![
            Tag::new("v2.0", "c2", date(20)),
            Tag::new("v1.0", "c1", date(10)),
        ];
        let matches = match_releases_to_tags(&releases, &tags);
        let names: Vec<_> = matches.pairs.iter().map(|p| p.release.name.as_str()).collect();
        assert_eq!(names, ["1.0", "2.0"]);
    }

    #[test]
    fn duplicate_release_name_is_not_rematched() {
        let releases = vec![release("1", "2.0"), release("2", "2.0")];
        let tags = vec![Tag::new("v2.0", "c2", date(2))];
        let matches = match_releases_to_tags(&releases, &tags);
        assert_eq!(matches.pairs.len(), 1);
        assert_eq!(matches.pairs[0].release.id, "1");
        assert_eq!(matches.unmatched[0].id, "2");
    }

    #[test]
    fn unrelated_tag_changes_nothing() {
        let releases = vec![release("1", "1.0"), release("2", "2.0")];
        let tags = vec![
            Tag::new("v1.0", "c1", date(1)),
            Tag::new("v2.0", "c2", date(2)),
        ];
        let before = match_releases_to_tags(&releases, &tags);

        let mut more_tags = tags.clone();
        more_tags.insert(0, Tag::new("nightly", "c9", date(3)));
        let after = match_releases_to_tags(&releases, &more_tags);

        assert_eq!(before.pairs, after.pairs);
        assert_eq!(before.unmatched, after.unmatched);
    }

    #[test]
    fn no_tags_leaves_everything_unmatched() {
        let releases = vec![release("1", "1.0")];
        let matches = match_releases_to_tags(&releases, &[]);
        assert!(matches.pairs.is_empty());
        assert_eq!(matches.unmatched.len(), 1);
    }

    #[tracing_test::traced_test]
    #[test]
    fn matching_gap_is_logged() {
        let releases = vec![release("1", "9.9")];
        match_releases_to_tags(&releases, &[Tag::new("v1.0", "c1", date(1))]);
        assert!(logs_contain("no tag matches release"));
    }
}
