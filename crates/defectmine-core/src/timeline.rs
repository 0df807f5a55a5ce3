//! The chronological release sequence and the release-date resolver.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::Release;

/// Releases in ascending date order; equal dates keep their input order.
///
/// The timeline owns the canonical [`Release`] values. Everything else that
/// refers to a release (tickets, partitions) holds a clone of one of them.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use defectmine_core::{Release, ReleaseTimeline};
///
/// let day = |m| NaiveDate::from_ymd_opt(2020, m, 1).unwrap();
/// let timeline = ReleaseTimeline::new(vec![
///     Release::on_day("2", "1.1", day(6)),
///     Release::on_day("1", "1.0", day(1)),
/// ]);
/// let names: Vec<_> = timeline.iter().map(|r| r.name.as_str()).collect();
/// assert_eq!(names, ["1.0", "1.1"]);
/// ```
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ReleaseTimeline {
    releases: Vec<Release>,
}

impl ReleaseTimeline {
    /// Build a timeline, sorting `releases` by date (stable).
    pub fn new(mut releases: Vec<Release>) -> Self {
        releases.sort_by_key(|r| r.date);
        Self { releases }
    }

    /// Number of releases.
    pub fn len(&self) -> usize {
        self.releases.len()
    }

    /// `true` if the timeline has no releases.
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// Iterate releases in chronological order.
    pub fn iter(&self) -> std::slice::Iter<'_, Release> {
        self.releases.iter()
    }

    /// The releases as a slice.
    pub fn as_slice(&self) -> &[Release] {
        &self.releases
    }

    /// Look up a release by its display name (first match in timeline order).
    pub fn by_name(&self, name: &str) -> Option<&Release> {
        self.releases.iter().find(|r| r.name == name)
    }

    /// The release active at `instant`.
    ///
    /// The active release is the last one, in timeline order, whose date is at
    /// or before `instant`. A release dated exactly at `instant` owns it.
    /// Returns `None` when `instant` precedes every release.
    ///
    /// Opening-version derivation and injected-version estimation both go
    /// through this function.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{NaiveDate, TimeZone, Utc};
    /// use defectmine_core::{Release, ReleaseTimeline};
    ///
    /// let day = |m| NaiveDate::from_ymd_opt(2020, m, 1).unwrap();
    /// let timeline = ReleaseTimeline::new(vec![
    ///     Release::on_day("1", "1.0", day(1)),
    ///     Release::on_day("2", "1.1", day(6)),
    /// ]);
    /// let march = Utc.with_ymd_and_hms(2020, 3, 15, 0, 0, 0).unwrap();
    /// assert_eq!(timeline.release_at(march).unwrap().name, "1.0");
    ///
    /// let earlier = Utc.with_ymd_and_hms(2019, 3, 15, 0, 0, 0).unwrap();
    /// assert!(timeline.release_at(earlier).is_none());
    /// ```
    pub fn release_at(&self, instant: DateTime<Utc>) -> Option<&Release> {
        let idx = self.releases.partition_point(|r| r.date <= instant);
        idx.checked_sub(1).map(|i| &self.releases[i])
    }

    /// Releases whose date lies in `[from, until)`, in timeline order.
    pub fn between(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Vec<Release> {
        self.releases
            .iter()
            .filter(|r| r.date >= from && r.date < until)
            .cloned()
            .collect()
    }
}

impl<'a> IntoIterator for &'a ReleaseTimeline {
    type Item = &'a Release;
    type IntoIter = std::slice::Iter<'a, Release>;

    fn into_iter(self) -> Self::IntoIter {
        self.releases.iter()
    }
}
