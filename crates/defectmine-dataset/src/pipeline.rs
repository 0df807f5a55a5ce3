//! End-to-end dataset construction.

use defectmine_core::{
    Commit, DefectmineError, RawTicket, Release, ReleaseTimeline, Tag, Ticket,
};
use defectmine_history::{match_releases_to_tags, partition_commits, CommitSource, PartitionMap};

use crate::linking::{link_commits_to_tickets, TicketLinks};
use crate::proportion::{apply_proportion, ProportionEstimate, DEFAULT_PROPORTION};

/// Snapshots acquired from the collaborators.
pub struct DatasetInputs<S> {
    /// Releases in any order; they are sorted into a timeline.
    pub releases: Vec<Release>,
    /// All repository tags.
    pub tags: Vec<Tag>,
    /// Full commit history, as scanned by the linker.
    pub commits: Vec<Commit>,
    /// Tickets with opening versions already derived.
    pub tickets: Vec<RawTicket>,
    /// Ancestry-range source for partitioning.
    pub source: S,
}

/// Knobs for [`build_dataset`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildOptions {
    /// Proportion used when no ticket yields a sample.
    pub default_p: f64,
    /// Keep the windows computed before a range-query failure instead of
    /// failing the build.
    pub keep_partial: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            default_p: DEFAULT_PROPORTION,
            keep_partial: true,
        }
    }
}

/// The reconciled dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// All releases, ascending by date.
    pub timeline: ReleaseTimeline,
    /// Releases that no tag matched.
    pub unmatched: Vec<Release>,
    /// Repository tags as read from version control.
    pub tags: Vec<Tag>,
    /// Full commit history, as scanned by the linker.
    pub commits: Vec<Commit>,
    /// Per-release commit windows for the matched releases.
    pub partitions: PartitionMap,
    /// Message of the range failure that cut partitioning short, if any.
    pub partition_failure: Option<String>,
    /// Ticket key → commits referencing it.
    pub links: TicketLinks,
    /// The proportion used for estimation.
    pub proportion: ProportionEstimate,
    /// Every ticket with its resolution, in input order.
    pub tickets: Vec<Ticket>,
    /// Keys of tickets left without an injected version.
    pub unresolved: Vec<String>,
}

/// Build the dataset from collaborator snapshots.
///
/// Tag matching and partitioning run concurrently with ticket linking; the
/// proportion estimator runs once both are done.
///
/// # Errors
///
/// Returns the range-query error when partitioning fails and
/// `options.keep_partial` is off. With `keep_partial` on, the windows computed
/// before the failure are kept and the failure is recorded in
/// [`Dataset::partition_failure`].
///
/// # Examples
///
/// ```
/// use defectmine_core::{Commit, DefectmineError};
/// use defectmine_dataset::{build_dataset, BuildOptions, DatasetInputs};
/// use defectmine_history::CommitSource;
///
/// struct NoHistory;
///
/// impl CommitSource for NoHistory {
///     fn commits_between(&self, _: Option<&str>, _: &str) -> Result<Vec<Commit>, DefectmineError> {
///         Ok(Vec::new())
///     }
/// }
///
/// let inputs = DatasetInputs {
///     releases: vec![],
///     tags: vec![],
///     commits: vec![],
///     tickets: vec![],
///     source: NoHistory,
/// };
/// let dataset = build_dataset(inputs, BuildOptions::default()).unwrap();
/// assert!(dataset.partitions.is_empty());
/// assert_eq!(dataset.proportion.p, 0.5);
/// ```
pub fn build_dataset<S>(
    inputs: DatasetInputs<S>,
    options: BuildOptions,
) -> Result<Dataset, DefectmineError>
where
    S: CommitSource + Send,
{
    let DatasetInputs {
        releases,
        tags,
        commits,
        tickets,
        source,
    } = inputs;

    let timeline = ReleaseTimeline::new(releases);
    tracing::info!(
        releases = timeline.len(),
        tags = tags.len(),
        commits = commits.len(),
        tickets = tickets.len(),
        "building dataset"
    );

    let matches = match_releases_to_tags(timeline.as_slice(), &tags);
    let pairs = &matches.pairs;

    let (partitioned, links) = rayon::join(
        move || partition_commits(pairs, &source),
        || link_commits_to_tickets(&commits, &tickets),
    );

    let (partitions, partition_failure) = match partitioned {
        Ok(map) => (map, None),
        Err(err) if options.keep_partial => {
            tracing::warn!(
                release = %err.release.name,
                kept = err.partial.len(),
                error = %err.source,
                "keeping partial partition map"
            );
            let message = err.to_string();
            (err.partial, Some(message))
        }
        Err(err) => return Err(err.source),
    };

    let outcome = apply_proportion(tickets, &timeline, options.default_p);

    Ok(Dataset {
        timeline,
        unmatched: matches.unmatched,
        tags,
        commits,
        partitions,
        partition_failure,
        links,
        proportion: outcome.estimate,
        tickets: outcome.tickets,
        unresolved: outcome.unresolved,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use defectmine_core::IvStatus;

    use super::*;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, d, 0, 0, 0).unwrap()
    }

    fn release(name: &str, d: u32) -> Release {
        Release::on_day(name, name, NaiveDate::from_ymd_opt(2020, 1, d).unwrap())
    }

    /// Linear history of commits `c0..cN`, one per day, oldest first.
    struct Linear {
        commits: Vec<Commit>,
        broken: Option<&'static str>,
    }

    impl Linear {
        fn new(n: u32) -> Self {
            let commits = (0..n)
                .map(|i| Commit {
                    hash: format!("c{i}"),
                    author: "alice".into(),
                    timestamp: day(i + 1),
                    message: format!("PROJ-{i}: change"),
                })
                .collect();
            Self {
                commits,
                broken: None,
            }
        }

        fn index(&self, id: &str) -> Result<usize, DefectmineError> {
            if self.broken == Some(id) {
                return Err(DefectmineError::RangeQuery {
                    range: id.into(),
                    reason: "object not found".into(),
                });
            }
            self.commits
                .iter()
                .position(|c| c.hash == id)
                .ok_or_else(|| DefectmineError::RangeQuery {
                    range: id.into(),
                    reason: "unknown commit".into(),
                })
        }
    }

    impl CommitSource for Linear {
        fn commits_between(
            &self,
            start: Option<&str>,
            end: &str,
        ) -> Result<Vec<Commit>, DefectmineError> {
            let end = self.index(end)?;
            let from = match start {
                Some(id) => self.index(id)? + 1,
                None => 0,
            };
            Ok(self.commits[from..=end].iter().rev().cloned().collect())
        }
    }

    fn tag(name: &str, source: &Linear, idx: usize) -> Tag {
        let commit = &source.commits[idx];
        Tag::new(name, commit.hash.clone(), commit.timestamp)
    }

    fn ticket(key: &str, ov: &Release, fv: &Release) -> RawTicket {
        RawTicket {
            id: key.into(),
            key: key.into(),
            resolution: "Fixed".into(),
            description: String::new(),
            opening_version: Some(ov.clone()),
            injected_version: None,
            fix_versions: vec![fv.clone()],
        }
    }

    fn inputs(source: Linear) -> DatasetInputs<Linear> {
        let r1 = release("1.0", 3);
        let r2 = release("1.1", 6);
        let r3 = release("2.0", 9);
        DatasetInputs {
            releases: vec![r3.clone(), r1.clone(), r2.clone()],
            tags: vec![
                tag("v1.0", &source, 2),
                tag("v1.1", &source, 5),
                tag("v2.0", &source, 7),
            ],
            commits: source.commits.iter().rev().cloned().collect(),
            tickets: vec![ticket("PROJ-1", &r2, &r3), ticket("PROJ-99", &r1, &r2)],
            source,
        }
    }

    #[test]
    fn builds_all_parts() {
        let dataset = build_dataset(inputs(Linear::new(8)), BuildOptions::default()).unwrap();

        let names: Vec<_> = dataset.timeline.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["1.0", "1.1", "2.0"]);
        assert!(dataset.unmatched.is_empty());
        assert_eq!(dataset.partitions.len(), 3);
        assert_eq!(dataset.partitions.commit_count(), 8);
        assert!(dataset.partition_failure.is_none());

        assert_eq!(dataset.links.len(), 1);
        assert_eq!(dataset.links["PROJ-1"][0].hash, "c1");

        assert!(dataset.proportion.defaulted);
        assert_eq!(dataset.tickets.len(), 2);
        assert!(dataset
            .tickets
            .iter()
            .all(|t| t.resolution.iv_status == IvStatus::Estimated
                || t.resolution.iv_status == IvStatus::OpeningFallback));
        assert!(dataset.unresolved.is_empty());
        assert_eq!(dataset.commits.len(), 8);
        assert_eq!(dataset.tags.len(), 3);
    }

    #[tracing_test::traced_test]
    #[test]
    fn keeps_partial_partitions_on_failure() {
        let mut source = Linear::new(8);
        source.broken = Some("c5");
        let dataset = build_dataset(inputs(source), BuildOptions::default()).unwrap();

        assert_eq!(dataset.partitions.len(), 1);
        assert_eq!(dataset.partitions.get("1.0").unwrap().len(), 3);
        let failure = dataset.partition_failure.unwrap();
        assert!(failure.contains("1.1"));
        // the rest of the pipeline still ran
        assert_eq!(dataset.tickets.len(), 2);
        assert!(logs_contain("keeping partial partition map"));
    }

    #[test]
    fn strict_mode_surfaces_range_failure() {
        let mut source = Linear::new(8);
        source.broken = Some("c5");
        let options = BuildOptions {
            keep_partial: false,
            ..BuildOptions::default()
        };
        let err = build_dataset(inputs(source), options).unwrap_err();
        assert!(matches!(err, DefectmineError::RangeQuery { .. }));
    }

    #[test]
    fn unmatched_release_is_reported_and_excluded() {
        let source = Linear::new(8);
        let mut inputs = inputs(source);
        inputs.releases.push(release("3.0", 20));
        let dataset = build_dataset(inputs, BuildOptions::default()).unwrap();

        assert_eq!(dataset.unmatched.len(), 1);
        assert!(dataset.partitions.get("3.0").is_none());
        assert_eq!(dataset.timeline.len(), 4);
    }
}
