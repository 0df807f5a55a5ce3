//! Dataset persistence and summaries.
//!
//! [`write_dataset`] lays the dataset out as one JSON file per concern:
//!
//! | File | Contents |
//! |------|----------|
//! | `releases.json` | timeline, with the tag each release matched |
//! | `tags.json` | repository tags with their commit id and date |
//! | `commits.json` | full history: hash, author, timestamp, message |
//! | `partitions.json` | release → commit hashes, empty windows kept |
//! | `links.json` | ticket key → commit hashes |
//! | `tickets.json` | ticket versions and injected-version status |
//! | `summary.json` | [`DatasetSummary`] |

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use defectmine_core::{DefectmineError, IvStatus, Release, Ticket};
use serde::Serialize;

use crate::pipeline::Dataset;
use crate::proportion::ProportionEstimate;

/// One timeline entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRecord {
    /// Tracker-side version identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Release date.
    pub date: DateTime<Utc>,
    /// Tag the release was matched to, if any.
    pub tag: Option<String>,
}

/// One release's commit window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionRecord {
    /// Release name.
    pub release: String,
    /// Tag bounding the window.
    pub tag: String,
    /// Commit hashes in the window, newest first. May be empty.
    pub commits: Vec<String>,
}

/// One ticket with version names in place of full releases.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRecord {
    /// Ticket key.
    pub key: String,
    /// Resolution label.
    pub resolution: String,
    /// Opening version name.
    pub opening_version: Option<String>,
    /// Injected version name, known or estimated.
    pub injected_version: Option<String>,
    /// How the injected version was obtained.
    pub iv_status: IvStatus,
    /// Fix version names, ascending by date.
    pub fix_versions: Vec<String>,
    /// Affected version names; absent for unresolved tickets.
    pub affected_versions: Option<Vec<String>>,
}

impl From<&Ticket> for TicketRecord {
    fn from(ticket: &Ticket) -> Self {
        let name = |r: &Release| r.name.clone();
        Self {
            key: ticket.key().to_string(),
            resolution: ticket.raw.resolution.clone(),
            opening_version: ticket.raw.opening_version.as_ref().map(name),
            injected_version: ticket.injected_version().map(name),
            iv_status: ticket.resolution.iv_status,
            fix_versions: ticket.raw.fix_versions.iter().map(name).collect(),
            affected_versions: ticket
                .affected_versions()
                .map(|versions| versions.iter().map(name).collect()),
        }
    }
}

/// Counts and diagnostics for one dataset build.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    /// Releases in the timeline.
    pub releases: usize,
    /// Releases matched to a tag and partitioned.
    pub matched_releases: usize,
    /// Names of releases no tag matched.
    pub unmatched_releases: Vec<String>,
    /// Repository tags read.
    pub tags: usize,
    /// Commits in the mined history.
    pub commits: usize,
    /// Commits placed in a release window.
    pub partitioned_commits: usize,
    /// Range failure that cut partitioning short, if any.
    pub partition_failure: Option<String>,
    /// Tickets referenced by at least one commit.
    pub linked_tickets: usize,
    /// Commit-ticket links.
    pub links: usize,
    /// Tickets processed.
    pub tickets: usize,
    /// The proportion and its sample diagnostics.
    pub proportion: ProportionEstimate,
    /// Tickets whose injected version came from the tracker.
    pub known: usize,
    /// Tickets with an estimated injected version.
    pub estimated: usize,
    /// Tickets whose injected version fell back to the opening version.
    pub opening_fallback: usize,
    /// Keys of tickets left without an injected version.
    pub unresolved: Vec<String>,
}

/// Summarize a built dataset.
pub fn summarize(dataset: &Dataset) -> DatasetSummary {
    let count = |status: IvStatus| {
        dataset
            .tickets
            .iter()
            .filter(|t| t.resolution.iv_status == status)
            .count()
    };

    DatasetSummary {
        releases: dataset.timeline.len(),
        matched_releases: dataset.partitions.len(),
        unmatched_releases: dataset.unmatched.iter().map(|r| r.name.clone()).collect(),
        tags: dataset.tags.len(),
        commits: dataset.commits.len(),
        partitioned_commits: dataset.partitions.commit_count(),
        partition_failure: dataset.partition_failure.clone(),
        linked_tickets: dataset.links.len(),
        links: dataset.links.values().map(Vec::len).sum(),
        tickets: dataset.tickets.len(),
        proportion: dataset.proportion,
        known: count(IvStatus::Known),
        estimated: count(IvStatus::Estimated),
        opening_fallback: count(IvStatus::OpeningFallback),
        unresolved: dataset.unresolved.clone(),
    }
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Releases: {} ({} matched to tags)",
            self.releases, self.matched_releases
        )?;
        if !self.unmatched_releases.is_empty() {
            writeln!(f, "  unmatched: {}", self.unmatched_releases.join(", "))?;
        }
        writeln!(
            f,
            "Commits: {} ({} partitioned), tags: {}",
            self.commits, self.partitioned_commits, self.tags
        )?;
        if let Some(failure) = &self.partition_failure {
            writeln!(f, "  partial: {failure}")?;
        }
        writeln!(
            f,
            "Links: {} commits across {} tickets",
            self.links, self.linked_tickets
        )?;
        writeln!(
            f,
            "Proportion: p = {:.3} ({} samples, {} degenerate{})",
            self.proportion.p,
            self.proportion.samples,
            self.proportion.degenerate,
            if self.proportion.defaulted { ", default" } else { "" }
        )?;
        writeln!(
            f,
            "Tickets: {} ({} known, {} estimated, {} opening fallback, {} unresolved)",
            self.tickets,
            self.known,
            self.estimated,
            self.opening_fallback,
            self.unresolved.len()
        )?;
        if !self.unresolved.is_empty() {
            writeln!(f, "  unresolved: {}", self.unresolved.join(", "))?;
        }
        Ok(())
    }
}

impl DatasetSummary {
    /// Render the summary as a markdown string.
    ///
    /// # Examples
    ///
    /// ```
    /// use defectmine_core::ReleaseTimeline;
    /// use defectmine_dataset::pipeline::Dataset;
    /// use defectmine_dataset::proportion::compute_proportion;
    /// use defectmine_dataset::report::summarize;
    ///
    /// let dataset = Dataset {
    ///     timeline: ReleaseTimeline::default(),
    ///     unmatched: vec![],
    ///     tags: vec![],
    ///     commits: vec![],
    ///     partitions: Default::default(),
    ///     partition_failure: None,
    ///     links: Default::default(),
    ///     proportion: compute_proportion(&[], 0.5),
    ///     tickets: vec![],
    ///     unresolved: vec![],
    /// };
    /// let md = summarize(&dataset).to_markdown();
    /// assert!(md.contains("# Dataset Summary"));
    /// ```
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Dataset Summary\n\n");
        out.push_str("| Item | Count |\n");
        out.push_str("|------|-------|\n");
        let rows = [
            ("Releases", self.releases),
            ("Matched releases", self.matched_releases),
            ("Tags", self.tags),
            ("Commits", self.commits),
            ("Partitioned commits", self.partitioned_commits),
            ("Linked tickets", self.linked_tickets),
            ("Commit links", self.links),
            ("Tickets", self.tickets),
            ("Known IV", self.known),
            ("Estimated IV", self.estimated),
            ("Opening-version fallback", self.opening_fallback),
            ("Unresolved", self.unresolved.len()),
        ];
        for (item, count) in rows {
            out.push_str(&format!("| {item} | {count} |\n"));
        }
        out.push('\n');

        out.push_str(&format!(
            "**Proportion:** p = {:.3} from {} samples ({} degenerate){}\n",
            self.proportion.p,
            self.proportion.samples,
            self.proportion.degenerate,
            if self.proportion.defaulted { ", default used" } else { "" }
        ));
        if let Some(failure) = &self.partition_failure {
            out.push_str(&format!("\n**Partial partitioning:** {failure}\n"));
        }
        if !self.unmatched_releases.is_empty() {
            out.push_str(&format!(
                "\n**Unmatched releases:** {}\n",
                self.unmatched_releases.join(", ")
            ));
        }
        if !self.unresolved.is_empty() {
            out.push_str(&format!(
                "\n**Unresolved tickets:** {}\n",
                self.unresolved.join(", ")
            ));
        }
        out
    }
}

/// Write the dataset into `dir`, creating it if needed.
///
/// Returns the paths written, in the order listed in the module docs.
///
/// # Errors
///
/// Returns [`DefectmineError::Io`] if the directory or a file cannot be
/// written.
pub fn write_dataset(dir: &Path, dataset: &Dataset) -> Result<Vec<PathBuf>, DefectmineError> {
    std::fs::create_dir_all(dir)?;

    let tags: BTreeMap<&str, &str> = dataset
        .partitions
        .windows()
        .iter()
        .map(|w| (w.release.id.as_str(), w.tag.name.as_str()))
        .collect();
    let releases: Vec<ReleaseRecord> = dataset
        .timeline
        .iter()
        .map(|r| ReleaseRecord {
            id: r.id.clone(),
            name: r.name.clone(),
            date: r.date,
            tag: tags.get(r.id.as_str()).map(|t| t.to_string()),
        })
        .collect();

    let partitions: Vec<PartitionRecord> = dataset
        .partitions
        .windows()
        .iter()
        .map(|w| PartitionRecord {
            release: w.release.name.clone(),
            tag: w.tag.name.clone(),
            commits: w.commits.iter().map(|c| c.hash.clone()).collect(),
        })
        .collect();

    let links: BTreeMap<&str, Vec<&str>> = dataset
        .links
        .iter()
        .map(|(key, commits)| {
            (
                key.as_str(),
                commits.iter().map(|c| c.hash.as_str()).collect(),
            )
        })
        .collect();

    let tickets: Vec<TicketRecord> = dataset.tickets.iter().map(TicketRecord::from).collect();

    let written = vec![
        write_json(dir, "releases.json", &releases)?,
        write_json(dir, "tags.json", &dataset.tags)?,
        write_json(dir, "commits.json", &dataset.commits)?,
        write_json(dir, "partitions.json", &partitions)?,
        write_json(dir, "links.json", &links)?,
        write_json(dir, "tickets.json", &tickets)?,
        write_json(dir, "summary.json", &summarize(dataset))?,
    ];
    tracing::info!(dir = %dir.display(), files = written.len(), "wrote dataset");
    Ok(written)
}

fn write_json<T: Serialize + ?Sized>(
    dir: &Path,
    name: &str,
    value: &T,
) -> Result<PathBuf, DefectmineError> {
    let path = dir.join(name);
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(&path, content)?;
    tracing::debug!(path = %path.display(), "wrote file");
    Ok(path)
}
