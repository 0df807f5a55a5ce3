use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A project release as published by the issue tracker.
///
/// Releases often carry only day precision; those are stored at the start of
/// the day in UTC.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use defectmine_core::Release;
///
/// let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
/// let release = Release::on_day("10010", "4.2.0", day);
/// assert_eq!(release.date.to_rfc3339(), "2020-01-01T00:00:00+00:00");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    /// Tracker-side version identifier.
    pub id: String,
    /// Display name, e.g. `"4.2.0"`.
    pub name: String,
    /// Release date.
    pub date: DateTime<Utc>,
}

impl Release {
    /// Create a release with a full timestamp.
    pub fn new(id: impl Into<String>, name: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            date,
        }
    }

    /// Create a release dated at the start of `day` (UTC).
    pub fn on_day(id: impl Into<String>, name: impl Into<String>, day: NaiveDate) -> Self {
        Self::new(id, name, day.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.date.format("%Y-%m-%d"))
    }
}

/// A version-control tag resolved to the commit it points at.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use defectmine_core::Tag;
///
/// let date = Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
/// let tag = Tag::new("refs/tags/release-4.2.0", "9fceb02", date);
/// assert_eq!(tag.name, "release-4.2.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Tag name without the `refs/tags/` namespace.
    pub name: String,
    /// Full hash of the tagged commit.
    pub commit_id: String,
    /// Authorship date of the tagged commit.
    pub commit_date: DateTime<Utc>,
}

impl Tag {
    /// Build a tag, stripping any `refs/tags/` prefix from `name`.
    pub fn new(name: &str, commit_id: impl Into<String>, commit_date: DateTime<Utc>) -> Self {
        Self {
            name: name.strip_prefix("refs/tags/").unwrap_or(name).to_string(),
            commit_id: commit_id.into(),
            commit_date,
        }
    }
}

/// A single commit from repository history.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use defectmine_core::Commit;
///
/// let commit = Commit {
///     hash: "9fceb02d0ae598e95dc970b74767f19372d61af8".into(),
///     author: "alice".into(),
///     timestamp: Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap(),
///     message: "BOOKKEEPER-42: fix ledger recovery".into(),
/// };
/// assert_eq!(commit.short_hash(), "9fceb02d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// Full commit hash.
    pub hash: String,
    /// Author name.
    pub author: String,
    /// Authorship timestamp.
    pub timestamp: DateTime<Utc>,
    /// Full commit message.
    pub message: String,
}

impl Commit {
    /// First eight characters of the hash.
    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(8)]
    }
}

/// A ticket as delivered by the ticket source, before estimation.
///
/// Everything here is fixed at creation. The injected version is only present
/// when the tracker already established it (earliest reported affected
/// version); the estimator never writes into this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTicket {
    /// Tracker-internal identifier.
    pub id: String,
    /// Human-readable key, e.g. `"BOOKKEEPER-42"`.
    pub key: String,
    /// Resolution label, e.g. `"Fixed"`.
    pub resolution: String,
    /// Free-text description or first comment.
    pub description: String,
    /// Release active when the ticket was created.
    pub opening_version: Option<Release>,
    /// Injected version established by the tracker, if any.
    pub injected_version: Option<Release>,
    /// Fix versions, ascending by date.
    pub fix_versions: Vec<Release>,
}

impl RawTicket {
    /// Sort fix versions ascending by date (stable).
    pub fn sort_fix_versions(&mut self) {
        self.fix_versions.sort_by_key(|r| r.date);
    }

    /// The latest fix version.
    pub fn last_fix_version(&self) -> Option<&Release> {
        self.fix_versions.last()
    }

    /// Whether the injected version was known before estimation.
    pub fn iv_status(&self) -> IvStatus {
        if self.injected_version.is_some() {
            IvStatus::Known
        } else {
            IvStatus::Unknown
        }
    }
}

/// How a ticket's injected version came to be.
///
/// # Examples
///
/// ```
/// use defectmine_core::IvStatus;
///
/// assert!(IvStatus::Estimated.is_resolved());
/// assert!(!IvStatus::Unknown.is_resolved());
/// assert_eq!(IvStatus::OpeningFallback.to_string(), "opening-fallback");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IvStatus {
    /// Supplied by the tracker.
    Known,
    /// Not yet estimated, or impossible to estimate.
    Unknown,
    /// Estimated with the proportion technique.
    Estimated,
    /// Estimation failed the `IV < OV` check; IV set to the opening version.
    OpeningFallback,
}

impl IvStatus {
    /// `true` once an injected version has been established.
    pub fn is_resolved(self) -> bool {
        !matches!(self, IvStatus::Unknown)
    }
}

impl fmt::Display for IvStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IvStatus::Known => write!(f, "known"),
            IvStatus::Unknown => write!(f, "unknown"),
            IvStatus::Estimated => write!(f, "estimated"),
            IvStatus::OpeningFallback => write!(f, "opening-fallback"),
        }
    }
}

/// Fields computed by the proportion estimator for one ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResolution {
    /// Resolved injected version; `None` if the ticket is unresolvable.
    pub injected_version: Option<Release>,
    /// Provenance of `injected_version`.
    pub iv_status: IvStatus,
    /// Releases in `[IV, last FV)`; `None` when not computable.
    pub affected_versions: Option<Vec<Release>>,
}

/// A raw ticket merged with its resolution.
///
/// # Examples
///
/// ```
/// use defectmine_core::{IvStatus, RawTicket, Ticket, TicketResolution};
///
/// let raw = RawTicket {
///     id: "1".into(),
///     key: "PROJ-1".into(),
///     resolution: "Fixed".into(),
///     description: String::new(),
///     opening_version: None,
///     injected_version: None,
///     fix_versions: vec![],
/// };
/// let ticket = Ticket::new(raw, TicketResolution {
///     injected_version: None,
///     iv_status: IvStatus::Unknown,
///     affected_versions: None,
/// });
/// assert!(ticket.affected_versions().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Immutable tracker data.
    pub raw: RawTicket,
    /// Estimator output.
    pub resolution: TicketResolution,
}

impl Ticket {
    /// Merge a raw ticket with its resolution.
    pub fn new(raw: RawTicket, resolution: TicketResolution) -> Self {
        Self { raw, resolution }
    }

    /// Ticket key.
    pub fn key(&self) -> &str {
        &self.raw.key
    }

    /// Resolved injected version.
    pub fn injected_version(&self) -> Option<&Release> {
        self.resolution.injected_version.as_ref()
    }

    /// Computed affected versions.
    pub fn affected_versions(&self) -> Option<&[Release]> {
        self.resolution.affected_versions.as_deref()
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use defectmine_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
