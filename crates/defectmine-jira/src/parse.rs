//! Jira REST JSON → releases and raw tickets.
//!
//! Handles the `project/{key}` response (its `versions` array) and the
//! `search` response (`total` plus an `issues` page). Opening versions are
//! derived with [`ReleaseTimeline::release_at`], the same resolver the
//! proportion estimator uses.

use chrono::{DateTime, NaiveDate, Utc};
use defectmine_core::{DefectmineError, RawTicket, Release, ReleaseTimeline};
use serde::Deserialize;

/// `GET /rest/api/2/project/{key}` response; only the versions are read.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectResponse {
    /// Project versions.
    #[serde(default)]
    pub versions: Vec<VersionJson>,
}

/// One project version.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    /// Version id.
    pub id: Option<String>,
    /// Version name.
    pub name: Option<String>,
    /// Release day, `yyyy-MM-dd`.
    pub release_date: Option<String>,
}

/// `GET /rest/api/2/search` response page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    /// Total matching issues reported by Jira.
    #[serde(default)]
    pub total: usize,
    /// Issues on this page.
    #[serde(default)]
    pub issues: Vec<IssueJson>,
}

/// One issue as returned by search.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueJson {
    /// Issue id.
    #[serde(default)]
    pub id: String,
    /// Issue key, e.g. `"BOOKKEEPER-42"`.
    pub key: Option<String>,
    /// Requested fields.
    #[serde(default)]
    pub fields: FieldsJson,
}

/// Issue fields requested by the search.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldsJson {
    /// Resolution, e.g. `{"name": "Fixed"}`.
    pub resolution: Option<NamedJson>,
    /// Creation timestamp.
    pub created: Option<String>,
    /// Affected versions.
    pub versions: Option<Vec<NamedJson>>,
    /// Fix versions.
    pub fix_versions: Option<Vec<NamedJson>>,
    /// Comment block.
    pub comment: Option<CommentBlock>,
}

/// Any object carrying a `name`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedJson {
    /// The name.
    #[serde(default)]
    pub name: String,
}

/// The `comment` field of an issue.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentBlock {
    /// Comments, oldest first.
    #[serde(default)]
    pub comments: Vec<CommentJson>,
}

/// A single comment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentJson {
    /// Comment text.
    #[serde(default)]
    pub body: String,
}

/// Saved search output: one page or a list of pages.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SearchDump {
    Pages(Vec<SearchPage>),
    Page(SearchPage),
}

/// Convert project versions to releases.
///
/// Versions without a `releaseDate` are skipped, as are dates that fail to
/// parse (logged). Release dates are day precision, stored at midnight UTC.
///
/// # Examples
///
/// ```
/// use defectmine_jira::parse::{releases_from_versions, ProjectResponse};
///
/// let project: ProjectResponse = serde_json::from_str(r#"{"versions": [
///     {"id": "1", "name": "4.0.0", "releaseDate": "2011-12-07"},
///     {"id": "2", "name": "4.1.0"}
/// ]}"#).unwrap();
/// let releases = releases_from_versions(&project.versions);
/// assert_eq!(releases.len(), 1);
/// assert_eq!(releases[0].name, "4.0.0");
/// ```
pub fn releases_from_versions(versions: &[VersionJson]) -> Vec<Release> {
    versions
        .iter()
        .filter_map(|version| {
            let raw_date = version.release_date.as_deref()?;
            match NaiveDate::parse_from_str(raw_date, "%Y-%m-%d") {
                Ok(day) => Some(Release::on_day(
                    version.id.clone().unwrap_or_default(),
                    version.name.clone().unwrap_or_default(),
                    day,
                )),
                Err(e) => {
                    tracing::warn!(
                        version = version.name.as_deref().unwrap_or(""),
                        date = raw_date,
                        error = %e,
                        "skipping version with unparseable release date"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Parse a `project/{key}` response into releases.
///
/// # Errors
///
/// Returns [`DefectmineError::Serialization`] if `json` is not a project object.
pub fn parse_releases(json: &str) -> Result<Vec<Release>, DefectmineError> {
    let project: ProjectResponse = serde_json::from_str(json)?;
    Ok(releases_from_versions(&project.versions))
}

/// Parse a Jira timestamp such as `2013-05-12T10:32:11.000+0000`.
///
/// RFC 3339 timestamps are accepted as well.
///
/// # Errors
///
/// Returns [`DefectmineError::Parse`] for any other shape.
///
/// # Examples
///
/// ```
/// use defectmine_jira::parse::parse_timestamp;
///
/// let ts = parse_timestamp("2013-05-12T10:32:11.000+0200").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2013-05-12T08:32:11+00:00");
/// ```
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DefectmineError> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.3f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DefectmineError::Parse(format!("invalid timestamp '{raw}': {e}")))
}

/// Map version names onto timeline releases, sorted by date.
///
/// Names unknown to the timeline (typically unreleased versions) are dropped.
fn resolve_versions(names: Option<&[NamedJson]>, timeline: &ReleaseTimeline) -> Vec<Release> {
    let mut releases: Vec<Release> = names
        .unwrap_or_default()
        .iter()
        .filter_map(|v| timeline.by_name(&v.name).cloned())
        .collect();
    releases.sort_by_key(|r| r.date);
    releases
}

/// Build a raw ticket from one issue.
///
/// - opening version: release active at the creation timestamp
/// - injected version: earliest reported affected version, if any
/// - fix versions: reported fix versions known to the timeline, by date
/// - description: body of the first comment
///
/// Returns `None` for issues without a key.
pub fn ticket_from_issue(issue: &IssueJson, timeline: &ReleaseTimeline) -> Option<RawTicket> {
    let key = issue.key.clone()?;
    let fields = &issue.fields;

    let opening_version = match fields.created.as_deref().map(parse_timestamp) {
        Some(Ok(created)) => timeline.release_at(created).cloned(),
        Some(Err(e)) => {
            tracing::warn!(ticket = %key, error = %e, "cannot derive opening version");
            None
        }
        None => None,
    };

    let affected = resolve_versions(fields.versions.as_deref(), timeline);
    let fix_versions = resolve_versions(fields.fix_versions.as_deref(), timeline);

    let description = fields
        .comment
        .as_ref()
        .and_then(|c| c.comments.first())
        .map(|c| c.body.clone())
        .unwrap_or_default();

    Some(RawTicket {
        id: issue.id.clone(),
        key,
        resolution: fields
            .resolution
            .as_ref()
            .map(|r| r.name.clone())
            .unwrap_or_default(),
        description,
        opening_version,
        injected_version: affected.into_iter().next(),
        fix_versions,
    })
}

/// Convert every keyed issue on a page into a raw ticket.
pub fn tickets_from_page(page: &SearchPage, timeline: &ReleaseTimeline) -> Vec<RawTicket> {
    page.issues
        .iter()
        .filter_map(|issue| ticket_from_issue(issue, timeline))
        .collect()
}

/// Parse saved search output (a single page or an array of pages).
///
/// # Errors
///
/// Returns [`DefectmineError::Serialization`] if `json` matches neither shape.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use defectmine_core::{Release, ReleaseTimeline};
/// use defectmine_jira::parse::parse_tickets;
///
/// let timeline = ReleaseTimeline::new(vec![
///     Release::on_day("1", "1.0", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()),
///     Release::on_day("2", "1.1", NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()),
/// ]);
/// let json = r#"{"total": 1, "issues": [{
///     "id": "100", "key": "PROJ-7",
///     "fields": {"created": "2020-02-03T10:00:00.000+0000",
///                "fixVersions": [{"name": "1.1"}]}
/// }]}"#;
/// let tickets = parse_tickets(json, &timeline).unwrap();
/// assert_eq!(tickets[0].opening_version.as_ref().unwrap().name, "1.0");
/// assert_eq!(tickets[0].fix_versions[0].name, "1.1");
/// ```
pub fn parse_tickets(
    json: &str,
    timeline: &ReleaseTimeline,
) -> Result<Vec<RawTicket>, DefectmineError> {
    let pages = match serde_json::from_str::<SearchDump>(json)? {
        SearchDump::Pages(pages) => pages,
        SearchDump::Page(page) => vec![page],
    };
    Ok(pages
        .iter()
        .flat_map(|page| tickets_from_page(page, timeline))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline() -> ReleaseTimeline {
        let json = r#"{"versions": [
            {"id": "10", "name": "1.0", "releaseDate": "2020-01-01"},
            {"id": "11", "name": "1.1", "releaseDate": "2020-03-01"},
            {"id": "12", "name": "2.0", "releaseDate": "2020-06-01"},
            {"id": "13", "name": "3.0-SNAPSHOT"}
        ]}"#;
        ReleaseTimeline::new(parse_releases(json).unwrap())
    }

    #[test]
    fn versions_without_date_are_skipped() {
        let t = timeline();
        assert_eq!(t.len(), 3);
        assert!(t.by_name("3.0-SNAPSHOT").is_none());
        assert_eq!(t.by_name("1.1").unwrap().id, "11");
    }

    #[test]
    fn malformed_release_date_is_skipped() {
        let releases = parse_releases(
            r#"{"versions": [{"id": "1", "name": "x", "releaseDate": "soon"}]}"#,
        )
        .unwrap();
        assert!(releases.is_empty());
    }

    #[test]
    fn issue_fields_map_to_raw_ticket() {
        let json = r#"{"total": 1, "issues": [{
            "id": "5001", "key": "PROJ-12",
            "fields": {
                "resolution": {"name": "Fixed"},
                "created": "2020-03-15T09:30:00.000+0000",
                "versions": [{"name": "1.1"}, {"name": "1.0"}, {"name": "9.9"}],
                "fixVersions": [{"name": "2.0"}, {"name": "1.1"}],
                "comment": {"comments": [{"body": "first"}, {"body": "second"}]}
            }
        }]}"#;
        let tickets = parse_tickets(json, &timeline()).unwrap();
        assert_eq!(tickets.len(), 1);
        let t = &tickets[0];
        assert_eq!(t.id, "5001");
        assert_eq!(t.key, "PROJ-12");
        assert_eq!(t.resolution, "Fixed");
        assert_eq!(t.description, "first");
        assert_eq!(t.opening_version.as_ref().unwrap().name, "1.1");
        assert_eq!(t.injected_version.as_ref().unwrap().name, "1.0");
        let fixes: Vec<_> = t.fix_versions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(fixes, ["1.1", "2.0"]);
    }

    #[test]
    fn missing_fields_leave_ticket_unresolved() {
        let json = r#"{"issues": [{"id": "1", "key": "PROJ-1", "fields": {
            "resolution": null, "versions": null, "fixVersions": []
        }}]}"#;
        let tickets = parse_tickets(json, &timeline()).unwrap();
        let t = &tickets[0];
        assert!(t.opening_version.is_none());
        assert!(t.injected_version.is_none());
        assert!(t.fix_versions.is_empty());
        assert_eq!(t.resolution, "");
    }

    #[test]
    fn created_before_first_release_has_no_opening_version() {
        let json = r#"{"issues": [{"id": "1", "key": "PROJ-1", "fields": {
            "created": "2019-05-01T00:00:00.000+0000"
        }}]}"#;
        let tickets = parse_tickets(json, &timeline()).unwrap();
        assert!(tickets[0].opening_version.is_none());
    }

    #[test]
    fn issues_without_key_are_dropped() {
        let json = r#"{"issues": [{"id": "1", "fields": {}}]}"#;
        assert!(parse_tickets(json, &timeline()).unwrap().is_empty());
    }

    #[test]
    fn page_arrays_are_flattened() {
        let json = r#"[
            {"total": 2, "issues": [{"id": "1", "key": "PROJ-1", "fields": {}}]},
            {"total": 2, "issues": [{"id": "2", "key": "PROJ-2", "fields": {}}]}
        ]"#;
        let keys: Vec<_> = parse_tickets(json, &timeline())
            .unwrap()
            .into_iter()
            .map(|t| t.key)
            .collect();
        assert_eq!(keys, ["PROJ-1", "PROJ-2"]);
    }

    #[test]
    fn timestamp_accepts_rfc3339() {
        let ts = parse_timestamp("2020-01-01T00:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2020-01-01T00:00:00+00:00");
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(DefectmineError::Parse(_))
        ));
    }

    #[tracing_test::traced_test]
    #[test]
    fn bad_created_timestamp_is_logged() {
        let json = r#"{"issues": [{"id": "1", "key": "PROJ-1", "fields": {"created": "nope"}}]}"#;
        let tickets = parse_tickets(json, &timeline()).unwrap();
        assert!(tickets[0].opening_version.is_none());
        assert!(logs_contain("cannot derive opening version"));
    }
}
