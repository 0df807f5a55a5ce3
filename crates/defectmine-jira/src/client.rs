use std::time::Duration;

use defectmine_core::{DefectmineError, JiraConfig, RawTicket, Release, ReleaseTimeline};

use crate::parse::{self, ProjectResponse, SearchPage};

/// Fields requested for every issue.
const ISSUE_FIELDS: &str = "id,key,resolution,created,versions,fixVersions,comment";

/// Jira REST client for project versions and ticket search.
///
/// # Examples
///
/// ```
/// use defectmine_core::JiraConfig;
/// use defectmine_jira::JiraClient;
///
/// let client = JiraClient::new(&JiraConfig::default()).unwrap();
/// assert_eq!(client.base_url(), "https://issues.apache.org/jira");
/// ```
pub struct JiraClient {
    http: reqwest::Client,
    config: JiraConfig,
}

impl JiraClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DefectmineError::Jira`] if the HTTP client cannot be built.
    pub fn new(config: &JiraConfig) -> Result<Self, DefectmineError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("defectmine/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DefectmineError::Jira(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Fetch the project's dated versions as releases.
    ///
    /// # Errors
    ///
    /// Returns [`DefectmineError::Jira`] on HTTP errors or unexpected payloads.
    pub async fn fetch_releases(&self, project: &str) -> Result<Vec<Release>, DefectmineError> {
        let url = format!("{}/rest/api/2/project/{project}", self.base_url());
        tracing::info!(%url, "fetching project versions");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DefectmineError::Jira(format!("request to {url} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DefectmineError::Jira(format!(
                "project request returned {status}: {body}"
            )));
        }

        let project: ProjectResponse = response
            .json()
            .await
            .map_err(|e| DefectmineError::Jira(format!("failed to parse project response: {e}")))?;
        let releases = parse::releases_from_versions(&project.versions);
        tracing::info!(
            versions = project.versions.len(),
            releases = releases.len(),
            "read project versions"
        );
        Ok(releases)
    }

    /// Fetch every ticket matching the configured filter, page by page.
    ///
    /// Paging stops once `total` issues were read or a page comes back empty.
    ///
    /// # Errors
    ///
    /// Returns [`DefectmineError::Jira`] on HTTP errors or unexpected payloads.
    pub async fn fetch_tickets(
        &self,
        project: &str,
        timeline: &ReleaseTimeline,
    ) -> Result<Vec<RawTicket>, DefectmineError> {
        let mut tickets = Vec::new();
        let mut start_at = 0;
        let mut total = None;

        loop {
            let page = self.search_page(project, start_at).await?;
            let expected = *total.get_or_insert(page.total);
            if page.issues.is_empty() {
                break;
            }
            start_at += page.issues.len();
            tickets.extend(parse::tickets_from_page(&page, timeline));
            tracing::debug!(read = start_at, total = expected, "fetched search page");
            if start_at >= expected {
                break;
            }
        }

        tracing::info!(
            tickets = tickets.len(),
            reported = total.unwrap_or(0),
            "fetched tickets"
        );
        Ok(tickets)
    }

    /// Search query for `project` combined with the configured filter.
    pub fn jql(&self, project: &str) -> String {
        format!("project = {project} AND {}", self.config.jql)
    }

    async fn search_page(
        &self,
        project: &str,
        start_at: usize,
    ) -> Result<SearchPage, DefectmineError> {
        let url = format!("{}/rest/api/2/search", self.base_url());
        let jql = self.jql(project);
        let start = start_at.to_string();
        let max = self.config.page_size.to_string();

        let response = self
            .http
            .get(&url)
            .query(&[
                ("jql", jql.as_str()),
                ("fields", ISSUE_FIELDS),
                ("startAt", start.as_str()),
                ("maxResults", max.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DefectmineError::Jira(format!("request to {url} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DefectmineError::Jira(format!(
                "search returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DefectmineError::Jira(format!("failed to parse search response: {e}")))
    }
}
