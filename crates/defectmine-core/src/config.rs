use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DefectmineError;

/// Top-level configuration loaded from `.defectmine.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use defectmine_core::DefectmineConfig;
///
/// let config = DefectmineConfig::default();
/// assert_eq!(config.proportion.default_p, 0.5);
/// assert_eq!(config.jira.page_size, 100);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefectmineConfig {
    /// Project identity.
    #[serde(default)]
    pub project: ProjectConfig,
    /// Issue-tracker settings.
    #[serde(default)]
    pub jira: JiraConfig,
    /// Repository settings.
    #[serde(default)]
    pub git: GitConfig,
    /// Proportion estimator settings.
    #[serde(default)]
    pub proportion: ProportionConfig,
    /// Commit partitioning settings.
    #[serde(default)]
    pub partition: PartitionConfig,
    /// Result sink settings.
    #[serde(default)]
    pub output: OutputConfig,
}

impl DefectmineConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DefectmineError::FileNotFound`] if `path` does not exist,
    /// [`DefectmineError::Io`] if the file cannot be read, or
    /// [`DefectmineError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use defectmine_core::DefectmineConfig;
    /// use std::path::Path;
    ///
    /// let config = DefectmineConfig::from_file(Path::new(".defectmine.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, DefectmineError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DefectmineError::FileNotFound(path.to_path_buf()),
            _ => DefectmineError::Io(e),
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`DefectmineError::Toml`] if parsing fails, or
    /// [`DefectmineError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use defectmine_core::DefectmineConfig;
    ///
    /// let toml = r#"
    /// [project]
    /// key = "BOOKKEEPER"
    /// "#;
    /// let config = DefectmineConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.project.key.as_deref(), Some("BOOKKEEPER"));
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, DefectmineError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), DefectmineError> {
        if !self.proportion.default_p.is_finite() || self.proportion.default_p < 0.0 {
            return Err(DefectmineError::Config(format!(
                "proportion.default_p must be a non-negative number, got {}",
                self.proportion.default_p
            )));
        }
        if self.jira.page_size == 0 {
            return Err(DefectmineError::Config(
                "jira.page_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Project identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Issue-tracker project key, e.g. `"BOOKKEEPER"`.
    pub key: Option<String>,
}

/// Issue-tracker configuration.
///
/// # Examples
///
/// ```
/// use defectmine_core::JiraConfig;
///
/// let config = JiraConfig::default();
/// assert_eq!(config.base_url, "https://issues.apache.org/jira");
/// assert!(config.jql.contains("resolution = Fixed"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    /// Base URL of the Jira instance.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Filter appended to `project = <key>` when searching tickets.
    #[serde(default = "default_jql")]
    pub jql: String,
    /// Issues requested per search page (default: 100).
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_base_url() -> String {
    "https://issues.apache.org/jira".into()
}

fn default_jql() -> String {
    "issuetype = Bug AND status in (Resolved, Closed) AND resolution = Fixed".into()
}

fn default_page_size() -> usize {
    100
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            jql: default_jql(),
            page_size: default_page_size(),
        }
    }
}

/// Repository configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Path to the repository (default: current directory).
    #[serde(default = "default_git_path")]
    pub path: PathBuf,
    /// Branch to walk for the full history (default: HEAD).
    pub branch: Option<String>,
}

fn default_git_path() -> PathBuf {
    PathBuf::from(".")
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            path: default_git_path(),
            branch: None,
        }
    }
}

/// Proportion estimator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProportionConfig {
    /// Proportion used when no ticket yields a usable sample (default: 0.5).
    #[serde(default = "default_p")]
    pub default_p: f64,
}

fn default_p() -> f64 {
    0.5
}

impl Default for ProportionConfig {
    fn default() -> Self {
        Self {
            default_p: default_p(),
        }
    }
}

/// Commit partitioning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Keep windows computed before a failed range query (default: true).
    #[serde(default = "default_keep_partial")]
    pub keep_partial: bool,
}

fn default_keep_partial() -> bool {
    true
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            keep_partial: default_keep_partial(),
        }
    }
}

/// Result sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the dataset files (default: `defectmine-out`).
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("defectmine-out")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}
