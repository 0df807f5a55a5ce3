use std::path::PathBuf;

/// Errors that can occur across defectmine.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to a `miette` report at the boundary.
///
/// # Examples
///
/// ```
/// use defectmine_core::DefectmineError;
///
/// let err = DefectmineError::Config("missing project key".into());
/// assert!(err.to_string().contains("missing project key"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DefectmineError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    Git(String),

    /// An ancestry-range query (`start..end`) could not be answered.
    #[error("range query {range} failed: {reason}")]
    RangeQuery {
        /// The range in `start..end` notation.
        range: String,
        /// Underlying failure.
        reason: String,
    },

    /// Issue-tracker API or response error.
    #[error("Jira error: {0}")]
    Jira(String),

    /// Malformed input data (dates, JSON shapes).
    #[error("parse error: {0}")]
    Parse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DefectmineError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = DefectmineError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn range_query_names_the_range() {
        let err = DefectmineError::RangeQuery {
            range: "abc..def".into(),
            reason: "object not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "range query abc..def failed: object not found"
        );
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = DefectmineError::FileNotFound(PathBuf::from("/tmp/issues.json"));
        assert!(err.to_string().contains("/tmp/issues.json"));
    }
}
