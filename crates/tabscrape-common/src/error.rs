//! Error types for tabscrape

use std::time::Duration;

/// Result type alias using ScrapeError
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Main error type for the query execution core
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The shell could not be spawned or exited non-zero
    #[error("Query execution failed: {0}")]
    Execution(String),

    /// The shell did not finish within its time budget
    #[error("Query timeout after {0:?}")]
    QueryTimeout(Duration),

    /// The shell ran but reported a database error on stderr
    #[error("SQL Error: {0}")]
    RemoteSql(String),

    /// The transcript could not be turned into rows
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ScrapeError {
    /// Get the error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            ScrapeError::Execution(_) => "EXECUTION_FAILED",
            ScrapeError::QueryTimeout(_) => "DEADLINE_EXCEEDED",
            ScrapeError::RemoteSql(_) => "REMOTE_SQL_ERROR",
            ScrapeError::Parse(_) => "PARSE_ERROR",
            ScrapeError::Config(_) => "CONFIG_ERROR",
            ScrapeError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// True for failures of the subprocess itself (spawn, exit status, timeout)
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            ScrapeError::Execution(_) | ScrapeError::QueryTimeout(_)
        )
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        ScrapeError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for ScrapeError {
    fn from(err: config::ConfigError) -> Self {
        ScrapeError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ScrapeError::Parse("x".into()).code(), "PARSE_ERROR");
        assert_eq!(
            ScrapeError::QueryTimeout(Duration::from_secs(30)).code(),
            "DEADLINE_EXCEEDED"
        );
    }

    #[test]
    fn test_execution_grouping() {
        assert!(ScrapeError::Execution("exit 1".into()).is_execution_failure());
        assert!(ScrapeError::QueryTimeout(Duration::from_secs(1)).is_execution_failure());
        assert!(!ScrapeError::RemoteSql("ERROR".into()).is_execution_failure());
        assert!(!ScrapeError::Parse("dup".into()).is_execution_failure());
    }

    #[test]
    fn test_config_error_conversion() {
        let err = ScrapeError::from(config::ConfigError::Message("bad list".into()));
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(!err.is_execution_failure());
    }

    #[test]
    fn test_remote_error_keeps_stderr_verbatim() {
        let err = ScrapeError::RemoteSql("[ISQL]ERROR: Could not SQLExecute".into());
        assert_eq!(err.to_string(), "SQL Error: [ISQL]ERROR: Could not SQLExecute");
    }
}
