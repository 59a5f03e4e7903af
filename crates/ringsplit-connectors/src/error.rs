//! Typed errors for the connectors crate.

use thiserror::Error;

/// Errors that can occur while talking to a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    /// The cluster could not be reached. Transient: the caller may retry.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The keyspace or table does not exist.
    #[error("schema not found: {keyspace}.{table}")]
    SchemaNotFound { keyspace: String, table: String },

    /// The URI scheme is not supported by any registered connector.
    #[error("unsupported URI: {0}")]
    UnsupportedUri(String),

    /// A query against the cluster failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Invalid or missing configuration.
    #[error("config error: {0}")]
    ConfigError(String),
}

impl ConnectorError {
    pub fn schema_not_found(keyspace: &str, table: &str) -> Self {
        ConnectorError::SchemaNotFound {
            keyspace: keyspace.to_string(),
            table: table.to_string(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ConnectorError::ConnectionFailed(_))
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(e: serde_json::Error) -> Self {
        ConnectorError::ConfigError(e.to_string())
    }
}

impl From<std::io::Error> for ConnectorError {
    fn from(e: std::io::Error) -> Self {
        ConnectorError::ConfigError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ConnectorError::schema_not_found("app", "users");
        assert_eq!(err.to_string(), "schema not found: app.users");
        let err = ConnectorError::ConnectionFailed("host unreachable".to_string());
        assert_eq!(err.to_string(), "connection failed: host unreachable");
    }

    #[test]
    fn test_only_connection_failures_are_transient() {
        assert!(ConnectorError::ConnectionFailed("x".into()).is_transient());
        assert!(!ConnectorError::schema_not_found("a", "b").is_transient());
        assert!(!ConnectorError::QueryFailed("x".into()).is_transient());
    }
}
