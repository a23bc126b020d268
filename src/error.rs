//! Error types for the read-only gateway.
//!
//! Every failure a tool call can produce is a distinct, named variant so the
//! calling assistant can decide whether to retry, rephrase, or give up.
//! Messages carry the environment that was attempted and never include
//! connection strings or credentials.

use thiserror::Error;

use crate::tools::sql_validator::RejectionReason;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Unknown environment '{requested}'. Configured environments: {}", format_available(.available))]
    UnknownEnvironment {
        requested: String,
        available: Vec<String>,
    },

    #[error("Connection to environment '{environment}' failed: {message}")]
    ConnectionFailed {
        environment: String,
        message: String,
        suggestion: String,
    },

    #[error("Connection pool for environment '{environment}' exhausted after waiting {waited_secs}s")]
    PoolExhausted {
        environment: String,
        waited_secs: u64,
    },

    #[error("Connection pool for environment '{environment}' has been shut down")]
    PoolShutdown { environment: String },

    #[error("Query rejected: {reason}")]
    Rejected { reason: RejectionReason },

    #[error("Query on environment '{environment}' exceeded the {timeout_secs}s statement timeout")]
    QueryTimeout {
        environment: String,
        timeout_secs: u64,
    },

    #[error("Query on environment '{environment}' failed: {message}")]
    QueryFailed {
        environment: String,
        message: String,
        /// e.g., "42501" for insufficient privilege
        sql_state: Option<String>,
    },

    #[error("Table '{table}' not found in environment '{environment}'")]
    TableNotFound { environment: String, table: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "(none)".to_string()
    } else {
        available.join(", ")
    }
}

impl DbError {
    /// Create an unknown environment error listing what is configured.
    pub fn unknown_environment(requested: impl Into<String>, available: Vec<String>) -> Self {
        Self::UnknownEnvironment {
            requested: requested.into(),
            available,
        }
    }

    /// Create a connection failure with a remediation hint.
    pub fn connection_failed(
        environment: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::ConnectionFailed {
            environment: environment.into(),
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn pool_exhausted(environment: impl Into<String>, waited_secs: u64) -> Self {
        Self::PoolExhausted {
            environment: environment.into(),
            waited_secs,
        }
    }

    pub fn pool_shutdown(environment: impl Into<String>) -> Self {
        Self::PoolShutdown {
            environment: environment.into(),
        }
    }

    pub fn rejected(reason: RejectionReason) -> Self {
        Self::Rejected { reason }
    }

    pub fn query_timeout(environment: impl Into<String>, timeout_secs: u64) -> Self {
        Self::QueryTimeout {
            environment: environment.into(),
            timeout_secs,
        }
    }

    /// Create a query failure with optional SQL state.
    pub fn query_failed(
        environment: impl Into<String>,
        message: impl Into<String>,
        sql_state: Option<String>,
    ) -> Self {
        Self::QueryFailed {
            environment: environment.into(),
            message: message.into(),
            sql_state,
        }
    }

    pub fn table_not_found(environment: impl Into<String>, table: impl Into<String>) -> Self {
        Self::TableNotFound {
            environment: environment.into(),
            table: table.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownEnvironment { .. } => "unknown_environment",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::PoolExhausted { .. } => "pool_exhausted",
            Self::PoolShutdown { .. } => "pool_shutdown",
            Self::Rejected { .. } => "rejected",
            Self::QueryTimeout { .. } => "query_timeout",
            Self::QueryFailed { .. } => "query_failed",
            Self::TableNotFound { .. } => "table_not_found",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Internal { .. } => "internal",
        }
    }

    /// Environment the failing call targeted, when one was resolved.
    pub fn environment(&self) -> Option<&str> {
        match self {
            Self::ConnectionFailed { environment, .. }
            | Self::PoolExhausted { environment, .. }
            | Self::PoolShutdown { environment }
            | Self::QueryTimeout { environment, .. }
            | Self::QueryFailed { environment, .. }
            | Self::TableNotFound { environment, .. } => Some(environment),
            _ => None,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::UnknownEnvironment { .. } => {
                Some("Pass one of the configured environments, or omit it to use the default")
            }
            Self::ConnectionFailed { suggestion, .. } => Some(suggestion),
            Self::PoolExhausted { .. } => {
                Some("All connections are busy; retry shortly or raise max_connections")
            }
            Self::Rejected { reason } => Some(reason.suggestion()),
            Self::QueryTimeout { .. } => {
                Some("Narrow the query with WHERE clauses or aggregates so it finishes in time")
            }
            Self::QueryFailed { .. } => Some("Check the SQL syntax, referenced objects and privileges"),
            Self::TableNotFound { .. } => {
                Some("Use list_tables to see available tables; qualify non-public tables as schema.table")
            }
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::PoolExhausted { .. } | Self::QueryTimeout { .. }
        )
    }
}

/// Result type alias for gateway operations.
pub type DbResult<T> = Result<T, DbError>;

/// Build the structured `data` payload attached to MCP errors.
fn error_data(err: &DbError) -> serde_json::Value {
    let mut data = serde_json::json!({ "kind": err.kind() });
    if let Some(environment) = err.environment() {
        data["environment"] = serde_json::Value::from(environment);
    }
    if let Some(suggestion) = err.suggestion() {
        data["suggestion"] = serde_json::Value::from(suggestion);
    }
    if let DbError::Rejected { reason } = err {
        data["rule"] = serde_json::Value::from(reason.rule());
    }
    data
}

/// Convert DbError to MCP ErrorData for semantic error categorization.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        let data = Some(error_data(&err));
        match &err {
            // Caller can fix these by changing arguments
            DbError::UnknownEnvironment { .. }
            | DbError::Rejected { .. }
            | DbError::InvalidInput { .. } => rmcp::ErrorData::invalid_params(err.to_string(), data),

            DbError::QueryFailed { sql_state, .. } => {
                let msg = match sql_state {
                    Some(code) => format!("{} (SQLSTATE: {})", err, code),
                    None => err.to_string(),
                };
                rmcp::ErrorData::invalid_params(msg, data)
            }

            DbError::TableNotFound { .. } => rmcp::ErrorData::resource_not_found(err.to_string(), data),

            // Environment-side conditions
            DbError::ConnectionFailed { .. }
            | DbError::PoolExhausted { .. }
            | DbError::PoolShutdown { .. }
            | DbError::QueryTimeout { .. }
            | DbError::Internal { .. } => rmcp::ErrorData::internal_error(err.to_string(), data),
        }
    }
}
