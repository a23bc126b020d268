//! Query-related data models.
//!
//! This module defines types for query results and the fixed limits every
//! query runs under.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default row cap for query results.
pub const DEFAULT_ROW_LIMIT: u32 = 1000;

/// Maximum allowed row cap.
pub const MAX_ROW_LIMIT: u32 = 10000;

/// Default statement timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Maximum statement timeout in seconds.
pub const MAX_QUERY_TIMEOUT_SECS: u64 = 300;

/// Default number of sample rows per table in `get_all_schemas`.
pub const DEFAULT_SAMPLE_ROWS: u32 = 5;

/// Limits applied to every statement. Fixed at startup, never caller-controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub row_limit: u32,
    pub timeout: Duration,
    pub sample_rows: u32,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            row_limit: DEFAULT_ROW_LIMIT,
            timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnMetadata {
    pub name: String,
    /// PostgreSQL type name (e.g., `INT4`, `TEXT`, `JSONB`)
    pub type_name: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// True if more rows existed than the row cap allowed
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Get the number of rows returned.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = QueryLimits::default();
        assert_eq!(limits.row_limit, DEFAULT_ROW_LIMIT);
        assert_eq!(limits.timeout, Duration::from_secs(30));
        assert_eq!(limits.sample_rows, 5);
    }

    #[test]
    fn test_query_result_empty() {
        let result = QueryResult::default();
        assert!(result.is_empty());
        assert_eq!(result.row_count(), 0);
        assert!(!result.truncated);
    }
}
