//! Query execution tool.
//!
//! This module implements the `database_query` MCP tool. Only single SELECT
//! or WITH statements are accepted; everything else is rejected before a
//! connection is acquired.

use crate::db::{EnvironmentRegistry, QueryExecutor};
use crate::error::DbResult;
use crate::models::{ColumnMetadata, Environment, QueryResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Input for the database_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// Single read-only SQL statement (SELECT or WITH). Writes and DDL are rejected.
    pub query: String,
    /// Target environment: local, dev/development, staging/stg, prod/production. Omit for the default.
    #[serde(default)]
    pub environment: Option<String>,
}

/// Output from the database_query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryOutput {
    /// Environment the statement ran against
    pub environment: Environment,
    /// Column names and PostgreSQL types
    pub columns: Vec<ColumnMetadata>,
    /// Result rows as key-value maps
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// Number of rows returned
    pub row_count: usize,
    /// True if more rows existed than the configured row limit
    pub truncated: bool,
    /// Query execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryOutput {
    pub fn from_result(environment: Environment, result: QueryResult) -> Self {
        Self {
            environment,
            row_count: result.row_count(),
            columns: result.columns,
            rows: result.rows,
            truncated: result.truncated,
            execution_time_ms: result.execution_time_ms,
        }
    }
}

/// Handler for query execution.
#[derive(Debug)]
pub struct QueryToolHandler {
    registry: Arc<EnvironmentRegistry>,
    executor: Arc<QueryExecutor>,
}

impl QueryToolHandler {
    pub fn new(registry: Arc<EnvironmentRegistry>, executor: Arc<QueryExecutor>) -> Self {
        Self { registry, executor }
    }

    /// Handle the database_query tool call.
    pub async fn query(&self, input: QueryInput) -> DbResult<QueryOutput> {
        let env = self.registry.resolve(input.environment.as_deref())?;
        let result = self.executor.execute(env, &input.query).await?;

        info!(
            environment = %env,
            row_count = result.row_count(),
            truncated = result.truncated,
            execution_time_ms = result.execution_time_ms,
            "Query executed"
        );

        Ok(QueryOutput::from_result(env, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolSettings;
    use crate::db::ConnectionManager;
    use crate::error::DbError;
    use crate::models::{ConnectionDescriptor, QueryLimits};

    fn handler() -> QueryToolHandler {
        let registry = Arc::new(
            EnvironmentRegistry::new(
                [ConnectionDescriptor::new(
                    Environment::Local,
                    "postgresql://localhost/db?min_connections=0",
                )],
                Some(Environment::Local),
            )
            .unwrap(),
        );
        let manager = Arc::new(ConnectionManager::new(
            Arc::clone(&registry),
            PoolSettings::default(),
        ));
        let executor = Arc::new(QueryExecutor::new(manager, QueryLimits::default()));
        QueryToolHandler::new(registry, executor)
    }

    #[test]
    fn test_query_input_deserialization() {
        let json = r#"{"query": "SELECT 1", "environment": "prod"}"#;
        let input: QueryInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.query, "SELECT 1");
        assert_eq!(input.environment.as_deref(), Some("prod"));

        let input: QueryInput = serde_json::from_str(r#"{"query": "SELECT 1"}"#).unwrap();
        assert!(input.environment.is_none());
    }

    #[test]
    fn test_query_output_serialization() {
        let mut row = serde_json::Map::new();
        row.insert("id".to_string(), JsonValue::from(1));

        let result = QueryResult {
            columns: vec![ColumnMetadata::new("id", "INT4")],
            rows: vec![row],
            truncated: false,
            execution_time_ms: 10,
        };
        let output = QueryOutput::from_result(Environment::Local, result);

        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"environment\":\"local\""));
        assert!(json.contains("\"row_count\":1"));
        assert!(json.contains("\"truncated\":false"));
        assert!(json.contains("\"id\":1"));
    }

    #[tokio::test]
    async fn test_unknown_environment_has_no_side_effects() {
        let handler = handler();
        let err = handler
            .query(QueryInput {
                query: "SELECT 1".to_string(),
                environment: Some("qa".to_string()),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UnknownEnvironment { .. }));
        assert_eq!(handler.executor.manager().acquire_attempts(), 0);
    }

    #[tokio::test]
    async fn test_write_rejected_before_acquire() {
        let handler = handler();
        let err = handler
            .query(QueryInput {
                query: "DROP TABLE users".to_string(),
                environment: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Rejected { .. }));
        assert_eq!(handler.executor.manager().acquire_attempts(), 0);
    }
}
