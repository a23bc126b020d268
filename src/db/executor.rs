//! Query execution engine.
//!
//! Every statement runs on its own checked-out connection inside a read-only
//! transaction, read through a server-side cursor so at most `cap + 1` rows
//! ever leave the server.
//!
//! # Session layout
//!
//! ```text
//! BEGIN
//! SET TRANSACTION READ ONLY; SET LOCAL statement_timeout = <ms>
//! DECLARE gateway_cursor NO SCROLL CURSOR FOR <statement>
//! FETCH FORWARD <cap + 1> FROM gateway_cursor
//! CLOSE gateway_cursor
//! ROLLBACK
//! ```
//!
//! `DECLARE` is sent as a single prepared statement, which PostgreSQL only
//! accepts when it holds exactly one command. The rest goes over the simple
//! query protocol, so fetched values arrive as text and are converted by
//! [`crate::db::types`].
//!
//! The server cancels statements that exceed `statement_timeout` (SQLSTATE
//! `57014`). A client-side backstop of the same timeout plus a grace period
//! covers an unresponsive server; the abandoned connection is discarded.

use crate::db::pool::{ConnectionManager, ScopedConnection};
use crate::db::stream::collect_capped;
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnMetadata, Environment, QueryLimits, QueryResult, TableName};
use crate::tools::sql_validator::validate_readonly;
use futures_util::future::BoxFuture;
use sqlx::postgres::PgConnection;
use sqlx::{Column, Executor, TypeInfo};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

const CURSOR_NAME: &str = "gateway_cursor";

/// SQLSTATE for `query_canceled`, raised when `statement_timeout` fires.
const STATEMENT_TIMEOUT_SQLSTATE: &str = "57014";

/// Extra client-side wait beyond the server timeout before giving up.
const CLIENT_TIMEOUT_GRACE: Duration = Duration::from_secs(2);

/// Rows and column metadata read from one cursor.
struct Fetched {
    columns: Vec<ColumnMetadata>,
    rows: Vec<serde_json::Map<String, serde_json::Value>>,
    truncated: bool,
}

/// Query executor that handles bounded, read-only statement execution.
#[derive(Debug)]
pub struct QueryExecutor {
    manager: Arc<ConnectionManager>,
    limits: QueryLimits,
}

impl QueryExecutor {
    pub fn new(manager: Arc<ConnectionManager>, limits: QueryLimits) -> Self {
        Self { manager, limits }
    }

    pub fn limits(&self) -> QueryLimits {
        self.limits
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Validate and run `sql` against `env`.
    ///
    /// Rejected statements never reach the pool.
    pub async fn execute(&self, env: Environment, sql: &str) -> DbResult<QueryResult> {
        let validated = validate_readonly(sql)?;

        debug!(
            environment = %env,
            sql = %validated.as_str(),
            row_limit = self.limits.row_limit,
            timeout_secs = self.limits.timeout.as_secs(),
            "Executing query"
        );

        let result = self
            .run_bounded(env, validated.as_str(), self.limits.row_limit as usize)
            .await?;

        if result.truncated {
            warn!(
                environment = %env,
                limit = self.limits.row_limit,
                "Query result truncated"
            );
        }
        Ok(result)
    }

    /// Fetch up to the configured number of sample rows from `table`.
    ///
    /// Bypasses validation; the statement is built here from a quoted name.
    pub async fn sample(&self, env: Environment, table: &TableName) -> DbResult<QueryResult> {
        let statement = sample_statement(table);
        self.run_bounded(env, &statement, self.limits.sample_rows as usize)
            .await
    }

    /// Run `f` on a fresh connection inside a read-only session for `env`.
    ///
    /// The session is rolled back afterwards. Driver errors are mapped to
    /// `QueryTimeout` or `QueryFailed`.
    pub async fn run_session<T, F>(&self, env: Environment, f: F) -> DbResult<T>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, sqlx::Error>>,
    {
        let statement_timeout = self.limits.timeout;
        let mut conn = self.manager.acquire(env).await?;

        let outcome = timeout(
            statement_timeout + CLIENT_TIMEOUT_GRACE,
            in_read_only_session(&mut conn, statement_timeout, f),
        )
        .await;

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(query_error(env, e, statement_timeout)),
            Err(_) => {
                // The session never finished; dropping `conn` discards it
                warn!(
                    environment = %env,
                    timeout_secs = statement_timeout.as_secs(),
                    "Server did not cancel statement in time"
                );
                Err(DbError::query_timeout(
                    env.as_str(),
                    statement_timeout.as_secs(),
                ))
            }
        }
    }

    async fn run_bounded(
        &self,
        env: Environment,
        statement: &str,
        cap: usize,
    ) -> DbResult<QueryResult> {
        let start = Instant::now();
        let statement = statement.to_string();
        let fetched = self
            .run_session(env, move |conn| {
                Box::pin(async move { read_cursor(conn, &statement, cap).await })
            })
            .await?;

        let execution_time_ms = start.elapsed().as_millis() as u64;
        info!(
            environment = %env,
            rows = fetched.rows.len(),
            truncated = fetched.truncated,
            execution_time_ms,
            "Statement completed"
        );

        Ok(QueryResult {
            columns: fetched.columns,
            rows: fetched.rows,
            truncated: fetched.truncated,
            execution_time_ms,
        })
    }
}

/// Run `f` in a read-only session, rolling back on every path.
///
/// The connection is only marked clean once the rollback succeeds.
async fn in_read_only_session<T, F>(
    conn: &mut ScopedConnection,
    statement_timeout: Duration,
    f: F,
) -> Result<T, sqlx::Error>
where
    F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, sqlx::Error>>,
{
    let mut tx = conn.begin_read_only(statement_timeout).await?;
    let result = f(&mut *tx).await;

    match tx.rollback().await {
        Ok(()) => conn.end_session(),
        Err(e) => warn!(error = %e, "Rollback failed; connection will be discarded"),
    }
    result
}

async fn read_cursor(
    conn: &mut PgConnection,
    statement: &str,
    cap: usize,
) -> Result<Fetched, sqlx::Error> {
    // Prepared, not simple-query: the server refuses to parse more than one
    // command here, so nothing can follow the cursor's statement
    let declare = declare_statement(statement);
    sqlx::query(&declare)
        .persistent(false)
        .execute(&mut *conn)
        .await?;

    let fetch = format!("FETCH FORWARD {} FROM {CURSOR_NAME}", cap + 1);
    let capped = {
        let stream = (&mut *conn).fetch(fetch.as_str());
        collect_capped(stream, cap).await?
    };

    let columns = match capped.items.first() {
        Some(row) => row.get_column_metadata(),
        None => describe_columns(conn, statement).await,
    };

    (&mut *conn)
        .execute(format!("CLOSE {CURSOR_NAME}").as_str())
        .await?;

    Ok(Fetched {
        columns,
        rows: capped.items.iter().map(RowToJson::to_json_map).collect(),
        truncated: capped.truncated,
    })
}

/// Recover column metadata for an empty result.
async fn describe_columns(conn: &mut PgConnection, statement: &str) -> Vec<ColumnMetadata> {
    match (&mut *conn).describe(statement).await {
        Ok(describe) => describe
            .columns()
            .iter()
            .map(|col| ColumnMetadata::new(col.name(), col.type_info().name()))
            .collect(),
        Err(e) => {
            debug!(error = %e, "Could not describe empty result");
            Vec::new()
        }
    }
}

fn declare_statement(statement: &str) -> String {
    format!("DECLARE {CURSOR_NAME} NO SCROLL CURSOR FOR {statement}")
}

fn sample_statement(table: &TableName) -> String {
    format!("SELECT * FROM {}", table.quoted())
}

/// Map a driver error raised while the statement ran.
fn query_error(env: Environment, err: sqlx::Error, statement_timeout: Duration) -> DbError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.into_owned());
            if code.as_deref() == Some(STATEMENT_TIMEOUT_SQLSTATE) {
                DbError::query_timeout(env.as_str(), statement_timeout.as_secs())
            } else {
                DbError::query_failed(env.as_str(), db_err.message(), code)
            }
        }
        other => DbError::query_failed(env.as_str(), other.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolSettings;
    use crate::db::registry::EnvironmentRegistry;
    use crate::models::ConnectionDescriptor;

    fn executor() -> QueryExecutor {
        let registry = EnvironmentRegistry::new(
            [ConnectionDescriptor::new(
                Environment::Local,
                "postgresql://user:pw@127.0.0.1:1/db?min_connections=0&acquire_timeout=1",
            )],
            Some(Environment::Local),
        )
        .unwrap();
        let manager = ConnectionManager::new(Arc::new(registry), PoolSettings::default());
        QueryExecutor::new(Arc::new(manager), QueryLimits::default())
    }

    #[tokio::test]
    async fn test_rejected_statement_never_acquires() {
        let executor = executor();
        let err = executor
            .execute(Environment::Local, "DELETE FROM users")
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Rejected { .. }));
        assert_eq!(executor.manager().acquire_attempts(), 0);
        assert_eq!(executor.manager().pool_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_statement_rejected() {
        let err = executor()
            .execute(Environment::Local, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rejected { .. }));
    }

    #[test]
    fn test_sample_statement_quotes_identifiers() {
        let table = TableName::new("sales", "Order \"Items\"");
        assert_eq!(
            sample_statement(&table),
            r#"SELECT * FROM "sales"."Order ""Items""""#
        );
    }

    #[test]
    fn test_declare_wraps_statement_verbatim() {
        assert_eq!(
            declare_statement("SELECT 1"),
            "DECLARE gateway_cursor NO SCROLL CURSOR FOR SELECT 1"
        );
    }

    #[test]
    fn test_non_database_error_is_query_failed() {
        let err = query_error(
            Environment::Staging,
            sqlx::Error::Protocol("unexpected message".into()),
            Duration::from_secs(30),
        );
        match err {
            DbError::QueryFailed {
                environment,
                sql_state,
                ..
            } => {
                assert_eq!(environment, "staging");
                assert!(sql_state.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_limits_exposed() {
        assert_eq!(executor().limits(), QueryLimits::default());
    }
}
