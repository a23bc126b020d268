//! Schema introspection module.
//!
//! Fixed `pg_catalog` queries, run through the executor's read-only sessions
//! so they share its acquisition, timeout and error mapping. They bypass the
//! SQL validator since they are statically known to be read-only.
//!
//! `pg_catalog` is used instead of `information_schema` because the latter
//! hides tables the role has no privileges on; those tables are still listed
//! and their samples fail individually.

use crate::db::executor::QueryExecutor;
use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnDefinition, Environment, SampledTableSchema, TableName, TableSample, TableSchema,
    TableType,
};
use futures_util::TryStreamExt;
use sqlx::postgres::PgConnection;
use sqlx::Row;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on relations returned by `list_tables`.
pub const MAX_LISTED_TABLES: usize = 10_000;

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub const LIST_RELATIONS: &str = r#"
        SELECT
            n.nspname::text AS schema_name,
            c.relname::text AS table_name,
            c.relkind::text AS relkind
        FROM pg_catalog.pg_class c
        JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
        WHERE c.relkind IN ('r', 'p', 'v', 'm', 'f')
        AND n.nspname NOT IN ('pg_catalog', 'information_schema')
        AND n.nspname NOT LIKE 'pg\_toast%'
        AND n.nspname NOT LIKE 'pg\_temp\_%'
        ORDER BY n.nspname, c.relname
        "#;

    pub const FIND_RELATION: &str = r#"
        SELECT c.relkind::text AS relkind
        FROM pg_catalog.pg_class c
        JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = $1
        AND c.relname = $2
        AND c.relkind IN ('r', 'p', 'v', 'm', 'f')
        "#;

    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            a.attname::text AS column_name,
            pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
            NOT a.attnotnull AS nullable,
            pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS column_default
        FROM pg_catalog.pg_attribute a
        JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
        JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
        LEFT JOIN pg_catalog.pg_attrdef d
            ON d.adrelid = a.attrelid AND d.adnum = a.attnum
        WHERE n.nspname = $1
        AND c.relname = $2
        AND a.attnum > 0
        AND NOT a.attisdropped
        ORDER BY a.attnum
        "#;

    pub const PRIMARY_KEY: &str = r#"
        SELECT a.attname::text AS column_name
        FROM pg_catalog.pg_index i
        JOIN pg_catalog.pg_class c ON c.oid = i.indrelid
        JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
        CROSS JOIN LATERAL unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, position)
        JOIN pg_catalog.pg_attribute a
            ON a.attrelid = i.indrelid AND a.attnum = k.attnum
        WHERE i.indisprimary
        AND n.nspname = $1
        AND c.relname = $2
        ORDER BY k.position
        "#;
}

/// A listed relation and its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: TableName,
    pub table_type: TableType,
}

/// Schema inspector for catalog introspection.
#[derive(Debug)]
pub struct SchemaInspector {
    executor: Arc<QueryExecutor>,
}

impl SchemaInspector {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    /// List relations as `schema.table`, ordered by schema then name.
    pub async fn list_tables(&self, env: Environment) -> DbResult<Vec<String>> {
        let relations = self.list_relations(env).await?;
        Ok(relations.iter().map(|r| r.name.to_string()).collect())
    }

    async fn list_relations(&self, env: Environment) -> DbResult<Vec<Relation>> {
        let (relations, truncated) = self
            .executor
            .run_session(env, |conn| Box::pin(postgres::list_relations(conn)))
            .await?;

        if truncated {
            warn!(
                environment = %env,
                limit = MAX_LISTED_TABLES,
                "Table listing truncated"
            );
        }
        debug!(environment = %env, count = relations.len(), "Listed tables");
        Ok(relations)
    }

    /// Describe one table. Accepts `schema.table` or a bare name in `public`.
    pub async fn get_table_schema(&self, env: Environment, table: &str) -> DbResult<TableSchema> {
        let name = TableName::parse(table)
            .ok_or_else(|| DbError::invalid_input("Table name must not be empty"))?;
        self.describe(env, name).await
    }

    async fn describe(&self, env: Environment, name: TableName) -> DbResult<TableSchema> {
        let lookup = name.clone();
        let schema = self
            .executor
            .run_session(env, move |conn| {
                Box::pin(async move { postgres::describe_table(conn, &lookup).await })
            })
            .await?;

        schema.ok_or_else(|| DbError::table_not_found(env.as_str(), name.to_string()))
    }

    /// Describe every listed table and attach a bounded sample of its rows.
    ///
    /// A table whose sample cannot be read is reported inline; the rest of
    /// the tables are unaffected.
    pub async fn get_all_schemas(
        &self,
        env: Environment,
    ) -> DbResult<BTreeMap<String, SampledTableSchema>> {
        let relations = self.list_relations(env).await?;
        let mut schemas = BTreeMap::new();
        let mut failed_samples = 0usize;

        for relation in relations {
            let schema = match self.describe(env, relation.name.clone()).await {
                Ok(schema) => schema,
                // Dropped between listing and describing
                Err(DbError::TableNotFound { .. }) => continue,
                Err(e) => return Err(e),
            };

            let sample = match self.executor.sample(env, &relation.name).await {
                Ok(result) => TableSample::Ok {
                    rows: result.rows,
                    truncated: result.truncated,
                },
                Err(e) => {
                    failed_samples += 1;
                    debug!(
                        environment = %env,
                        table = %relation.name,
                        error = %e,
                        "Sample failed"
                    );
                    TableSample::Failed {
                        error: e.to_string(),
                    }
                }
            };

            schemas.insert(
                relation.name.to_string(),
                SampledTableSchema { schema, sample },
            );
        }

        info!(
            environment = %env,
            tables = schemas.len(),
            failed_samples,
            "Collected all table schemas"
        );
        Ok(schemas)
    }
}

// =============================================================================
// Catalog Queries
// =============================================================================

mod postgres {
    use super::*;
    use crate::db::stream::collect_capped;

    pub async fn list_relations(
        conn: &mut PgConnection,
    ) -> Result<(Vec<Relation>, bool), sqlx::Error> {
        let stream = sqlx::query(queries::LIST_RELATIONS)
            .fetch(&mut *conn)
            .and_then(|row| async move {
                let schema: String = row.try_get("schema_name")?;
                let name: String = row.try_get("table_name")?;
                let relkind: String = row.try_get("relkind")?;
                Ok::<_, sqlx::Error>(Relation {
                    name: TableName::new(schema, name),
                    table_type: TableType::from_relkind(&relkind),
                })
            });
        let capped = collect_capped(Box::pin(stream), MAX_LISTED_TABLES).await?;
        Ok((capped.items, capped.truncated))
    }

    /// `None` if the relation does not exist.
    pub async fn describe_table(
        conn: &mut PgConnection,
        name: &TableName,
    ) -> Result<Option<TableSchema>, sqlx::Error> {
        let relkind: Option<String> = sqlx::query_scalar(queries::FIND_RELATION)
            .bind(&name.schema)
            .bind(&name.name)
            .fetch_optional(&mut *conn)
            .await?;
        let Some(relkind) = relkind else {
            return Ok(None);
        };

        let columns = fetch_columns(conn, name).await?;
        let primary_key = fetch_primary_key(conn, name).await?;

        let schema = columns
            .into_iter()
            .fold(
                TableSchema::new(name, TableType::from_relkind(&relkind)),
                TableSchema::with_column,
            )
            .with_primary_key(primary_key);
        Ok(Some(schema))
    }

    async fn fetch_columns(
        conn: &mut PgConnection,
        name: &TableName,
    ) -> Result<Vec<ColumnDefinition>, sqlx::Error> {
        let rows = sqlx::query(queries::DESCRIBE_COLUMNS)
            .bind(&name.schema)
            .bind(&name.name)
            .fetch_all(&mut *conn)
            .await?;

        rows.iter()
            .map(|row| {
                let column_name: String = row.try_get("column_name")?;
                let data_type: String = row.try_get("data_type")?;
                let nullable: bool = row.try_get("nullable")?;
                let default_value: Option<String> = row.try_get("column_default")?;
                Ok(ColumnDefinition::new(column_name, data_type, nullable)
                    .with_default(default_value))
            })
            .collect()
    }

    async fn fetch_primary_key(
        conn: &mut PgConnection,
        name: &TableName,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(queries::PRIMARY_KEY)
            .bind(&name.schema)
            .bind(&name.name)
            .fetch_all(&mut *conn)
            .await
    }
}
