//! Schema introspection tools.
//!
//! This module implements the `list_tables`, `get_table_schema` and
//! `get_all_schemas` MCP tools.

use crate::db::{EnvironmentRegistry, SchemaInspector};
use crate::error::DbResult;
use crate::models::{Environment, SampledTableSchema, TableSchema};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Input for the list_tables tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Target environment. Omit for the default.
    #[serde(default)]
    pub environment: Option<String>,
}

/// Output for the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    pub environment: Environment,
    /// Tables and views as `schema.table`, ordered by schema then name
    pub tables: Vec<String>,
    pub count: usize,
}

/// Input for the get_table_schema tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetTableSchemaInput {
    /// Table name, either `schema.table` or a bare name in the public schema.
    /// Double-quote parts that contain dots, as list_tables prints them.
    #[serde(alias = "table_name")]
    pub table: String,
    /// Target environment. Omit for the default.
    #[serde(default)]
    pub environment: Option<String>,
}

/// Output for the get_table_schema tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableSchemaOutput {
    pub environment: Environment,
    #[serde(flatten)]
    pub schema: TableSchema,
}

/// Input for the get_all_schemas tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct GetAllSchemasInput {
    /// Target environment. Omit for the default.
    #[serde(default)]
    pub environment: Option<String>,
}

/// Output for the get_all_schemas tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AllSchemasOutput {
    pub environment: Environment,
    pub table_count: usize,
    /// Keyed by `schema.table`; each entry carries a sample or its failure
    pub schemas: BTreeMap<String, SampledTableSchema>,
}

/// Handler for schema introspection tools.
#[derive(Debug)]
pub struct SchemaToolHandler {
    registry: Arc<EnvironmentRegistry>,
    inspector: Arc<SchemaInspector>,
}

impl SchemaToolHandler {
    pub fn new(registry: Arc<EnvironmentRegistry>, inspector: Arc<SchemaInspector>) -> Self {
        Self {
            registry,
            inspector,
        }
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> DbResult<ListTablesOutput> {
        let env = self.registry.resolve(input.environment.as_deref())?;
        let tables = self.inspector.list_tables(env).await?;

        info!(environment = %env, count = tables.len(), "Listed tables");

        Ok(ListTablesOutput {
            environment: env,
            count: tables.len(),
            tables,
        })
    }

    pub async fn get_table_schema(
        &self,
        input: GetTableSchemaInput,
    ) -> DbResult<TableSchemaOutput> {
        let env = self.registry.resolve(input.environment.as_deref())?;
        let schema = self.inspector.get_table_schema(env, &input.table).await?;

        info!(
            environment = %env,
            table = %schema.qualified_name(),
            columns = schema.columns.len(),
            "Described table"
        );

        Ok(TableSchemaOutput {
            environment: env,
            schema,
        })
    }

    pub async fn get_all_schemas(&self, input: GetAllSchemasInput) -> DbResult<AllSchemasOutput> {
        let env = self.registry.resolve(input.environment.as_deref())?;
        let schemas = self.inspector.get_all_schemas(env).await?;

        Ok(AllSchemasOutput {
            environment: env,
            table_count: schemas.len(),
            schemas,
        })
    }
}
