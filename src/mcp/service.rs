//! MCP service implementation using rmcp.
//!
//! This module defines the GatewayService struct with all gateway tools
//! exposed via the MCP protocol using the rmcp framework's macros.

use crate::db::{ConnectionManager, PoolStats, QueryExecutor, SchemaInspector};
use crate::models::Environment;
use crate::tools::query::{QueryInput, QueryOutput, QueryToolHandler};
use crate::tools::schema::{
    AllSchemasOutput, GetAllSchemasInput, GetTableSchemaInput, ListTablesInput, ListTablesOutput,
    SchemaToolHandler, TableSchemaOutput,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    schemars::JsonSchema,
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use std::sync::Arc;

/// Output for the list_environments tool.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ListEnvironmentsOutput {
    /// Configured environments in canonical order
    pub environments: Vec<Environment>,
    /// Environment used when a call omits `environment`
    pub default: Option<Environment>,
    /// Statistics for pools that have been created
    pub pools: Vec<PoolStats>,
}

#[derive(Clone)]
pub struct GatewayService {
    manager: Arc<ConnectionManager>,
    query_handler: Arc<QueryToolHandler>,
    schema_handler: Arc<SchemaToolHandler>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl GatewayService {
    pub fn new(
        manager: Arc<ConnectionManager>,
        executor: Arc<QueryExecutor>,
        inspector: Arc<SchemaInspector>,
    ) -> Self {
        let registry = Arc::clone(manager.registry());
        Self {
            query_handler: Arc::new(QueryToolHandler::new(Arc::clone(&registry), executor)),
            schema_handler: Arc::new(SchemaToolHandler::new(registry, inspector)),
            manager,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl GatewayService {
    #[tool(
        description = "Run a single read-only SQL statement (SELECT or WITH) against a PostgreSQL environment.\nWrites, DDL and multiple statements are rejected.\nResults are capped at the configured row limit; `truncated` reports whether more rows existed."
    )]
    async fn database_query(
        &self,
        Parameters(input): Parameters<QueryInput>,
    ) -> Result<Json<QueryOutput>, McpError> {
        self.query_handler
            .query(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "List tables and views in an environment as `schema.table`, ordered by schema then name."
    )]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Result<Json<ListTablesOutput>, McpError> {
        self.schema_handler
            .list_tables(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Get columns (name, type, nullability, default) and primary key for one table.\nAccepts `schema.table` or a bare name in the public schema."
    )]
    async fn get_table_schema(
        &self,
        Parameters(input): Parameters<GetTableSchemaInput>,
    ) -> Result<Json<TableSchemaOutput>, McpError> {
        self.schema_handler
            .get_table_schema(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Get the schema of every table with a few sample rows each.\nTables whose sample cannot be read are reported with status \"failed\" instead of failing the call."
    )]
    async fn get_all_schemas(
        &self,
        Parameters(input): Parameters<GetAllSchemasInput>,
    ) -> Result<Json<AllSchemasOutput>, McpError> {
        self.schema_handler
            .get_all_schemas(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "List configured environments, the default environment, and connection pool statistics. Never includes connection strings."
    )]
    async fn list_environments(&self) -> Json<ListEnvironmentsOutput> {
        let registry = self.manager.registry();
        Json(ListEnvironmentsOutput {
            environments: registry.environments(),
            default: registry.default_environment(),
            pools: self.manager.all_stats().await,
        })
    }
}

#[tool_handler]
impl ServerHandler for GatewayService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "pg-readonly-gateway".to_owned(),
                title: Some("PostgreSQL Read-Only Gateway".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Read-only access to PostgreSQL databases across environments.\n\
                \n\
                ## Environments\n\
                Every tool accepts an optional `environment`: local, dev/development,\n\
                staging/stg, prod/production. Omit it to use the default.\n\
                Call `list_environments` to see what is configured.\n\
                \n\
                ## Workflow\n\
                1. `list_tables` to discover tables\n\
                2. `get_table_schema` (or `get_all_schemas`) to learn columns\n\
                3. `database_query` with a single SELECT or WITH statement\n\
                \n\
                ## Limits\n\
                - Results are capped at a fixed row limit; check `truncated`\n\
                - Statements are cancelled after a fixed timeout\n\
                - INSERT, UPDATE, DELETE, DROP, CREATE, ALTER, TRUNCATE and INTO are rejected"
                    .to_string(),
            ),
        }
    }
}
