//! MCP tool implementations.
//!
//! This module contains all gateway tool handlers:
//! - `query`: Execute read-only SELECT/WITH statements
//! - `schema`: List tables, describe one table, describe all tables with samples
//! - `sql_validator`: SQL statement validation for read-only enforcement

pub mod query;
pub mod schema;
pub mod sql_validator;

pub use query::{QueryInput, QueryOutput, QueryToolHandler};
pub use schema::{
    AllSchemasOutput, GetAllSchemasInput, GetTableSchemaInput, ListTablesInput, ListTablesOutput,
    SchemaToolHandler, TableSchemaOutput,
};
