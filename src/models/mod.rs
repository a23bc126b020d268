//! Data models for the read-only gateway.
//!
//! This module re-exports all model types used throughout the application.

pub mod environment;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use environment::{ConnectionDescriptor, Environment};
pub use query::{
    ColumnMetadata, DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT, DEFAULT_SAMPLE_ROWS,
    MAX_QUERY_TIMEOUT_SECS, MAX_ROW_LIMIT, QueryLimits, QueryResult,
};
pub use schema::{
    ColumnDefinition, DEFAULT_SCHEMA, SampledTableSchema, TableName, TableSample, TableSchema,
    TableType,
};
