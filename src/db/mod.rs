//! Database access layer.
//!
//! This module provides database access functionality:
//! - Environment resolution
//! - Per-environment connection pool management
//! - Bounded, read-only query execution
//! - Catalog introspection
//! - Text-format value conversion

pub mod executor;
pub mod pool;
pub mod registry;
pub mod schema;
pub mod stream;
pub mod types;

pub use executor::QueryExecutor;
pub use pool::{ConnectionManager, PoolStats, ScopedConnection};
pub use registry::EnvironmentRegistry;
pub use schema::SchemaInspector;
