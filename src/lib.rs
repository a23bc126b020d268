//! PostgreSQL Read-Only Gateway Library
//!
//! This library provides MCP (Model Context Protocol) tools that give AI
//! assistants bounded, read-only access to PostgreSQL databases across
//! named environments (local, development, staging, production).

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::GatewayService;
