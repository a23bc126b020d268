//! Schema-related data models.
//!
//! This module defines types for catalog introspection results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::borrow::Cow;

/// Default schema for unqualified table names.
pub const DEFAULT_SCHEMA: &str = "public";

/// Relation kinds listed by the introspector (from `pg_class.relkind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    Table,
    PartitionedTable,
    View,
    MaterializedView,
    ForeignTable,
}

impl TableType {
    /// Map a `relkind` code. Unknown codes fall back to `Table`.
    pub fn from_relkind(relkind: &str) -> Self {
        match relkind {
            "p" => Self::PartitionedTable,
            "v" => Self::View,
            "m" => Self::MaterializedView,
            "f" => Self::ForeignTable,
            _ => Self::Table,
        }
    }
}

impl std::fmt::Display for TableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::PartitionedTable => write!(f, "partitioned_table"),
            Self::View => write!(f, "view"),
            Self::MaterializedView => write!(f, "materialized_view"),
            Self::ForeignTable => write!(f, "foreign_table"),
        }
    }
}

/// A schema-qualified relation name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub schema: String,
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse `schema.table` or a bare `table` (placed in `public`).
    ///
    /// Either part may be double-quoted (`"my.schema"."Order ""Items"""`) to
    /// carry dots or quotes; this is the form `Display` produces for such names.
    pub fn parse(input: &str) -> Option<Self> {
        let mut rest = input.trim();
        let first = take_ident(&mut rest)?;
        let (schema, name) = if rest.is_empty() {
            (DEFAULT_SCHEMA.to_string(), first)
        } else {
            rest = rest.strip_prefix('.')?;
            let second = take_ident(&mut rest)?;
            if !rest.is_empty() {
                return None;
            }
            (first, second)
        };
        if schema.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(schema, name))
    }

    /// Quoted form safe to splice into SQL text.
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

/// `schema.table`, quoting only parts that would not parse back unquoted.
impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", display_ident(&self.schema), display_ident(&self.name))
    }
}

fn display_ident(ident: &str) -> Cow<'_, str> {
    let ambiguous = ident.is_empty()
        || ident.contains(['.', '"'])
        || ident.trim() != ident;
    if ambiguous {
        Cow::Owned(quote_ident(ident))
    } else {
        Cow::Borrowed(ident)
    }
}

/// Take one identifier off the front of `input`: a double-quoted name
/// (`""` is a literal quote) or bare text up to the next dot.
///
/// `None` for an unterminated quoted name.
fn take_ident(input: &mut &str) -> Option<String> {
    let s = input.trim_start();
    let Some(quoted) = s.strip_prefix('"') else {
        let end = s.find('.').unwrap_or(s.len());
        *input = &s[end..];
        return Some(s[..end].trim().to_string());
    };

    let mut ident = String::new();
    let mut chars = quoted.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '"' {
            ident.push(c);
        } else if matches!(chars.peek(), Some((_, '"'))) {
            ident.push('"');
            chars.next();
        } else {
            *input = quoted[i + 1..].trim_start();
            return Some(ident);
        }
    }
    None
}

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableSchema {
    pub table_name: String,
    pub schema_name: String,
    pub table_type: TableType,
    pub columns: Vec<ColumnDefinition>,
    /// Primary key columns in key order
    pub primary_key: Vec<String>,
}

impl TableSchema {
    /// Create a new table schema.
    pub fn new(table: &TableName, table_type: TableType) -> Self {
        Self {
            table_name: table.name.clone(),
            schema_name: table.schema.clone(),
            table_type,
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Add a column definition.
    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Set the primary key columns, flagging matching column definitions.
    pub fn with_primary_key(mut self, columns: Vec<String>) -> Self {
        for column in &mut self.columns {
            column.is_primary_key = columns.contains(&column.name);
        }
        self.primary_key = columns;
        self
    }

    /// Get the fully qualified table name, in `TableName` display form.
    pub fn qualified_name(&self) -> String {
        TableName::new(self.schema_name.as_str(), self.table_name.as_str()).to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDefinition {
    pub name: String,
    /// Formatted type (e.g., `character varying(255)`, `numeric(10,2)`)
    pub data_type: String,
    pub nullable: bool,
    /// Default expression as PostgreSQL prints it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub is_primary_key: bool,
}

impl ColumnDefinition {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default_value: None,
            is_primary_key: false,
        }
    }

    pub fn with_default(mut self, default_value: Option<String>) -> Self {
        self.default_value = default_value;
        self
    }
}

/// Outcome of the per-table sample fetch in `get_all_schemas`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableSample {
    Ok {
        rows: Vec<serde_json::Map<String, JsonValue>>,
        truncated: bool,
    },
    Failed {
        error: String,
    },
}

impl TableSample {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Table schema with its sample rows.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SampledTableSchema {
    #[serde(flatten)]
    pub schema: TableSchema,
    pub sample: TableSample,
}
