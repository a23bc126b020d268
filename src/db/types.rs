//! PostgreSQL value to JSON conversion.
//!
//! # Architecture
//!
//! Rows reach this module through the simple query protocol, so every value
//! arrives in PostgreSQL's text format. Conversion is two-phase:
//! 1. `TypeCategory` classifies the column type name
//! 2. `decode_text_value` turns the text representation into a JSON value
//!
//! Anything without a faithful JSON counterpart (timestamps, intervals,
//! arrays, numerics) stays a string exactly as PostgreSQL printed it.

use crate::models::ColumnMetadata;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for PostgreSQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    /// NUMERIC/DECIMAL, kept as strings to preserve precision
    Decimal,
    Boolean,
    Json,
    Binary,
    Text,
}

/// Classify a PostgreSQL type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_ascii_lowercase();

    // Arrays print as {a,b}; keep the literal
    if lower.ends_with("[]") || lower.starts_with('_') {
        return TypeCategory::Text;
    }

    match lower.as_str() {
        "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" | "oid" => {
            TypeCategory::Integer
        }
        "float4" | "float8" | "real" | "double precision" => TypeCategory::Float,
        "numeric" | "decimal" => TypeCategory::Decimal,
        "bool" | "boolean" => TypeCategory::Boolean,
        "json" | "jsonb" => TypeCategory::Json,
        "bytea" => TypeCategory::Binary,
        _ => TypeCategory::Text,
    }
}

// =============================================================================
// Value Decoding
// =============================================================================

/// Convert one text-format value to JSON.
pub fn decode_text_value(raw: &str, category: TypeCategory) -> JsonValue {
    match category {
        TypeCategory::Integer => raw
            .parse::<i64>()
            .map(JsonValue::from)
            .unwrap_or_else(|_| JsonValue::String(raw.to_string())),
        TypeCategory::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            // NaN and Infinity have no JSON number form
            .unwrap_or_else(|| JsonValue::String(raw.to_string())),
        TypeCategory::Boolean => match raw {
            "t" | "true" => JsonValue::Bool(true),
            "f" | "false" => JsonValue::Bool(false),
            other => JsonValue::String(other.to_string()),
        },
        TypeCategory::Json => {
            serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
        }
        TypeCategory::Binary => match decode_bytea_hex(raw) {
            Some(bytes) => decode_binary_value(&bytes),
            None => JsonValue::String(raw.to_string()),
        },
        TypeCategory::Decimal | TypeCategory::Text => JsonValue::String(raw.to_string()),
    }
}

/// Decode bytea hex output (`\x48656c6c6f`).
fn decode_bytea_hex(raw: &str) -> Option<Vec<u8>> {
    let hex = raw.strip_prefix("\\x")?;
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Decode binary data to JSON value.
///
/// Valid UTF-8 becomes text; anything else is base64 encoded.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue>;
    fn get_column_metadata(&self) -> Vec<ColumnMetadata>;
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name());
                // Text format: every value decodes as its printed string
                let value = match self.try_get_unchecked::<Option<String>, _>(idx) {
                    Ok(Some(raw)) => decode_text_value(&raw, category),
                    Ok(None) => JsonValue::Null,
                    Err(e) => {
                        tracing::error!(column = col.name(), error = %e, "Failed to decode column");
                        JsonValue::Null
                    }
                };
                (col.name().to_string(), value)
            })
            .collect()
    }

    fn get_column_metadata(&self) -> Vec<ColumnMetadata> {
        self.columns()
            .iter()
            .map(|col| ColumnMetadata::new(col.name(), col.type_info().name()))
            .collect()
    }
}
