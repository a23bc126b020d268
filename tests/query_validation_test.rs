//! Integration tests for query validation.
//!
//! These tests verify that only single SELECT/WITH statements pass and that
//! every rejection names the rule that fired.

use pg_readonly_gateway::error::DbError;
use pg_readonly_gateway::tools::sql_validator::{RejectionReason, validate, validate_readonly};
use rmcp::model::ErrorCode;

fn rule(sql: &str) -> &'static str {
    match validate_readonly(sql) {
        Err(DbError::Rejected { reason }) => reason.rule(),
        other => panic!("expected rejection for {sql:?}, got {other:?}"),
    }
}

/// Test that INSERT is rejected.
#[test]
fn test_query_rejects_insert() {
    assert_eq!(
        rule("INSERT INTO users (name) VALUES ('test')"),
        "forbidden_keyword"
    );
}

#[test]
fn test_query_rejects_update() {
    assert_eq!(
        rule("UPDATE users SET name = 'changed' WHERE id = 1"),
        "forbidden_keyword"
    );
}

#[test]
fn test_query_rejects_delete() {
    assert_eq!(rule("DELETE FROM users WHERE id = 1"), "forbidden_keyword");
}

#[test]
fn test_query_rejects_ddl() {
    for sql in [
        "CREATE TABLE test (id INT PRIMARY KEY)",
        "DROP TABLE users",
        "ALTER TABLE users ADD COLUMN x INT",
        "TRUNCATE users",
    ] {
        assert_eq!(rule(sql), "forbidden_keyword", "{sql}");
    }
}

/// Test that a write hidden after a SELECT is still caught.
#[test]
fn test_query_rejects_piggybacked_write() {
    let err = validate("SELECT * FROM users; DELETE FROM users").unwrap_err();
    assert_eq!(
        err,
        RejectionReason::ForbiddenKeyword {
            keyword: "DELETE".to_string()
        }
    );
}

#[test]
fn test_query_rejects_multiple_selects() {
    assert_eq!(rule("SELECT 1; SELECT 2"), "multiple_statements");
}

#[test]
fn test_query_rejects_other_statements() {
    for sql in [
        "SHOW search_path",
        "EXPLAIN SELECT 1",
        "SET statement_timeout = 0",
        "COPY users TO STDOUT",
        "VALUES (1)",
        "(SELECT 1)",
    ] {
        assert_eq!(rule(sql), "statement_not_allowed", "{sql}");
    }
}

#[test]
fn test_query_rejects_empty() {
    for sql in ["", "   ", "\n\t", "-- just a comment", "/* nothing */"] {
        assert_eq!(rule(sql), "empty_statement", "{sql:?}");
    }
}

#[test]
fn test_query_rejects_unterminated_literal() {
    assert_eq!(rule("SELECT 'oops"), "unparseable");
}

#[test]
fn test_query_allows_select() {
    for sql in [
        "SELECT * FROM users",
        "select id, name from users where id = 1",
        "SELECT count(*) FROM orders GROUP BY status",
        "WITH t AS (SELECT 1 AS x) SELECT x FROM t",
        "SELECT 'DELETE FROM users' AS text",
        "SELECT \"update\" FROM audit",
        "SELECT 1 -- DROP TABLE users",
    ] {
        assert!(validate_readonly(sql).is_ok(), "{sql}");
    }
}

#[test]
fn test_trailing_semicolon_is_stripped() {
    let validated = validate("SELECT * FROM users;  ").unwrap();
    assert_eq!(validated.as_str(), "SELECT * FROM users");

    let validated = validate("SELECT 'é';").unwrap();
    assert_eq!(validated.as_str(), "SELECT 'é'");
}

#[test]
fn test_rejection_maps_to_invalid_params() {
    let err = validate_readonly("DROP TABLE users").unwrap_err();
    let mcp: rmcp::ErrorData = err.into();

    assert_eq!(mcp.code, ErrorCode::INVALID_PARAMS);
    let data = mcp.data.unwrap();
    assert_eq!(data["kind"], "rejected");
    assert_eq!(data["rule"], "forbidden_keyword");
    assert!(data["suggestion"].is_string());
}
