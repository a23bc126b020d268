//! SQL statement validation for read-only enforcement.
//!
//! Every query text is classified before a connection is acquired. The
//! classification is lexical: the text is tokenized with
//! [sqlparser](https://docs.rs/sqlparser/)'s PostgreSQL tokenizer and rules
//! are checked against token identity, so keywords inside string literals,
//! quoted identifiers, comments, or longer identifiers (`deleted_at`) never
//! trigger a rule.
//!
//! Rules, in order:
//! 1. the text must contain at least one token besides whitespace/comments
//! 2. no unquoted forbidden keyword may appear anywhere
//! 3. at most one statement; a single trailing `;` is tolerated
//! 4. the statement must begin with `SELECT` or `WITH`
//!
//! The database role and the read-only transaction the executor opens are a
//! second line of defense, not a substitute for these rules.

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, TokenWithSpan, Tokenizer};

use crate::error::{DbError, DbResult};

/// Keywords rejected anywhere in the statement.
///
/// `INTO` is included because `SELECT ... INTO` creates a table.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "INTO",
];

/// Keywords a statement may begin with.
pub const ALLOWED_LEADING_KEYWORDS: &[&str] = &["SELECT", "WITH"];

/// Why a query text was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    EmptyStatement,
    /// Tokenizer failure, e.g. an unterminated string literal
    Unparseable { message: String },
    ForbiddenKeyword { keyword: String },
    MultipleStatements,
    /// Statement shape outside the allow-list
    DisallowedStatement { leading: String },
}

impl RejectionReason {
    /// Stable rule identifier reported to clients.
    pub fn rule(&self) -> &'static str {
        match self {
            Self::EmptyStatement => "empty_statement",
            Self::Unparseable { .. } => "unparseable",
            Self::ForbiddenKeyword { .. } => "forbidden_keyword",
            Self::MultipleStatements => "multiple_statements",
            Self::DisallowedStatement { .. } => "statement_not_allowed",
        }
    }

    /// How the caller can rephrase.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::EmptyStatement => "Provide a SELECT or WITH query",
            Self::Unparseable { .. } => "Check for unterminated quotes or comments",
            Self::ForbiddenKeyword { .. } => {
                "This gateway is read-only; quote identifiers that collide with keywords (\"update\")"
            }
            Self::MultipleStatements => "Send one statement per call",
            Self::DisallowedStatement { .. } => "Rewrite the request as a SELECT or WITH query",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyStatement => write!(f, "empty statement"),
            Self::Unparseable { message } => {
                write!(f, "statement could not be tokenized: {}", message)
            }
            Self::ForbiddenKeyword { keyword } => write!(
                f,
                "forbidden keyword {} found; only read-only statements are allowed",
                keyword
            ),
            Self::MultipleStatements => {
                write!(f, "multiple statements detected; only a single statement is permitted")
            }
            Self::DisallowedStatement { leading } => write!(
                f,
                "statements beginning with {} are not allowed; only SELECT and WITH queries are accepted",
                leading
            ),
        }
    }
}

/// A statement that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    statement: String,
}

impl ValidatedQuery {
    /// Statement text with any trailing terminator removed.
    pub fn as_str(&self) -> &str {
        &self.statement
    }
}

/// Classify `sql` as an allowed read-only statement or a rejection.
///
/// # Examples
///
/// ```
/// use pg_readonly_gateway::tools::sql_validator::{validate, RejectionReason};
///
/// assert!(validate("SELECT * FROM users").is_ok());
/// assert!(matches!(
///     validate("DELETE FROM users"),
///     Err(RejectionReason::ForbiddenKeyword { .. })
/// ));
/// ```
pub fn validate(sql: &str) -> Result<ValidatedQuery, RejectionReason> {
    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize_with_location()
        .map_err(|e| RejectionReason::Unparseable {
            message: e.to_string(),
        })?;

    let significant: Vec<&TokenWithSpan> = tokens
        .iter()
        .filter(|t| !matches!(t.token, Token::Whitespace(_) | Token::EOF))
        .collect();

    let Some(first) = significant.first() else {
        return Err(RejectionReason::EmptyStatement);
    };

    if let Some(keyword) = significant.iter().find_map(|t| forbidden_keyword(&t.token)) {
        return Err(RejectionReason::ForbiddenKeyword {
            keyword: keyword.to_string(),
        });
    }

    let terminator = match significant
        .iter()
        .position(|t| matches!(t.token, Token::SemiColon))
    {
        Some(idx) if idx + 1 < significant.len() => {
            return Err(RejectionReason::MultipleStatements);
        }
        Some(idx) => Some(significant[idx]),
        None => None,
    };

    if !starts_with_allowed_keyword(&first.token) {
        return Err(RejectionReason::DisallowedStatement {
            leading: describe_token(&first.token),
        });
    }

    let statement = match terminator {
        Some(semicolon) => {
            let start = &semicolon.span.start;
            let offset = byte_offset(sql, start.line, start.column).ok_or_else(|| {
                RejectionReason::Unparseable {
                    message: "could not locate statement terminator".to_string(),
                }
            })?;
            sql[..offset].trim_end()
        }
        None => sql.trim_end(),
    };

    Ok(ValidatedQuery {
        statement: statement.to_string(),
    })
}

/// Validate SQL for read-only execution, wrapping rejections as [`DbError::Rejected`].
pub fn validate_readonly(sql: &str) -> DbResult<ValidatedQuery> {
    validate(sql).map_err(DbError::rejected)
}

fn forbidden_keyword(token: &Token) -> Option<&'static str> {
    match token {
        Token::Word(word) if word.quote_style.is_none() => FORBIDDEN_KEYWORDS
            .iter()
            .copied()
            .find(|k| word.value.eq_ignore_ascii_case(k)),
        _ => None,
    }
}

fn starts_with_allowed_keyword(token: &Token) -> bool {
    match token {
        Token::Word(word) if word.quote_style.is_none() => ALLOWED_LEADING_KEYWORDS
            .iter()
            .any(|k| word.value.eq_ignore_ascii_case(k)),
        _ => false,
    }
}

fn describe_token(token: &Token) -> String {
    match token {
        Token::Word(word) if word.quote_style.is_none() => word.value.to_ascii_uppercase(),
        other => format!("'{}'", other),
    }
}

/// Convert a 1-based line/column (columns count characters) into a byte offset.
fn byte_offset(sql: &str, line: u64, column: u64) -> Option<usize> {
    let line_idx = usize::try_from(line).ok()?.checked_sub(1)?;
    let col_idx = usize::try_from(column).ok()?.checked_sub(1)?;

    let mut line_start = 0;
    for (idx, text) in sql.split('\n').enumerate() {
        if idx == line_idx {
            return text
                .char_indices()
                .nth(col_idx)
                .map(|(byte, _)| line_start + byte);
        }
        line_start += text.len() + 1;
    }
    None
}
