//! Guards for user-supplied text that ends up in backend SQL.
//!
//! Column names, table names, row conditions and in-set values all come
//! from expectation or metric kwargs. Nothing reaches the DataFusion session
//! without passing through [`SqlSecurity`].

use crate::error::{Result, TermError};
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_IDENTIFIER_LENGTH: usize = 128;
const MAX_EXPRESSION_LENGTH: usize = 5000;

static IDENTIFIER_REGEX: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*$").ok()
});

static SUSPICIOUS_EXPRESSIONS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        r";\s*\w+",
        r"union\s+select",
        r"'\s*or\s+'",
        r"'\s*and\s+'",
        r"\(\s*select\s+.*\)",
    ]
    .into_iter()
    .filter_map(|pattern| Regex::new(pattern).ok().map(|regex| (pattern, regex)))
    .collect()
});

/// Statement keywords that may not be used as a bare identifier segment.
const RESERVED_IDENTIFIERS: &[&str] = &[
    "select", "insert", "update", "delete", "drop", "create", "alter", "union", "exec",
    "declare",
];

/// Statement keywords rejected as whole words in a row condition.
static EXPRESSION_KEYWORDS: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"\b(drop|create|alter|truncate|insert|update|delete|exec|declare|cursor|fetch|open|close|begin|commit|rollback|information_schema|load_file|into\s+outfile)\b|\b(?:xp|sp)_\w+\s*\(",
    )
    .ok()
});

/// Single-quoted literals, with `''` as an escaped quote.
static STRING_LITERAL: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"'(?:[^']|'')*'").ok());

const COMMENT_MARKERS: &[&str] = &["--", "/*", "*/"];

fn security_error(message: impl Into<String>) -> TermError {
    TermError::SecurityError(message.into())
}

pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates an identifier and returns it double-quoted.
    ///
    /// ```rust
    /// use term_expectations::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::escape_identifier("customer_id").unwrap(), "\"customer_id\"");
    /// assert!(SqlSecurity::escape_identifier("id; DROP TABLE users--").is_err());
    /// ```
    pub fn escape_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        Ok(format!("\"{identifier}\""))
    }

    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(security_error(
                "SQL identifier cannot be empty or whitespace-only",
            ));
        }
        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(security_error(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }

        let regex = IDENTIFIER_REGEX
            .as_ref()
            .ok_or_else(|| TermError::Internal("identifier pattern failed to compile".into()))?;
        if !regex.is_match(identifier) {
            return Err(security_error(format!(
                "Invalid SQL identifier format: '{identifier}'. Identifiers must start with a letter or underscore and contain only letters, numbers, underscores and dots"
            )));
        }

        // Identifiers are double-quoted when used, so only bare keywords are refused.
        if let Some(segment) = identifier
            .split('.')
            .find(|segment| RESERVED_IDENTIFIERS.contains(&segment.to_lowercase().as_str()))
        {
            return Err(security_error(format!(
                "SQL identifier is a reserved keyword: '{segment}'"
            )));
        }
        Ok(())
    }

    /// Checks a row condition before it is spliced into a `WHERE` clause.
    pub fn validate_sql_expression(expression: &str) -> Result<()> {
        if expression.len() > MAX_EXPRESSION_LENGTH {
            return Err(security_error(format!(
                "SQL expression too long (max {MAX_EXPRESSION_LENGTH} characters)"
            )));
        }
        if expression.contains('\0') {
            return Err(security_error("SQL expression cannot contain null bytes"));
        }

        let literals = STRING_LITERAL
            .as_ref()
            .ok_or_else(|| TermError::Internal("literal pattern failed to compile".into()))?;
        let keywords = EXPRESSION_KEYWORDS
            .as_ref()
            .ok_or_else(|| TermError::Internal("keyword pattern failed to compile".into()))?;

        // Literal contents are data; keep the quotes so quote-based patterns still apply.
        let lower = literals
            .replace_all(&expression.to_lowercase(), "''")
            .into_owned();
        if let Some(found) = keywords.find(&lower) {
            return Err(security_error(format!(
                "SQL expression contains dangerous keyword: '{}'",
                found.as_str().trim_end_matches('(').trim_end()
            )));
        }
        if let Some(marker) = COMMENT_MARKERS.iter().find(|m| lower.contains(*m)) {
            return Err(security_error(format!(
                "SQL expression contains comment marker: '{marker}'"
            )));
        }
        if let Some((pattern, _)) = SUSPICIOUS_EXPRESSIONS
            .iter()
            .find(|(_, regex)| regex.is_match(&lower))
        {
            return Err(security_error(format!(
                "SQL expression contains suspicious pattern matching: {pattern}"
            )));
        }
        Ok(())
    }

    /// Quotes a string value as a SQL literal, doubling embedded quotes.
    pub fn quote_string_literal(value: &str) -> Result<String> {
        if value.contains('\0') {
            return Err(security_error("SQL literal cannot contain null bytes"));
        }
        Ok(format!("'{}'", value.replace('\'', "''")))
    }
}
