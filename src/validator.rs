//! SQL safety validator
//!
//! Syntactic keyword gate applied to every statement before execution: the
//! statement must begin with SELECT and must not contain any deny-listed
//! keyword or a multi-statement separator. This is a best-effort filter,
//! not a security boundary. It does not parse SQL and cannot catch keyword
//! smuggling through comments or string literals; a read-only database role
//! is the appropriate hard guarantee.

use crate::error::{NlqError, Result};
use regex::Regex;

/// Statement keywords that are never allowed to reach the warehouse.
pub const DEFAULT_DENY_LIST: [&str; 9] = [
    "DROP", "DELETE", "ALTER", "TRUNCATE", "INSERT", "UPDATE", "GRANT", "CREATE", "REVOKE",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationVerdict {
    pub passed: bool,
    pub reason: Option<String>,
}

impl ValidationVerdict {
    fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

pub struct SqlValidator {
    deny_patterns: Vec<(String, Regex)>,
}

impl SqlValidator {
    pub fn new() -> Self {
        Self::with_deny_list(&DEFAULT_DENY_LIST)
    }

    /// Build a validator with a custom keyword deny-list. Keywords are
    /// matched case-insensitively on word boundaries.
    pub fn with_deny_list(keywords: &[&str]) -> Self {
        let deny_patterns = keywords
            .iter()
            .map(|kw| {
                let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw)))
                    .unwrap_or_else(|_| unreachable!("escaped keyword is a valid pattern"));
                (kw.to_uppercase(), pattern)
            })
            .collect();
        Self { deny_patterns }
    }

    /// Inspect a candidate statement. Never mutates the input.
    pub fn validate(&self, sql: &str) -> ValidationVerdict {
        let trimmed = sql.trim();

        if trimmed.is_empty() {
            return ValidationVerdict::fail("Statement is empty");
        }

        let head = trimmed
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_uppercase();
        if head != "SELECT" {
            return ValidationVerdict::fail(format!(
                "Only SELECT statements are allowed, statement begins with {}",
                head
            ));
        }

        if trimmed.contains(';') {
            return ValidationVerdict::fail(
                "Multi-statement separator ';' is not allowed",
            );
        }

        for (keyword, pattern) in &self.deny_patterns {
            if pattern.is_match(trimmed) {
                return ValidationVerdict::fail(format!(
                    "Query contains potentially dangerous keyword: {}",
                    keyword
                ));
            }
        }

        ValidationVerdict::pass()
    }

    /// `validate` as a `Result`, for use inside the pipeline.
    pub fn check(&self, sql: &str) -> Result<()> {
        let verdict = self.validate(sql);
        if verdict.passed {
            Ok(())
        } else {
            Err(NlqError::Validation(
                verdict.reason.unwrap_or_else(|| "Rejected".to_string()),
            ))
        }
    }
}

impl Default for SqlValidator {
    fn default() -> Self {
        Self::new()
    }
}
