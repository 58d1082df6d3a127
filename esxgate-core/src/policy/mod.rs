//! Command authorization engine
//!
//! This module decides admit/deny for every candidate command string before
//! it reaches a remote host. The engine is deterministic, side-effect free,
//! and fail-closed: anything not provably safe is denied.
//!
//! Evaluation order (first match wins):
//! 1. empty command
//! 2. denylist veto at the start of the command (cannot be overridden)
//! 3. exact allowlist catalog
//! 4. dangerous-pattern scan (metacharacters, escalation/shell tokens)
//! 5. approved command-family prefixes
//! 6. restricted charset gate
//! 7. default deny
//!
//! The dangerous-pattern scan runs before prefix approval so that a
//! prefix-approved family can never smuggle chaining or substitution
//! metacharacters past the gate.

mod tables;

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use tables::{PolicyTableError, PolicyTableResult, PolicyTables};

/// Errors that can occur while building a policy engine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// A table entry could not be compiled into a matcher
    #[error("Failed to compile policy pattern '{pattern}': {reason}")]
    PatternCompilationFailed {
        /// The table entry that failed to compile
        pattern: String,
        /// The reason for the failure
        reason: String,
    },
}

/// Result type for policy engine construction
pub type PolicyResult<T> = std::result::Result<T, PolicyError>;

/// Why a command was admitted or denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    /// The command was empty after trimming
    Empty,
    /// The command starts with a denylisted verb
    Denied,
    /// The command exactly matches a catalog entry
    ExactMatch,
    /// The command starts with an approved family prefix
    PrefixMatch,
    /// The command contains characters outside the restricted charset
    InvalidCharacters,
    /// The command contains shell metacharacters or escalation tokens
    DangerousPattern,
    /// The command matched no allow rule
    NotAllowlisted,
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::Empty => "Command cannot be empty",
            Self::Denied => "Command is not allowed for security reasons",
            Self::ExactMatch => "Command is allowed",
            Self::PrefixMatch => "Command prefix is allowed",
            Self::InvalidCharacters => "Command contains invalid characters",
            Self::DangerousPattern => "Command contains dangerous patterns",
            Self::NotAllowlisted => "Command is not in the allowed list",
        };
        write!(f, "{msg}")
    }
}

/// Outcome of validating a single command, produced fresh per call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the command may be executed
    pub admitted: bool,
    /// The rule that decided the outcome
    pub reason: ValidationReason,
}

impl ValidationResult {
    /// Creates an admitted result
    #[must_use]
    pub const fn admitted(reason: ValidationReason) -> Self {
        Self {
            admitted: true,
            reason,
        }
    }

    /// Creates a denied result
    #[must_use]
    pub const fn denied(reason: ValidationReason) -> Self {
        Self {
            admitted: false,
            reason,
        }
    }

    /// Returns true if the command was admitted
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        self.admitted
    }
}

/// Returns true if every character is in the restricted command charset:
/// ASCII alphanumerics, whitespace, `.`, `_`, `-`.
#[must_use]
pub fn has_valid_charset(command: &str) -> bool {
    command
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c.is_ascii_whitespace() || matches!(c, '.' | '_' | '-'))
}

/// Returns true if the command contains a chaining metacharacter (`&`, `;`, `|`)
#[must_use]
pub fn contains_chaining(command: &str) -> bool {
    command.chars().any(|c| matches!(c, '&' | ';' | '|'))
}

/// Returns true if the command contains a redirection metacharacter (`<`, `>`)
#[must_use]
pub fn contains_redirection(command: &str) -> bool {
    command.chars().any(|c| matches!(c, '<' | '>'))
}

/// Returns true if the command contains variable or command substitution
/// syntax (`$`, backtick; `${...}` is covered by `$`)
#[must_use]
pub fn contains_substitution(command: &str) -> bool {
    command.chars().any(|c| matches!(c, '$' | '`'))
}

/// Returns true if the command contains subshell syntax (`()`)
#[must_use]
pub fn contains_subshell(command: &str) -> bool {
    command.contains("()")
}

/// Returns true if the command contains a comment marker (`#`)
#[must_use]
pub fn contains_comment(command: &str) -> bool {
    command.contains('#')
}

/// Returns true if the command contains a backslash escape
/// (a backslash followed by any character)
#[must_use]
pub fn contains_escape(command: &str) -> bool {
    let mut chars = command.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek().is_some() {
            return true;
        }
    }
    false
}

/// The command authorization engine.
///
/// Holds the injected [`PolicyTables`] plus matchers compiled from them.
/// Denylist verbs compile to start-anchored token-boundary patterns;
/// dangerous tokens compile to word-boundary patterns, so `sh` matches
/// `sh -c` but not `vsish` or `search`.
#[derive(Debug)]
pub struct PolicyEngine {
    tables: PolicyTables,
    exact_allow: HashSet<String>,
    deny_matchers: Vec<Regex>,
    token_matchers: Vec<Regex>,
}

impl PolicyEngine {
    /// Builds an engine from the given tables.
    ///
    /// # Errors
    /// Returns `PolicyError::PatternCompilationFailed` if a table entry
    /// cannot be compiled into a matcher.
    pub fn new(tables: PolicyTables) -> PolicyResult<Self> {
        let deny_matchers = tables
            .denied_commands
            .iter()
            .map(|verb| compile_pattern(&format!(r"^{}\b", regex::escape(verb)), verb))
            .collect::<PolicyResult<Vec<_>>>()?;

        let token_matchers = tables
            .dangerous_tokens
            .iter()
            .map(|token| compile_pattern(&format!(r"\b{}\b", regex::escape(token)), token))
            .collect::<PolicyResult<Vec<_>>>()?;

        let exact_allow = tables.allowed_commands.iter().cloned().collect();

        Ok(Self {
            tables,
            exact_allow,
            deny_matchers,
            token_matchers,
        })
    }

    /// Builds an engine over the built-in tables.
    ///
    /// # Panics
    /// Never in practice: the built-in tables are static and every entry
    /// is escaped before compilation.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(PolicyTables::builtin()).expect("built-in policy tables compile")
    }

    /// Returns the tables this engine was built from
    #[must_use]
    pub const fn tables(&self) -> &PolicyTables {
        &self.tables
    }

    /// Validates a candidate command string.
    ///
    /// Deterministic and side-effect free. See the module docs for the
    /// exact rule precedence.
    #[must_use]
    pub fn validate(&self, command: &str) -> ValidationResult {
        let command = command.trim();

        if command.is_empty() {
            return ValidationResult::denied(ValidationReason::Empty);
        }

        // Unconditional veto, evaluated before any allow rule
        if self.matches_denylist(command) {
            return ValidationResult::denied(ValidationReason::Denied);
        }

        if self.exact_allow.contains(command) {
            return ValidationResult::admitted(ValidationReason::ExactMatch);
        }

        // Scanned before prefix approval: a prefix-approved command with an
        // injected metacharacter must still be denied
        if self.contains_dangerous_pattern(command) {
            return ValidationResult::denied(ValidationReason::DangerousPattern);
        }

        if self
            .tables
            .allowed_prefixes
            .iter()
            .any(|prefix| command.starts_with(prefix.as_str()))
        {
            return ValidationResult::admitted(ValidationReason::PrefixMatch);
        }

        if !has_valid_charset(command) {
            return ValidationResult::denied(ValidationReason::InvalidCharacters);
        }

        ValidationResult::denied(ValidationReason::NotAllowlisted)
    }

    /// Returns true if the command starts with a denylisted verb at a
    /// token boundary.
    ///
    /// Boundary semantics are anchored at the start only: `rm -rf /`,
    /// `rm.` and bare `rm` match the `rm` entry, while fused suffixes
    /// such as `rmdir` or `removedata` do not.
    #[must_use]
    pub fn matches_denylist(&self, command: &str) -> bool {
        self.deny_matchers.iter().any(|re| re.is_match(command))
    }

    /// Returns true if the command contains any dangerous metacharacter
    /// or a word-boundary escalation/shell token.
    #[must_use]
    pub fn contains_dangerous_pattern(&self, command: &str) -> bool {
        contains_chaining(command)
            || contains_redirection(command)
            || contains_substitution(command)
            || contains_subshell(command)
            || contains_comment(command)
            || contains_escape(command)
            || self.token_matchers.iter().any(|re| re.is_match(command))
    }
}

fn compile_pattern(pattern: &str, entry: &str) -> PolicyResult<Regex> {
    Regex::new(pattern).map_err(|e| PolicyError::PatternCompilationFailed {
        pattern: entry.to_string(),
        reason: e.to_string(),
    })
}
