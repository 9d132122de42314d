//! Write assurance rules
//!
//! Decides whether an operation must be served by a write/master host even
//! though it could be answered by a replica:
//! - the table reference names an assured write table
//! - an authenticated backend session is active (when enabled)
//! - the process was dispatched from the command line (when enabled)

use dbroute_core::{AssureConfig, ExecutionContext};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;

/// Bare identifiers of a table clause such as `fe_sessions AS sessions, fe_users`
static TABLE_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i),?\b(\w+)\b(\s+AS\s+\w+)?").unwrap());

/// Which rule pinned an operation to the write pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteReason {
    AssuredTable,
    BackendSession,
    CliDispatch,
}

impl WriteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteReason::AssuredTable => "assured_table",
            WriteReason::BackendSession => "backend_session",
            WriteReason::CliDispatch => "cli_dispatch",
        }
    }
}

impl fmt::Display for WriteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable write-assurance rules derived from `AssureConfig`
#[derive(Debug, Clone, Default)]
pub struct WriteAssurancePolicy {
    assured_write_tables: HashSet<String>,
    backend_session_assured: bool,
    cli_dispatch_assured: bool,
    case_insensitive: bool,
}

impl WriteAssurancePolicy {
    pub fn from_config(config: &AssureConfig) -> Self {
        let write = &config.write;
        let case_insensitive = write.case_insensitive;

        let assured_write_tables = write
            .table_names()
            .into_iter()
            .map(|name| {
                if case_insensitive {
                    name.to_ascii_lowercase()
                } else {
                    name
                }
            })
            .collect();

        Self {
            assured_write_tables,
            backend_session_assured: write.backend_session,
            cli_dispatch_assured: write.cli_dispatch,
            case_insensitive,
        }
    }

    /// Tables always served by write hosts
    pub fn assured_write_tables(&self) -> &HashSet<String> {
        &self.assured_write_tables
    }

    fn contains_table(&self, name: &str) -> bool {
        if self.case_insensitive {
            self.assured_write_tables.contains(&name.to_ascii_lowercase())
        } else {
            self.assured_write_tables.contains(name)
        }
    }

    /// Whether `table_ref` names, or contains, an assured write table
    ///
    /// A reference with a space or comma is treated as a table clause and
    /// scanned left to right, skipping `AS <alias>` suffixes; the first
    /// assured identifier wins.
    pub fn is_assured_write_table(&self, table_ref: &str) -> bool {
        let table_ref = table_ref.trim();

        if self.contains_table(table_ref) {
            return true;
        }

        if !table_ref.contains([' ', ',']) {
            return false;
        }

        TABLE_TOKEN_REGEX
            .captures_iter(table_ref)
            .filter_map(|captures| captures.get(1))
            .any(|table| self.contains_table(table.as_str()))
    }

    /// Authenticated sessions are pinned and one is active
    pub fn is_assured_write_session(&self, ctx: &ExecutionContext) -> bool {
        self.backend_session_assured && ctx.has_authenticated_session
    }

    /// CLI processes are pinned and this is one
    pub fn is_assured_write_cli_dispatch(&self, ctx: &ExecutionContext) -> bool {
        self.cli_dispatch_assured && ctx.is_cli_dispatch
    }

    /// First rule that forces the write pool, if any
    pub fn write_reason(&self, table_ref: &str, ctx: &ExecutionContext) -> Option<WriteReason> {
        if self.is_assured_write_table(table_ref) {
            Some(WriteReason::AssuredTable)
        } else if self.is_assured_write_session(ctx) {
            Some(WriteReason::BackendSession)
        } else if self.is_assured_write_cli_dispatch(ctx) {
            Some(WriteReason::CliDispatch)
        } else {
            None
        }
    }

    /// Whether the operation must be served by a write host
    pub fn must_use_write(&self, table_ref: &str, ctx: &ExecutionContext) -> bool {
        self.write_reason(table_ref, ctx).is_some()
    }
}
