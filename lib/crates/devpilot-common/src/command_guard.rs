//! Allowlist check for shell commands.
//!
//! The check is purely textual: no environment lookups, no shell parsing,
//! no awareness of metacharacters. An allowed prefix followed by `&& rm -rf`
//! is still allowed; the allowlist is the only control.

use serde::{Deserialize, Serialize};

/// How allowlist entries are compared against a command.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommandMatch {
    /// Literal string prefix. `"npm"` admits `"npm install"` and also
    /// `"npmfoo"`.
    #[default]
    Prefix,
    /// Whitespace-delimited tokens of the entry must equal the leading
    /// tokens of the command. `"npm"` admits `"npm install"` but not
    /// `"npmfoo"`.
    Token,
}

/// Returns `true` when `command` is admitted by at least one entry.
///
/// An empty allowlist denies everything. Blank entries never match.
#[must_use]
pub fn is_allowed<S: AsRef<str>>(allowlist: &[S], command: &str, mode: CommandMatch) -> bool {
    allowlist
        .iter()
        .map(AsRef::as_ref)
        .filter(|entry| !entry.trim().is_empty())
        .any(|entry| match mode {
            CommandMatch::Prefix => command.starts_with(entry),
            CommandMatch::Token => leading_tokens_match(entry, command),
        })
}

fn leading_tokens_match(entry: &str, command: &str) -> bool {
    let mut command_tokens = command.split_whitespace();
    entry
        .split_whitespace()
        .all(|expected| command_tokens.next() == Some(expected))
}
