//! Identifier handling for table, column, index and alias names.
//!
//! SQLite cannot bind identifiers as parameters, so they end up in the
//! statement text. Under [`IdentifierPolicy::Strict`] a name must match
//! `[A-Za-z_][A-Za-z0-9_]*` and is emitted double-quoted. Under
//! [`IdentifierPolicy::Raw`] the name is concatenated as given: the caller
//! must supply text that is safe to splice into SQL.

use serde::{Deserialize, Serialize};

use crate::error::{MirrorError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierPolicy {
    #[default]
    Strict,
    Raw,
}

impl IdentifierPolicy {
    /// Render `name` for inclusion in statement text.
    pub fn render(self, name: &str) -> Result<String> {
        match self {
            IdentifierPolicy::Strict => {
                if is_plain_identifier(name) {
                    Ok(quote_ident(name))
                } else {
                    Err(MirrorError::InvalidIdentifier(name.to_string()))
                }
            }
            IdentifierPolicy::Raw => Ok(name.to_string()),
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote a SQL identifier using ANSI double-quoting.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
