// src/core/protocol/mod.rs

//! Wire-level pieces shared by every component: line framing and the
//! delimiters of the private command grammar.

pub mod line_codec;

pub use line_codec::LineCodec;

use serde::{Deserialize, Serialize};

/// The delimiters that define the private command grammar. They are published
/// to the remote side when the session becomes active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConstants {
    /// A line is a command candidate iff it starts with this string.
    pub command_prefix: String,
    /// Separates the token, the invoker and each `key=value` pair.
    pub kwarg_delimiter: String,
    /// Separates the items of a list value.
    pub list_delimiter: String,
}

impl ProtocolConstants {
    pub fn new(
        command_prefix: impl Into<String>,
        kwarg_delimiter: impl Into<String>,
        list_delimiter: impl Into<String>,
    ) -> Self {
        Self {
            command_prefix: command_prefix.into(),
            kwarg_delimiter: kwarg_delimiter.into(),
            list_delimiter: list_delimiter.into(),
        }
    }

    /// Substitutes `{prefix}`, `{kwarg_delimiter}` and `{list_delimiter}` in a
    /// setup command template.
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{prefix}", &self.command_prefix)
            .replace("{kwarg_delimiter}", &self.kwarg_delimiter)
            .replace("{list_delimiter}", &self.list_delimiter)
    }
}

impl Default for ProtocolConstants {
    fn default() -> Self {
        Self::new("@@", "|~|", "|;|")
    }
}
