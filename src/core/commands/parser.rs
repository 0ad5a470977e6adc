// src/core/commands/parser.rs

//! Parses (and builds) lines of the private command grammar:
//!
//! ```text
//! <prefix><token><D><invoker><D>[key1=val1[<D>key2=val2...]]
//! ```
//!
//! where `<D>` is the keyword delimiter and any value may itself be a
//! list-delimiter-joined sequence of items.

use crate::core::MudlinkError;
use crate::core::protocol::ProtocolConstants;
use indexmap::IndexMap;
use indexmap::map::{IntoIter, Iter};

/// The value half of a `key=value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KwargValue {
    /// A value without the list delimiter, kept verbatim (possibly empty).
    Text(String),
    /// A value containing the list delimiter, split into its non-empty items.
    List(Vec<String>),
}

impl KwargValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            KwargValue::Text(s) => Some(s),
            KwargValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            KwargValue::List(items) => Some(items),
            KwargValue::Text(_) => None,
        }
    }
}

impl From<&str> for KwargValue {
    fn from(s: &str) -> Self {
        KwargValue::Text(s.to_string())
    }
}

impl From<String> for KwargValue {
    fn from(s: String) -> Self {
        KwargValue::Text(s)
    }
}

impl From<Vec<String>> for KwargValue {
    fn from(items: Vec<String>) -> Self {
        KwargValue::List(items)
    }
}

impl From<Vec<&str>> for KwargValue {
    fn from(items: Vec<&str>) -> Self {
        KwargValue::List(items.into_iter().map(str::to_string).collect())
    }
}

/// Keyword arguments in the order they appeared on the line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Kwargs(IndexMap<String, KwargValue>);

impl Kwargs {
    pub fn new() -> Self {
        Default::default()
    }

    /// Inserts a pair. A repeated key keeps its first position and takes the
    /// latest value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<KwargValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&KwargValue> {
        self.0.get(key)
    }

    /// The value of `key` if it is scalar text.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(KwargValue::as_text)
    }

    /// The items of `key` if it is a list.
    pub fn list(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).and_then(KwargValue::as_list)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> Iter<'_, String, KwargValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<KwargValue>> FromIterator<(K, V)> for Kwargs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut kwargs = Kwargs::new();
        for (k, v) in iter {
            kwargs.insert(k, v);
        }
        kwargs
    }
}

impl IntoIterator for Kwargs {
    type Item = (String, KwargValue);
    type IntoIter = IntoIter<String, KwargValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Kwargs {
    type Item = (&'a String, &'a KwargValue);
    type IntoIter = Iter<'a, String, KwargValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A structured command decoded from one inbound line. Built per line and
/// dropped after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub token: String,
    pub invoker: String,
    pub kwargs: Kwargs,
}

impl ParsedCommand {
    pub fn new(token: impl Into<String>, invoker: impl Into<String>, kwargs: Kwargs) -> Self {
        Self {
            token: token.into(),
            invoker: invoker.into(),
            kwargs,
        }
    }

    /// Parses `line` as a command. Returns `None` for any line that does not
    /// start with the command prefix; never fails otherwise.
    ///
    /// A line holding only the prefix and a token parses with an empty invoker
    /// and no keywords. Malformed `key=value` segments are dropped one by one
    /// without affecting the rest of the line.
    pub fn parse(line: &str, protocol: &ProtocolConstants) -> Option<Self> {
        let body = line.strip_prefix(protocol.command_prefix.as_str())?;
        let delim = protocol.kwarg_delimiter.as_str();

        let (token, rest) = body.split_once(delim).unwrap_or((body, ""));
        let mut segments = rest.split(delim);
        let invoker = segments.next().unwrap_or_default();

        let kwargs = segments
            .filter_map(|segment| parse_segment(segment, &protocol.list_delimiter).ok())
            .collect();

        Some(Self::new(token, invoker, kwargs))
    }

    /// Builds the line that `parse` would turn back into this command.
    ///
    /// Lists of fewer than two items carry a trailing list delimiter so they
    /// are not mistaken for scalar text on the way back in.
    pub fn encode(&self, protocol: &ProtocolConstants) -> String {
        let delim = protocol.kwarg_delimiter.as_str();
        let mut line = String::with_capacity(64);
        line.push_str(&protocol.command_prefix);
        line.push_str(&self.token);
        line.push_str(delim);
        line.push_str(&self.invoker);
        for (key, value) in &self.kwargs {
            line.push_str(delim);
            line.push_str(key);
            line.push('=');
            match value {
                KwargValue::Text(text) => line.push_str(text),
                KwargValue::List(items) => {
                    line.push_str(&items.join(&protocol.list_delimiter));
                    if items.len() < 2 {
                        line.push_str(&protocol.list_delimiter);
                    }
                }
            }
        }
        line
    }
}

/// Parses one `key=value` segment.
///
/// A segment without `=`, or with an empty key, is a
/// `MalformedCommandSegment`. A value containing the list delimiter becomes a
/// list of its non-empty items (so a value made only of delimiters is an empty
/// list); any other value, including the empty string, is kept as text.
pub fn parse_segment(
    segment: &str,
    list_delimiter: &str,
) -> Result<(String, KwargValue), MudlinkError> {
    let (key, value) = segment
        .split_once('=')
        .ok_or_else(|| MudlinkError::MalformedCommandSegment(segment.to_string()))?;
    if key.is_empty() {
        return Err(MudlinkError::MalformedCommandSegment(segment.to_string()));
    }

    let value = if value.contains(list_delimiter) {
        KwargValue::List(
            value
                .split(list_delimiter)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        )
    } else {
        KwargValue::Text(value.to_string())
    };
    Ok((key.to_string(), value))
}
