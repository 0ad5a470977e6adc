// src/core/matching.rs

//! Owned match results shared by watchers and triggers.

use crate::core::MudlinkError;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;

/// Selects which part of a match a watcher resolves with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureGroup {
    Index(usize),
    Name(String),
}

impl From<usize> for CaptureGroup {
    fn from(index: usize) -> Self {
        CaptureGroup::Index(index)
    }
}

impl From<&str> for CaptureGroup {
    fn from(name: &str) -> Self {
        CaptureGroup::Name(name.to_string())
    }
}

impl From<String> for CaptureGroup {
    fn from(name: String) -> Self {
        CaptureGroup::Name(name)
    }
}

impl fmt::Display for CaptureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureGroup::Index(i) => write!(f, "{i}"),
            CaptureGroup::Name(n) => f.write_str(n),
        }
    }
}

/// An owned copy of a regex match against one inbound line.
///
/// `regex::Captures` borrows the haystack, but handlers outlive the dispatch of
/// the line that fired them, so the interesting text is copied out here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    groups: Vec<Option<String>>,
    named: HashMap<String, String>,
}

impl LineMatch {
    /// Runs `pattern` against `line` (search semantics: the match may start
    /// anywhere in the line). Returns `None` if it does not match.
    pub fn search(pattern: &Regex, line: &str) -> Option<Self> {
        pattern
            .captures(line)
            .map(|caps| Self::from_captures(pattern, &caps))
    }

    fn from_captures(pattern: &Regex, caps: &Captures<'_>) -> Self {
        let groups = caps
            .iter()
            .map(|m| m.map(|m| m.as_str().to_string()))
            .collect();
        let named = pattern
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
            .collect();
        Self { groups, named }
    }

    /// The full text of the match.
    pub fn as_str(&self) -> &str {
        self.groups
            .first()
            .and_then(|g| g.as_deref())
            .unwrap_or_default()
    }

    /// A numbered group, if it participated in the match.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|g| g.as_deref())
    }

    /// A named group, if it participated in the match.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Extracts the text a watcher resolves with: the whole match, or only the
    /// selected group.
    pub fn select(&self, group: Option<&CaptureGroup>) -> Result<String, MudlinkError> {
        match group {
            None => Ok(self.as_str().to_string()),
            Some(CaptureGroup::Index(i)) => self
                .get(*i)
                .map(str::to_string)
                .ok_or_else(|| MudlinkError::CaptureGroupMissing(i.to_string())),
            Some(CaptureGroup::Name(n)) => self
                .name(n)
                .map(str::to_string)
                .ok_or_else(|| MudlinkError::CaptureGroupMissing(n.clone())),
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
