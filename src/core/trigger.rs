// src/core/trigger.rs

//! The trigger registry: permanent (pattern, handler) pairs that fire every
//! time their pattern matches an inbound line, for the whole session.

use crate::core::dispatch::HandlerFuture;
use crate::core::link::Link;
use crate::core::matching::LineMatch;
use crate::core::MudlinkError;
use async_trait::async_trait;
use regex::Regex;
use std::future::Future;
use std::sync::Arc;

/// Reacts to a line matching a trigger's pattern.
///
/// The handler starts running on the dispatch flow as soon as its line is
/// matched. If it awaits (a watcher, typically), it is parked and the dispatch
/// flow moves on to the next line.
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn on_match(&self, link: Link, line: String, matched: LineMatch)
    -> Result<(), MudlinkError>;
}

#[async_trait]
impl<F, Fut> TriggerHandler for F
where
    F: Fn(Link, String, LineMatch) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), MudlinkError>> + Send + 'static,
{
    async fn on_match(
        &self,
        link: Link,
        line: String,
        matched: LineMatch,
    ) -> Result<(), MudlinkError> {
        (self)(link, line, matched).await
    }
}

/// A compiled pattern and the handler it fires.
#[derive(Clone)]
pub struct Trigger {
    name: String,
    pattern: Regex,
    handler: Arc<dyn TriggerHandler>,
}

impl Trigger {
    pub fn new(pattern: Regex, handler: impl TriggerHandler + 'static) -> Self {
        Self {
            name: pattern.as_str().to_string(),
            pattern,
            handler: Arc::new(handler),
        }
    }

    /// Compiles `pattern` and pairs it with `handler`.
    pub fn compile(
        pattern: &str,
        handler: impl TriggerHandler + 'static,
    ) -> Result<Self, MudlinkError> {
        Ok(Self::new(Regex::new(pattern)?, handler))
    }

    /// Overrides the name used in logs; defaults to the pattern source.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Builds the handler future for one firing.
    pub fn fire(&self, link: Link, line: String, matched: LineMatch) -> HandlerFuture {
        let handler = self.handler.clone();
        Box::pin(async move { handler.on_match(link, line, matched).await })
    }
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// A flat list of triggers in registration order. Frozen once the session starts.
#[derive(Debug, Clone, Default)]
pub struct TriggerRegistry {
    triggers: Vec<Trigger>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn register(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
    }

    /// Returns the first trigger, in registration order, whose pattern matches
    /// `line`, together with the match.
    pub fn match_line(&self, line: &str) -> Option<(&Trigger, LineMatch)> {
        self.triggers
            .iter()
            .find_map(|t| LineMatch::search(&t.pattern, line).map(|m| (t, m)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.iter()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}
