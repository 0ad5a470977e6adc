// src/core/commands/registry.rs

//! The token → handler table for structured inbound commands.

use super::parser::{Kwargs, ParsedCommand};
use crate::core::MudlinkError;
use crate::core::dispatch::HandlerFuture;
use crate::core::link::Link;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

/// Handles one kind of structured command, selected by its token.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn call(&self, link: Link, invoker: String, kwargs: Kwargs) -> Result<(), MudlinkError>;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(Link, String, Kwargs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), MudlinkError>> + Send + 'static,
{
    async fn call(&self, link: Link, invoker: String, kwargs: Kwargs) -> Result<(), MudlinkError> {
        (self)(link, invoker, kwargs).await
    }
}

/// A token paired with its handler, as exposed by extension tables.
#[derive(Clone)]
pub struct CommandSpec {
    pub token: String,
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandSpec {
    pub fn new(token: impl Into<String>, handler: impl CommandHandler + 'static) -> Self {
        Self {
            token: token.into(),
            handler: Arc::new(handler),
        }
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("token", &self.token)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers `spec`. Registering the same token twice keeps the later handler.
    pub fn register(&mut self, spec: CommandSpec) {
        self.handlers.insert(spec.token, spec.handler);
    }

    pub fn contains(&self, token: &str) -> bool {
        self.handlers.contains_key(token)
    }

    pub fn lookup(&self, token: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(token).cloned()
    }

    /// Builds the handler future for `command`, or `UnknownCommandToken` if no
    /// handler is registered for its token.
    pub fn dispatch(
        &self,
        link: Link,
        command: ParsedCommand,
    ) -> Result<HandlerFuture, MudlinkError> {
        let handler = self
            .lookup(&command.token)
            .ok_or_else(|| MudlinkError::UnknownCommandToken(command.token.clone()))?;
        let span = tracing::info_span!(
            "command",
            token = %command.token,
            invoker = %command.invoker
        );
        let ParsedCommand {
            invoker, kwargs, ..
        } = command;
        Ok(Box::pin(
            async move { handler.call(link, invoker, kwargs).await }.instrument(span),
        ))
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tokens: Vec<&str> = self.tokens().collect();
        tokens.sort_unstable();
        f.debug_struct("CommandRegistry")
            .field("tokens", &tokens)
            .finish()
    }
}
