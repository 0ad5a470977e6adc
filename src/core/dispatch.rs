// src/core/dispatch.rs

//! The per-line dispatch pipeline: watcher, then trigger, then command,
//! stopping at the first consumer.

use crate::core::commands::{CommandRegistry, ParsedCommand};
use crate::core::link::Link;
use crate::core::trigger::TriggerRegistry;
use crate::core::{MudlinkError, metrics};
use futures::future::BoxFuture;
use std::sync::Arc;

/// The work a trigger or command handler does for one line.
pub type HandlerFuture = BoxFuture<'static, Result<(), MudlinkError>>;

/// Which stage of the pipeline took a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consumer {
    Watcher,
    Trigger(String),
    Command(String),
    /// Nothing matched; the line falls through silently.
    Unconsumed,
}

/// The outcome of dispatching one line. `work` is the handler future still to
/// be driven, if a trigger or command took the line.
pub struct Dispatched {
    pub consumer: Consumer,
    pub work: Option<HandlerFuture>,
}

impl Dispatched {
    fn settled(consumer: Consumer) -> Self {
        Self {
            consumer,
            work: None,
        }
    }
}

impl std::fmt::Debug for Dispatched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatched")
            .field("consumer", &self.consumer)
            .field("has_work", &self.work.is_some())
            .finish()
    }
}

/// Holds the frozen trigger and command tables for a session.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    triggers: Arc<TriggerRegistry>,
    commands: Arc<CommandRegistry>,
}

impl Dispatcher {
    pub fn new(triggers: Arc<TriggerRegistry>, commands: Arc<CommandRegistry>) -> Self {
        Self { triggers, commands }
    }

    pub fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Routes one inbound line. Never fails: a line nobody wants is simply
    /// reported as `Consumer::Unconsumed`.
    pub fn dispatch(&self, link: &Link, line: &str) -> Dispatched {
        if link.watchers().match_line(line) {
            return Dispatched::settled(Consumer::Watcher);
        }

        if let Some((trigger, matched)) = self.triggers.match_line(line) {
            metrics::TRIGGERS_FIRED_TOTAL.inc();
            return Dispatched {
                consumer: Consumer::Trigger(trigger.name().to_string()),
                work: Some(trigger.fire(link.clone(), line.to_string(), matched)),
            };
        }

        let Some(command) = ParsedCommand::parse(line, link.protocol()) else {
            return Dispatched::settled(Consumer::Unconsumed);
        };
        let token = command.token.clone();
        match self.commands.dispatch(link.clone(), command) {
            Ok(work) => {
                metrics::COMMANDS_DISPATCHED_TOTAL
                    .with_label_values(&[token.as_str()])
                    .inc();
                Dispatched {
                    consumer: Consumer::Command(token),
                    work: Some(work),
                }
            }
            // Most traffic is not a command; an unknown token is expected.
            Err(_) => Dispatched::settled(Consumer::Unconsumed),
        }
    }
}
