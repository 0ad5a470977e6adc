// src/core/extension.rs

//! Composition of trigger, command and timer tables before a session starts.
//!
//! Every extension exposes its tables through the `Extension` trait and the
//! embedding application registers them explicitly, in order. Once the
//! session starts the tables are frozen.

use crate::core::MudlinkError;
use crate::core::commands::{CommandHandler, CommandRegistry, CommandSpec};
use crate::core::dispatch::Dispatcher;
use crate::core::tasks::Timer;
use crate::core::trigger::{Trigger, TriggerHandler, TriggerRegistry};
use std::sync::Arc;
use tracing::debug;

/// A bundle of triggers, commands and timers contributed by one feature.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn triggers(&self) -> Result<Vec<Trigger>, MudlinkError> {
        Ok(Vec::new())
    }

    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }

    fn timers(&self) -> Result<Vec<Timer>, MudlinkError> {
        Ok(Vec::new())
    }
}

/// The mutable builder for a session's tables.
#[derive(Debug, Default)]
pub struct Registries {
    triggers: TriggerRegistry,
    commands: CommandRegistry,
    timers: Vec<Timer>,
}

impl Registries {
    pub fn new() -> Self {
        Default::default()
    }

    /// Compiles `pattern` and appends a trigger for it.
    pub fn register_trigger(
        &mut self,
        pattern: &str,
        handler: impl TriggerHandler + 'static,
    ) -> Result<&mut Self, MudlinkError> {
        self.triggers.register(Trigger::compile(pattern, handler)?);
        Ok(self)
    }

    pub fn add_trigger(&mut self, trigger: Trigger) -> &mut Self {
        self.triggers.register(trigger);
        self
    }

    pub fn register_command(
        &mut self,
        token: impl Into<String>,
        handler: impl CommandHandler + 'static,
    ) -> &mut Self {
        self.commands.register(CommandSpec::new(token, handler));
        self
    }

    pub fn register_timer(&mut self, timer: Timer) -> &mut Self {
        self.timers.push(timer);
        self
    }

    /// Appends every table `extension` exposes, after what is already registered.
    pub fn register_extension(&mut self, extension: &dyn Extension) -> Result<&mut Self, MudlinkError> {
        let triggers = extension.triggers()?;
        let commands = extension.commands();
        let timers = extension.timers()?;
        debug!(
            "Registering extension '{}': {} trigger(s), {} command(s), {} timer(s).",
            extension.name(),
            triggers.len(),
            commands.len(),
            timers.len()
        );
        for trigger in triggers {
            self.triggers.register(trigger);
        }
        for spec in commands {
            self.commands.register(spec);
        }
        self.timers.extend(timers);
        Ok(self)
    }

    pub fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    /// Freezes the tables into a dispatcher and the timer list.
    pub fn freeze(self) -> (Dispatcher, Vec<Timer>) {
        let dispatcher = Dispatcher::new(Arc::new(self.triggers), Arc::new(self.commands));
        (dispatcher, self.timers)
    }
}
