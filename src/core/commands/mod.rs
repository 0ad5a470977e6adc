// src/core/commands/mod.rs

//! Structured inbound commands: the line grammar and the handler table.

pub mod parser;
pub mod registry;

pub use parser::{KwargValue, Kwargs, ParsedCommand, parse_segment};
pub use registry::{CommandHandler, CommandRegistry, CommandSpec};
