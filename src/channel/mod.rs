//! A connection to a debugger engine.
//!
//! Engine is driven by textual commands and answers with lines of text. Nothing in the answer
//! is guaranteed to match any pattern, callers treat it as plain text.

pub mod process;
pub mod script;

pub use crate::error::ChannelError;
pub use process::ProcessChannel;
pub use script::ScriptedChannel;

/// Line-oriented command execution capability of a debugger engine.
pub trait CommandChannel {
    /// Execute a command and return its output, top line first. Output may be empty.
    fn execute(&mut self, command: &str) -> Result<Vec<String>, ChannelError>;
}

impl<C: CommandChannel + ?Sized> CommandChannel for &mut C {
    fn execute(&mut self, command: &str) -> Result<Vec<String>, ChannelError> {
        (**self).execute(command)
    }
}

impl<C: CommandChannel + ?Sized> CommandChannel for Box<C> {
    fn execute(&mut self, command: &str) -> Result<Vec<String>, ChannelError> {
        (**self).execute(command)
    }
}
