use crate::channel::{ChannelError, CommandChannel};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};

/// Engine stand-in that answers from prepared per-command response queues.
///
/// Every command pops the next response of its own queue, an exhausted (or unknown) queue
/// answers with no lines. All executed commands are recorded.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    responses: HashMap<String, VecDeque<Vec<String>>>,
    history: Vec<String>,
    disconnect_after: Option<usize>,
}

#[derive(Deserialize)]
struct Transcript {
    #[serde(default, rename = "response")]
    responses: Vec<TranscriptEntry>,
    #[serde(default)]
    disconnect_after: Option<usize>,
}

#[derive(Deserialize)]
struct TranscriptEntry {
    command: String,
    #[serde(default)]
    lines: Vec<String>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load responses from a toml transcript:
    ///
    /// ```toml
    /// [[response]]
    /// command = "k 2"
    /// lines = ["00 nt!ExAllocatePoolWithTag"]
    /// ```
    pub fn from_transcript(data: &str) -> Result<Self, toml::de::Error> {
        let transcript: Transcript = toml::from_str(data)?;
        let mut channel = Self::new();
        for entry in transcript.responses {
            channel.push_response(entry.command, entry.lines);
        }
        channel.disconnect_after = transcript.disconnect_after;
        Ok(channel)
    }

    /// Queue next response for a command.
    pub fn push_response<I, S>(&mut self, command: impl Into<String>, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses
            .entry(command.into())
            .or_default()
            .push_back(lines.into_iter().map(Into::into).collect());
    }

    /// Builder form of [`ScriptedChannel::push_response`].
    pub fn respond<I, S>(mut self, command: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_response(command, lines);
        self
    }

    /// Fail every command after the first `n` with [`ChannelError::Disconnected`].
    pub fn disconnect_after(mut self, n: usize) -> Self {
        self.disconnect_after = Some(n);
        self
    }

    /// Commands executed so far, in order.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Number of times a command was executed.
    pub fn count(&self, command: &str) -> usize {
        self.history.iter().filter(|c| *c == command).count()
    }
}

impl CommandChannel for ScriptedChannel {
    fn execute(&mut self, command: &str) -> Result<Vec<String>, ChannelError> {
        if self
            .disconnect_after
            .is_some_and(|limit| self.history.len() >= limit)
        {
            return Err(ChannelError::Disconnected(command.to_string()));
        }
        self.history.push(command.to_string());

        Ok(self
            .responses
            .get_mut(command)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default())
    }
}
