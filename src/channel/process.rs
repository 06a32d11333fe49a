use crate::channel::{ChannelError, CommandChannel};
use crate::{muted_error, ph_debug};
use once_cell::sync;
use os_pipe::PipeReader;
use regex::Regex;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::Duration;
use timeout_readwrite::TimeoutReader;
use uuid::Uuid;

/// Engine console running as a child process (`cdb`, `kd` or a remote client of them).
///
/// Engine stdout and stderr are merged into a single pipe. The end of a command output is
/// detected by a unique marker echoed by the engine right after the command.
pub struct ProcessChannel {
    program: String,
    child: Child,
    stdin: ChildStdin,
    output: BufReader<TimeoutReader<PipeReader>>,
    echo: String,
    timeout: Option<Duration>,
}

impl ProcessChannel {
    /// Start an engine console.
    ///
    /// # Arguments
    ///
    /// * `program`: engine executable
    /// * `args`: engine arguments
    /// * `echo`: engine command that prints its argument (`.echo` for windbg family)
    /// * `timeout`: longest period of engine silence while waiting for an answer, `None` to wait forever
    pub fn spawn<ARGS: IntoIterator<Item = I>, I: AsRef<str>>(
        program: impl Into<String>,
        args: ARGS,
        echo: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ChannelError> {
        let program = program.into();
        let (reader, writer) = os_pipe::pipe()?;
        let err_writer = writer.try_clone()?;

        let mut command = Command::new(&program);
        command
            .args(args.into_iter().map(|a| a.as_ref().to_string()))
            .stdin(Stdio::piped())
            .stdout(writer)
            .stderr(err_writer);
        let mut child = command
            .spawn()
            .map_err(|e| ChannelError::Spawn(program.clone(), e))?;
        // pipe writers must be closed on our side, otherwise engine exit is never observed
        drop(command);

        let stdin = child.stdin.take().ok_or_else(|| {
            ChannelError::Spawn(
                program.clone(),
                std::io::Error::new(ErrorKind::BrokenPipe, "engine stdin is not captured"),
            )
        })?;

        Ok(Self {
            program,
            child,
            stdin,
            output: BufReader::new(TimeoutReader::new(reader, timeout)),
            echo: echo.into(),
            timeout,
        })
    }

    fn send(&mut self, command: &str, marker: &str) -> std::io::Result<()> {
        writeln!(self.stdin, "{command}")?;
        writeln!(self.stdin, "{} {marker}", self.echo)?;
        self.stdin.flush()
    }

    /// Read engine output up to the marker line. Output is not required to be valid UTF-8,
    /// broken sequences are replaced.
    fn read_answer(&mut self, command: &str, marker: &str) -> Result<Vec<String>, ChannelError> {
        let mut lines = vec![];
        let mut buf = vec![];
        loop {
            buf.clear();
            let read_n = match self.output.read_until(b'\n', &mut buf) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    return Err(ChannelError::Timeout {
                        command: command.to_string(),
                        timeout: self.timeout.unwrap_or_default(),
                    })
                }
                Err(e) => return Err(e.into()),
            };
            if read_n == 0 {
                return Err(ChannelError::Disconnected(command.to_string()));
            }

            let raw = String::from_utf8_lossy(&buf);
            let line = strip_prompt(raw.trim_end_matches(['\r', '\n']));
            if line.contains(marker) {
                return Ok(lines);
            }
            lines.push(line.to_string());
        }
    }
}

impl CommandChannel for ProcessChannel {
    fn execute(&mut self, command: &str) -> Result<Vec<String>, ChannelError> {
        ph_debug!("{} <- {command}", self.program);

        let marker = format!("poolhit-{}", Uuid::new_v4().simple());
        if let Err(e) = self.send(command, &marker) {
            return match e.kind() {
                ErrorKind::BrokenPipe => Err(ChannelError::Disconnected(command.to_string())),
                _ => Err(e.into()),
            };
        }

        self.read_answer(command, &marker)
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        if muted_error!(self.child.try_wait()).flatten().is_none() {
            _ = self.child.kill();
            _ = self.child.wait();
        }
    }
}

/// Remove engine prompts (`0: kd> `, `0:000> `) from the start of an output line.
///
/// Engine prints a prompt without a line break, so it sticks to the first line of the next
/// command output.
pub fn strip_prompt(line: &str) -> &str {
    static PROMPT_RE: sync::Lazy<Regex> = sync::Lazy::new(|| {
        Regex::new(r"^(\s*\d+:\s*(kd|\d+(:\w+)?)>\s?)+").expect("must compile")
    });

    match PROMPT_RE.find(line) {
        Some(prompt) => &line[prompt.end()..],
        None => line,
    }
}
