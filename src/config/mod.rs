//! Session configuration.
//!
//! A session is described once, before the run, and never changes afterwards. Values come from
//! the built-in preset, then from a user toml file, then from command line overrides.

use crate::error::ConfigError;
use crate::format::FormatKind;
use crate::weak_error;
use serde::Deserialize;
use ser::SessionFile;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

mod ser;

const PRESET: &str = include_str!("preset/session.toml");

/// Width of a pool tag in characters.
pub const TAG_WIDTH: usize = 4;

/// Engine command dialect.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commands {
    /// Commands issued once before the trigger is armed (extension loading).
    pub extensions: Vec<String>,
    pub log_open: String,
    pub log_close: String,
    pub trigger_symbol: String,
    pub resume: String,
    pub step_out: String,
    /// Read of the register holding a return value.
    pub return_register: String,
    /// Stack query used for classification.
    pub bounded_stack: String,
    /// Stack query captured as a raw snapshot.
    pub full_stack: String,
    /// Stack query that carries frame parameters.
    pub parameter_stack: String,
    pub process: String,
    pub echo: String,
}

/// Symbols and labels that are searched for in engine output.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Symbols {
    pub allocation: Vec<String>,
    pub deallocation: Vec<String>,
    /// Number of top stack frames inspected by the classifier.
    pub max_frames: usize,
    pub free_routine: String,
    /// Frame-index prefix of the first stack segment.
    pub frame_prefix: String,
    /// Frame-index prefix that starts the second stack segment.
    pub segment_end_prefix: String,
    pub parameter_label: String,
    pub image_label: String,
    pub process_prefix: String,
}

/// Command line overrides, `None` keeps a file value.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub tag: Option<String>,
    pub iterations: Option<u32>,
    pub log_path: Option<PathBuf>,
    pub format: Option<String>,
    pub command_timeout_ms: Option<u64>,
    pub engine_log: Option<PathBuf>,
    pub resume_after_arm: bool,
}

/// Immutable configuration of a single run.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Human readable pool tag.
    pub tag: String,
    /// Number of halts to process.
    pub iterations: u32,
    /// Journal location.
    pub log_path: PathBuf,
    pub format: FormatKind,
    /// Upper bound for a single engine command, `None` blocks forever.
    pub command_timeout: Option<Duration>,
    /// Engine side transcript, opened with the engine log commands when set.
    pub engine_log: Option<PathBuf>,
    /// Resume the target once right after the trigger is armed.
    pub resume_after_arm: bool,
    pub step_out_limit: usize,
    pub commands: Commands,
    pub symbols: Symbols,
}

impl SessionConfig {
    const DEFAULT_PATH: &'static str = ".config/poolhit/session.toml";

    /// Create configuration from the three mandatory session values, everything else is taken
    /// from the preset.
    pub fn new(
        tag: impl Into<String>,
        iterations: u32,
        log_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        Self::from_toml(
            "",
            Overrides {
                tag: Some(tag.into()),
                iterations: Some(iterations),
                log_path: Some(log_path.into()),
                ..Default::default()
            },
        )
    }

    /// Load configuration from file. If `path` is `None` then the file in user home directory
    /// is used if exists.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self, ConfigError> {
        let data = match path {
            Some(path) => {
                read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?
            }
            None => home::home_dir()
                .map(|home| Self::home_file(&home))
                .unwrap_or_default(),
        };
        Self::from_toml(&data, overrides)
    }

    /// Content of the config file under `home`, empty if there is no such file.
    fn home_file(home: &Path) -> String {
        let path = home.join(Self::DEFAULT_PATH);
        if !path.exists() {
            return String::new();
        }
        weak_error!(read_to_string(&path), "default config skipped:").unwrap_or_default()
    }

    /// Build configuration from toml text laid over the preset.
    pub fn from_toml(data: &str, overrides: Overrides) -> Result<Self, ConfigError> {
        let mut file = SessionFile::parse(PRESET, data)?;

        if let Some(tag) = overrides.tag {
            file.tag = tag;
        }
        if let Some(iterations) = overrides.iterations {
            file.iterations = iterations;
        }
        if let Some(log_path) = overrides.log_path {
            file.log_path = log_path;
        }
        if let Some(format) = overrides.format {
            file.format = format;
        }
        if overrides.command_timeout_ms.is_some() {
            file.command_timeout_ms = overrides.command_timeout_ms;
        }
        if overrides.engine_log.is_some() {
            file.engine_log = overrides.engine_log;
        }
        file.resume_after_arm |= overrides.resume_after_arm;

        Self::validate(file)
    }

    fn validate(file: SessionFile) -> Result<Self, ConfigError> {
        if file.tag.chars().count() != TAG_WIDTH {
            return Err(ConfigError::TagWidth(file.tag));
        }
        if file.iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if file.log_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyLogPath);
        }
        if file.symbols.max_frames == 0 {
            return Err(ConfigError::ZeroMaxFrames);
        }
        if file.step_out_limit == 0 {
            return Err(ConfigError::ZeroStepOutLimit);
        }
        let format = FormatKind::from_str(&file.format)
            .map_err(|_| ConfigError::UnknownFormat(file.format.clone()))?;

        Ok(Self {
            tag: file.tag,
            iterations: file.iterations,
            log_path: file.log_path,
            format,
            command_timeout: file.command_timeout_ms.map(Duration::from_millis),
            engine_log: file.engine_log,
            resume_after_arm: file.resume_after_arm,
            step_out_limit: file.step_out_limit,
            commands: file.commands,
            symbols: file.symbols,
        })
    }
}
