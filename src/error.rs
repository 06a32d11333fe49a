use std::path::PathBuf;
use std::time::Duration;

/// Failures of the engine command channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("engine disconnected while executing `{0}`")]
    Disconnected(String),
    #[error("engine did not answer `{command}` in {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("spawn engine `{0}`: {1}")]
    Spawn(String, std::io::Error),
    #[error(transparent)]
    IO(#[from] std::io::Error),
}

/// Invalid session configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("pool tag must be exactly 4 characters, got {0:?}")]
    TagWidth(String),
    #[error("iteration count must be positive")]
    ZeroIterations,
    #[error("classifier window (symbols.max_frames) must be positive")]
    ZeroMaxFrames,
    #[error("step-out limit must be positive")]
    ZeroStepOutLimit,
    #[error("log path is empty")]
    EmptyLogPath,
    #[error("read config {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("config file parsing error: {0}")]
    Parsing(#[from] toml::de::Error),
    #[error("unknown evidence format `{0}`")]
    UnknownFormat(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- engine errors ---------------------------------------------
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("target did not leave the allocator after {0} step-outs")]
    StepOutLimit(usize),

    // --------------------------------- journal errors --------------------------------------------
    #[error("open journal {0}: {1}")]
    JournalOpen(PathBuf, std::io::Error),
    #[error("journal is not opened")]
    JournalClosed,
    #[error(transparent)]
    IO(#[from] std::io::Error),

    // --------------------------------- setup errors ----------------------------------------------
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Return a hint to an interface - whether the debug target is left in an unknown state.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Config(_) => false,
            Error::JournalOpen(_, _) => false,

            // target state is unknown after these
            Error::Channel(_) => true,
            Error::StepOutLimit(_) => true,
            Error::JournalClosed => true,
            Error::IO(_) => true,
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: $crate::log::TARGET, "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: $crate::log::TARGET, concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(::log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(::log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(::log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(::log::debug, $res, $msg)
    };
}
