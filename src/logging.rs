//! Logging setup
//!
//! The library logs through the `log` facade. This module maps the crate's
//! numeric log levels onto it and installs the `env_logger` backend the
//! binary writes to stderr with.

use log::{LevelFilter, SetLoggerError};

/// Log levels, most quiet first
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Nothing = 0,
    User = 1,
    Error = 2,
    Warning = 3,
    Info = 4,
    Debug = 5,
    All = 6,
}

impl LogLevel {
    /// Create a LogLevel from an integer
    pub fn from_i32(level: i32) -> Self {
        match level {
            0 => LogLevel::Nothing,
            1 => LogLevel::User,
            2 => LogLevel::Error,
            3 => LogLevel::Warning,
            4 => LogLevel::Info,
            5 => LogLevel::Debug,
            6 => LogLevel::All,
            _ => LogLevel::Info,
        }
    }

    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// Equivalent `log` filter; `User` only lets errors through
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Nothing => LevelFilter::Off,
            LogLevel::User | LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::All => LevelFilter::Trace,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Warning
    }
}

/// Install an `env_logger` at `level`
///
/// Fails if a logger is already installed; the level is left unchanged then.
pub fn init(level: LogLevel) -> Result<(), SetLoggerError> {
    env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .format_target(false)
        .try_init()
}
