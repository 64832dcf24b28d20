//! azfile logging
//!
//! Installs a `tracing` subscriber for the driver binary and its tests.
//!
//! # Environment Variables
//!
//! - `AZFILE_DEBUG=1` - Enable debug logging
//! - `AZFILE_LOG_LEVEL=trace|debug|info|warn|error` - Set log level
//! - `AZFILE_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `AZFILE_LOG_COLOR=1|0` - Enable/disable colors
//! - `RUST_LOG` - Full `EnvFilter` directive, overrides the level above
//!
//! # Usage
//!
//! ```rust,no_run
//! azfile_log::init();
//! tracing::info!(node = "aks-node-0", "starting node server");
//! ```

use once_cell::sync::{Lazy, OnceCell};
use std::env;
use std::sync::atomic::{AtomicU8, Ordering};

// ============================================================================
// Log Levels
// ============================================================================

/// Log level for the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    /// Trace level (most verbose)
    Trace = 0,
    /// Debug level
    Debug = 1,
    /// Info level
    Info = 2,
    /// Warning level
    Warn = 3,
    /// Error level (least verbose)
    Error = 4,
    /// Off (no logging)
    Off = 5,
}

impl Level {
    /// Get level from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Map a klog-style `-v` verbosity onto a level.
    ///
    /// `V(2)` messages are the driver's normal operational output and `V(4)`
    /// the per-object detail, so 2 lands on info and 4 on debug.
    pub fn from_verbosity(verbosity: u8) -> Self {
        match verbosity {
            0 => Level::Warn,
            1..=2 => Level::Info,
            3..=4 => Level::Debug,
            _ => Level::Trace,
        }
    }

    /// Get level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }

    /// `EnvFilter` directive for this level.
    pub fn directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line human readable format
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl Format {
    /// Get format from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Global Configuration
// ============================================================================

/// Level override applied by [`set_level`] before [`init`].
static LEVEL_OVERRIDE: AtomicU8 = AtomicU8::new(u8::MAX);

static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether colors are enabled
    pub color: bool,
    /// Whether to include the module path
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Compact,
            color: false,
            module_path: true,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let debug = env_flag("AZFILE_DEBUG").unwrap_or(false);

        let level = env::var("AZFILE_LOG_LEVEL")
            .ok()
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = env::var("AZFILE_LOG_FORMAT")
            .ok()
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Compact);

        let color = env_flag("AZFILE_LOG_COLOR").unwrap_or_else(|| {
            env::var("NO_COLOR").is_err() && env::var("TERM").is_ok() && format != Format::Json
        });

        let module_path = env_flag("AZFILE_LOG_MODULE").unwrap_or(true);

        Self {
            debug,
            level,
            format,
            color,
            module_path,
        }
    }

    /// Level after applying any runtime override.
    pub fn effective_level(&self) -> Level {
        match LEVEL_OVERRIDE.load(Ordering::SeqCst) {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            4 => Level::Error,
            5 => Level::Off,
            _ => self.level,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Public API
// ============================================================================

/// Get the global configuration.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

/// Override the level read from the environment.
///
/// Only effective before [`init`] installs the subscriber.
pub fn set_level(level: Level) {
    LEVEL_OVERRIDE.store(level as u8, Ordering::SeqCst);
}

/// Override the level from a klog-style verbosity.
pub fn set_verbosity(verbosity: u8) {
    set_level(Level::from_verbosity(verbosity));
}

/// Install the global subscriber.
///
/// Safe to call more than once; later calls are no-ops, and an already
/// installed foreign subscriber is left in place.
pub fn init() {
    INSTALLED.get_or_init(|| {
        let config = config();
        let _ = install(config);
    });
}

fn install(config: &LogConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.effective_level().directive()));

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        Format::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(config.module_path)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        Format::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_ansi(config.color)
                    .with_target(config.module_path)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        Format::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(config.color)
                    .with_target(config.module_path)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
}

// ============================================================================
// Tests
// ============================================================================
