//! Logging configuration for drip
//!
//! This module provides easy setup for structured logging with support for
//! both JSON (production) and pretty (development) output formats.
//!
//! # Features
//!
//! - `logging` - Enable debug logging
//! - `logging-json` - Use JSON structured output (recommended for production)
//! - `logging-pretty` - Use colorful pretty output (recommended for development)
//!
//! # Example
//!
//! ```rust,ignore
//! use drip::logging;
//!
//! // Initialize with default settings (JSON if logging-json, pretty if logging-pretty)
//! logging::init();
//!
//! // Or use the builder for custom configuration
//! logging::builder()
//!     .with_level(tracing::Level::DEBUG)
//!     .drip_only()
//!     .json()
//!     .init();
//! ```

use tracing::Level;

/// Logging format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON structured logging (production default)
    #[default]
    Json,
    /// Pretty colorful output (development)
    Pretty,
    /// Compact single-line output
    Compact,
}

/// Builder for logging configuration
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    with_file: bool,
    with_line_number: bool,
    with_thread_ids: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Json,
            target: None,
            with_file: false,
            with_line_number: false,
            with_thread_ids: false,
        }
    }
}

impl LoggingBuilder {
    /// Create a new logging builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set log level to TRACE (most verbose)
    pub fn trace(mut self) -> Self {
        self.level = Level::TRACE;
        self
    }

    /// Set log level to DEBUG
    pub fn debug(mut self) -> Self {
        self.level = Level::DEBUG;
        self
    }

    /// Set log level to INFO
    pub fn info(mut self) -> Self {
        self.level = Level::INFO;
        self
    }

    /// Filter to only show logs from a specific target
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show drip's own logs
    pub fn drip_only(self) -> Self {
        self.with_target_filter("drip")
    }

    /// Include file names in log output
    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    /// Include line numbers in log output
    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
        self
    }

    /// Include thread IDs in log output
    pub fn with_thread_ids(mut self) -> Self {
        self.with_thread_ids = true;
        self
    }

    /// Use JSON structured logging format
    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    /// Use pretty colorful logging format
    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    /// Use compact single-line logging format
    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// Initialize the logging subscriber with the configured settings
    ///
    /// Requires either `logging-json` or `logging-pretty` feature to be enabled.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let filter = if let Some(target) = self.target {
            EnvFilter::new(format!("{}={}", target, self.level))
        } else {
            EnvFilter::new(self.level.to_string())
        };

        match self.format {
            LogFormat::Json => {
                #[cfg(feature = "logging-json")]
                {
                    let subscriber = fmt::layer()
                        .json()
                        .with_file(self.with_file)
                        .with_line_number(self.with_line_number)
                        .with_thread_ids(self.with_thread_ids)
                        .with_target(true);

                    tracing_subscriber::registry()
                        .with(filter)
                        .with(subscriber)
                        .init();
                }
                #[cfg(not(feature = "logging-json"))]
                {
                    // Fall back to the plain formatter if json is not enabled
                    let subscriber = fmt::layer()
                        .with_file(self.with_file)
                        .with_line_number(self.with_line_number)
                        .with_thread_ids(self.with_thread_ids)
                        .with_target(true);

                    tracing_subscriber::registry()
                        .with(filter)
                        .with(subscriber)
                        .init();
                }
            }
            LogFormat::Pretty => {
                let subscriber = fmt::layer()
                    .pretty()
                    .with_file(self.with_file)
                    .with_line_number(self.with_line_number)
                    .with_thread_ids(self.with_thread_ids)
                    .with_target(true);

                tracing_subscriber::registry()
                    .with(filter)
                    .with(subscriber)
                    .init();
            }
            LogFormat::Compact => {
                let subscriber = fmt::layer()
                    .compact()
                    .with_file(self.with_file)
                    .with_line_number(self.with_line_number)
                    .with_thread_ids(self.with_thread_ids)
                    .with_target(true);

                tracing_subscriber::registry()
                    .with(filter)
                    .with(subscriber)
                    .init();
            }
        }
    }

    /// Initialize (no-op when subscriber features not available)
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) {
        // No-op: users should enable logging-json or logging-pretty
    }
}

/// Create a new logging builder
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Initialize logging with default settings
///
/// Uses JSON format if `logging-json` is enabled, otherwise pretty format
/// if `logging-pretty` is enabled.
#[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
pub fn init() {
    #[cfg(feature = "logging-json")]
    {
        init_json();
    }
    #[cfg(all(feature = "logging-pretty", not(feature = "logging-json")))]
    {
        init_pretty();
    }
}

/// Initialize logging (no-op when subscriber features not available)
#[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
pub fn init() {
    // No-op: requires logging-json or logging-pretty
}

/// Initialize JSON structured logging
///
/// Ideal for production environments where logs are aggregated and parsed.
pub fn init_json() {
    builder().json().debug().init();
}

/// Initialize pretty colorful logging
///
/// Ideal for development and debugging.
pub fn init_pretty() {
    builder().pretty().debug().init();
}
