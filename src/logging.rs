//! Tracing subscriber setup.
//!
//! The workspace crates only emit `tracing` events. An application installs
//! a subscriber once with [`init`] or [`init_from_config`]; `RUST_LOG` wins
//! over the configured level when it is set.
//!
//! ```no_run
//! use rtcl_p3s7::logging::{self, LoggingOptions, OutputFormat};
//! use tracing::Level;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! logging::init(LoggingOptions::new(Level::DEBUG).with_format(OutputFormat::Json))?;
//! tracing::info!(frames = 20, "recording committed");
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::ClientConfig;

/// Line format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Multi-line, colored
    Pretty,
    /// One line per event
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

/// Subscriber options.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Level used when `RUST_LOG` is unset
    pub level: Level,
    /// Line format
    pub format: OutputFormat,
    /// Emit an event when a span closes, with its busy/idle time
    pub span_timings: bool,
    /// Colors in pretty and compact output
    pub ansi: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LoggingOptions {
    /// Compact output at `level`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self {
            level,
            format: OutputFormat::Compact,
            span_timings: false,
            ansi: true,
        }
    }

    /// Options from the `[logging]` section.
    pub fn from_config(config: &ClientConfig) -> Result<Self, String> {
        let level = parse_log_level(&config.logging.level)?;
        Ok(Self::new(level).with_format(config.logging.format))
    }

    /// Set the line format.
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Report span durations on close.
    #[must_use]
    pub fn with_span_timings(mut self, enabled: bool) -> Self {
        self.span_timings = enabled;
        self
    }

    /// Enable or disable colors.
    #[must_use]
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.ansi = enabled;
        self
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let spans = if self.span_timings {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = fmt::layer().with_target(true).with_span_events(spans);
        match self.format {
            OutputFormat::Pretty => layer.pretty().with_ansi(self.ansi).boxed(),
            OutputFormat::Compact => layer.compact().with_ansi(self.ansi).boxed(),
            OutputFormat::Json => layer.json().with_current_span(true).boxed(),
        }
    }
}

/// Install the `[logging]` section as the global subscriber.
pub fn init_from_config(config: &ClientConfig) -> Result<(), String> {
    init(LoggingOptions::from_config(config)?)
}

/// Install the global subscriber.
///
/// Does nothing when a global subscriber is already installed, e.g. by the
/// host application or a test harness.
pub fn init(options: LoggingOptions) -> Result<(), String> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.level.as_str().to_lowercase()));

    tracing_subscriber::registry()
        .with(options.fmt_layer().with_filter(filter))
        .try_init()
        .map_err(|e| format!("failed to install tracing subscriber: {e}"))
}

/// Parse `trace`, `debug`, `info`, `warn` or `error`, ignoring case.
pub fn parse_log_level(level: &str) -> Result<Level, String> {
    level
        .parse::<Level>()
        .ok()
        .filter(|_| !level.chars().all(|c| c.is_ascii_digit()))
        .ok_or_else(|| {
            format!("invalid log level '{level}', expected trace, debug, info, warn or error")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("trace"), Ok(Level::TRACE));
        assert_eq!(parse_log_level("WARN"), Ok(Level::WARN));
        assert_eq!(parse_log_level("Debug"), Ok(Level::DEBUG));
        assert!(parse_log_level("verbose").is_err());
        assert!(parse_log_level("").is_err());
    }

    #[test]
    fn test_options_from_config() {
        let mut config = ClientConfig::default();
        config.logging.level = "error".to_string();
        config.logging.format = OutputFormat::Pretty;

        let options = LoggingOptions::from_config(&config).unwrap();
        assert_eq!(options.level, Level::ERROR);
        assert_eq!(options.format, OutputFormat::Pretty);
        assert!(!options.span_timings);
    }

    #[test]
    fn test_bad_level_in_config() {
        let mut config = ClientConfig::default();
        config.logging.level = "loud".to_string();
        assert!(init_from_config(&config).is_err());
    }

    #[test]
    fn test_ansi_option() {
        assert!(LoggingOptions::default().ansi);
        let options = LoggingOptions::default().with_ansi(false);
        assert!(!options.ansi);
        for format in [OutputFormat::Pretty, OutputFormat::Compact, OutputFormat::Json] {
            let _layer = options.clone().with_format(format).fmt_layer();
        }
    }

    #[test]
    fn test_init_twice_is_ok() {
        assert!(init(LoggingOptions::default().with_ansi(false)).is_ok());
        assert!(init(LoggingOptions::new(Level::TRACE).with_span_timings(true)).is_ok());
    }
}
