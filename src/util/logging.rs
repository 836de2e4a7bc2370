//! Process-wide `tracing` subscriber
//!
//! Everything is written to stderr; stdout is reserved for the plan document.
//!
//! Environment:
//! - `ABXPLAN_LOG_LEVEL` - trace, debug, info, warn, error (default info)
//! - `ABXPLAN_LOG_JSON` - `true` for JSON lines
//! - `RUST_LOG` - extra filter directives, applied on top

use std::env;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// HTTP and provider crates log request internals at debug.
const CHATTY_CRATES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "genai"];

static INSTALLED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Adds file, line and thread to every event.
    pub source_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            source_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    fn filter(&self) -> EnvFilter {
        let mut directives = vec![format!("abxplan={}", self.level)];
        if env::var_os("RUST_LOG").is_none() {
            directives.extend(CHATTY_CRATES.iter().map(|krate| format!("{}=warn", krate)));
        }

        directives
            .iter()
            .filter_map(|d| d.parse::<Directive>().ok())
            .fold(EnvFilter::from_default_env(), EnvFilter::add_directive)
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let located = self.source_location;
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(located)
            .with_line_number(located)
            .with_thread_ids(located);
        match self.format {
            LogFormat::Pretty => base.boxed(),
            LogFormat::Json => base.json().boxed(),
        }
    }
}

/// Parses a level name case-insensitively; unknown names fall back to INFO.
pub fn parse_level(name: &str) -> Level {
    let lowered = name.trim().to_lowercase();
    match lowered.as_str() {
        "warning" => Level::WARN,
        other => other.parse().unwrap_or_else(|_| {
            eprintln!("Unknown log level '{}', using info", name);
            Level::INFO
        }),
    }
}

/// Installs the subscriber; later calls are no-ops.
pub fn init_logging(config: LoggingConfig) {
    INSTALLED.get_or_init(|| {
        let installed = tracing_subscriber::registry()
            .with(config.layer().with_filter(config.filter()))
            .try_init();
        if let Err(e) = installed {
            eprintln!("A tracing subscriber is already installed: {}", e);
        }
    });
}

/// Reads `ABXPLAN_LOG_LEVEL` and `ABXPLAN_LOG_JSON`.
pub fn config_from_env() -> LoggingConfig {
    let level = env::var("ABXPLAN_LOG_LEVEL")
        .map(|v| parse_level(&v))
        .unwrap_or(Level::INFO);
    let json = env::var("ABXPLAN_LOG_JSON").is_ok_and(|v| v.trim().eq_ignore_ascii_case("true"));

    LoggingConfig {
        level,
        format: if json { LogFormat::Json } else { LogFormat::Pretty },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("Debug"), Level::DEBUG);
        assert_eq!(parse_level(" error "), Level::ERROR);
        assert_eq!(parse_level("WARNING"), Level::WARN);
        assert_eq!(parse_level("loud"), Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        env::set_var("ABXPLAN_LOG_LEVEL", "trace");
        env::set_var("ABXPLAN_LOG_JSON", "TRUE");
        let config = config_from_env();
        env::remove_var("ABXPLAN_LOG_LEVEL");
        env::remove_var("ABXPLAN_LOG_JSON");

        assert_eq!(config.level, Level::TRACE);
        assert_eq!(config.format, LogFormat::Json);

        let defaults = config_from_env();
        assert_eq!(defaults.level, Level::INFO);
        assert_eq!(defaults.format, LogFormat::Pretty);
    }

    #[test]
    fn test_second_init_is_ignored() {
        init_logging(LoggingConfig::with_level(Level::WARN));
        init_logging(LoggingConfig {
            format: LogFormat::Json,
            ..LoggingConfig::with_level(Level::DEBUG)
        });
    }
}
