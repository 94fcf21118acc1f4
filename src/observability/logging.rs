//! Structured logging configuration.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Log filter variable, checked before `RUST_LOG`.
pub const LOG_FILTER_ENV: &str = "MURMUR_LOG";

/// Log format variable (`pretty` or `json`).
pub const LOG_FORMAT_ENV: &str = "MURMUR_LOG_FORMAT";

/// Log file variable; logs are appended there instead of stderr.
pub const LOG_FILE_ENV: &str = "MURMUR_LOG_FILE";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Level filter.
    pub filter: EnvFilter,
    /// Output format.
    pub format: LogFormat,
    /// Optional file to append to.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds logging configuration from the environment.
    ///
    /// The filter comes from `MURMUR_LOG`, then `RUST_LOG`, and defaults to
    /// `info` (`debug` when `verbose`). An unparseable filter falls back to
    /// the default.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        let default_level = if verbose { "debug" } else { "info" };
        let directives = std::env::var(LOG_FILTER_ENV)
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .filter(|v| !v.trim().is_empty());
        let filter = directives
            .and_then(|d| EnvFilter::try_new(d).ok())
            .unwrap_or_else(|| EnvFilter::new(default_level));

        let format = std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|v| LogFormat::parse(&v))
            .unwrap_or_default();

        let file = std::env::var(LOG_FILE_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            filter,
            format,
            file,
        }
    }

    /// Sets the log file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Sets the output format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" pretty "), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_builders() {
        let config = LoggingConfig {
            filter: EnvFilter::new("info"),
            format: LogFormat::Pretty,
            file: None,
        }
        .with_format(LogFormat::Json)
        .with_file("/tmp/murmur.log");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/murmur.log")));
    }
}
