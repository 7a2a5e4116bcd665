//! Logging configuration and initialization.

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// `pretty` or `json`.
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".into()
}

fn default_format() -> String {
    "pretty".into()
}

impl LoggingConfig {
    /// Level after applying `-v` / `-q`. `RUST_LOG` still wins over this.
    #[must_use]
    pub fn effective_level(&self, verbose: u8, quiet: bool) -> String {
        match (quiet, verbose) {
            (true, _) => "warn".into(),
            (false, 0) => self.level.clone(),
            (false, 1) => "debug".into(),
            (false, _) => "trace".into(),
        }
    }

    /// Initialize the tracing subscriber, writing to stderr.
    pub fn init(&self, verbose: u8, quiet: bool) {
        let level = self.effective_level(verbose, quiet);
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

        match self.format.as_str() {
            "json" => {
                fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            _ => {
                fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_level() {
        let config = LoggingConfig::default();
        assert_eq!(config.effective_level(0, false), "info");
        assert_eq!(config.effective_level(1, false), "debug");
        assert_eq!(config.effective_level(3, false), "trace");
        assert_eq!(config.effective_level(2, true), "warn");
    }
}
