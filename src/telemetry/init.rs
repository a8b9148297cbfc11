// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry initialization.
//!
//! Logs share the terminal with the interactive prompt, so output goes to
//! stderr in a compact single-line format and stays quiet unless asked.
//! `RUST_LOG` always wins over the configured level.

use std::io::{self, IsTerminal};

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How much the logger should say, and where from.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Level applied when `RUST_LOG` is not set.
    pub default_level: Level,

    /// Include file and line of the emitting call site.
    pub source_locations: bool,

    /// Extra filter directive layered over the default level.
    pub filter_directive: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            source_locations: false,
            filter_directive: None,
        }
    }
}

impl TelemetryConfig {
    /// Verbose setup for the `--verbose` flag: debug everywhere, with call
    /// sites, and this crate down to trace.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            source_locations: true,
            filter_directive: Some("confab=trace".to_string()),
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }
}

/// Keep this alive for the life of the program.
pub struct TelemetryGuard {
    _private: (),
}

/// Install the global subscriber. Call once at startup.
pub fn init_telemetry(config: &TelemetryConfig) -> io::Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let base = config.default_level.to_string();
        match &config.filter_directive {
            Some(directive) => EnvFilter::new(format!("{base},{directive}")),
            None => EnvFilter::new(base),
        }
    });

    let fmt_layer = fmt::layer()
        .compact()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(true)
        .with_file(config.source_locations)
        .with_line_number(config.source_locations);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    Ok(TelemetryGuard { _private: () })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_quiet() {
        let config = TelemetryConfig::default();
        assert_eq!(config.default_level, Level::INFO);
        assert!(!config.source_locations);
        assert!(config.filter_directive.is_none());
    }

    #[test]
    fn test_development_raises_crate_verbosity() {
        let config = TelemetryConfig::development();
        assert_eq!(config.default_level, Level::DEBUG);
        assert!(config.source_locations);
        assert_eq!(config.filter_directive.as_deref(), Some("confab=trace"));
    }

    #[test]
    fn test_with_level_overrides_default() {
        let config = TelemetryConfig::default().with_level(Level::WARN);
        assert_eq!(config.default_level, Level::WARN);
    }
}
