//! Console configuration: TOML file plus environment overrides.

use std::{path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;

/// Default name of the backend log channel.
pub const DEFAULT_CHANNEL: &str = "kortex:log";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Console configuration.
///
/// Every field has a default, so an empty file is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ConsoleConfig {
    /// Named event channel carrying backend log events.
    pub channel: String,
    /// Force `Idle` if a cycle sees neither a terminal marker nor a call
    /// failure within this many milliseconds. `None` never times out.
    pub terminal_timeout_ms: Option<u64>,
    /// Maximum retained timeline records. `None` or zero keeps everything.
    pub timeline_capacity: Option<usize>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            terminal_timeout_ms: None,
            timeline_capacity: None,
        }
    }
}

impl ConsoleConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    /// Returns error if the document is not valid TOML for this schema.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Load from a TOML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Apply `AGENT_CONSOLE_*` environment overrides.
    #[must_use]
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Invalid values are ignored.
    #[must_use]
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(channel) = lookup("AGENT_CONSOLE_CHANNEL") {
            if channel.trim().is_empty() {
                tracing::warn!("Ignoring empty AGENT_CONSOLE_CHANNEL");
            } else {
                self.channel = channel;
            }
        }

        if let Some(raw) = lookup("AGENT_CONSOLE_TERMINAL_TIMEOUT_MS") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "0" | "off" | "disabled" => self.terminal_timeout_ms = None,
                value => match value.parse::<u64>() {
                    Ok(ms) => self.terminal_timeout_ms = Some(ms),
                    Err(e) => tracing::warn!(
                        "Invalid AGENT_CONSOLE_TERMINAL_TIMEOUT_MS value '{raw}' ({e}), keeping {:?}",
                        self.terminal_timeout_ms
                    ),
                },
            }
        }

        if let Some(raw) = lookup("AGENT_CONSOLE_TIMELINE_CAPACITY") {
            match raw.trim().parse::<usize>() {
                Ok(0) => self.timeline_capacity = None,
                Ok(n) => self.timeline_capacity = Some(n),
                Err(e) => tracing::warn!(
                    "Invalid AGENT_CONSOLE_TIMELINE_CAPACITY value '{raw}' ({e}), keeping {:?}",
                    self.timeline_capacity
                ),
            }
        }

        self
    }

    /// Terminal timeout as a duration; zero counts as disabled.
    #[must_use]
    pub fn terminal_timeout(&self) -> Option<Duration> {
        self.terminal_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
