//! Timeline records and the inbound event payload.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open level tag attached to every log record.
///
/// Not a closed enum: the backend may invent new tags at any time and
/// they must still render. Comparison against known tags is ASCII
/// case-insensitive because the transport does not normalize case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelTag(String);

impl LevelTag {
    /// Tag used for payloads that arrived without a usable level or message.
    pub const MALFORMED: &'static str = "MALFORMED";

    /// Create a tag from any string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The synthetic tag for malformed payloads.
    #[must_use]
    pub fn malformed() -> Self {
        Self(Self::MALFORMED.to_string())
    }

    /// The tag as received.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a known tag.
    #[must_use]
    pub fn matches(&self, known: &str) -> bool {
        self.0.eq_ignore_ascii_case(known)
    }

    /// Whether this tag ends a processing cycle, and why.
    #[must_use]
    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        if self.matches("COMPLETE") {
            Some(TerminalReason::Complete)
        } else if self.matches("ERROR") {
            Some(TerminalReason::Error)
        } else {
            None
        }
    }
}

impl fmt::Display for LevelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LevelTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Why a processing cycle ended on the log channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// A `COMPLETE` marker arrived.
    Complete,
    /// An `ERROR` marker arrived.
    Error,
}

/// One entry of the activity timeline.
///
/// Immutable once created. The timestamp is the local receipt time,
/// so timeline order is arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    level: LevelTag,
    message: String,
    timestamp: DateTime<Local>,
}

impl LogRecord {
    /// Create a record stamped with the current local time.
    #[must_use]
    pub fn received(level: LevelTag, message: impl Into<String>) -> Self {
        Self::at(level, message, Local::now())
    }

    /// Create a record with an explicit timestamp.
    #[must_use]
    pub fn at(level: LevelTag, message: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp,
        }
    }

    /// Record standing in for a payload that could not be normalized.
    ///
    /// The raw JSON text is kept as the message so nothing is silently lost.
    #[must_use]
    pub fn malformed(raw: &Value) -> Self {
        Self::received(LevelTag::malformed(), raw.to_string())
    }

    #[must_use]
    pub const fn level(&self) -> &LevelTag {
        &self.level
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }
}

/// Payload delivered on the log channel: `{ "level": .., "message": .. }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub level: String,
    pub message: String,
}

impl EventPayload {
    /// Create a payload.
    #[must_use]
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            message: message.into(),
        }
    }

    /// Normalize an inbound value.
    ///
    /// Returns `None` when the value is not an object carrying string
    /// `level` and `message` fields.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        #[derive(Deserialize)]
        struct Partial {
            level: Option<String>,
            message: Option<String>,
        }

        let partial = Partial::deserialize(value).ok()?;
        Some(Self {
            level: partial.level?,
            message: partial.message?,
        })
    }

    /// Convert into a timeline record stamped now.
    #[must_use]
    pub fn into_record(self) -> LogRecord {
        LogRecord::received(LevelTag::new(self.level), self.message)
    }

    /// Encode as a channel value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "level": self.level, "message": self.message })
    }
}
