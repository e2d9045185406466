//! Wire protocol for the browser console socket.

use agent_console_core::{LogCategory, LogRecord, Role, TranscriptEntry, format_timestamp};
use agent_console_session::SessionView;
use serde::{Deserialize, Serialize};

/// Message from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Submit a command.
    Goal { goal: String },
    /// Ping for keepalive.
    Ping,
}

/// Bare `{ "goal": .. }` frame sent by older clients.
#[derive(Deserialize)]
struct BareGoal {
    goal: String,
}

impl ClientMessage {
    /// Parse a text frame, accepting both tagged and bare goal frames.
    ///
    /// # Errors
    /// Returns error if the frame matches neither shape.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(text).or_else(|tagged_err| {
            serde_json::from_str::<BareGoal>(text)
                .map(|bare| Self::Goal { goal: bare.goal })
                .map_err(|_| tagged_err)
        })
    }
}

/// Message from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// One timeline record.
    Log {
        level: String,
        message: String,
        timestamp: String,
        category: LogCategory,
    },
    /// One transcript entry.
    Transcript { role: Role, content: String },
    /// Busy indicator.
    State { processing: bool },
    /// Error message.
    Error { message: String },
    /// Pong response.
    Pong,
}

impl ServerMessage {
    /// Frame for a timeline record.
    #[must_use]
    pub fn log(record: &LogRecord) -> Self {
        Self::Log {
            level: record.level().to_string(),
            message: record.message().to_string(),
            timestamp: format_timestamp(record.timestamp()),
            category: record.category(),
        }
    }

    /// Frame for a transcript entry.
    #[must_use]
    pub fn transcript(entry: &TranscriptEntry) -> Self {
        Self::Transcript {
            role: entry.role,
            content: entry.content.clone(),
        }
    }

    /// Frames describing the whole view, for a client that just connected.
    #[must_use]
    pub fn snapshot(view: &SessionView) -> Vec<Self> {
        let mut frames = Self::changes(&SessionView::default(), view);
        if !view.state.is_processing() {
            frames.push(Self::State { processing: false });
        }
        frames
    }

    /// Frames describing what changed between two views.
    ///
    /// Transcripts are append-only, so only entries past the previous
    /// length are sent.
    #[must_use]
    pub fn changes(previous: &SessionView, current: &SessionView) -> Vec<Self> {
        let mut frames: Vec<Self> = current
            .transcript
            .iter()
            .skip(previous.transcript.len())
            .map(Self::transcript)
            .collect();

        if previous.state != current.state {
            frames.push(Self::State {
                processing: current.state.is_processing(),
            });
        }

        if let Some(diagnostic) = &current.last_diagnostic {
            if previous.last_diagnostic.as_ref() != Some(diagnostic) {
                frames.push(Self::Error {
                    message: diagnostic.clone(),
                });
            }
        }

        frames
    }
}
