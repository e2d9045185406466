//! Core abstractions for the agent console.
//!
//! This crate provides the fundamental building blocks:
//! - `LogRecord` - Timestamped entry of the activity timeline
//! - `Timeline` / `TimelineView` - Append-only record history with live broadcast, and its read-only handle
//! - `TranscriptEntry` / `ProcessingState` - Chat transcript and busy state
//! - `LogCategory` - Total mapping from level tags to visual categories
//! - `PromptBackend` / `EventSource` traits for the backend seams
//! - `ConsoleConfig` - File and environment configuration

pub mod config;
pub mod log_record;
pub mod presentation;
pub mod timeline;
pub mod traits;
pub mod transcript;

pub use config::{ConfigError, ConsoleConfig};
pub use log_record::{EventPayload, LevelTag, LogRecord, TerminalReason};
pub use presentation::{LogCategory, format_timestamp};
pub use timeline::{Timeline, TimelineView};
pub use traits::{BackendError, EventSource, PromptBackend, SubscribeError};
pub use transcript::{ProcessingState, Role, TranscriptEntry};
