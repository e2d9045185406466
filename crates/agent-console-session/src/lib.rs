//! Session control and event ingestion for the agent console.
//!
//! Provides:
//! - `EventIngestionPipeline` - Backend log events into the timeline
//! - `SessionController` - Single-flight processing state and transcript
//! - `Console` / `ConsoleHandle` - Single-writer runtime composing both

pub mod controller;
pub mod ingestion;
pub mod runtime;

pub use controller::{PromptTicket, SessionController};
pub use ingestion::EventIngestionPipeline;
pub use runtime::{Console, ConsoleEvent, ConsoleHandle, SendError, SessionView};
