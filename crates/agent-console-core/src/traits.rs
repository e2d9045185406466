//! Core traits for the backend seams: the outbound call and the event channel.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

/// Outbound call error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Agent not initialized")]
    NotInitialized,
    #[error("Prompt rejected: {0}")]
    Rejected(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Event subscription error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscribeError {
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
    #[error("Event source closed")]
    Closed,
}

/// The automation backend, seen from the console.
///
/// Implement this to connect the console to an agent runtime.
/// Exactly one call is in flight at a time; the console guarantees it.
#[async_trait]
pub trait PromptBackend: Send + Sync {
    /// Hand a command to the backend and await its answer text.
    ///
    /// Completion of the work is announced on the log channel, not by
    /// this call returning.
    async fn send_prompt(&self, text: &str) -> Result<String, BackendError>;
}

/// Push-only source of backend log events.
///
/// Values are delivered in emission order. Nothing emitted before a
/// subscription exists is replayed.
pub trait EventSource: Send + Sync {
    /// Open a subscription to a named channel.
    ///
    /// # Errors
    /// Returns error if the channel cannot be opened.
    fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, Value>, SubscribeError>;
}
