//! Event ingestion: backend log payloads into the timeline.

use std::sync::Arc;

use agent_console_core::{
    EventPayload, EventSource, LogRecord, SubscribeError, TerminalReason, Timeline, TimelineView,
};
use futures::StreamExt;
use serde_json::Value;
use tokio::{sync::mpsc, task::JoinHandle};

/// Installed listener on the backend channel.
struct Subscription {
    channel: String,
    forwarder: JoinHandle<()>,
}

/// Converts inbound channel values into timeline records and spots
/// the markers that end a processing cycle.
///
/// The only writer of its timeline; everyone else gets a
/// [`TimelineView`]. At most one listener is ever installed: a second
/// one would append every event twice.
pub struct EventIngestionPipeline {
    timeline: Arc<Timeline>,
    subscription: Option<Subscription>,
}

impl EventIngestionPipeline {
    /// Create a pipeline that takes ownership of `timeline`.
    #[must_use]
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline: Arc::new(timeline),
            subscription: None,
        }
    }

    /// Install the single listener on `channel`.
    ///
    /// Every inbound value is wrapped and pushed into `inbox`, whose
    /// owner is expected to call [`Self::on_event`]. The listener does
    /// not keep the inbox open: it stops once every strong sender is
    /// gone. Returns `Ok(false)` without touching `source` when a
    /// listener already exists. Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns error if the source refuses the subscription.
    pub fn subscribe<T, F>(
        &mut self,
        source: &dyn EventSource,
        channel: &str,
        inbox: mpsc::WeakUnboundedSender<T>,
        wrap: F,
    ) -> Result<bool, SubscribeError>
    where
        T: Send + 'static,
        F: Fn(Value) -> T + Send + 'static,
    {
        if let Some(existing) = &self.subscription {
            tracing::debug!(
                channel,
                existing = %existing.channel,
                "Already subscribed, ignoring duplicate subscription"
            );
            return Ok(false);
        }

        let mut stream = source.subscribe(channel)?;
        let name = channel.to_string();
        let forwarder = tokio::spawn(async move {
            while let Some(value) = stream.next().await {
                let Some(inbox) = inbox.upgrade() else {
                    break;
                };
                if inbox.send(wrap(value)).is_err() {
                    break;
                }
            }
            tracing::debug!(channel = %name, "Event forwarder stopped");
        });

        tracing::info!(channel, "Subscribed to backend log channel");
        self.subscription = Some(Subscription {
            channel: channel.to_string(),
            forwarder,
        });
        Ok(true)
    }

    /// Whether the listener is installed.
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Ingest one inbound value.
    ///
    /// Appends exactly one record, stamped now, and reports whether it
    /// is a terminal marker. Never fails: values without a string
    /// `level` and `message` are kept as `MALFORMED` records.
    pub fn on_event(&self, value: Value) -> Option<TerminalReason> {
        let record = match EventPayload::from_value(&value) {
            Some(payload) => payload.into_record(),
            None => {
                tracing::warn!(payload = %value, "Malformed log event");
                LogRecord::malformed(&value)
            }
        };

        let terminal = record.level().terminal_reason();
        tracing::debug!(level = %record.level(), ?terminal, "Ingested log event");
        self.timeline.append(record);
        terminal
    }

    /// Read-only view of the timeline.
    #[must_use]
    pub fn timeline(&self) -> TimelineView {
        TimelineView::new(Arc::clone(&self.timeline))
    }
}

impl Drop for EventIngestionPipeline {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.forwarder.abort();
        }
    }
}
