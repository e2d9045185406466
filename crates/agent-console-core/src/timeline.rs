//! Append-only activity timeline with live broadcast.

use std::{
    collections::VecDeque,
    sync::{Arc, PoisonError, RwLock},
};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::LogRecord;

/// Live listener buffer. Lagging listeners skip records, the history does not.
const BROADCAST_CAPACITY: usize = 10_000;

struct Inner {
    history: VecDeque<LogRecord>,
    capacity: Option<usize>,
}

/// Ordered, append-only sequence of log records.
///
/// Insertion order is the only order. Readers get snapshots and never
/// block the writer for longer than a clone. Late surfaces can attach
/// with [`Timeline::history_plus_stream`] and see history then live records.
pub struct Timeline {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<LogRecord>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    /// Create an unbounded timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Create a timeline that keeps at most `limit` records, evicting the oldest.
    #[must_use]
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self::with_capacity(Some(limit.max(1)))
    }

    /// Create a timeline with an optional retention limit.
    ///
    /// A limit of zero keeps everything, like `None`.
    #[must_use]
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: RwLock::new(Inner {
                history: VecDeque::with_capacity(32),
                capacity: capacity.filter(|limit| *limit > 0),
            }),
            sender,
        }
    }

    /// Append a record to history and live listeners.
    pub fn append(&self, record: LogRecord) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(limit) = inner.capacity {
            while inner.history.len() >= limit {
                if inner.history.pop_front().is_none() {
                    break;
                }
            }
        }
        inner.history.push_back(record.clone());
        // Send under the write lock so history and broadcast agree on order.
        let _ = self.sender.send(record);
    }

    /// Copy of the retained records in receipt order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogRecord> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retention limit, if any.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity
    }

    /// Receiver for records appended from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LogRecord> {
        self.sender.subscribe()
    }

    /// Stream that yields the retained history first, then live records.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, LogRecord> {
        let (history, rx) = {
            // Hold the read lock so no record lands between the two.
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            let history: Vec<LogRecord> = inner.history.iter().cloned().collect();
            (history, self.sender.subscribe())
        };

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move {
            match res {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("timeline listener lagged: {e}");
                    None
                }
            }
        });

        Box::pin(hist.chain(live))
    }
}

/// Read-only handle on a [`Timeline`].
///
/// Handed to surfaces so they can render and follow the history
/// without being able to append to it.
///
/// ```compile_fail
/// use std::sync::Arc;
/// use agent_console_core::{LevelTag, LogRecord, Timeline, TimelineView};
///
/// let view = TimelineView::new(Arc::new(Timeline::new()));
/// view.append(LogRecord::received(LevelTag::new("COMPLETE"), "forged"));
/// ```
#[derive(Clone)]
pub struct TimelineView {
    timeline: Arc<Timeline>,
}

impl TimelineView {
    #[must_use]
    pub const fn new(timeline: Arc<Timeline>) -> Self {
        Self { timeline }
    }

    /// Copy of the retained records in receipt order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogRecord> {
        self.timeline.snapshot()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.timeline.capacity()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LogRecord> {
        self.timeline.subscribe()
    }

    /// Retained history, then live records.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, LogRecord> {
        self.timeline.history_plus_stream()
    }
}
