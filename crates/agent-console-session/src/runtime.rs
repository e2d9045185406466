//! Single-writer console runtime.
//!
//! One owning task holds the controller and the ingestion pipeline and
//! handles every event to completion, in inbox order. Handles only send
//! events and read published snapshots.

use std::{sync::Arc, time::Duration};

use agent_console_core::{
    BackendError, ConsoleConfig, EventSource, ProcessingState, PromptBackend, SubscribeError,
    Timeline, TimelineView, TranscriptEntry,
};
use serde::Serialize;
use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{EventIngestionPipeline, PromptTicket, SessionController};

/// Everything the owning task reacts to.
#[derive(Debug)]
pub enum ConsoleEvent {
    /// User submitted text.
    Submit(String),
    /// User submitted the input buffer.
    SubmitInput,
    /// User edited the input buffer.
    SetInput(String),
    /// Raw value from the backend log channel.
    Inbound(Value),
    /// Outbound call for `cycle` finished.
    CallResolved {
        cycle: u64,
        result: Result<String, BackendError>,
    },
    /// Terminal timeout armed for `cycle` elapsed.
    TerminalTimeout { cycle: u64 },
    /// Reply once every earlier event has been handled.
    Flush(oneshot::Sender<()>),
    /// Stop the owning task.
    Shutdown,
}

/// Published snapshot of the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub state: ProcessingState,
    pub transcript: Vec<TranscriptEntry>,
    pub input: String,
    pub last_diagnostic: Option<String>,
}

/// Send error.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Console stopped")]
    ChannelClosed,
}

/// Entry point for starting a console.
pub struct Console;

impl Console {
    /// Subscribe to the backend channel and spawn the owning task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns error if the event source refuses the subscription.
    pub fn start(
        config: &ConsoleConfig,
        backend: Arc<dyn PromptBackend>,
        source: &dyn EventSource,
    ) -> Result<ConsoleHandle, SubscribeError> {
        let mut pipeline =
            EventIngestionPipeline::new(Timeline::with_capacity(config.timeline_capacity));
        let timeline = pipeline.timeline();

        // Only handles hold strong senders, so dropping the last one stops the task.
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        pipeline.subscribe(source, &config.channel, inbox_tx.downgrade(), ConsoleEvent::Inbound)?;

        let (view_tx, view_rx) = watch::channel(SessionView::default());
        let runtime = ConsoleRuntime {
            controller: SessionController::new(),
            pipeline,
            backend,
            inbox: inbox_tx.downgrade(),
            view: view_tx,
            terminal_timeout: config.terminal_timeout(),
        };
        let task = tokio::spawn(runtime.run(inbox_rx));

        Ok(ConsoleHandle {
            inbox: inbox_tx,
            timeline,
            view: view_rx,
            task: Arc::new(task),
        })
    }
}

struct ConsoleRuntime {
    controller: SessionController,
    pipeline: EventIngestionPipeline,
    backend: Arc<dyn PromptBackend>,
    inbox: mpsc::WeakUnboundedSender<ConsoleEvent>,
    view: watch::Sender<SessionView>,
    terminal_timeout: Option<Duration>,
}

impl ConsoleRuntime {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<ConsoleEvent>) {
        while let Some(event) = inbox.recv().await {
            match event {
                ConsoleEvent::Shutdown => break,
                ConsoleEvent::Flush(done) => {
                    if done.send(()).is_err() {
                        tracing::debug!("Flush caller went away");
                    }
                }
                event => {
                    self.handle(event);
                    self.publish();
                }
            }
        }
        tracing::debug!("Console runtime stopped");
    }

    fn handle(&mut self, event: ConsoleEvent) {
        match event {
            ConsoleEvent::Submit(text) => {
                if let Some(ticket) = self.controller.submit(&text) {
                    self.dispatch(ticket);
                }
            }
            ConsoleEvent::SubmitInput => {
                if let Some(ticket) = self.controller.submit_input() {
                    self.dispatch(ticket);
                }
            }
            ConsoleEvent::SetInput(text) => self.controller.set_input(text),
            ConsoleEvent::Inbound(value) => {
                if let Some(reason) = self.pipeline.on_event(value) {
                    self.controller.on_session_ended(reason);
                }
            }
            ConsoleEvent::CallResolved { cycle, result } => {
                self.controller.on_call_resolved(cycle, result);
            }
            ConsoleEvent::TerminalTimeout { cycle } => {
                self.controller.on_terminal_timeout(cycle);
            }
            ConsoleEvent::Flush(_) | ConsoleEvent::Shutdown => {}
        }
    }

    /// Issue the single outbound call for an accepted ticket.
    fn dispatch(&self, ticket: PromptTicket) {
        let Some(inbox) = self.inbox.upgrade() else {
            tracing::warn!(cycle = ticket.cycle, "Inbox closed, dropping prompt");
            return;
        };

        if let Some(timeout) = self.terminal_timeout {
            let timer_inbox = inbox.clone();
            let cycle = ticket.cycle;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if timer_inbox
                    .send(ConsoleEvent::TerminalTimeout { cycle })
                    .is_err()
                {
                    tracing::debug!(cycle, "Console stopped before terminal timeout");
                }
            });
        }

        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            let PromptTicket { cycle, prompt } = ticket;
            let result = backend.send_prompt(&prompt).await;
            if let Err(e) = inbox.send(ConsoleEvent::CallResolved { cycle, result }) {
                tracing::debug!(cycle, event = ?e.0, "Console stopped before call resolved");
            }
        });
    }

    fn publish(&self) {
        let view = SessionView {
            state: self.controller.state(),
            transcript: self.controller.transcript().to_vec(),
            input: self.controller.input().to_string(),
            last_diagnostic: self.controller.last_diagnostic().map(str::to_string),
        };
        self.view.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

/// Cloneable handle to a running console.
#[derive(Clone)]
pub struct ConsoleHandle {
    inbox: mpsc::UnboundedSender<ConsoleEvent>,
    timeline: TimelineView,
    view: watch::Receiver<SessionView>,
    task: Arc<JoinHandle<()>>,
}

impl ConsoleHandle {
    /// Submit a command. Ignored while processing or when blank.
    ///
    /// # Errors
    /// Returns error if the console has stopped.
    pub fn submit(&self, text: impl Into<String>) -> Result<(), SendError> {
        self.send(ConsoleEvent::Submit(text.into()))
    }

    /// Submit the current input buffer.
    ///
    /// # Errors
    /// Returns error if the console has stopped.
    pub fn submit_input(&self) -> Result<(), SendError> {
        self.send(ConsoleEvent::SubmitInput)
    }

    /// Replace the input buffer.
    ///
    /// # Errors
    /// Returns error if the console has stopped.
    pub fn set_input(&self, text: impl Into<String>) -> Result<(), SendError> {
        self.send(ConsoleEvent::SetInput(text.into()))
    }

    /// Read-only timeline.
    #[must_use]
    pub fn timeline(&self) -> TimelineView {
        self.timeline.clone()
    }

    /// Receiver of controller snapshots.
    #[must_use]
    pub fn view(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn current(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Wait until every event sent so far through this handle is handled.
    ///
    /// # Errors
    /// Returns error if the console has stopped.
    pub async fn flush(&self) -> Result<(), SendError> {
        let (tx, rx) = oneshot::channel();
        self.send(ConsoleEvent::Flush(tx))?;
        rx.await.map_err(|_| SendError::ChannelClosed)
    }

    /// Wait until the controller reports `Idle`.
    ///
    /// # Errors
    /// Returns error if the console stops first.
    pub async fn wait_idle(&self) -> Result<SessionView, SendError> {
        let mut view = self.view.clone();
        view.wait_for(|v| !v.state.is_processing())
            .await
            .map(|v| v.clone())
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Stop the owning task and release the subscription.
    ///
    /// Dropping every handle has the same effect once in-flight calls finish.
    pub fn shutdown(&self) {
        if self.send(ConsoleEvent::Shutdown).is_err() {
            tracing::debug!("Console already stopped");
        }
    }

    /// Whether the owning task has exited.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }

    fn send(&self, event: ConsoleEvent) -> Result<(), SendError> {
        self.inbox.send(event).map_err(|_| SendError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use agent_console_core::Role;
    use async_trait::async_trait;
    use futures::{StreamExt, channel::mpsc as fmpsc, stream::BoxStream};
    use serde_json::json;
    use tokio_test::assert_ok;

    use super::*;

    /// Backend whose answers are released by the test.
    #[derive(Default)]
    struct ManualBackend {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
        replies: Mutex<VecDeque<oneshot::Receiver<Result<String, BackendError>>>>,
    }

    impl ManualBackend {
        fn expect_call(&self) -> oneshot::Sender<Result<String, BackendError>> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().unwrap().push_back(rx);
            tx
        }
    }

    #[async_trait]
    impl PromptBackend for ManualBackend {
        async fn send_prompt(&self, text: &str) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(text.to_string());
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(BackendError::Transport("dropped".into()))),
                None => futures::future::pending().await,
            }
        }
    }

    struct ChannelSource {
        stream: Mutex<Option<fmpsc::UnboundedReceiver<Value>>>,
    }

    impl EventSource for ChannelSource {
        fn subscribe(&self, _channel: &str) -> Result<BoxStream<'static, Value>, SubscribeError> {
            self.stream
                .lock()
                .unwrap()
                .take()
                .map(StreamExt::boxed)
                .ok_or(SubscribeError::Closed)
        }
    }

    struct Harness {
        console: ConsoleHandle,
        backend: Arc<ManualBackend>,
        events: fmpsc::UnboundedSender<Value>,
    }

    impl Harness {
        fn start(config: &ConsoleConfig) -> Self {
            let (events, rx) = fmpsc::unbounded();
            let source = ChannelSource {
                stream: Mutex::new(Some(rx)),
            };
            let backend = Arc::new(ManualBackend::default());
            let console = Console::start(config, backend.clone(), &source).unwrap();
            Self {
                console,
                backend,
                events,
            }
        }

        fn emit(&self, level: &str, message: &str) {
            self.events
                .unbounded_send(json!({"level": level, "message": message}))
                .unwrap();
        }

        async fn wait_for_records(&self, n: usize) {
            let timeline = self.console.timeline();
            let deadline = Duration::from_secs(5);
            tokio::time::timeout(deadline, async {
                while timeline.len() < n {
                    tokio::task::yield_now().await;
                }
            })
            .await
            .expect("records arrived");
            self.console.flush().await.unwrap();
        }

        async fn wait_for_view<F>(&self, predicate: F) -> SessionView
        where
            F: Fn(&SessionView) -> bool,
        {
            let mut view = self.console.view();
            let deadline = Duration::from_secs(5);
            tokio::time::timeout(deadline, view.wait_for(|v| predicate(v)))
                .await
                .expect("view reached")
                .unwrap()
                .clone()
        }
    }

    #[tokio::test]
    async fn test_navigate_scenario() {
        let h = Harness::start(&ConsoleConfig::default());
        let reply = h.backend.expect_call();

        h.console.submit("Navigate to google.com").unwrap();
        h.console.flush().await.unwrap();
        let view = h.console.current();
        assert_eq!(view.state, ProcessingState::Processing);
        assert_eq!(view.transcript, [TranscriptEntry::user("Navigate to google.com")]);

        h.emit("INIT", "starting");
        h.emit("NAVIGATE", "loading google.com");
        h.emit("COMPLETE", "done");
        h.wait_for_records(3).await;

        let levels: Vec<String> = h
            .console
            .timeline()
            .snapshot()
            .iter()
            .map(|r| r.level().to_string())
            .collect();
        assert_eq!(levels, ["INIT", "NAVIGATE", "COMPLETE"]);
        assert_eq!(h.console.current().state, ProcessingState::Idle);

        reply.send(Ok("Navigated successfully.".into())).unwrap();
        let view = h.wait_for_view(|v| v.transcript.len() == 2).await;
        assert_eq!(view.state, ProcessingState::Idle);
        assert_eq!(view.transcript[1], TranscriptEntry::assistant("Navigated successfully."));
        assert_eq!(h.backend.prompts.lock().unwrap().as_slice(), ["Navigate to google.com"]);
    }

    #[tokio::test]
    async fn test_submit_while_processing_is_a_no_op() {
        let h = Harness::start(&ConsoleConfig::default());
        let _reply = h.backend.expect_call();

        h.console.submit("first").unwrap();
        h.console.submit("x").unwrap();
        h.console.submit("  ").unwrap();
        h.console.flush().await.unwrap();

        let calls = &h.backend.calls;
        tokio::time::timeout(Duration::from_secs(5), async {
            while calls.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("call issued");
        h.console.submit("y").unwrap();
        h.console.flush().await.unwrap();
        tokio::task::yield_now().await;

        assert_eq!(h.backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.console.current().transcript.len(), 1);
        assert!(h.console.timeline().is_empty());
    }

    #[tokio::test]
    async fn test_answer_before_marker_still_waits_for_marker() {
        let h = Harness::start(&ConsoleConfig::default());
        let reply = h.backend.expect_call();

        h.console.submit("search for AI news").unwrap();
        reply.send(Ok("Task started.".into())).unwrap();
        let view = h.wait_for_view(|v| v.transcript.len() == 2).await;
        assert_eq!(view.state, ProcessingState::Processing);

        h.emit("complete", "done");
        let view = h.wait_for_view(|v| !v.state.is_processing()).await;
        let answers = view
            .transcript
            .iter()
            .filter(|e| e.role == Role::Assistant)
            .count();
        assert_eq!(answers, 1);
    }

    #[tokio::test]
    async fn test_call_failure_returns_to_idle() {
        let h = Harness::start(&ConsoleConfig::default());
        let reply = h.backend.expect_call();

        h.console.set_input("click the first result").unwrap();
        h.console.submit_input().unwrap();
        h.console.flush().await.unwrap();
        reply.send(Err(BackendError::NotInitialized)).unwrap();

        let view = h.console.wait_idle().await.unwrap();
        assert_eq!(view.transcript, [TranscriptEntry::user("click the first result")]);
        assert_eq!(view.input, "click the first result");
        assert!(view.last_diagnostic.is_some());
        assert!(h.console.timeline().is_empty());
    }

    #[tokio::test]
    async fn test_error_marker_after_complete_is_ignored() {
        let h = Harness::start(&ConsoleConfig::default());
        let _reply = h.backend.expect_call();

        h.console.submit("go").unwrap();
        h.emit("COMPLETE", "done");
        h.emit("ERROR", "late");
        h.wait_for_records(2).await;
        assert_eq!(h.console.current().state, ProcessingState::Idle);

        // A new cycle can start afterwards.
        let _next = h.backend.expect_call();
        h.console.submit("again").unwrap();
        h.console.flush().await.unwrap();
        assert_eq!(h.console.current().state, ProcessingState::Processing);
    }

    #[tokio::test]
    async fn test_malformed_event_keeps_subscription_alive() {
        let h = Harness::start(&ConsoleConfig::default());
        let _reply = h.backend.expect_call();
        h.console.submit("go").unwrap();

        h.events.unbounded_send(json!({"oops": true})).unwrap();
        h.emit("COMPLETE", "done");
        h.wait_for_records(2).await;

        let snapshot = h.console.timeline().snapshot();
        assert_eq!(snapshot[0].level().as_str(), "MALFORMED");
        assert_eq!(h.console.current().state, ProcessingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_timeout_by_default() {
        let h = Harness::start(&ConsoleConfig::default());
        h.console.submit("hang").unwrap();
        h.console.flush().await.unwrap();

        tokio::time::sleep(Duration::from_secs(3600)).await;
        h.console.flush().await.unwrap();
        assert_eq!(h.console.current().state, ProcessingState::Processing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_timeout_forces_idle() {
        let config = ConsoleConfig {
            terminal_timeout_ms: Some(30_000),
            ..ConsoleConfig::default()
        };
        let h = Harness::start(&config);
        h.console.submit("hang").unwrap();
        h.console.flush().await.unwrap();

        tokio::time::sleep(Duration::from_secs(29)).await;
        h.console.flush().await.unwrap();
        assert_eq!(h.console.current().state, ProcessingState::Processing);

        let view = h.console.wait_idle().await.unwrap();
        assert!(view.last_diagnostic.is_some());
    }

    #[tokio::test]
    async fn test_zero_capacity_from_toml_keeps_running() {
        let config = assert_ok!(ConsoleConfig::from_toml_str("timeline_capacity = 0\n"));
        let h = Harness::start(&config);
        let _reply = h.backend.expect_call();

        assert_ok!(h.console.submit("go"));
        h.emit("INIT", "starting");
        h.emit("COMPLETE", "done");
        h.wait_for_records(2).await;

        assert_eq!(h.console.current().state, ProcessingState::Idle);
        assert_eq!(h.console.timeline().capacity(), None);
    }

    #[tokio::test]
    async fn test_dropping_every_handle_stops_runtime() {
        let Harness {
            console, events, ..
        } = Harness::start(&ConsoleConfig::default());
        let other = console.clone();
        let task = Arc::clone(&console.task);
        drop(console);
        drop(other);

        tokio::time::timeout(Duration::from_secs(5), async {
            while !(task.is_finished() && events.is_closed()) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("runtime released");
    }

    #[tokio::test]
    async fn test_shutdown_stops_runtime() {
        let h = Harness::start(&ConsoleConfig::default());
        h.console.shutdown();
        let deadline = Duration::from_secs(5);
        tokio::time::timeout(deadline, async {
            while !h.console.is_stopped() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("runtime stopped");
        assert!(h.console.submit("late").is_err());
    }
}
