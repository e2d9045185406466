//! In-process event bus and simulated agent backend.
//!
//! Stands in for the desktop runtime's named event channels and the
//! automation engine, so the console can run without a real backend.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use agent_console_core::{
    BackendError, EventPayload, EventSource, PromptBackend, SubscribeError,
};
use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

const CHANNEL_CAPACITY: usize = 1024;

/// Named broadcast channels.
///
/// Emitting on a channel nobody listens to drops the value: there is
/// no replay for late subscribers.
#[derive(Default)]
pub struct EventBus {
    channels: Mutex<HashMap<String, broadcast::Sender<Value>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<Value> {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Emit a raw value. Returns how many listeners received it.
    pub fn emit_raw(&self, channel: &str, value: Value) -> usize {
        self.sender(channel).send(value).unwrap_or(0)
    }

    /// Emit a `{level, message}` log event.
    pub fn emit(&self, channel: &str, level: &str, message: impl Into<String>) -> usize {
        let payload = EventPayload::new(level, message);
        tracing::info!(target: "agent", "[{}] {}", payload.level, payload.message);
        self.emit_raw(channel, payload.to_value())
    }

    /// Number of live listeners on a channel.
    #[must_use]
    pub fn listener_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl EventSource for EventBus {
    fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, Value>, SubscribeError> {
        let rx = self.sender(channel).subscribe();
        let name = channel.to_string();
        let stream = BroadcastStream::new(rx).filter_map(move |res| {
            let name = name.clone();
            async move {
                match res {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!(channel = %name, "Event listener lagged: {e}");
                        None
                    }
                }
            }
        });
        Ok(stream.boxed())
    }
}

/// One scripted action of the simulated agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Emit a log event.
    Emit { level: String, message: String },
    /// Abort the task with this error.
    Fail(String),
}

impl Step {
    #[must_use]
    pub fn emit(level: &str, message: impl Into<String>) -> Self {
        Self::Emit {
            level: level.to_string(),
            message: message.into(),
        }
    }
}

type Planner = dyn Fn(&str) -> Vec<Step> + Send + Sync;

/// Answer returned while the task keeps running in the background.
pub const TASK_STARTED: &str = "Task started. Watch the Mission Control for updates.";

/// Backend that acknowledges a prompt at once and reports progress on the bus.
///
/// Tasks run one at a time; a second prompt waits for the first task
/// to finish before its steps start.
pub struct SimulatedBackend {
    bus: Arc<EventBus>,
    channel: String,
    planner: Arc<Planner>,
    step_delay: Duration,
    initialized: bool,
    task_lock: Arc<tokio::sync::Mutex<()>>,
}

impl SimulatedBackend {
    /// Create a backend using the default planner.
    #[must_use]
    pub fn new(bus: Arc<EventBus>, channel: impl Into<String>) -> Self {
        Self {
            bus,
            channel: channel.into(),
            planner: Arc::new(default_plan),
            step_delay: Duration::from_millis(300),
            initialized: true,
            task_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Replace the planner.
    #[must_use]
    pub fn with_planner<F>(mut self, planner: F) -> Self
    where
        F: Fn(&str) -> Vec<Step> + Send + Sync + 'static,
    {
        self.planner = Arc::new(planner);
        self
    }

    /// Delay between steps.
    #[must_use]
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Mark the agent as not initialized; every prompt is then rejected.
    #[must_use]
    pub fn uninitialized(mut self) -> Self {
        self.initialized = false;
        self
    }
}

#[async_trait]
impl PromptBackend for SimulatedBackend {
    async fn send_prompt(&self, text: &str) -> Result<String, BackendError> {
        if !self.initialized {
            return Err(BackendError::NotInitialized);
        }

        self.bus.emit(&self.channel, "USER", format!("📝 {text}"));

        let steps = (self.planner)(text);
        let bus = Arc::clone(&self.bus);
        let channel = self.channel.clone();
        let lock = Arc::clone(&self.task_lock);
        let delay = self.step_delay;
        tokio::spawn(async move {
            let _guard = lock.lock().await;
            bus.emit(
                &channel,
                "PLANNING",
                "🧠 Analyzing task and preparing execution plan...",
            );

            for step in steps {
                tokio::time::sleep(delay).await;
                match step {
                    Step::Emit { level, message } => {
                        bus.emit(&channel, &level, message);
                    }
                    Step::Fail(error) => {
                        bus.emit(
                            &channel,
                            "ERROR",
                            format!("❌ Task execution failed: {error}"),
                        );
                        return;
                    }
                }
            }

            bus.emit(&channel, "COMPLETE", "✅ Task completed successfully!");
        });

        Ok(TASK_STARTED.to_string())
    }
}

/// Plan a prompt into browser-style steps.
#[must_use]
pub fn default_plan(prompt: &str) -> Vec<Step> {
    let mut steps = Vec::new();
    let target = prompt
        .split_whitespace()
        .find(|word| word.contains('.') && !word.ends_with('.'));

    if let Some(url) = target {
        steps.push(Step::emit("NAVIGATE", format!("Navigating to {url}")));
        steps.push(Step::emit("GET_SNAPSHOT", "Captured page snapshot"));
    }

    let lower = prompt.to_ascii_lowercase();
    if let Some(query) = lower.strip_prefix("search for ") {
        steps.push(Step::emit("TYPE", format!("Typing '{query}' into search box")));
        steps.push(Step::emit("CLICK", "Submitting search"));
    } else if lower.starts_with("click") {
        steps.push(Step::emit("HIGHLIGHT", "Highlighting target element"));
        steps.push(Step::emit("CLICK", "Clicking target element"));
    }

    if steps.is_empty() {
        steps.push(Step::emit("GET_SNAPSHOT", "Captured page snapshot"));
    }
    steps
}
