//! Session controller: transcript ownership and the single-flight state machine.

use agent_console_core::{BackendError, ProcessingState, TerminalReason, TranscriptEntry};

/// Instruction to issue exactly one outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTicket {
    /// Processing cycle this call belongs to.
    pub cycle: u64,
    /// Text to send.
    pub prompt: String,
}

/// Tracks whether the agent is busy and owns the chat transcript.
///
/// Sans-IO: accepting a submission yields a [`PromptTicket`] and the
/// caller performs the call, then reports back through
/// [`Self::on_call_resolved`]. Processing ends on the first of a call
/// failure or a terminal log marker; a successful answer only appends
/// to the transcript.
#[derive(Debug, Default)]
pub struct SessionController {
    state: ProcessingState,
    transcript: Vec<TranscriptEntry>,
    input: String,
    cycle: u64,
    last_diagnostic: Option<String>,
}

impl SessionController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> ProcessingState {
        self.state
    }

    #[must_use]
    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Current input buffer.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Most recent transient diagnostic, if any.
    #[must_use]
    pub fn last_diagnostic(&self) -> Option<&str> {
        self.last_diagnostic.as_deref()
    }

    /// Cycle number of the latest accepted submission.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Submit whatever is in the input buffer.
    pub fn submit_input(&mut self) -> Option<PromptTicket> {
        let text = self.input.clone();
        self.submit(&text)
    }

    /// Accept a command if the text is non-blank and nothing is in flight.
    ///
    /// On acceptance the user entry is appended and the state becomes
    /// `Processing` before the ticket is handed out. Otherwise nothing
    /// changes.
    pub fn submit(&mut self, prompt: &str) -> Option<PromptTicket> {
        if prompt.trim().is_empty() {
            tracing::debug!("Ignoring blank submission");
            return None;
        }
        if self.state.is_processing() {
            tracing::debug!(cycle = self.cycle, "Ignoring submission while processing");
            return None;
        }

        self.transcript.push(TranscriptEntry::user(prompt));
        self.state = ProcessingState::Processing;
        self.cycle += 1;
        self.last_diagnostic = None;
        tracing::info!(cycle = self.cycle, "Processing started");

        Some(PromptTicket {
            cycle: self.cycle,
            prompt: prompt.to_string(),
        })
    }

    /// Reconcile the outcome of the outbound call for `cycle`.
    ///
    /// Success appends the answer and clears the input but leaves the
    /// state alone. Failure forces `Idle` when it belongs to the cycle
    /// still processing. Returns whether the state changed.
    pub fn on_call_resolved(&mut self, cycle: u64, result: Result<String, BackendError>) -> bool {
        match result {
            Ok(answer) => {
                if cycle != self.cycle {
                    tracing::debug!(cycle, current = self.cycle, "Late answer from earlier cycle");
                }
                self.transcript.push(TranscriptEntry::assistant(answer));
                self.input.clear();
                false
            }
            Err(e) => {
                tracing::warn!(cycle, "Failed to send prompt: {e}");
                self.last_diagnostic = Some(format!("Failed to send prompt: {e}"));
                if cycle == self.cycle && self.state.is_processing() {
                    self.finish("call failed");
                    true
                } else {
                    tracing::debug!(cycle, current = self.cycle, "Call failure after cycle ended");
                    false
                }
            }
        }
    }

    /// A terminal marker arrived on the log channel.
    ///
    /// Ends processing unconditionally. A no-op when already `Idle`.
    pub fn on_session_ended(&mut self, reason: TerminalReason) -> bool {
        if !self.state.is_processing() {
            tracing::debug!(?reason, "Terminal marker while idle");
            return false;
        }
        self.finish(match reason {
            TerminalReason::Complete => "complete marker",
            TerminalReason::Error => "error marker",
        });
        true
    }

    /// The terminal timeout for `cycle` elapsed.
    ///
    /// Only ends the cycle it was armed for.
    pub fn on_terminal_timeout(&mut self, cycle: u64) -> bool {
        if cycle != self.cycle || !self.state.is_processing() {
            return false;
        }
        tracing::warn!(cycle, "No terminal marker before timeout, returning to idle");
        self.last_diagnostic = Some("Timed out waiting for the agent to finish".to_string());
        self.finish("terminal timeout");
        true
    }

    fn finish(&mut self, cause: &'static str) {
        self.state = ProcessingState::Idle;
        tracing::info!(cycle = self.cycle, cause, "Processing ended");
    }
}

#[cfg(test)]
mod tests {
    use agent_console_core::Role;

    use super::*;

    fn accepted(controller: &mut SessionController, text: &str) -> PromptTicket {
        controller.submit(text).expect("submission accepted")
    }

    #[test]
    fn test_submit_appends_user_entry_and_enters_processing() {
        let mut controller = SessionController::new();
        let ticket = accepted(&mut controller, "Navigate to google.com");

        assert_eq!(ticket.prompt, "Navigate to google.com");
        assert_eq!(ticket.cycle, 1);
        assert_eq!(controller.state(), ProcessingState::Processing);
        assert_eq!(
            controller.transcript(),
            [TranscriptEntry::user("Navigate to google.com")]
        );
    }

    #[test]
    fn test_blank_submissions_are_ignored() {
        let mut controller = SessionController::new();
        for text in ["", "   ", "\n\t"] {
            assert!(controller.submit(text).is_none());
        }
        assert_eq!(controller.state(), ProcessingState::Idle);
        assert!(controller.transcript().is_empty());
    }

    #[test]
    fn test_single_flight() {
        let mut controller = SessionController::new();
        accepted(&mut controller, "first");

        for text in ["x", "second", "first"] {
            assert!(controller.submit(text).is_none());
        }
        assert_eq!(controller.transcript().len(), 1);
        assert_eq!(controller.cycle(), 1);

        controller.on_session_ended(TerminalReason::Complete);
        let ticket = accepted(&mut controller, "second");
        assert_eq!(ticket.cycle, 2);
        assert_eq!(controller.transcript().len(), 2);
    }

    #[test]
    fn test_success_alone_does_not_end_processing() {
        let mut controller = SessionController::new();
        controller.set_input("open the docs");
        let ticket = controller.submit_input().unwrap();

        assert!(!controller.on_call_resolved(ticket.cycle, Ok("Task started.".into())));
        assert_eq!(controller.state(), ProcessingState::Processing);
        assert_eq!(controller.input(), "");
        assert_eq!(controller.transcript()[1], TranscriptEntry::assistant("Task started."));
    }

    #[test]
    fn test_terminal_wins_in_either_order() {
        // Answer first, then marker.
        let mut a = SessionController::new();
        let ticket = accepted(&mut a, "go");
        a.on_call_resolved(ticket.cycle, Ok("answer".into()));
        assert!(a.on_session_ended(TerminalReason::Complete));

        // Marker first, then answer.
        let mut b = SessionController::new();
        let ticket = accepted(&mut b, "go");
        assert!(b.on_session_ended(TerminalReason::Complete));
        assert!(!b.on_call_resolved(ticket.cycle, Ok("answer".into())));

        for controller in [&a, &b] {
            assert_eq!(controller.state(), ProcessingState::Idle);
            let answers = controller
                .transcript()
                .iter()
                .filter(|e| e.role == Role::Assistant)
                .count();
            assert_eq!(answers, 1);
        }
    }

    #[test]
    fn test_call_failure_forces_idle_without_transcript_entry() {
        let mut controller = SessionController::new();
        let ticket = accepted(&mut controller, "go");

        assert!(controller.on_call_resolved(ticket.cycle, Err(BackendError::NotInitialized)));
        assert_eq!(controller.state(), ProcessingState::Idle);
        assert_eq!(controller.transcript().len(), 1);
        assert!(controller.last_diagnostic().unwrap().contains("not initialized"));
    }

    #[test]
    fn test_second_terminal_signal_is_a_no_op() {
        let mut controller = SessionController::new();
        let ticket = accepted(&mut controller, "go");

        assert!(controller.on_session_ended(TerminalReason::Complete));
        assert!(!controller.on_session_ended(TerminalReason::Error));
        assert!(!controller.on_call_resolved(
            ticket.cycle,
            Err(BackendError::Transport("closed".into()))
        ));
        assert_eq!(controller.state(), ProcessingState::Idle);
    }

    #[test]
    fn test_stale_failure_does_not_end_next_cycle() {
        let mut controller = SessionController::new();
        let first = accepted(&mut controller, "one");
        controller.on_session_ended(TerminalReason::Complete);
        accepted(&mut controller, "two");

        assert!(!controller.on_call_resolved(first.cycle, Err(BackendError::Rejected("late".into()))));
        assert_eq!(controller.state(), ProcessingState::Processing);
    }

    #[test]
    fn test_terminal_timeout_only_for_current_cycle() {
        let mut controller = SessionController::new();
        let first = accepted(&mut controller, "one");
        controller.on_session_ended(TerminalReason::Error);
        let second = accepted(&mut controller, "two");

        assert!(!controller.on_terminal_timeout(first.cycle));
        assert_eq!(controller.state(), ProcessingState::Processing);

        assert!(controller.on_terminal_timeout(second.cycle));
        assert_eq!(controller.state(), ProcessingState::Idle);
        assert!(controller.last_diagnostic().is_some());
        assert!(!controller.on_terminal_timeout(second.cycle));
    }

    #[test]
    fn test_accepted_submit_clears_diagnostic() {
        let mut controller = SessionController::new();
        let ticket = accepted(&mut controller, "go");
        controller.on_call_resolved(ticket.cycle, Err(BackendError::NotInitialized));
        assert!(controller.last_diagnostic().is_some());

        accepted(&mut controller, "again");
        assert!(controller.last_diagnostic().is_none());
    }
}
