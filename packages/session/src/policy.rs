//! # Session Policies
//!
//! The two session variants share all connection handling and differ only
//! in endpoint, job tracking and how events reduce into state.

use crate::events::InboundEvent;
use crate::state::{SessionState, SessionStatus};

/// Per-variant behaviour of a [`StreamingSession`](crate::StreamingSession)
pub trait SessionPolicy: Send + Sync + 'static {
    /// Endpoint path appended to the server URL
    const PATH: &'static str;

    /// Short name used in logs
    const LABEL: &'static str;

    /// Whether lifecycle events are mirrored into the job store
    const TRACKS_JOBS: bool = false;

    /// Fold an event into the state; `true` if anything changed
    fn reduce(&self, state: &mut SessionState, event: &InboundEvent) -> bool {
        reduce_event(state, event)
    }

    /// Local transition after a decision was sent
    fn on_decision(&self, state: &mut SessionState) -> bool {
        if state.status != SessionStatus::HitlPending {
            return false;
        }
        state.status = SessionStatus::Processing;
        state.pending_hitl = None;
        true
    }
}

/// Reducer shared by both variants
pub fn reduce_event(state: &mut SessionState, event: &InboundEvent) -> bool {
    if state.status.is_terminal() {
        tracing::debug!(event = event.event_type(), "Ignoring event after session ended");
        return false;
    }

    match event {
        InboundEvent::JobCreated { job_id } => {
            state.status = SessionStatus::Processing;
            state.job_id = Some(job_id.clone());
            state.error = None;
        }
        InboundEvent::NodeStarted {
            node,
            node_index,
            total_nodes,
        } => {
            resume(state);
            state.current_node = Some(node.clone());
            state.node_index = *node_index;
            state.total_nodes = *total_nodes;
        }
        InboundEvent::NodeCompleted { node, details }
        | InboundEvent::ToolCall {
            tool: node,
            details,
        } => {
            resume(state);
            state.node_details.insert(node.clone(), details.clone());
        }
        InboundEvent::LlmToken { token } => {
            if token.is_empty() {
                return false;
            }
            state.streamed_text.push_str(token);
        }
        InboundEvent::HitlRequired { prompt } => {
            state.status = SessionStatus::HitlPending;
            state.pending_hitl = Some(prompt.clone());
        }
        InboundEvent::Error { message } => {
            state.status = SessionStatus::Error;
            state.error = Some(message.clone());
        }
        InboundEvent::Complete { result } => {
            state.status = SessionStatus::Complete;
            state.result = Some(result.clone());
            state.pending_hitl = None;
        }
    }
    true
}

/// Server activity after a pause means the decision was taken
fn resume(state: &mut SessionState) {
    if state.status == SessionStatus::HitlPending {
        state.status = SessionStatus::Processing;
        state.pending_hitl = None;
    }
}

/// Video processing: node progress only, tracked as a job
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessingPolicy;

impl SessionPolicy for ProcessingPolicy {
    const PATH: &'static str = "/ws/process";
    const LABEL: &'static str = "process";
    const TRACKS_JOBS: bool = true;

    fn reduce(&self, state: &mut SessionState, event: &InboundEvent) -> bool {
        match event {
            InboundEvent::HitlRequired { .. } => {
                tracing::warn!("Processing session received a HITL prompt, ignoring");
                false
            }
            InboundEvent::LlmToken { .. } => false,
            _ => reduce_event(state, event),
        }
    }
}

/// AI compiler copilot: token stream, tool calls and HITL pauses
#[derive(Debug, Clone, Copy, Default)]
pub struct CompilerPolicy;

impl SessionPolicy for CompilerPolicy {
    const PATH: &'static str = "/ws/compile";
    const LABEL: &'static str = "compile";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn created() -> InboundEvent {
        InboundEvent::JobCreated {
            job_id: "j1".to_string(),
        }
    }

    #[test]
    fn test_lifecycle() {
        let mut state = SessionState::default();
        assert!(reduce_event(&mut state, &created()));
        assert_eq!(state.status, SessionStatus::Processing);
        assert_eq!(state.job_id.as_deref(), Some("j1"));

        reduce_event(
            &mut state,
            &InboundEvent::NodeStarted {
                node: "analyze".to_string(),
                node_index: Some(1),
                total_nodes: Some(3),
            },
        );
        assert_eq!(state.current_node.as_deref(), Some("analyze"));
        assert_eq!(state.total_nodes, Some(3));

        reduce_event(&mut state, &InboundEvent::Complete { result: json!({"manual_id": 5}) });
        assert_eq!(state.status, SessionStatus::Complete);
        assert_eq!(state.result, Some(json!({"manual_id": 5})));
    }

    #[test]
    fn test_node_details_merge() {
        let mut state = SessionState::default();
        reduce_event(&mut state, &created());

        reduce_event(
            &mut state,
            &InboundEvent::NodeCompleted {
                node: "a".to_string(),
                details: json!({"n": 1}),
            },
        );
        reduce_event(
            &mut state,
            &InboundEvent::ToolCall {
                tool: "search".to_string(),
                details: json!({"q": "x"}),
            },
        );

        assert_eq!(state.node_details.len(), 2);
        assert_eq!(state.node_details["a"], json!({"n": 1}));
        assert_eq!(state.node_details["search"], json!({"q": "x"}));
    }

    #[test]
    fn test_events_after_terminal_are_ignored() {
        let mut state = SessionState::default();
        reduce_event(&mut state, &created());
        reduce_event(
            &mut state,
            &InboundEvent::Error {
                message: "failed".to_string(),
            },
        );

        let changed = reduce_event(
            &mut state,
            &InboundEvent::LlmToken {
                token: "late".to_string(),
            },
        );
        assert!(!changed);
        assert_eq!(state.status, SessionStatus::Error);
        assert!(state.streamed_text.is_empty());
    }

    #[test]
    fn test_hitl_loop() {
        let policy = CompilerPolicy;
        let mut state = SessionState::default();
        policy.reduce(&mut state, &created());

        policy.reduce(
            &mut state,
            &InboundEvent::HitlRequired {
                prompt: json!({"question": "Apply?"}),
            },
        );
        assert_eq!(state.status, SessionStatus::HitlPending);
        assert!(state.pending_hitl.is_some());

        assert!(policy.on_decision(&mut state));
        assert_eq!(state.status, SessionStatus::Processing);
        assert!(state.pending_hitl.is_none());

        // Only meaningful while paused
        assert!(!policy.on_decision(&mut state));
    }

    #[test]
    fn test_processing_ignores_hitl() {
        let policy = ProcessingPolicy;
        let mut state = SessionState::default();
        policy.reduce(&mut state, &created());

        let changed = policy.reduce(
            &mut state,
            &InboundEvent::HitlRequired {
                prompt: json!({}),
            },
        );
        assert!(!changed);
        assert_eq!(state.status, SessionStatus::Processing);

        let changed = policy.reduce(
            &mut state,
            &InboundEvent::LlmToken {
                token: "t".to_string(),
            },
        );
        assert!(!changed);
        assert!(state.streamed_text.is_empty());
    }
}
