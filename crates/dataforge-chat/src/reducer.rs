//! The single transition function behind the chat stream state.
//!
//! Every mutation goes through [`Reducer::dispatch`]. Actions tied to a run
//! carry the `seq` that run was started with; once a newer run has started
//! or the run was stopped, those actions no longer match the generation and
//! are dropped before anything is touched.

use dataforge_stream::StreamEvent;

use crate::{
    cache::QueryKey,
    error::Error,
    state::{Phase, StreamState},
    tools,
};

/// Shown when the server signals an error without a message
pub const GENERIC_STREAM_ERROR: &str = "AI response failed, please try again";

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Begin a run for a conversation
    Start {
        conversation_id: i64,
        content: String,
    },
    /// A decoded event from run `seq`
    Event { seq: u64, event: StreamEvent },
    /// Run `seq` failed with a user-visible message
    Fail { seq: u64, message: String },
    /// Run `seq` ended; return to idle
    Finish { seq: u64 },
    /// Cancel whatever is running
    Stop,
    /// Dismiss the current error
    ClearError,
}

/// What a dispatch did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A run was accepted under this seq
    Started { seq: u64 },
    /// A run was already active; `error` was set instead
    Rejected,
    /// State changed; these cache keys are now stale
    Applied { invalidate: Vec<QueryKey> },
    /// The action belonged to a superseded run
    Ignored,
    /// The generation was advanced and state reset
    Stopped,
}

impl Outcome {
    fn applied() -> Self {
        Outcome::Applied {
            invalidate: Vec::new(),
        }
    }
}

/// Stream state plus the generation counter guarding it
#[derive(Debug, Default)]
pub struct Reducer {
    state: StreamState,
    generation: u64,
}

impl Reducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Apply one action
    pub fn dispatch(&mut self, action: Action) -> Outcome {
        match action {
            Action::Start {
                conversation_id,
                content,
            } => self.start(conversation_id, content),
            Action::Event { seq, event } => match self.active_conversation(seq) {
                Some(conversation_id) => self.apply_event(conversation_id, event),
                None => Outcome::Ignored,
            },
            Action::Fail { seq, message } => {
                if seq != self.generation {
                    return Outcome::Ignored;
                }
                self.state.error = Some(message);
                Outcome::applied()
            }
            Action::Finish { seq } => {
                if seq != self.generation {
                    return Outcome::Ignored;
                }
                self.state.reset_to_idle();
                Outcome::applied()
            }
            Action::Stop => {
                self.generation += 1;
                self.state.reset_to_idle();
                Outcome::Stopped
            }
            Action::ClearError => {
                self.state.error = None;
                Outcome::applied()
            }
        }
    }

    fn start(&mut self, conversation_id: i64, content: String) -> Outcome {
        if self.state.is_streaming() {
            self.state.error = Some(Error::AlreadyStreaming.to_string());
            return Outcome::Rejected;
        }

        self.generation += 1;
        let seq = self.generation;
        self.state = StreamState {
            phase: Phase::Streaming {
                seq,
                conversation_id,
            },
            pending_user_message: Some(content),
            ..Default::default()
        };
        Outcome::Started { seq }
    }

    /// The conversation of run `seq`, if that run is still the current one.
    fn active_conversation(&self, seq: u64) -> Option<i64> {
        match self.state.phase {
            Phase::Streaming {
                seq: current,
                conversation_id,
            } if current == seq && self.generation == seq => Some(conversation_id),
            _ => None,
        }
    }

    fn apply_event(&mut self, conversation_id: i64, event: StreamEvent) -> Outcome {
        let mut invalidate = Vec::new();

        match event {
            StreamEvent::Start {
                assistant_message_id,
                ..
            } => {
                if let Some(id) = assistant_message_id {
                    self.state.streaming_message_id = Some(id);
                }
                invalidate.push(QueryKey::ConversationMessages(conversation_id));
                invalidate.push(QueryKey::Conversations);
            }
            StreamEvent::ToolStart { tool_name } => {
                let line = tools::progress_line(tool_name.as_deref().unwrap_or_default());
                self.state.streaming_content.push_str(&line);
            }
            StreamEvent::ToolResult { success, .. } => {
                // Failed tools get no line of their own
                if success == Some(true) {
                    self.state.streaming_content.push_str(tools::TOOL_SUCCESS_LINE);
                }
            }
            ref fragment @ StreamEvent::Reasoning { .. } => {
                if let Some(text) = fragment.fragment() {
                    self.state.streaming_reasoning.push_str(text);
                }
            }
            StreamEvent::Content { content } => {
                if let Some(text) = content {
                    self.state.streaming_content.push_str(&text);
                }
            }
            StreamEvent::Done { .. } => {
                invalidate.push(QueryKey::ConversationMessages(conversation_id));
                invalidate.push(QueryKey::Messages);
                invalidate.push(QueryKey::Conversations);
            }
            StreamEvent::Error { error } => {
                self.state.error = Some(error.unwrap_or_else(|| GENERIC_STREAM_ERROR.to_string()));
            }
        }

        Outcome::Applied { invalidate }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(reducer: &mut Reducer, conversation_id: i64) -> u64 {
        match reducer.dispatch(Action::Start {
            conversation_id,
            content: "question".into(),
        }) {
            Outcome::Started { seq } => seq,
            other => panic!("expected start, got {:?}", other),
        }
    }

    fn event(reducer: &mut Reducer, seq: u64, event: StreamEvent) -> Outcome {
        reducer.dispatch(Action::Event { seq, event })
    }

    #[test]
    fn test_start_resets_buffers_and_sets_pending_message() {
        let mut reducer = Reducer::new();
        reducer.dispatch(Action::Stop);
        let seq = started(&mut reducer, 5);

        assert_eq!(seq, 2);
        let state = reducer.state();
        assert!(state.is_streaming());
        assert_eq!(state.conversation_id(), Some(5));
        assert_eq!(state.pending_user_message.as_deref(), Some("question"));
        assert!(state.streaming_content.is_empty());
        assert!(state.error.is_none());
    }

    #[test]
    fn test_start_while_streaming_is_rejected() {
        let mut reducer = Reducer::new();
        let seq = started(&mut reducer, 1);
        event(&mut reducer, seq, StreamEvent::content("partial"));

        let outcome = reducer.dispatch(Action::Start {
            conversation_id: 2,
            content: "second".into(),
        });

        assert_eq!(outcome, Outcome::Rejected);
        assert_eq!(reducer.generation, seq);
        let state = reducer.state();
        assert_eq!(state.conversation_id(), Some(1));
        assert_eq!(state.streaming_content, "partial");
        assert_eq!(state.pending_user_message.as_deref(), Some("question"));
        assert_eq!(
            state.error.as_deref(),
            Some(Error::AlreadyStreaming.to_string().as_str())
        );

        // The running run is unaffected
        event(&mut reducer, seq, StreamEvent::content(" more"));
        assert_eq!(reducer.state().streaming_content, "partial more");
    }

    #[test]
    fn test_start_event_records_message_id_and_invalidates() {
        let mut reducer = Reducer::new();
        let seq = started(&mut reducer, 8);

        let outcome = event(
            &mut reducer,
            seq,
            StreamEvent::Start {
                user_message_id: Some(41),
                assistant_message_id: Some(42),
            },
        );

        assert_eq!(reducer.state().streaming_message_id, Some(42));
        assert_eq!(
            outcome,
            Outcome::Applied {
                invalidate: vec![QueryKey::ConversationMessages(8), QueryKey::Conversations]
            }
        );
    }

    #[test]
    fn test_start_event_without_id_keeps_none() {
        let mut reducer = Reducer::new();
        let seq = started(&mut reducer, 8);
        event(
            &mut reducer,
            seq,
            StreamEvent::Start {
                user_message_id: None,
                assistant_message_id: None,
            },
        );
        assert_eq!(reducer.state().streaming_message_id, None);
    }

    #[test]
    fn test_content_and_reasoning_accumulate_separately() {
        let mut reducer = Reducer::new();
        let seq = started(&mut reducer, 1);

        event(&mut reducer, seq, StreamEvent::reasoning("Let me "));
        event(&mut reducer, seq, StreamEvent::content("Hel"));
        event(&mut reducer, seq, StreamEvent::reasoning("check."));
        event(&mut reducer, seq, StreamEvent::content("lo"));

        assert_eq!(reducer.state().streaming_content, "Hello");
        assert_eq!(reducer.state().streaming_reasoning, "Let me check.");
    }

    #[test]
    fn test_tool_lines() {
        let mut reducer = Reducer::new();
        let seq = started(&mut reducer, 1);

        event(
            &mut reducer,
            seq,
            StreamEvent::ToolStart {
                tool_name: Some("query_call_records".into()),
            },
        );
        event(
            &mut reducer,
            seq,
            StreamEvent::ToolResult {
                tool_name: Some("query_call_records".into()),
                success: Some(true),
            },
        );
        event(
            &mut reducer,
            seq,
            StreamEvent::ToolStart {
                tool_name: Some("custom_tool".into()),
            },
        );
        event(
            &mut reducer,
            seq,
            StreamEvent::ToolResult {
                tool_name: Some("custom_tool".into()),
                success: Some(false),
            },
        );

        assert_eq!(
            reducer.state().streaming_content,
            "\n🔍 正在查询通话记录...\n✅ 数据查询完成\n\n\n🔍 正在custom_tool...\n"
        );
    }

    #[test]
    fn test_done_invalidates_three_keys() {
        let mut reducer = Reducer::new();
        let seq = started(&mut reducer, 3);
        let outcome = event(
            &mut reducer,
            seq,
            StreamEvent::Done {
                assistant_message_id: Some(9),
                tokens_used: Some(120),
            },
        );
        assert_eq!(
            outcome,
            Outcome::Applied {
                invalidate: vec![
                    QueryKey::ConversationMessages(3),
                    QueryKey::Messages,
                    QueryKey::Conversations,
                ]
            }
        );
        // Still streaming until the run finishes
        assert!(reducer.state().is_streaming());
    }

    #[test]
    fn test_error_event_sets_error_and_keeps_streaming() {
        let mut reducer = Reducer::new();
        let seq = started(&mut reducer, 1);

        event(
            &mut reducer,
            seq,
            StreamEvent::Error {
                error: Some("quota exceeded".into()),
            },
        );
        assert_eq!(reducer.state().error.as_deref(), Some("quota exceeded"));
        assert!(reducer.state().is_streaming());

        event(&mut reducer, seq, StreamEvent::Error { error: None });
        assert_eq!(reducer.state().error.as_deref(), Some(GENERIC_STREAM_ERROR));

        event(&mut reducer, seq, StreamEvent::content("still here"));
        assert_eq!(reducer.state().streaming_content, "still here");
    }

    #[test]
    fn test_stale_events_are_ignored_after_stop() {
        let mut reducer = Reducer::new();
        let seq = started(&mut reducer, 1);
        event(&mut reducer, seq, StreamEvent::content("before"));

        assert_eq!(reducer.dispatch(Action::Stop), Outcome::Stopped);
        let after_stop = reducer.state().clone();

        for e in [
            StreamEvent::content("late"),
            StreamEvent::reasoning("late"),
            StreamEvent::Error {
                error: Some("late".into()),
            },
            StreamEvent::Done {
                assistant_message_id: None,
                tokens_used: None,
            },
        ] {
            assert_eq!(event(&mut reducer, seq, e), Outcome::Ignored);
        }
        assert_eq!(
            reducer.dispatch(Action::Fail {
                seq,
                message: "late".into()
            }),
            Outcome::Ignored
        );
        assert_eq!(reducer.dispatch(Action::Finish { seq }), Outcome::Ignored);
        assert_eq!(reducer.state(), &after_stop);
        assert!(after_stop.streaming_content.is_empty());
    }

    #[test]
    fn test_old_run_cannot_touch_newer_run() {
        let mut reducer = Reducer::new();
        let old = started(&mut reducer, 1);
        reducer.dispatch(Action::Stop);
        let new = started(&mut reducer, 2);
        event(&mut reducer, new, StreamEvent::content("fresh"));

        assert_eq!(event(&mut reducer, old, StreamEvent::content("stale")), Outcome::Ignored);
        assert_eq!(reducer.dispatch(Action::Finish { seq: old }), Outcome::Ignored);

        let state = reducer.state();
        assert!(state.is_streaming());
        assert_eq!(state.conversation_id(), Some(2));
        assert_eq!(state.streaming_content, "fresh");
    }

    #[test]
    fn test_finish_returns_to_idle_and_keeps_error() {
        let mut reducer = Reducer::new();
        let seq = started(&mut reducer, 1);
        event(&mut reducer, seq, StreamEvent::content("text"));
        reducer.dispatch(Action::Fail {
            seq,
            message: "HTTP error! status: 500".into(),
        });
        reducer.dispatch(Action::Finish { seq });

        let state = reducer.state();
        assert!(!state.is_streaming());
        assert!(state.streaming_content.is_empty());
        assert!(state.pending_user_message.is_none());
        assert_eq!(state.error.as_deref(), Some("HTTP error! status: 500"));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut once = Reducer::new();
        let seq = started(&mut once, 1);
        event(&mut once, seq, StreamEvent::content("x"));
        once.dispatch(Action::Stop);

        let mut twice = Reducer::new();
        let seq = started(&mut twice, 1);
        event(&mut twice, seq, StreamEvent::content("x"));
        twice.dispatch(Action::Stop);
        twice.dispatch(Action::Stop);

        assert_eq!(once.state(), twice.state());

        let mut idle = Reducer::new();
        idle.dispatch(Action::Stop);
        assert_eq!(idle.state(), &StreamState::default());
        assert_eq!(idle.generation, 1);
    }

    #[test]
    fn test_clear_error() {
        let mut reducer = Reducer::new();
        started(&mut reducer, 1);
        reducer.dispatch(Action::Start {
            conversation_id: 1,
            content: "again".into(),
        });
        assert!(reducer.state().error.is_some());

        reducer.dispatch(Action::ClearError);
        assert!(reducer.state().error.is_none());
        assert!(reducer.state().is_streaming());
    }
}
