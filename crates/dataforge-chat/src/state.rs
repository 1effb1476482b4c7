//! Observable streaming state: phase, live buffers, and the last error.

/// Where the store is in its run lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// No run in progress
    #[default]
    Idle,
    /// A run is in progress; only events carrying `seq` are applied
    Streaming { seq: u64, conversation_id: i64 },
}

/// Live state of the reply being streamed, rendered before the server's
/// persisted copy is re-fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    /// Current lifecycle phase
    pub phase: Phase,
    /// Accumulated answer text
    pub streaming_content: String,
    /// Accumulated thinking text
    pub streaming_reasoning: String,
    /// The just-sent user text, shown before the server confirms it
    pub pending_user_message: Option<String>,
    /// Server id of the assistant message being streamed
    pub streaming_message_id: Option<i64>,
    /// Last surfaced error
    pub error: Option<String>,
}

impl StreamState {
    /// Whether a run is in progress
    pub fn is_streaming(&self) -> bool {
        matches!(self.phase, Phase::Streaming { .. })
    }

    /// Conversation being streamed, if any
    pub fn conversation_id(&self) -> Option<i64> {
        match self.phase {
            Phase::Streaming {
                conversation_id, ..
            } => Some(conversation_id),
            Phase::Idle => None,
        }
    }

    /// Reset everything except `error` to idle defaults.
    pub(crate) fn reset_to_idle(&mut self) {
        self.phase = Phase::Idle;
        self.streaming_content.clear();
        self.streaming_reasoning.clear();
        self.pending_user_message = None;
        self.streaming_message_id = None;
    }
}
