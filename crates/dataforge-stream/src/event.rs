//! Streaming event types

use serde::{Deserialize, Serialize};

/// Events pushed by the server while an assistant reply is generated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The user message was persisted and the assistant message allocated
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_message_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assistant_message_id: Option<i64>,
    },
    /// A data tool started running
    ToolStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
    },
    /// A data tool finished
    ToolResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        success: Option<bool>,
    },
    /// Thinking text delta
    Reasoning {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// Answer text delta
    Content {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// The assistant message was persisted
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assistant_message_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tokens_used: Option<u64>,
    },
    /// Server-side failure
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl StreamEvent {
    /// Parse a single `data:` payload
    pub fn from_payload(payload: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    /// The incremental text carried by a `reasoning` or `content` event
    pub fn fragment(&self) -> Option<&str> {
        match self {
            StreamEvent::Reasoning { reasoning, content } => {
                reasoning.as_deref().or(content.as_deref())
            }
            StreamEvent::Content { content } => content.as_deref(),
            _ => None,
        }
    }

    /// The wire tag of this event
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Start { .. } => "start",
            StreamEvent::ToolStart { .. } => "tool_start",
            StreamEvent::ToolResult { .. } => "tool_result",
            StreamEvent::Reasoning { .. } => "reasoning",
            StreamEvent::Content { .. } => "content",
            StreamEvent::Done { .. } => "done",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// Check if this is the semantic end of a reply
    #[cfg(test)]
    pub(crate) fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. })
    }

    /// Convenience constructor for an answer delta
    pub fn content(text: impl Into<String>) -> Self {
        StreamEvent::Content {
            content: Some(text.into()),
        }
    }

    /// Convenience constructor for a thinking delta
    pub fn reasoning(text: impl Into<String>) -> Self {
        StreamEvent::Reasoning {
            reasoning: Some(text.into()),
            content: None,
        }
    }
}
