//! Request body for the message-stream endpoint

use serde::{Deserialize, Serialize};

/// Per-turn provider selection chosen by the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderOptions {
    /// Backend AI provider identifier (server default when absent)
    pub ai_provider: Option<String>,
    /// Ask the provider for a reasoning trace
    pub use_deep_thinking: Option<bool>,
}

impl ProviderOptions {
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.ai_provider = Some(provider.into());
        self
    }

    pub fn with_deep_thinking(mut self, enabled: bool) -> Self {
        self.use_deep_thinking = Some(enabled);
        self
    }
}

/// JSON body posted to start a streamed reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequest {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_provider: Option<String>,
    pub enable_tools: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_deep_thinking: Option<bool>,
}

impl StreamRequest {
    /// Build the body for a user message. Tools are always enabled.
    pub fn new(content: impl Into<String>, options: &ProviderOptions) -> Self {
        Self {
            content: content.into(),
            ai_provider: options.ai_provider.clone(),
            enable_tools: true,
            use_deep_thinking: options.use_deep_thinking,
        }
    }
}
