pub mod anthropic;
pub mod openai;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;

use super::{ LlmConfig, LlmType };
use self::anthropic::AnthropicChatClient;
use self::openai::OpenAIChatClient;
use crate::models::chat::ConversationMessage;
use crate::tools::ToolDescriptor;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error: HTTP {status}: {body}")]
    Api {
        status: u16,
        body: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A request by the model to run one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: JsonValue,
}

/// Vendor-neutral transcript entry. Each backend maps these onto its own
/// wire format.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnMessage {
    User(String),
    Assistant(String),
    /// Assistant turn that asked for one or more tools, with any text it
    /// said alongside. Each call is answered by its own `ToolResult`.
    ToolCall {
        text: String,
        calls: Vec<ToolCall>,
    },
    ToolResult {
        call_id: String,
        content: String,
    },
}

impl From<&ConversationMessage> for TurnMessage {
    fn from(msg: &ConversationMessage) -> Self {
        if msg.is_from_assistant {
            TurnMessage::Assistant(msg.content.clone())
        } else {
            TurnMessage::User(msg.content.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    ToolUse,
    EndTurn,
    MaxTokens,
    Other(String),
}

#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub system_prompt: &'a str,
    pub tools: &'a [ToolDescriptor],
    pub messages: &'a [TurnMessage],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    /// Tool invocations in the order the model emitted them.
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), tool_calls: Vec::new(), stop_reason: StopReason::EndTurn }
    }

    pub fn tool_use(call: ToolCall) -> Self {
        Self::tool_uses(vec![call])
    }

    pub fn tool_uses(calls: Vec<ToolCall>) -> Self {
        Self { text: String::new(), tool_calls: calls, stop_reason: StopReason::ToolUse }
    }

    pub fn wants_tool(&self) -> bool {
        self.stop_reason == StopReason::ToolUse
    }
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// One stateless completion step with the given tools available.
    async fn complete_with_tools(
        &self,
        request: ModelRequest<'_>
    ) -> Result<ModelResponse, LlmError>;

    fn get_model(&self) -> String;
    fn get_llm_type(&self) -> LlmType;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ModelBackend>, LlmError> {
    let client: Arc<dyn ModelBackend> = match config.llm_type {
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Anthropic => {
            let specific_client = AnthropicChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}
