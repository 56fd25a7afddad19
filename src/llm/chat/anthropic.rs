use async_trait::async_trait;
use log::debug;
use reqwest::{Client as HttpClient, header::{HeaderMap, HeaderValue, CONTENT_TYPE}};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{LlmError, ModelBackend, ModelRequest, ModelResponse, StopReason, ToolCall, TurnMessage};
use crate::llm::{LlmConfig, LlmType};
use crate::tools::ToolDescriptor;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API with native `tool_use` blocks.
pub struct AnthropicChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool<'a>>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize)]
struct AnthropicTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a JsonValue,
}

#[derive(Serialize, Debug, PartialEq)]
struct AnthropicMessage {
    role: &'static str,
    content: AnthropicContent,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: JsonValue,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

impl AnthropicChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        max_tokens: u32,
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| "claude-sonnet-4-20250514".to_string());
        let api_url = base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key)
                .map_err(|e| LlmError::Configuration(format!("Invalid API key format: {}", e)))?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            model: chat_model,
            base_url: api_url,
            max_tokens,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::Configuration("Anthropic API key is required".to_string()))?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            config.max_tokens,
        )
    }
}

fn convert_messages(messages: &[TurnMessage]) -> Vec<AnthropicMessage> {
    let mut converted: Vec<AnthropicMessage> = Vec::with_capacity(messages.len());

    // The API requires the transcript to open with a user turn; the
    // widget's greeting is dropped.
    let transcript = messages.iter().skip_while(|m| matches!(m, TurnMessage::Assistant(_)));

    for message in transcript {
        match message {
            TurnMessage::User(content) => converted.push(AnthropicMessage {
                role: "user",
                content: AnthropicContent::Text(content.clone()),
            }),
            // Empty text content blocks are rejected by the API.
            TurnMessage::Assistant(content) if content.trim().is_empty() => {}
            TurnMessage::Assistant(content) => converted.push(AnthropicMessage {
                role: "assistant",
                content: AnthropicContent::Text(content.clone()),
            }),
            TurnMessage::ToolCall { text, calls } => {
                let mut blocks = Vec::with_capacity(calls.len() + 1);
                if !text.trim().is_empty() {
                    blocks.push(ContentBlock::Text { text: text.clone() });
                }
                blocks.extend(calls.iter().map(|call| ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.input.clone(),
                }));
                converted.push(AnthropicMessage {
                    role: "assistant",
                    content: AnthropicContent::Blocks(blocks),
                });
            }
            TurnMessage::ToolResult { call_id, content } => {
                let block = ContentBlock::ToolResult {
                    tool_use_id: call_id.clone(),
                    content: content.clone(),
                };
                // Results for one assistant turn travel together in the next user turn.
                match converted.last_mut() {
                    Some(AnthropicMessage {
                        role: "user",
                        content: AnthropicContent::Blocks(blocks),
                    }) => blocks.push(block),
                    _ => converted.push(AnthropicMessage {
                        role: "user",
                        content: AnthropicContent::Blocks(vec![block]),
                    }),
                }
            }
        }
    }

    converted
}

fn convert_tools(tools: &[ToolDescriptor]) -> Vec<AnthropicTool<'_>> {
    tools.iter()
        .map(|t| AnthropicTool {
            name: &t.name,
            description: &t.description,
            input_schema: &t.parameters,
        })
        .collect()
}

fn parse_response(response: AnthropicResponse) -> ModelResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            ContentBlock::Text { text: t } => text.push_str(&t),
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall { id, name, input });
            }
            _ => {}
        }
    }

    let stop_reason = match response.stop_reason.as_deref() {
        Some("tool_use") => StopReason::ToolUse,
        Some("end_turn") | Some("stop_sequence") | None => StopReason::EndTurn,
        Some("max_tokens") => StopReason::MaxTokens,
        Some(other) => StopReason::Other(other.to_string()),
    };

    ModelResponse { text, tool_calls, stop_reason }
}

#[async_trait]
impl ModelBackend for AnthropicChatClient {
    async fn complete_with_tools(
        &self,
        request: ModelRequest<'_>
    ) -> Result<ModelResponse, LlmError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let req = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: request.system_prompt,
            tools: convert_tools(request.tools),
            messages: convert_messages(request.messages),
        };

        let resp = self.http.post(&url)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), body });
        }

        let parsed = resp.json::<AnthropicResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let response = parse_response(parsed);
        debug!("Anthropic finished with {:?}", response.stop_reason);
        Ok(response)
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_llm_type(&self) -> LlmType {
        LlmType::Anthropic
    }
}
