use async_trait::async_trait;
use log::debug;
use reqwest::{Client as HttpClient, header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION}};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{LlmError, ModelBackend, ModelRequest, ModelResponse, StopReason, ToolCall, TurnMessage};
use crate::llm::{LlmConfig, LlmType};
use crate::tools::ToolDescriptor;

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct OpenAIMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAIMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: OpenAIFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct OpenAIFunctionCall {
    name: String,
    /// JSON-encoded argument object, as the API sends it.
    arguments: String,
}

#[derive(Serialize)]
struct OpenAITool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: OpenAIFunction<'a>,
}

#[derive(Serialize)]
struct OpenAIFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a JsonValue,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAITool<'a>>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    #[serde(rename = "finish_reason")]
    finish_reason: Option<String>,
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        max_tokens: u32,
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| "gpt-4o".to_string());
        let api_url = base_url.unwrap_or_else(|| "https://api.openai.com".to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
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
            .ok_or_else(|| LlmError::Configuration("OpenAI API key is required".to_string()))?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            config.max_tokens,
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

fn convert_messages(system_prompt: &str, messages: &[TurnMessage]) -> Vec<OpenAIMessage> {
    let mut converted = Vec::with_capacity(messages.len() + 1);
    converted.push(OpenAIMessage::text("system", system_prompt));

    for message in messages {
        let entry = match message {
            TurnMessage::User(content) => OpenAIMessage::text("user", content),
            TurnMessage::Assistant(content) => OpenAIMessage::text("assistant", content),
            TurnMessage::ToolCall { text, calls } => OpenAIMessage {
                role: "assistant".to_string(),
                content: Some(text.clone()).filter(|t| !t.is_empty()),
                tool_calls: Some(calls.iter()
                    .map(|call| OpenAIToolCall {
                        id: call.id.clone(),
                        call_type: function_type(),
                        function: OpenAIFunctionCall {
                            name: call.name.clone(),
                            arguments: call.input.to_string(),
                        },
                    })
                    .collect()),
                tool_call_id: None,
            },
            TurnMessage::ToolResult { call_id, content } => OpenAIMessage {
                role: "tool".to_string(),
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
            },
        };
        converted.push(entry);
    }

    converted
}

fn convert_tools(tools: &[ToolDescriptor]) -> Vec<OpenAITool<'_>> {
    tools.iter()
        .map(|t| OpenAITool {
            tool_type: "function",
            function: OpenAIFunction {
                name: &t.name,
                description: &t.description,
                parameters: &t.parameters,
            },
        })
        .collect()
}

fn parse_response(response: OpenAIResponse) -> Result<ModelResponse, LlmError> {
    let choice = response.choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("No response from OpenAI API".to_string()))?;

    let stop_reason = match choice.finish_reason.as_deref() {
        Some("tool_calls") => StopReason::ToolUse,
        Some("stop") | None => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some(other) => StopReason::Other(other.to_string()),
    };

    let tool_calls = choice.message.tool_calls
        .unwrap_or_default()
        .into_iter()
        .filter(|c| c.call_type == "function")
        .map(|c| {
            // Malformed argument JSON is passed through as a string so the
            // tool layer can report it back to the model.
            let input = serde_json::from_str(&c.function.arguments)
                .unwrap_or(JsonValue::String(c.function.arguments));
            ToolCall { id: c.id, name: c.function.name, input }
        })
        .collect();

    Ok(ModelResponse {
        text: choice.message.content.unwrap_or_default(),
        tool_calls,
        stop_reason,
    })
}

#[async_trait]
impl ModelBackend for OpenAIChatClient {
    async fn complete_with_tools(
        &self,
        request: ModelRequest<'_>
    ) -> Result<ModelResponse, LlmError> {
        let req = OpenAIChatRequest {
            model: &self.model,
            messages: convert_messages(request.system_prompt, request.messages),
            max_tokens: self.max_tokens,
            tools: convert_tools(request.tools),
        };

        let resp = self.http.post(self.endpoint())
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), body });
        }

        let parsed = resp.json::<OpenAIResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let response = parse_response(parsed)?;
        debug!("OpenAI finished with {:?}", response.stop_reason);
        Ok(response)
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_llm_type(&self) -> LlmType {
        LlmType::OpenAI
    }
}
