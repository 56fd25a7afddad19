use crate::calendar::slots::to_iso;
use crate::calendar::{ AvailabilityProvider, BookingCommitter, Scheduler };
use crate::cli::Args;
use crate::config::prompt::{ initialize_prompts, PromptConfig };
use crate::error::BookingError;
use crate::llm::{ LlmConfig, LlmType };
use crate::llm::chat::{
    new_client as new_chat_client,
    ModelBackend,
    ModelRequest,
    ModelResponse,
    ToolCall,
    TurnMessage,
};
use crate::locale::Locale;
use crate::models::chat::{ BookingRecord, ChatResponse, ConversationMessage };
use crate::tools::{ ToolInvocation, ToolRegistry };

use log::{ debug, error, info, warn };
use serde_json::{ json, Value as JsonValue };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

const TOOL_LIMIT_ERROR: &str = "Tool call limit reached";

#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Tool dispatches allowed per turn before the loop is cut off.
    pub max_tool_iterations: usize,
    pub turn_timeout: Duration,
    pub contact_email: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_tool_iterations: 5,
            turn_timeout: Duration::from_secs(30),
            contact_email: "hello@leadflow.ai".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationOutcome {
    pub response_text: String,
    /// Set when a `book_slot` call succeeded during the turn.
    pub booking: Option<BookingRecord>,
}

impl ConversationOutcome {
    pub fn booked(&self) -> bool {
        self.booking.is_some()
    }
}

impl From<ConversationOutcome> for ChatResponse {
    fn from(outcome: ConversationOutcome) -> Self {
        ChatResponse {
            booked: outcome.booked(),
            response: outcome.response_text,
            booking_details: outcome.booking,
        }
    }
}

/// Drives one stateless turn of the booking conversation: the model is
/// called with the locale's directive and the two booking tools, and tool
/// requests are served until it answers in plain text.
pub struct BookingAgent {
    model: Arc<dyn ModelBackend>,
    availability: Arc<dyn AvailabilityProvider>,
    committer: Arc<dyn BookingCommitter>,
    prompts: Arc<PromptConfig>,
    tools: ToolRegistry,
    settings: AgentSettings,
}

impl BookingAgent {
    pub fn new(
        model: Arc<dyn ModelBackend>,
        availability: Arc<dyn AvailabilityProvider>,
        committer: Arc<dyn BookingCommitter>,
        prompts: Arc<PromptConfig>,
        settings: AgentSettings
    ) -> Self {
        Self {
            model,
            availability,
            committer,
            prompts,
            tools: ToolRegistry::booking_tools(),
            settings,
        }
    }

    pub async fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let llm_type: LlmType = args.chat_llm_type.parse()?;
        let api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type,
            api_key,
            completion_model: args.chat_model.clone(),
            base_url: args.chat_base_url.clone(),
            max_tokens: args.chat_max_tokens,
        };
        let model = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={:?}",
            llm_type,
            model.get_model(),
            chat_config.base_url.as_deref().unwrap_or("adapter default")
        );

        let prompts = initialize_prompts(args.prompts_path.as_deref(), &args.company_name)?;
        let scheduler = Arc::new(Scheduler::from_args(args).await?);
        info!(
            "Scheduler ready: timezone={}, calendar={}",
            scheduler.timezone(),
            if scheduler.has_calendar() { "google" } else { "placeholder" }
        );

        let settings = AgentSettings {
            max_tool_iterations: args.max_tool_iterations,
            turn_timeout: Duration::from_secs(args.turn_timeout_secs),
            contact_email: args.contact_email.clone(),
        };
        Ok(Self::new(model, scheduler.clone(), scheduler, prompts, settings))
    }

    pub fn contact_email(&self) -> &str {
        &self.settings.contact_email
    }

    /// Runs one turn within the configured wall-clock budget. `history` is
    /// the full client-held transcript in chronological order.
    pub async fn converse(
        &self,
        user_message: &str,
        locale: Locale,
        history: &[ConversationMessage]
    ) -> Result<ConversationOutcome, BookingError> {
        if user_message.trim().is_empty() {
            return Err(BookingError::Validation("Message is required".to_string()));
        }

        let turn_id = Uuid::new_v4();
        debug!("[{}] New turn: locale={}, history={} messages", turn_id, locale, history.len());

        let budget = self.settings.turn_timeout;
        match timeout(budget, self.run_turn(turn_id, user_message, locale, history)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("[{}] Turn exceeded {}s budget", turn_id, budget.as_secs());
                Err(BookingError::TurnTimeout(budget.as_secs()))
            }
        }
    }

    async fn run_turn(
        &self,
        turn_id: Uuid,
        user_message: &str,
        locale: Locale,
        history: &[ConversationMessage]
    ) -> Result<ConversationOutcome, BookingError> {
        let directive = self.prompts
            .system_directive(locale)
            .map_err(|e| BookingError::Internal(e.to_string()))?;

        let mut messages: Vec<TurnMessage> = history.iter().map(TurnMessage::from).collect();
        messages.push(TurnMessage::User(user_message.to_string()));

        let mut booking = None;
        let mut iterations = 0;
        let mut response = self.complete(turn_id, directive, &messages).await?;

        while response.wants_tool() {
            if response.tool_calls.is_empty() {
                warn!("[{}] Model signalled tool use without a tool call", turn_id);
                break;
            }

            let max = self.settings.max_tool_iterations;
            if iterations >= max {
                warn!("[{}] Tool loop cap of {} reached, answering with last text", turn_id, max);
                let response_text = if response.text.trim().is_empty() {
                    locale.turn_limit_message(&self.settings.contact_email)
                } else {
                    response.text
                };
                return Ok(ConversationOutcome { response_text, booking });
            }

            // Every call id gets a result, even the ones past the cap.
            let mut results = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                let result = if iterations < max {
                    iterations += 1;
                    self.dispatch(turn_id, call, locale, &mut booking).await
                } else {
                    warn!("[{}] Skipping {} ({}): tool loop cap reached", turn_id, call.name, call.id);
                    json!({ "error": TOOL_LIMIT_ERROR })
                };
                results.push(TurnMessage::ToolResult {
                    call_id: call.id.clone(),
                    content: result.to_string(),
                });
            }
            messages.push(TurnMessage::ToolCall { text: response.text, calls: response.tool_calls });
            messages.extend(results);

            response = self.complete(turn_id, directive, &messages).await?;
        }

        info!("[{}] Turn finished after {} tool calls (booked: {})", turn_id, iterations, booking.is_some());
        Ok(ConversationOutcome { response_text: response.text, booking })
    }

    async fn complete(
        &self,
        turn_id: Uuid,
        directive: &str,
        messages: &[TurnMessage]
    ) -> Result<ModelResponse, BookingError> {
        let request = ModelRequest {
            system_prompt: directive,
            tools: self.tools.descriptors(),
            messages,
        };
        self.model.complete_with_tools(request).await.map_err(|e| {
            error!("[{}] Model backend ({}) failed: {}", turn_id, self.model.get_llm_type(), e);
            BookingError::BackendUnavailable(e.to_string())
        })
    }

    /// Serves one tool call. Failures become an `{"error": ...}` payload for
    /// the model rather than ending the turn.
    async fn dispatch(
        &self,
        turn_id: Uuid,
        call: &ToolCall,
        locale: Locale,
        booking: &mut Option<BookingRecord>
    ) -> JsonValue {
        let invocation = match self.tools.parse(call) {
            Ok(invocation) => invocation,
            Err(e) => {
                warn!("[{}] Rejected tool call: {}", turn_id, e);
                return e.to_result_payload();
            }
        };

        match invocation {
            ToolInvocation::CheckAvailability { preferred_day } => {
                let slots = self.availability.available_slots(preferred_day.as_deref()).await;
                info!(
                    "[{}] check_availability({:?}) offered {} slots",
                    turn_id,
                    preferred_day,
                    slots.len()
                );
                json!({ "available_slots": slots.iter().map(to_iso).collect::<Vec<_>>() })
            }
            ToolInvocation::BookSlot(args) => {
                match
                    self.committer.book_slot(&args.datetime, &args.name, &args.email, locale).await
                {
                    Ok(record) => {
                        info!(
                            "[{}] book_slot confirmed {} {} (event id: {:?})",
                            turn_id,
                            record.date,
                            record.time,
                            record.external_event_id
                        );
                        let mut payload =
                            json!({
                            "success": true,
                            "message": "Booking confirmed",
                            "date": record.date,
                            "time": record.time,
                        });
                        if let Some(event_id) = &record.external_event_id {
                            payload["eventId"] = json!(event_id);
                        }
                        *booking = Some(record);
                        payload
                    }
                    Err(e) => {
                        warn!("[{}] book_slot failed: {}", turn_id, e);
                        json!({ "error": e.to_string() })
                    }
                }
            }
        }
    }
}
