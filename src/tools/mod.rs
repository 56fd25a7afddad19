use serde::{ Deserialize, Serialize };
use serde_json::{ json, Value as JsonValue };
use thiserror::Error;

use crate::llm::chat::ToolCall;

pub const CHECK_AVAILABILITY: &str = "check_availability";
pub const BOOK_SLOT: &str = "book_slot";

#[derive(Debug, Error, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments {
        tool: String,
        message: String,
    },
}

impl ToolError {
    /// Structured result fed back to the model in place of a real tool output.
    pub fn to_result_payload(&self) -> JsonValue {
        match self {
            ToolError::UnknownTool(_) => json!({ "error": "Unknown tool" }),
            ToolError::InvalidArguments { .. } => json!({ "error": self.to_string() }),
        }
    }
}

/// A capability the model may invoke. `parameters` is a JSON schema object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CheckAvailabilityArgs {
    #[serde(default)]
    preferred_day: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookSlotArgs {
    pub datetime: String,
    pub name: String,
    pub email: String,
}

/// A tool call whose name and arguments have been validated.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    CheckAvailability {
        preferred_day: Option<String>,
    },
    BookSlot(BookSlotArgs),
}

#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::booking_tools()
    }
}

impl ToolRegistry {
    pub fn booking_tools() -> Self {
        let tools = vec![
            ToolDescriptor {
                name: CHECK_AVAILABILITY.to_string(),
                description: "Check calendar availability for the next 5 business days. Returns available 30-minute slots.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "preferred_day": {
                            "type": "string",
                            "description": "Optional preferred day mentioned by user (e.g., 'Tuesday', 'tomorrow', 'next week')"
                        }
                    },
                    "required": []
                }),
            },
            ToolDescriptor {
                name: BOOK_SLOT.to_string(),
                description: "Book a calendar slot and create an event. Requires datetime, name, and email.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "datetime": {
                            "type": "string",
                            "description": "The selected datetime in ISO format"
                        },
                        "name": {
                            "type": "string",
                            "description": "Name of the person booking"
                        },
                        "email": {
                            "type": "string",
                            "description": "Email address for the calendar invite"
                        }
                    },
                    "required": ["datetime", "name", "email"]
                }),
            }
        ];
        Self { tools }
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn parse(&self, call: &ToolCall) -> Result<ToolInvocation, ToolError> {
        let invalid = |e: serde_json::Error| ToolError::InvalidArguments {
            tool: call.name.clone(),
            message: e.to_string(),
        };

        match call.name.as_str() {
            CHECK_AVAILABILITY => {
                let args: CheckAvailabilityArgs = match &call.input {
                    JsonValue::Null => CheckAvailabilityArgs::default(),
                    input => serde_json::from_value(input.clone()).map_err(invalid)?,
                };
                let preferred_day = args.preferred_day.filter(|d| !d.trim().is_empty());
                Ok(ToolInvocation::CheckAvailability { preferred_day })
            }
            BOOK_SLOT => {
                let args: BookSlotArgs = serde_json
                    ::from_value(call.input.clone())
                    .map_err(invalid)?;
                if args.datetime.trim().is_empty() || args.email.trim().is_empty() {
                    return Err(ToolError::InvalidArguments {
                        tool: call.name.clone(),
                        message: "datetime and email must not be empty".to_string(),
                    });
                }
                Ok(ToolInvocation::BookSlot(args))
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}
