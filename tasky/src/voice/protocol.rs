//! Live session wire messages (JSON over WebSocket)

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::llm::ToolDefinition;

/// Name of the task-creation tool
pub const ADD_TASK_TOOL: &str = "addTask";

/// Name of the health-update tool
pub const UPDATE_HEALTH_TOOL: &str = "updateHealth";

/// Base64 media payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

/// Text part of a system instruction
#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

/// First message of every session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Fully qualified model name (`models/...`)
    pub model: String,
    pub generation_config: Value,
    pub system_instruction: Content,
    pub tools: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeInput {
    pub audio: Blob,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

/// Messages we send
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

impl ClientMessage {
    /// Session setup: audio responses, system instruction and our tools
    pub fn setup(model: &str, system_instruction: &str, tools: &[ToolDefinition]) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        Self::Setup(Setup {
            model,
            generation_config: json!({ "responseModalities": ["AUDIO"] }),
            system_instruction: Content {
                parts: vec![TextPart {
                    text: system_instruction.to_string(),
                }],
            },
            tools: vec![json!({
                "functionDeclarations": tools.iter().map(ToolDefinition::to_gemini_declaration).collect::<Vec<_>>()
            })],
        })
    }

    pub fn audio(blob: Blob) -> Self {
        Self::RealtimeInput(RealtimeInput { audio: blob })
    }

    /// Acknowledge one function call
    pub fn tool_ack(id: &str, name: &str, response: Value) -> Self {
        Self::ToolResponse(ToolResponse {
            function_responses: vec![FunctionResponse {
                id: id.to_string(),
                name: name.to_string(),
                response,
            }],
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub inline_data: Option<Blob>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub turn_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

/// Messages the service sends; unknown fields are ignored
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub tool_call: Option<ToolCall>,
    #[serde(default)]
    pub go_away: Option<Value>,
}

impl ServerMessage {
    /// Inline audio payloads of the model turn, in order
    pub fn audio_chunks(&self) -> impl Iterator<Item = &Blob> {
        self.server_content
            .iter()
            .filter_map(|c| c.model_turn.as_ref())
            .flat_map(|t| t.parts.iter())
            .filter_map(|p| p.inline_data.as_ref())
            .filter(|b| b.mime_type.starts_with("audio/"))
    }

    pub fn function_calls(&self) -> &[FunctionCall] {
        self.tool_call.as_ref().map(|t| t.function_calls.as_slice()).unwrap_or(&[])
    }

    pub fn interrupted(&self) -> bool {
        self.server_content.as_ref().is_some_and(|c| c.interrupted)
    }
}

/// Tools offered to the live model
pub fn voice_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            ADD_TASK_TOOL,
            "Add a task to the user's board",
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" },
                    "priority": { "type": "string" }
                },
                "required": ["text"]
            }),
        ),
        ToolDefinition::new(
            UPDATE_HEALTH_TOOL,
            "Update the user's health stats",
            json!({
                "type": "object",
                "properties": {
                    "steps": { "type": "number" },
                    "waterIntake": { "type": "number" }
                }
            }),
        ),
    ]
}
