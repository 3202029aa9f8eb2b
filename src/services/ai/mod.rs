pub mod groq;
pub mod ollama;
pub mod prompt;
pub mod tools;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::ConversationMessage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl From<&ConversationMessage> for Message {
    fn from(m: &ConversationMessage) -> Self {
        Self {
            role: m.role.clone(),
            content: m.content.clone(),
        }
    }
}

/// A function the model may call, with its JSON schema parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// What the model is allowed to answer with.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputContract {
    FreeText,
    Tool(ToolSpec),
    JsonObject { schema: serde_json::Value },
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub output: OutputContract,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    Text(String),
    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<ChatReply>;
}

/// System prompt followed by the conversation, in chat-completions shape.
pub(crate) fn chat_messages(request: &ChatRequest) -> Vec<serde_json::Value> {
    let mut messages = vec![json!({
        "role": "system",
        "content": request.system_prompt,
    })];

    for msg in &request.messages {
        messages.push(json!({
            "role": msg.role,
            "content": msg.content,
        }));
    }
    messages
}

pub(crate) fn tool_json(tool: &ToolSpec) -> serde_json::Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

/// Reads a response `message` object. The first tool call wins over content;
/// arguments may arrive either as an object or as a JSON-encoded string.
pub(crate) fn reply_from_message(message: &serde_json::Value) -> anyhow::Result<ChatReply> {
    if let Some(call) = message["tool_calls"].as_array().and_then(|calls| calls.first()) {
        let name = call["function"]["name"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("tool call without a function name"))?
            .to_string();
        let arguments = match &call["function"]["arguments"] {
            serde_json::Value::String(raw) => serde_json::from_str(raw)
                .map_err(|e| anyhow::anyhow!("tool call arguments are not JSON: {e}"))?,
            other => other.clone(),
        };
        return Ok(ChatReply::ToolCall { name, arguments });
    }

    message["content"]
        .as_str()
        .map(|s| ChatReply::Text(s.to_string()))
        .ok_or_else(|| anyhow::anyhow!("missing content in model response"))
}
