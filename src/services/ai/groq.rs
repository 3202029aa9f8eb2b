use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{chat_messages, reply_from_message, tool_json, ChatReply, ChatRequest, LlmProvider, OutputContract};

pub struct GroqProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GroqProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<ChatReply> {
        let mut body = json!({
            "model": self.model,
            "messages": chat_messages(request),
            "temperature": 0.3,
        });

        match &request.output {
            OutputContract::FreeText => {}
            OutputContract::Tool(tool) => {
                body["tools"] = json!([tool_json(tool)]);
                body["tool_choice"] = json!("auto");
            }
            // Groq only enforces syntactic JSON; the schema is in the prompt
            OutputContract::JsonObject { .. } => {
                body["response_format"] = json!({"type": "json_object"});
            }
        }

        let resp = self
            .client
            .post("https://api.groq.com/openai/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call Groq API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Groq response")?;

        if !status.is_success() {
            anyhow::bail!("Groq API error ({}): {}", status, data);
        }

        reply_from_message(&data["choices"][0]["message"])
    }
}
