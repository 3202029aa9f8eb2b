use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{chat_messages, reply_from_message, tool_json, ChatReply, ChatRequest, LlmProvider, OutputContract};

pub struct OllamaProvider {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(url: String, model: String) -> Self {
        Self {
            url,
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<ChatReply> {
        let mut body = json!({
            "model": self.model,
            "messages": chat_messages(request),
            "stream": false,
        });

        match &request.output {
            OutputContract::FreeText => {}
            OutputContract::Tool(tool) => {
                body["tools"] = json!([tool_json(tool)]);
            }
            OutputContract::JsonObject { schema } => {
                body["format"] = schema.clone();
            }
        }

        let resp = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&body)
            .send()
            .await
            .context("failed to call Ollama API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Ollama response")?;

        if !status.is_success() {
            anyhow::bail!("Ollama API error ({}): {}", status, data);
        }

        reply_from_message(&data["message"])
    }
}
