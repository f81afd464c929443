use anyhow::Context as _;
use serde_json::Value;

use crate::config::LlmConfig;
use crate::http::Transport;
use crate::llm::{InferenceRequest, InferenceService};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub fn chat_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/api/chat")
}

pub struct OllamaEngine {
    transport: Transport,
    endpoint: String,
    model: String,
    temperature: f32,
    top_p: f32,
}

pub fn build(config: &LlmConfig) -> anyhow::Result<Box<dyn InferenceService>> {
    Ok(Box::new(OllamaEngine {
        transport: crate::llm::transport(config)?,
        endpoint: chat_endpoint(config.base_url_or(DEFAULT_BASE_URL)),
        model: config.model.clone(),
        temperature: config.temperature,
        top_p: config.top_p,
    }))
}

impl InferenceService for OllamaEngine {
    fn complete(&self, request: &InferenceRequest) -> anyhow::Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "top_p": self.top_p,
            },
        });
        if let Some(schema) = &request.schema
            && let Some(obj) = body.as_object_mut()
        {
            obj.insert("format".to_owned(), schema.clone());
        }

        let response = self
            .transport
            .execute(&self.endpoint, |client| client.post(&self.endpoint).json(&body))
            .with_context(|| format!("POST {}", self.endpoint))?;

        let value: Value =
            serde_json::from_str(&response.body).context("parse Ollama response")?;
        let content = value
            .pointer("/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing `message.content` in Ollama response"))?;
        if content.trim().is_empty() {
            anyhow::bail!("Ollama response content is empty");
        }
        Ok(content.to_owned())
    }
}
