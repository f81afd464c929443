use anyhow::Context as _;
use serde_json::Value;

use crate::config::LlmConfig;
use crate::http::{FetchError, Transport};
use crate::llm::{InferenceRequest, InferenceService};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub fn responses_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/responses")
}

pub struct OpenAiEngine {
    transport: Transport,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    top_p: f32,
}

pub fn build(config: &LlmConfig) -> anyhow::Result<Box<dyn InferenceService>> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set"))?;

    Ok(Box::new(OpenAiEngine {
        transport: crate::llm::transport(config)?,
        endpoint: responses_endpoint(config.base_url_or(DEFAULT_BASE_URL)),
        api_key,
        model: config.model.clone(),
        temperature: config.temperature,
        top_p: config.top_p,
    }))
}

impl OpenAiEngine {
    fn request_body(&self, request: &InferenceRequest) -> Value {
        let format = match &request.schema {
            Some(schema) => serde_json::json!({
                "type": "json_schema",
                "name": request.schema_name,
                "schema": schema,
                "strict": false,
            }),
            None => serde_json::json!({ "type": "text" }),
        };

        let mut body = serde_json::json!({
            "model": self.model,
            "instructions": request.system,
            "input": request.prompt,
            "text": { "format": format },
            "store": false,
        });

        // NOTE: GPT-5 models reject sampling params.
        if !self.model.starts_with("gpt-5")
            && let Some(obj) = body.as_object_mut()
        {
            obj.insert("temperature".to_owned(), serde_json::json!(self.temperature));
            obj.insert("top_p".to_owned(), serde_json::json!(self.top_p));
        }
        body
    }
}

impl InferenceService for OpenAiEngine {
    fn complete(&self, request: &InferenceRequest) -> anyhow::Result<String> {
        let body = self.request_body(request);
        let response = self
            .transport
            .execute(&self.endpoint, |client| {
                client
                    .post(&self.endpoint)
                    .bearer_auth(&self.api_key)
                    .json(&body)
            })
            .map_err(|err| match err {
                FetchError::Rejected {
                    status, message, ..
                } => {
                    let message = parse_error_message(&message).unwrap_or(message);
                    anyhow::anyhow!("OpenAI API error ({status}): {message}")
                }
                other => anyhow::Error::new(other),
            })
            .with_context(|| format!("POST {}", self.endpoint))?;

        let value: Value =
            serde_json::from_str(&response.body).context("parse OpenAI response")?;
        extract_output_text(&value).context("extract output text")
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn extract_output_text(value: &Value) -> anyhow::Result<String> {
    let output = value
        .get("output")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow::anyhow!("missing `output` array in response"))?;

    let text = output
        .iter()
        .filter(|item| item.get("type").and_then(|v| v.as_str()) == Some("message"))
        .filter_map(|item| item.get("content").and_then(|v| v.as_array()))
        .flatten()
        .filter(|part| part.get("type").and_then(|v| v.as_str()) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
        .collect::<String>();

    if text.trim().is_empty() {
        anyhow::bail!("OpenAI output text is empty");
    }
    Ok(text)
}
