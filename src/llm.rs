use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::LlmConfig;
use crate::http::{RetryPolicy, Transport};
use crate::{command, ollama, openai};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Ollama,
    Openai,
    Command,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Ollama => "ollama",
            EngineKind::Openai => "openai",
            EngineKind::Command => "command",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ENGINES
            .iter()
            .map(|(kind, _)| *kind)
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("unknown inference engine: {s}"))
    }
}

/// One generation call. `schema` constrains the output when the engine supports it.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub system: String,
    pub prompt: String,
    pub schema_name: String,
    pub schema: Option<Value>,
}

pub trait InferenceService {
    fn complete(&self, request: &InferenceRequest) -> anyhow::Result<String>;
}

type EngineBuilder = fn(&LlmConfig) -> anyhow::Result<Box<dyn InferenceService>>;

pub const ENGINES: &[(EngineKind, EngineBuilder)] = &[
    (EngineKind::Ollama, ollama::build),
    (EngineKind::Openai, openai::build),
    (EngineKind::Command, command::build),
];

pub fn build_engine(config: &LlmConfig) -> anyhow::Result<Box<dyn InferenceService>> {
    let (_, builder) = ENGINES
        .iter()
        .find(|(kind, _)| *kind == config.engine)
        .ok_or_else(|| anyhow::anyhow!("unsupported inference engine: {}", config.engine))?;

    tracing::info!(
        engine = %config.engine,
        model = %config.model,
        "inference engine"
    );
    builder(config)
}

pub(crate) fn transport(config: &LlmConfig) -> anyhow::Result<Transport> {
    Transport::new(
        Duration::from_secs(config.timeout_secs.max(1)),
        RetryPolicy {
            attempts: config.retry_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_delay_ms),
        },
    )
}
