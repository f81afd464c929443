use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::llm::EngineKind;

pub const DEFAULT_CONFIG_FILE: &str = "hiring_agent.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub evaluation: ScoringConfig,
    pub github: HostConfig,
    pub gitlab: HostConfig,
    pub classification: ClassificationRules,
    pub project_selection: ProjectSelection,
    pub blog: BlogConfig,
    pub cache: CacheConfig,
    pub prompts: PromptsConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub engine: EngineKind,
    pub model: String,
    /// Engine endpoint root. Each engine falls back to its public default.
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_secs: u64,
    /// Attempts per section when the response cannot be parsed.
    pub parse_attempts: u32,
    /// Transport retries per call (timeouts, 5xx).
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub command: Option<String>,
    pub command_args: Vec<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Ollama,
            model: "gemma3:4b".to_owned(),
            base_url: None,
            api_key: None,
            temperature: 0.1,
            top_p: 0.9,
            timeout_secs: 120,
            parse_attempts: 3,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            command: None,
            command_args: Vec::new(),
        }
    }
}

impl LlmConfig {
    pub fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url.as_deref().unwrap_or(default)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub max_scores: MaxScores,
    pub bonus_max: f64,
    pub min_final_score: f64,
    pub max_final_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_scores: MaxScores::default(),
            bonus_max: 20.0,
            min_final_score: -20.0,
            max_final_score: 120.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxScores {
    pub open_source: f64,
    pub self_projects: f64,
    pub production: f64,
    pub technical_skills: f64,
}

impl Default for MaxScores {
    fn default() -> Self {
        Self {
            open_source: 35.0,
            self_projects: 30.0,
            production: 25.0,
            technical_skills: 10.0,
        }
    }
}

impl MaxScores {
    pub fn for_category(&self, category: &str) -> Option<f64> {
        match category {
            "open_source" => Some(self.open_source),
            "self_projects" => Some(self.self_projects),
            "production" => Some(self.production),
            "technical_skills" => Some(self.technical_skills),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub enabled: bool,
    /// API root. Each host falls back to its public endpoint when unset.
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub max_repos: u32,
    /// Sleep until the window resets once fewer requests than this remain.
    pub rate_limit_floor: u64,
    pub max_rate_limit_wait_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            token: None,
            timeout_secs: 10,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_repos: 100,
            rate_limit_floor: 2,
            max_rate_limit_wait_secs: 60,
        }
    }
}

impl HostConfig {
    pub fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .unwrap_or(default)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationRules {
    pub open_source_licenses: Vec<String>,
    pub program_topics: Vec<String>,
    /// Stars strictly above this count as community engagement.
    pub engagement_stars: u64,
    /// Forks strictly above this count as community engagement.
    pub engagement_forks: u64,
    /// Forks with fewer forks than this are skipped while listing.
    pub fork_threshold: u64,
    pub popular_stars: u64,
    pub major_stars: u64,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        let owned = |items: &[&str]| -> Vec<String> { items.iter().map(|s| (*s).to_owned()).collect() };
        Self {
            open_source_licenses: owned(&[
                "mit",
                "apache-2.0",
                "gpl-2.0",
                "gpl-3.0",
                "lgpl-2.1",
                "lgpl-3.0",
                "agpl-3.0",
                "bsd-2-clause",
                "bsd-3-clause",
                "mpl-2.0",
                "isc",
                "unlicense",
                "epl-2.0",
                "cc0-1.0",
            ]),
            program_topics: owned(&[
                "hacktoberfest",
                "gsoc",
                "google-summer-of-code",
                "outreachy",
                "mlh",
                "mlh-fellowship",
                "gssoc",
                "girlscript-summer-of-code",
                "hackathon",
                "kwoc",
                "lfx-mentorship",
                "24-pull-requests",
            ]),
            engagement_stars: 10,
            engagement_forks: 5,
            fork_threshold: 5,
            popular_stars: 1000,
            major_stars: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSelection {
    pub max_projects: usize,
    pub prefer_open_source: bool,
}

impl Default for ProjectSelection {
    fn default() -> Self {
        Self {
            max_projects: 7,
            prefer_open_source: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub max_posts: usize,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 10,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_posts: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("cache"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory of `<name>.txt` files overriding the built-in templates.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub csv: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv: PathBuf::from("resume_evaluations.csv"),
        }
    }
}

impl Config {
    /// Defaults, then the YAML file (explicit path, else `hiring_agent.yaml` when
    /// present), then environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parse config: {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).context("parse config yaml")
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(engine) = non_empty("HIRING_AGENT_ENGINE") {
            match engine.parse::<EngineKind>() {
                Ok(kind) => self.llm.engine = kind,
                Err(err) => tracing::warn!(%engine, error = %err, "ignoring HIRING_AGENT_ENGINE"),
            }
        }
        if let Some(model) = non_empty("HIRING_AGENT_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = non_empty("HIRING_AGENT_LLM_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(token) = non_empty("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(token) = non_empty("GITLAB_TOKEN") {
            self.gitlab.token = Some(token);
        }
        if let Some(base_url) = non_empty("HIRING_AGENT_GITHUB_API") {
            self.github.base_url = Some(base_url);
        }
        if let Some(base_url) = non_empty("HIRING_AGENT_GITLAB_API") {
            self.gitlab.base_url = Some(base_url);
        }
        if let Some(dir) = non_empty("HIRING_AGENT_CACHE_DIR") {
            self.cache.dir = PathBuf::from(dir);
        }
        if let Some(flag) = non_empty("HIRING_AGENT_CACHE") {
            self.cache.enabled = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }
}
