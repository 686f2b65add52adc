use crate::error::{RecommenderError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Process configuration. Built once by the binary and passed down explicitly.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub dataset: DatasetConfig,
    pub server: ServerConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatasetConfig {
    pub id: String,
    pub config: String,
    pub split: String,
    pub page_size: usize,
    pub timeout_secs: u64,
    /// Local export used instead of the Hugging Face rows API when set.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Gemini first, Grok as fallback when configured
    Gemini,
    Grok,
    Ollama,
}

impl LlmProvider {
    /// Unknown names fall back to the default provider.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "grok" => Self::Grok,
            "ollama" => Self::Ollama,
            _ => Self::Gemini,
        }
    }
}

#[derive(Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub grok_api_key: String,
    pub grok_model: String,
    pub grok_base_url: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub verify_ssl: bool,
}

// Keys stay out of logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("gemini_model", &self.gemini_model)
            .field("grok_api_key", &redact(&self.grok_api_key))
            .field("grok_model", &self.grok_model)
            .field("grok_base_url", &self.grok_base_url)
            .field("ollama_base_url", &self.ollama_base_url)
            .field("ollama_model", &self.ollama_model)
            .field("verify_ssl", &self.verify_ssl)
            .finish()
    }
}

fn redact(key: &str) -> &'static str {
    if key.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/restaurants.db"),
            dataset: DatasetConfig::default(),
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            id: "ManikaSaini/zomato-restaurant-recommendation".to_string(),
            config: "default".to_string(),
            split: "train".to_string(),
            page_size: 100,
            timeout_secs: 60,
            file: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            metrics_port: 9898,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Gemini,
            gemini_api_key: String::new(),
            gemini_model: "gemini-1.5-flash".to_string(),
            grok_api_key: String::new(),
            grok_model: "grok-4".to_string(),
            grok_base_url: "https://api.x.ai/v1".to_string(),
            ollama_base_url: "http://localhost:11434/v1".to_string(),
            ollama_model: "llama3.2".to_string(),
            verify_ssl: true,
        }
    }
}

impl Config {
    /// Defaults overridden by process environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// TOML file overridden by process environment variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RecommenderError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment, in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = get("DATASET_ID") {
            self.dataset.id = v;
        }
        if let Some(v) = get("DATASET_CONFIG") {
            self.dataset.config = v;
        }
        if let Some(v) = get("DATASET_SPLIT") {
            self.dataset.split = v;
        }
        if let Some(v) = get("DATASET_PAGE_SIZE") {
            self.dataset.page_size = parse_number("DATASET_PAGE_SIZE", &v)?;
        }
        if let Some(v) = get("DATASET_TIMEOUT_SECS") {
            self.dataset.timeout_secs = parse_number("DATASET_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("DATASET_FILE") {
            self.dataset.file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("SERVER_PORT") {
            self.server.port = parse_number("SERVER_PORT", &v)?;
        }
        if let Some(v) = get("METRICS_PORT") {
            self.server.metrics_port = parse_number("METRICS_PORT", &v)?;
        }
        if let Some(v) = get("LLM_PROVIDER") {
            self.llm.provider = LlmProvider::parse(&v);
        }
        if let Some(v) = get("GEMINI_API_KEY") {
            self.llm.gemini_api_key = v.trim().to_string();
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.llm.gemini_model = v.trim().to_string();
        }
        if let Some(v) = get("GROK_API_KEY") {
            self.llm.grok_api_key = v.trim().to_string();
        }
        if let Some(v) = get("GROK_MODEL") {
            self.llm.grok_model = v.trim().to_string();
        }
        if let Some(v) = get("GROK_BASE_URL") {
            self.llm.grok_base_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = get("OLLAMA_BASE_URL") {
            self.llm.ollama_base_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = get("OLLAMA_MODEL") {
            self.llm.ollama_model = v.trim().to_string();
        }
        if let Some(v) = get("LLM_VERIFY_SSL") {
            self.llm.verify_ssl = !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no"
            );
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RecommenderError::Config(format!("{key} must be a number, got '{value}'")))
}
