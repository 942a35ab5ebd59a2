use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level config (ollagram.toml + OLLAGRAM_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Maximum number of prior turns fetched into a context window.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub options: GenerationOptions,
}

/// Generation option bag forwarded to the inference backend verbatim.
///
/// Every field is optional; unset fields are omitted from the serialized
/// request, so the backend sees exactly the operator-supplied subset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_sample: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_history_limit() -> usize {
    1000
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.ollagram/ollagram.db", home)
}

impl Config {
    /// Load config from a TOML file with OLLAGRAM_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. OLLAGRAM_CONFIG env var
    ///   3. ~/.ollagram/ollagram.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("OLLAGRAM_CONFIG").ok())
            .unwrap_or_else(default_config_path);

        let config: Config = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("OLLAGRAM_").split("_"))
            .extract()
            .map_err(|e| crate::error::OllagramError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.ollagram/ollagram.toml", home)
}
