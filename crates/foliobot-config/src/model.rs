use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Generative model providers, tried in the listed order.
    #[serde(default)]
    pub llm: Vec<LlmProviderConfig>,

    #[serde(default)]
    pub embeddings: Option<EmbeddingConfig>,

    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub fallback: FallbackConfig,

    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token guarding admin routes such as knowledge seeding.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
            max_message_len: default_max_message_len(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_message_len() -> usize {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub provider: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl LlmProviderConfig {
    /// Display name, falling back to the provider type.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.provider)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Retrieval knobs. Defaults match the values the site has always used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_knowledge_top_k")]
    pub knowledge_top_k: usize,

    #[serde(default = "default_knowledge_threshold")]
    pub knowledge_threshold: f32,

    #[serde(default = "default_history_top_k")]
    pub history_top_k: usize,

    #[serde(default = "default_history_threshold")]
    pub history_threshold: f32,

    /// How many recent embedded exchanges are scanned for similar history.
    #[serde(default = "default_history_scan_limit")]
    pub history_scan_limit: usize,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            knowledge_top_k: default_knowledge_top_k(),
            knowledge_threshold: default_knowledge_threshold(),
            history_top_k: default_history_top_k(),
            history_threshold: default_history_threshold(),
            history_scan_limit: default_history_scan_limit(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_knowledge_top_k() -> usize {
    3
}

fn default_knowledge_threshold() -> f32 {
    0.7
}

fn default_history_top_k() -> usize {
    2
}

fn default_history_threshold() -> f32 {
    0.75
}

fn default_history_scan_limit() -> usize {
    100
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f64 {
    0.7
}

/// Independent secondary bot backend consulted when every model provider fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_fallback_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_fallback_timeout_secs(),
        }
    }
}

fn default_fallback_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,

    #[serde(default = "default_owner_name")]
    pub owner_name: String,

    #[serde(default = "default_contact_email")]
    pub contact_email: String,

    /// YAML or JSON file replacing the built-in site profile.
    #[serde(default)]
    pub profile_path: Option<PathBuf>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            owner_name: default_owner_name(),
            contact_email: default_contact_email(),
            profile_path: None,
        }
    }
}

fn default_bot_name() -> String {
    "RameezBot".to_string()
}

fn default_owner_name() -> String {
    "Rameez Bader Khwaja".to_string()
}

fn default_contact_email() -> String {
    "rameezbaderkhwaja@gmail.com".to_string()
}
