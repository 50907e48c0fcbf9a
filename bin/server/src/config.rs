//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (`LINE__CHANNEL_SECRET`, `COMPLETION__BASE_URL`).

use larn_relay_ai::HttpCompletionConfig;
use larn_relay_reply::DEFAULT_PAGE_SIZE;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the webhook listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection URL. Without it the relay keeps state in memory.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Messaging platform settings.
    pub line: LineConfig,

    /// Completion backend settings.
    pub completion: CompletionConfig,

    /// Literal texts that trigger fixed flows.
    #[serde(default)]
    pub commands: CommandConfig,

    /// Reply presentation settings.
    #[serde(default)]
    pub reply: ReplyConfig,
}

/// LINE Messaging API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LineConfig {
    /// Secret used to verify webhook signatures.
    pub channel_secret: String,

    /// Bearer token for the Messaging API.
    pub channel_token: String,

    #[serde(default = "default_line_api_base_url")]
    pub api_base_url: String,

    /// Duration of the typing indicator.
    #[serde(default = "default_loading_seconds")]
    pub loading_seconds: u32,
}

/// Completion backend settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    pub base_url: String,

    #[serde(default = "default_recommend_path")]
    pub recommend_path: String,

    /// Bound on each backend request.
    #[serde(default = "default_completion_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl CompletionConfig {
    /// Converts to the backend client's settings.
    #[must_use]
    pub fn to_backend_config(&self) -> HttpCompletionConfig {
        HttpCompletionConfig {
            base_url: self.base_url.clone(),
            recommend_path: self.recommend_path.clone(),
            timeout: Duration::from_secs(self.timeout_seconds),
        }
    }
}

/// Command literals.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
    /// Sends the fake-news tutorial.
    #[serde(default = "default_tutorial_command")]
    pub tutorial: String,

    /// Serves the next page of pending overflow.
    #[serde(default = "default_read_more_command")]
    pub read_more: String,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            tutorial: default_tutorial_command(),
            read_more: default_read_more_command(),
        }
    }
}

/// Reply presentation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_line_api_base_url() -> String {
    "https://api.line.me".to_string()
}

fn default_loading_seconds() -> u32 {
    60
}

fn default_recommend_path() -> String {
    "/ai/recommend".to_string()
}

fn default_completion_timeout_seconds() -> u64 {
    30
}

fn default_tutorial_command() -> String {
    "วิธีเช็คข่าวปลอม".to_string()
}

fn default_read_more_command() -> String {
    "อ่านต่อ".to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::default())
    }

    fn from_source(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
