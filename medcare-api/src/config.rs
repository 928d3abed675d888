//! Service configuration, read once from the environment at startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_CHAT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("unknown CHAT_PROVIDER '{0}' (expected 'gemini' or 'openrouter')")]
    UnknownProvider(String),
    #[error("unknown CHAT_AUTH_MODE '{0}' (expected 'server' or 'request')")]
    UnknownAuthMode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatProviderKind {
    Gemini,
    OpenRouter,
}

impl ChatProviderKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ChatProviderKind::Gemini => "Google Gemini",
            ChatProviderKind::OpenRouter => "OpenRouter",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ChatProviderKind::Gemini => "gemini-2.5-flash",
            ChatProviderKind::OpenRouter => "openai/gpt-4.1-mini",
        }
    }

    /// Environment variable holding the server-side credential.
    pub fn key_variable(self) -> &'static str {
        match self {
            ChatProviderKind::Gemini => "GEMINI_API_KEY",
            ChatProviderKind::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

impl FromStr for ChatProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ChatProviderKind::Gemini),
            "openrouter" => Ok(ChatProviderKind::OpenRouter),
            _ => Err(ConfigError::UnknownProvider(s.to_string())),
        }
    }
}

/// Where the chat relay takes its provider credential from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAuthMode {
    /// A key held by the server, read from the environment at startup.
    Server,
    /// A key supplied by the caller on every request (`x-api-key`).
    Request,
}

impl ChatAuthMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatAuthMode::Server => "server",
            ChatAuthMode::Request => "request",
        }
    }
}

impl FromStr for ChatAuthMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" => Ok(ChatAuthMode::Server),
            "request" => Ok(ChatAuthMode::Request),
            _ => Err(ConfigError::UnknownAuthMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub provider: ChatProviderKind,
    pub model: String,
    pub auth_mode: ChatAuthMode,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub disease_model_dir: PathBuf,
    pub cancer_model_dir: PathBuf,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub chat: ChatSettings,
    pub log_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        let provider = ChatProviderKind::Gemini;
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            disease_model_dir: PathBuf::from("models/disease"),
            cancer_model_dir: PathBuf::from("models/cancer"),
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            chat: ChatSettings {
                provider,
                model: provider.default_model().to_string(),
                auth_mode: ChatAuthMode::Server,
                api_key: None,
                timeout: Duration::from_secs(DEFAULT_CHAT_TIMEOUT_SECS),
            },
            log_format: "json".to_string(),
        }
    }
}

impl Settings {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match var("CHAT_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => defaults.chat.provider,
        };
        let auth_mode = match var("CHAT_AUTH_MODE") {
            Some(raw) => raw.parse()?,
            None => defaults.chat.auth_mode,
        };

        let cors_origins = var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or(defaults.cors_origins);

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", var("PORT"), defaults.port),
            disease_model_dir: var("DISEASE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.disease_model_dir),
            cancer_model_dir: var("CANCER_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cancer_model_dir),
            cors_origins,
            max_upload_bytes: parse_or(
                "MAX_UPLOAD_BYTES",
                var("MAX_UPLOAD_BYTES"),
                defaults.max_upload_bytes,
            ),
            chat: ChatSettings {
                provider,
                model: var("CHAT_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
                auth_mode,
                api_key: var(provider.key_variable()),
                timeout: Duration::from_secs(parse_or(
                    "CHAT_TIMEOUT_SECS",
                    var("CHAT_TIMEOUT_SECS"),
                    DEFAULT_CHAT_TIMEOUT_SECS,
                )),
            },
            log_format: var("LOG_FORMAT").unwrap_or(defaults.log_format),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = key, value = %raw, default = %default, "Ignoring unparseable setting");
            default
        }),
    }
}
