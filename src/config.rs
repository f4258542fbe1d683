//! Configuration management for health-assistant-rs.
//!
//! Loads config from YAML files in standard locations. The OpenAI API key
//! may live in the config file, but the OPENAI_API_KEY environment variable
//! always wins.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub share: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 7860,
            share: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub system_prompt: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".into(),
            api_key: None,
            chat_model: "gpt-4o-mini".into(),
            system_prompt:
                "You are a health assistant helping a patient with their health concerns.".into(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub model: String,
    pub voice: String,
    pub audio_dir: PathBuf,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            model: "tts-1".into(),
            voice: "nova".into(),
            audio_dir: std::env::temp_dir().join("health-assistant-audio"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Rasterization resolution for PDF pages.
    pub dpi: u32,
    /// Cap on rasterized pages per upload; 0 means no cap.
    pub max_pages: u32,
    /// Parent directory for per-turn scratch dirs; OS temp dir when unset.
    pub scratch_root: Option<PathBuf>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            dpi: 500,
            max_pages: 0,
            scratch_root: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub openai: OpenAiConfig,
    pub tts: TtsConfig,
    pub document: DocumentConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/health-assistant/config.yaml
    /// 3. /etc/health-assistant/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/health-assistant/config.yaml")),
                Some(PathBuf::from("/etc/health-assistant/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match serde_yml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    /// Resolve the API key: environment first, config file second.
    pub fn api_key(&self) -> Option<String> {
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.openai.api_key.clone())
    }
}
