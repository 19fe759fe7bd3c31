//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILLENS_CONFIG` (environment variable)
//! 2. `~/.config/maillens/config.toml` (Linux/macOS)
//!    `%APPDATA%\maillens\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::i18n::Lang;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Message walking and attachment extraction.
    pub extraction: ExtractionConfig,
    /// Classification settings.
    pub classifier: ClassifierConfig,
    /// Embedding provider settings.
    pub provider: ProviderConfig,
    /// Injection guard settings.
    pub guard: GuardConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Language for placeholders, labels and prompt templates.
    pub language: Lang,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Message walking and attachment extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Worker threads for attachment extraction (0 = available parallelism, capped at 4).
    pub workers: usize,
    /// Maximum nesting depth of multiparts and attached messages.
    pub max_nesting_depth: usize,
    /// Encodings tried in order when reading CSV attachments.
    pub csv_encodings: Vec<String>,
    /// Single-byte code page used when a text attachment is not valid UTF-8.
    pub text_fallback_encoding: String,
    /// Replacement for URLs removed from the body.
    pub url_placeholder: String,
    /// Characters of each attachment's text included in the classification input.
    pub attachment_summary_chars: usize,
}

/// Classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum top similarity for a prediction; below it the result is "Undetermined".
    pub threshold: f32,
}

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Deterministic offline hashing embedder.
    Hashing,
    /// OpenAI-compatible `/embeddings` HTTP endpoint.
    OpenAi,
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Backend kind.
    pub kind: ProviderKind,
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    /// Embedding model name.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Requested dimensionality (hashing embedder size, optional for OpenAI).
    pub dimensions: Option<usize>,
    /// Deadline for one embedding call, retries included.
    pub timeout_secs: u64,
    /// Total attempts per call, the first request included.
    pub max_attempts: usize,
    /// Maximum prompts sent in one request.
    pub batch_size: usize,
}

/// Injection guard settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Replacement pattern list; `None` uses the bundled patterns.
    pub patterns: Option<Vec<String>>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            language: Lang::En,
            cache_dir: None,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            max_nesting_depth: 8,
            csv_encodings: ["utf-8", "windows-1251", "koi8-r", "iso-8859-5"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            text_fallback_encoding: "windows-1251".to_string(),
            url_placeholder: String::new(),
            attachment_summary_chars: 200,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self { threshold: 0.28 }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Hashing,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimensions: None,
            timeout_secs: 30,
            max_attempts: 3,
            batch_size: 64,
        }
    }
}

impl ExtractionConfig {
    /// Effective worker count.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(4)
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Load configuration from an explicit path. Unlike [`load_config`], a
/// missing or malformed file is an error.
pub fn load_config_from(path: &std::path::Path) -> crate::error::Result<Config> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| crate::error::MailLensError::io(path, e))?;
    toml::from_str(&contents).map_err(|e| {
        crate::error::MailLensError::Config(format!("{}: {e}", path.display()))
    })
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILLENS_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("maillens").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("maillens")
}
