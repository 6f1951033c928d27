use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default config file looked up in the working directory when `--config` is
/// not given.
pub const DEFAULT_CONFIG_FILE: &str = "kody.json";

fn default_ignored_extensions() -> Vec<String> {
    [
        ".jpg", ".png", ".gif", ".bmp", ".mp3", ".mp4", ".zip", ".tar", ".gz", ".pdf", ".exe",
        ".bin",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_ignored_dirs() -> Vec<String> {
    ["node_modules", "vendor", "dist", "build", "target", "images", "audio"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_file_size() -> u64 {
    512_000
}

fn default_truncate_limit() -> usize {
    500
}

fn default_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_cli_command() -> String {
    "fabric".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_timeout_seconds() -> u64 {
    60
}

/// Which kind of external backend answers prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Anthropic-style HTTP messages endpoint.
    #[default]
    Http,
    /// A local CLI tool reading the prompt on stdin and answering on stdout.
    Cli,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AiConfig {
    pub backend: BackendKind,
    /// Checked lazily: only the AI-bearing commands need it.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// External command for the `cli` backend.
    pub command: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            command: default_cli_command(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScanningConfig {
    /// Extensions excluded from the project context, leading dot included.
    pub ignored_extensions: Vec<String>,
    /// Directory names never descended into.
    pub ignored_dirs: Vec<String>,
    /// Files larger than this are left out of the context.
    pub max_file_size: u64,
    /// Per-file content cap when serializing context into a prompt.
    pub truncate_limit: usize,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            ignored_extensions: default_ignored_extensions(),
            ignored_dirs: default_ignored_dirs(),
            max_file_size: default_max_file_size(),
            truncate_limit: default_truncate_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CliConfig {
    pub ai: AiConfig,
    pub scanning: ScanningConfig,
}

impl CliConfig {
    /// Loads configuration for the session.
    ///
    /// An explicit path must exist and parse; that failure is fatal at
    /// startup. Without an explicit path, `kody.json` in the working
    /// directory is used when present, otherwise defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }
}
