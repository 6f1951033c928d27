use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::{AiConfig, BackendKind};
use crate::error::BackendError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The seam between the REPL and whatever answers prompts. Both backend modes
/// normalize to a plain text reply.
#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn send(&self, prompt: &str) -> Result<String, BackendError>;
}

/// Builds the configured backend. HTTP mode needs an API key, taken from the
/// config or the ANTHROPIC_API_KEY environment variable; its absence only
/// matters once an AI-bearing command runs.
pub fn from_config(config: &AiConfig) -> Result<Box<dyn AiBackend>, BackendError> {
    match config.backend {
        BackendKind::Http => {
            let api_key = config
                .api_key
                .clone()
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
                .ok_or(BackendError::MissingApiKey)?;
            Ok(Box::new(HttpBackend::new(
                api_key,
                config.model.clone(),
                config.base_url.clone(),
                config.max_tokens,
                config.timeout_seconds,
            )))
        }
        BackendKind::Cli => Ok(Box::new(CliBackend::new(
            config.command.clone(),
            config.timeout_seconds,
        ))),
    }
}

/// Anthropic-style messages endpoint over reqwest.
pub struct HttpBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    timeout_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

impl HttpBackend {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        max_tokens: u32,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url,
            max_tokens,
            timeout_seconds,
        }
    }
}

#[async_trait]
impl AiBackend for HttpBackend {
    async fn send(&self, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        debug!(url, model = %self.model, "sending prompt to HTTP backend");

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send();

        let response = tokio::time::timeout(Duration::from_secs(self.timeout_seconds), request)
            .await
            .map_err(|_| BackendError::Timeout(self.timeout_seconds))?
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!("{status}: {detail}")));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Api(format!("unexpected response body: {e}")))?;

        let text: Vec<String> = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();

        Ok(text.join("\n"))
    }
}

/// Local CLI tool invocation: prompt on stdin, reply on stdout. When stdout
/// comes back empty the stderr text is used instead, matching tools that
/// print their answer there.
pub struct CliBackend {
    command: String,
    timeout_seconds: u64,
}

impl CliBackend {
    pub fn new(command: String, timeout_seconds: u64) -> Self {
        Self {
            command,
            timeout_seconds,
        }
    }

    async fn invoke(&self, prompt: &str) -> Result<String, BackendError> {
        let mut child = tokio::process::Command::new(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BackendError::Unavailable(format!("{}: {e}", self.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| BackendError::Unavailable(e.to_string()))?;
            // Close stdin so the tool sees EOF and answers.
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(BackendError::Api(if stderr.is_empty() {
                format!("{} exited with {}", self.command, output.status)
            } else {
                stderr
            }));
        }

        Ok(if stdout.is_empty() { stderr } else { stdout })
    }
}

#[async_trait]
impl AiBackend for CliBackend {
    async fn send(&self, prompt: &str) -> Result<String, BackendError> {
        debug!(command = %self.command, "sending prompt to CLI backend");
        tokio::time::timeout(
            Duration::from_secs(self.timeout_seconds),
            self.invoke(prompt),
        )
        .await
        .map_err(|_| BackendError::Timeout(self.timeout_seconds))?
    }
}
