use thiserror::Error;

/// Failures talking to the external AI backend. All of these are recovered at
/// the dispatch boundary: the message is printed and the loop continues.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("AI backend unreachable: {0}")]
    Unavailable(String),

    #[error("AI backend returned an error: {0}")]
    Api(String),

    #[error("AI backend timed out after {0}s")]
    Timeout(u64),

    #[error("no API key configured; set `ai.api_key` in kody.json or the ANTHROPIC_API_KEY environment variable")]
    MissingApiKey,
}

/// Failures while turning an AI response into file writes.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("no JSON object found in the AI response")]
    NoJson,

    #[error("failed to parse update plan: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("refusing to write outside the project root: {0}")]
    PathEscape(String),
}
