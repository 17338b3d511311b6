// datachat-core/src/errors.rs
use thiserror::Error;

/// Failures produced by a tool adapter.
///
/// The five variants are the complete adapter failure taxonomy; every
/// upstream condition folds into exactly one of them. Any adapter
/// failure aborts the whole chat turn; there is no partial-success
/// envelope.
#[derive(Error, Debug)]
pub enum ToolError {
    /// A required credential or setting is missing. Fatal, no retry.
    #[error("Configuration Error: {0}")]
    Configuration(String),

    /// The model (or caller) supplied an unsatisfiable parameter
    /// combination. The model may recover by rephrasing its call.
    #[error("Invalid Parameters: {0}")]
    InvalidParameters(String),

    /// The upstream provider returned a non-success HTTP status or the
    /// transport itself failed.
    #[error("Provider Error: {0}")]
    Provider(String),

    /// The upstream signalled call-frequency throttling. Distinguished
    /// from `Provider` so a caller could implement backoff.
    #[error("Rate Limited: {0}")]
    RateLimited(String),

    /// The upstream confirmed absence of the requested entity, after
    /// any fallback search.
    #[error("Not Found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        ToolError::Provider(format!("request failed: {}", err))
    }
}

/// Errors that can abort a chat turn.
#[derive(Error, Debug)]
pub enum TurnError {
    /// Missing model credential or invalid runtime configuration,
    /// detected before any network call is made.
    #[error("Configuration Error: {0}")]
    Configuration(String),

    /// Error during a model invocation (phase 1 or phase 2).
    #[error("API Error: {0}")]
    Api(#[source] anyhow::Error),

    /// A tool adapter failed while executing a model-issued call.
    #[error("Tool Error: {0}")]
    Tool(#[from] ToolError),

    /// The caller supplied an empty message history.
    #[error("cannot run a chat turn with an empty message history")]
    EmptyHistory,
}

impl TurnError {
    pub fn config(msg: impl Into<String>) -> Self {
        TurnError::Configuration(msg.into())
    }
}
