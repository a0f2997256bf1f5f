//! The text-completion capability seam.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from an external text model invocation.
///
/// These never cross the engagement boundary: every call site degrades to a
/// deterministic fallback value on `Err`.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Transport-level failure (connection, non-2xx status).
    #[error("model request failed: {0}")]
    Request(String),

    /// The model answered but the response carried no usable text.
    #[error("model returned an unusable response: {0}")]
    InvalidResponse(String),

    /// Missing or malformed credentials/configuration.
    #[error("model configuration error: {0}")]
    Config(String),
}

/// An external text-completion capability: prompt in, free text out.
///
/// The returned text is untrusted model output. It must only ever be parsed
/// as data, never evaluated or executed.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AgentError>;
}
