use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Malformed diary response: {0}")]
    MalformedResponse(String),
    #[error("Generator not configured: {0}")]
    NotConfigured(String),
}

impl GenerationError {
    /// True when the call itself did not complete, as opposed to completing with unusable output.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            GenerationError::HttpError(_)
                | GenerationError::ApiError { .. }
                | GenerationError::Timeout(_)
                | GenerationError::NotConfigured(_)
        )
    }
}

/// Free-text in, free-text out. The only I/O the diary pipeline performs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
