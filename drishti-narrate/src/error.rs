use thiserror::Error;

#[derive(Error, Debug)]
pub enum NarrationError {
    #[error("API key not set for provider: {0}")]
    MissingApiKey(String),

    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Request timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, NarrationError>;

impl From<NarrationError> for drishti_core::Error {
    fn from(err: NarrationError) -> Self {
        drishti_core::Error::Narration(err.to_string())
    }
}
