use thiserror::Error;

pub type Result<T> = std::result::Result<T, AmoCrmError>;

#[derive(Debug, Error)]
pub enum AmoCrmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("AmoCRM rate limit hit (429)")]
    RateLimited,

    #[error("AmoCRM authentication failed (401), check AMOCRM_ACCESS_TOKEN")]
    Unauthorized,

    #[error("AmoCRM API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for AmoCrmError {
    fn from(err: reqwest::Error) -> Self {
        AmoCrmError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AmoCrmError {
    fn from(err: serde_json::Error) -> Self {
        AmoCrmError::Parse(err.to_string())
    }
}
