use reqwest::StatusCode;
use thiserror::Error;

pub type SuggestResult<T> = Result<T, SuggestError>;

#[derive(Debug, Error)]
pub enum SuggestError {
    /// The request was superseded or its field was dropped. Never surfaced to users.
    #[error("request cancelled")]
    Cancelled,
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("source responded with status {0}")]
    Status(StatusCode),
    #[error("source did not respond within {0} ms")]
    Timeout(u64),
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Config(String),
}

impl SuggestError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
