use thiserror::Error;

/// Errors surfaced to the user. None of them are fatal; the user retries by resubmitting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Invalid URL: {0}")]
    Validation(String),

    #[error("Could not fetch video info: {0}")]
    Fetch(String),

    #[error("Download failed: {0}")]
    Retrieval(String),
}

impl AppError {
    pub fn fetch(err: anyhow::Error) -> Self {
        Self::Fetch(format!("{err:#}"))
    }

    pub fn retrieval(err: anyhow::Error) -> Self {
        Self::Retrieval(format!("{err:#}"))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Fetch(_) => "fetch",
            Self::Retrieval(_) => "retrieval",
        }
    }
}
