use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReaperError {
    #[error("persistence error: {0}")]
    Persistence(#[from] aec_core::CoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid protected-path pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, ReaperError>;
