use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("workflow {0} not found")]
    NotFound(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] aec_core::CoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no administrator public key configured")]
    NoAdminKey,

    #[error("invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
