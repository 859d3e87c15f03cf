use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("validator transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
