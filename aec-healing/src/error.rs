use thiserror::Error;

#[derive(Error, Debug)]
pub enum HealingError {
    #[error("domain DATABASE is reserved")]
    NotImplemented,

    #[error("all strategies exhausted for domain {domain:?}")]
    Exhausted { domain: crate::types::Domain },
}

pub type Result<T> = std::result::Result<T, HealingError>;
