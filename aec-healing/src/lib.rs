//! Healing Dispatcher (C4): on validation failure, selects a domain-specific
//! repair strategy, applies circuit-breaker and predictor-guided selection,
//! and mints a vitality token on success.

pub mod circuit;
pub mod dispatcher;
pub mod error;
pub mod predictor;
pub mod strategies;
pub mod types;

pub use circuit::{CircuitBreaker, CircuitNode};
pub use dispatcher::HealingDispatcher;
pub use error::{HealingError, Result};
pub use predictor::{FrequencyPredictor, Predictor};
pub use types::{Domain, DomainCounters, ErrorSignature, HealContext, RepairArtifact, Strategy};
