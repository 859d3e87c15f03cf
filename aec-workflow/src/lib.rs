//! Evolution Workflow (C6): the durable state machine that sequences
//! sandbox validation, healing, consensus review, and governance approval
//! for a single proposed mutation, per `spec.md` §4.6.

pub mod engine;
pub mod error;

pub use engine::{
    ApprovalOutcome, EvolutionWorkflow, DEFAULT_APPROVAL_TIMEOUT_MILLIS, DEFAULT_EXECUTION_DEADLINE,
    DEFAULT_HIGH_RISK_THRESHOLD,
};
pub use error::{Result, WorkflowError};
