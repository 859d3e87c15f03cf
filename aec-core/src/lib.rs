//! Shared data model and collaborator contracts for the autonomic evolution
//! core (AEC): the mutation/proposal/token types every component exchanges,
//! plus the small set of traits (clock, randomness, key-value persistence,
//! notification) that let each component stay agnostic of its deployment
//! environment.
//!
//! Nothing in this crate executes a mutation, signs anything, or persists
//! anything durably — it is the vocabulary the other `aec-*` crates share.

pub mod canonical;
pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod kv;
pub mod model;
pub mod notify;
pub mod random;
pub mod retry;
pub mod vitality;
pub mod workflow_types;

pub use canonical::{canonical_encode, proof_hash};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use entity::{CodeEntity, EntityKind};
pub use error::CoreError;
pub use kv::{KvStore, MemKvStore};
pub use model::{
    ConsensusHistoryEntry, ConsensusMethod, ConsensusResult, FormalProof, Mutation, Proposal,
    TwinResponse, Verdict,
};
pub use notify::{Notifier, TracingNotifier};
pub use random::{OsRandom, SecureRandom};
pub use vitality::VitalityRegistrar;
pub use workflow_types::{
    WorkflowFailureReason, WorkflowHistoryEntry, WorkflowInstance, WorkflowStage,
};
