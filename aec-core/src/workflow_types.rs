//! Evolution workflow state machine data, per `spec.md` §3 / §4.6.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStage {
    New,
    Validating,
    Healing,
    Consensus,
    AwaitingApproval,
    Committing,
    Done,
    Failed,
}

/// Stable, user-visible failure reason — never a raw error message, per
/// `spec.md` §7 ("failed workflows return a stable enum reason").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowFailureReason {
    StaticForbidden,
    HealExhausted,
    ConsensusVeto,
    GovernanceTimeout,
    SignatureInvalid,
    SignatureMissing,
    Cancelled,
    AlreadyCommitted,
}

impl std::fmt::Display for WorkflowFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::StaticForbidden => "STATIC_FORBIDDEN",
            Self::HealExhausted => "HEAL_EXHAUSTED",
            Self::ConsensusVeto => "CONSENSUS_VETO",
            Self::GovernanceTimeout => "GOVERNANCE_TIMEOUT",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::SignatureMissing => "SIGNATURE_MISSING",
            Self::Cancelled => "CANCELLED",
            Self::AlreadyCommitted => "ALREADY_COMMITTED",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowHistoryEntry {
    pub stage: WorkflowStage,
    pub timestamp_millis: i64,
    pub outcome: String,
}

/// Durable workflow instance. The workflow exclusively owns its mutable
/// fields; every other component receives read-only snapshots (`spec.md`
/// §3 "Ownership").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub workflow_id: String,
    pub stage: WorkflowStage,
    pub mutation_target_id: String,
    pub risk_score: f64,
    pub proof_hash: Option<[u8; 32]>,
    pub pending_signature: Option<Vec<u8>>,
    pub failure_reason: Option<WorkflowFailureReason>,
    pub awaiting_since_millis: Option<i64>,
    pub history: Vec<WorkflowHistoryEntry>,
}

impl WorkflowInstance {
    pub fn new(workflow_id: impl Into<String>, mutation_target_id: impl Into<String>, risk_score: f64) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            stage: WorkflowStage::New,
            mutation_target_id: mutation_target_id.into(),
            risk_score,
            proof_hash: None,
            pending_signature: None,
            failure_reason: None,
            awaiting_since_millis: None,
            history: Vec::new(),
        }
    }

    pub fn push_history(&mut self, stage: WorkflowStage, timestamp_millis: i64, outcome: impl Into<String>) {
        self.history.push(WorkflowHistoryEntry {
            stage,
            timestamp_millis,
            outcome: outcome.into(),
        });
    }

    pub fn transition(&mut self, stage: WorkflowStage, timestamp_millis: i64, outcome: impl Into<String>) {
        self.stage = stage;
        self.push_history(stage, timestamp_millis, outcome);
    }

    pub fn fail(&mut self, reason: WorkflowFailureReason, timestamp_millis: i64) {
        self.failure_reason = Some(reason);
        self.transition(WorkflowStage::Failed, timestamp_millis, reason.to_string());
    }
}
