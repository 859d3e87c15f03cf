//! The proposal/consensus data model, per `spec.md` §3.

use serde::{Deserialize, Serialize};

/// An opaque proposed code mutation. Immutable after creation; the core
/// never interprets `payload`, only its risk score and target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mutation {
    pub payload: Vec<u8>,
    pub target_id: String,
    pub risk_score: f64,
    pub created_at_millis: i64,
}

impl Mutation {
    pub fn new(
        payload: impl Into<Vec<u8>>,
        target_id: impl Into<String>,
        risk_score: f64,
        created_at_millis: i64,
    ) -> Self {
        Self {
            payload: payload.into(),
            target_id: target_id.into(),
            risk_score: risk_score.clamp(0.0, 1.0),
            created_at_millis,
        }
    }

    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// A lightweight, non-machine-checked proof triple used purely for the
/// circularity and historical-consistency checks in `spec.md` §4.5.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FormalProof {
    pub axioms: Vec<String>,
    pub derivations: Vec<String>,
    pub conclusion: String,
}

/// C5 input: a mutation proposed for consensus review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub proposal_id: String,
    pub mutation: Mutation,
    pub formal_proof: FormalProof,
}

impl Proposal {
    pub fn new(proposal_id: impl Into<String>, mutation: Mutation, formal_proof: FormalProof) -> Self {
        Self {
            proposal_id: proposal_id.into(),
            mutation,
            formal_proof,
        }
    }

    /// Derive the refined proposal id `<parent>-refined-<k>` used by the
    /// dialectic debate loop (`spec.md` §4.5 step 4).
    pub fn refined_id(&self, round: u32) -> String {
        format!("{}-refined-{}", self.proposal_id, round)
    }
}

/// A validator's verdict on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Accept,
    Reject,
    Challenge,
}

/// A single validator's response to a proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwinResponse {
    pub response_id: String,
    pub proposal_id: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub counterexample: Option<String>,
    pub reasoning_trace: Vec<String>,
}

/// How a consensus result was reached (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusMethod {
    Immediate,
    Dialectic,
    Arbiter,
    Veto,
}

/// Terminal result of `Consensus::verify` (`spec.md` §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub achieved: bool,
    pub method: ConsensusMethod,
    pub rounds: u32,
    pub proof_hash: [u8; 32],
}

/// An entry in the consensus engine's historical-consistency log
/// (`spec.md` §3 / §4.5 check (c)).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusHistoryEntry {
    pub proof_hash: [u8; 32],
    pub achieved: bool,
    pub method: ConsensusMethod,
    pub rounds: u32,
    pub timestamp_millis: i64,
}
