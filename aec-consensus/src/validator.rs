//! Validator abstraction. Remote validators are an optional extension
//! (`spec.md` Non-goals); `LocalSimulator` is the normative offline twin
//! used whenever a remote validator is absent or unreachable.

use crate::checks;
use aec_core::{ConsensusHistoryEntry, Proposal, TwinResponse, Verdict};
use async_trait::async_trait;
use std::collections::VecDeque;

#[async_trait]
pub trait Validator: Send + Sync {
    async fn evaluate(&self, proposal: &Proposal, history: &VecDeque<ConsensusHistoryEntry>) -> TwinResponse;
}

/// Runs the four local checks and derives ACCEPT / CHALLENGE / REJECT from
/// the pass ratio (`spec.md` §4.5 step 2).
pub struct LocalSimulator {
    pub resource_cap_bytes: usize,
}

impl LocalSimulator {
    pub fn new(resource_cap_bytes: usize) -> Self {
        Self { resource_cap_bytes }
    }

    pub fn run_checks(&self, proposal: &Proposal, history: &VecDeque<ConsensusHistoryEntry>) -> (u32, Vec<String>) {
        let proof_hash = aec_core::proof_hash(&proposal.formal_proof);
        let results = [
            ("axiom_independence", checks::axiom_independence(&proposal.formal_proof)),
            ("counterexample_scan", checks::counterexample_scan(&proposal.mutation)),
            (
                "historical_consistency",
                checks::historical_consistency(&proof_hash, history),
            ),
            (
                "resource_bound",
                checks::resource_bound(&proposal.mutation, self.resource_cap_bytes),
            ),
        ];
        let passed = results.iter().filter(|(_, ok)| *ok).count() as u32;
        let trace = results
            .iter()
            .map(|(name, ok)| format!("{name}: {}", if *ok { "pass" } else { "fail" }))
            .collect();
        (passed, trace)
    }
}

#[async_trait]
impl Validator for LocalSimulator {
    async fn evaluate(&self, proposal: &Proposal, history: &VecDeque<ConsensusHistoryEntry>) -> TwinResponse {
        let (passed, trace) = self.run_checks(proposal, history);
        let ratio = passed as f64 / 4.0;
        let verdict = if ratio >= 0.75 {
            Verdict::Accept
        } else if ratio >= 0.5 {
            Verdict::Challenge
        } else {
            Verdict::Reject
        };
        let counterexample = (verdict != Verdict::Accept).then(|| {
            trace
                .iter()
                .find(|t| t.ends_with("fail"))
                .cloned()
                .unwrap_or_else(|| "unspecified failing check".to_string())
        });
        TwinResponse {
            response_id: format!("local-sim-{}", proposal.proposal_id),
            proposal_id: proposal.proposal_id.clone(),
            verdict,
            confidence: ratio,
            counterexample,
            reasoning_trace: trace,
        }
    }
}

/// Synthesized response for a validator that timed out or errored
/// (`spec.md` §4.5 step 1).
pub fn unreachable_response(proposal_id: &str) -> TwinResponse {
    TwinResponse {
        response_id: format!("unreachable-{proposal_id}"),
        proposal_id: proposal_id.to_string(),
        verdict: Verdict::Challenge,
        confidence: 0.3,
        counterexample: None,
        reasoning_trace: vec!["unreachable".to_string()],
    }
}
