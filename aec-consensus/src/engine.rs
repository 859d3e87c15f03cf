//! Consensus Engine (C5): broadcasts a proposal to adversarial validators,
//! aggregates verdicts, and runs a bounded dialectic refinement loop.

use crate::checks::{DEFAULT_HISTORY_WINDOW, DEFAULT_RESOURCE_CAP_BYTES};
use crate::validator::{unreachable_response, LocalSimulator, Validator};
use aec_core::{Clock, ConsensusHistoryEntry, ConsensusMethod, ConsensusResult, FormalProof, Proposal, Verdict};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Minimum agreement ratio for an `ARBITER` approval (default 0.7).
pub const DEFAULT_MIN_AGREE: f64 = 0.7;
/// Maximum dialectic refinement rounds (default 5).
pub const DEFAULT_MAX_ROUNDS: u32 = 5;

pub struct ConsensusEngine {
    validators: Vec<Arc<dyn Validator>>,
    local_simulator: LocalSimulator,
    history: RwLock<VecDeque<ConsensusHistoryEntry>>,
    clock: Arc<dyn Clock>,
    validator_timeout: Duration,
    min_agree: f64,
    max_rounds: u32,
}

impl ConsensusEngine {
    pub fn new(clock: Arc<dyn Clock>, validator_timeout: Duration) -> Self {
        Self {
            validators: Vec::new(),
            local_simulator: LocalSimulator::new(DEFAULT_RESOURCE_CAP_BYTES),
            history: RwLock::new(VecDeque::with_capacity(DEFAULT_HISTORY_WINDOW)),
            clock,
            validator_timeout,
            min_agree: DEFAULT_MIN_AGREE,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn register_validator(&mut self, validator: Arc<dyn Validator>) {
        self.validators.push(validator);
    }

    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    #[tracing::instrument(skip(self, proposal), fields(proposal_id = %proposal.proposal_id))]
    pub async fn verify(&self, proposal: Proposal) -> ConsensusResult {
        if self.validators.is_empty() {
            return self.zero_validator_fallback(&proposal);
        }

        let mut current = proposal;
        let mut round = 0u32;
        loop {
            round += 1;
            let responses: Vec<_> = {
                let history = self.history.read().clone();
                let calls = self.validators.iter().map(|validator| validator.evaluate(&current, &history));
                match tokio::time::timeout(self.validator_timeout, futures::future::join_all(calls)).await {
                    Ok(responses) => responses,
                    Err(_) => self
                        .validators
                        .iter()
                        .map(|_| unreachable_response(&current.proposal_id))
                        .collect(),
                }
            };

            let total = responses.len();
            let accepts = responses.iter().filter(|r| r.verdict == Verdict::Accept).count();
            let ratio = accepts as f64 / total as f64;

            if accepts == total {
                let method = if round == 1 { ConsensusMethod::Immediate } else { ConsensusMethod::Dialectic };
                return self.finalize(true, method, round, &current);
            }
            if ratio >= self.min_agree {
                return self.finalize(true, ConsensusMethod::Arbiter, round, &current);
            }
            if round >= self.max_rounds {
                return self.finalize(false, ConsensusMethod::Veto, round, &current);
            }

            current = refine(&current, &responses, round);
        }
    }

    fn zero_validator_fallback(&self, proposal: &Proposal) -> ConsensusResult {
        let (passed, _trace) = self.local_simulator.run_checks(proposal, &self.history.read());
        if passed >= 3 {
            self.finalize(true, ConsensusMethod::Arbiter, 1, proposal)
        } else {
            self.finalize(false, ConsensusMethod::Veto, 1, proposal)
        }
    }

    fn finalize(&self, achieved: bool, method: ConsensusMethod, rounds: u32, proposal: &Proposal) -> ConsensusResult {
        let proof_hash = aec_core::proof_hash(&proposal.formal_proof);
        let entry = ConsensusHistoryEntry {
            proof_hash,
            achieved,
            method,
            rounds,
            timestamp_millis: self.clock.now_millis(),
        };
        let mut history = self.history.write();
        history.push_back(entry);
        while history.len() > DEFAULT_HISTORY_WINDOW {
            history.pop_front();
        }
        ConsensusResult {
            achieved,
            method,
            rounds,
            proof_hash,
        }
    }
}

/// Append the negation of each dissenting counterexample to the proof's
/// axioms and mint a new proposal id (`spec.md` §4.5 step 4).
fn refine(proposal: &Proposal, responses: &[aec_core::TwinResponse], round: u32) -> Proposal {
    let mut axioms = proposal.formal_proof.axioms.clone();
    for response in responses {
        if response.verdict != Verdict::Accept {
            if let Some(cex) = &response.counterexample {
                axioms.push(format!("NOT({cex})"));
            }
        }
    }
    let formal_proof = FormalProof {
        axioms,
        derivations: proposal.formal_proof.derivations.clone(),
        conclusion: proposal.formal_proof.conclusion.clone(),
    };
    Proposal::new(proposal.refined_id(round), proposal.mutation.clone(), formal_proof)
}
