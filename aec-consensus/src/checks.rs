//! The four local checks a validator runs against a proposal, used both by
//! `LocalSimulator` (standing in for an unreachable remote validator) and by
//! the zero-validator fallback.

use aec_core::{FormalProof, Mutation};
use regex::RegexSet;
use std::collections::VecDeque;
use std::sync::OnceLock;

/// Default resource bound for a mutation payload (1 MiB).
pub const DEFAULT_RESOURCE_CAP_BYTES: usize = 1024 * 1024;
/// Default size of the historical-consistency window.
pub const DEFAULT_HISTORY_WINDOW: usize = 100;

fn dangerous_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            r"while\s*\(\s*true\s*\)",
            r"for\s*\(\s*;;\s*\)",
            r"loop\s*\{",
            r"(?i)drop\s+table",
            r"(?i)delete\s+from",
            r"rm\s+-rf",
            r"\bprocess\.exit\b",
            r"\bSystem\.exit\b",
            r"\beval\s*\(",
        ])
        .expect("all counterexample patterns are valid regexes")
    })
}

/// Coarse circularity guard: no axiom may appear both in a derivation and
/// in the conclusion.
pub fn axiom_independence(proof: &FormalProof) -> bool {
    !proof.axioms.iter().any(|axiom| {
        proof.derivations.iter().any(|d| d.contains(axiom.as_str())) && proof.conclusion.contains(axiom.as_str())
    })
}

/// Regex scan of the mutation payload for dangerous patterns. Returns true
/// (pass) when no dangerous pattern is present.
pub fn counterexample_scan(mutation: &Mutation) -> bool {
    !dangerous_patterns().is_match(&mutation.as_text())
}

/// `proof_hash` must not match any entry in the recent history window.
pub fn historical_consistency(proof_hash: &[u8; 32], history: &VecDeque<ConsensusHistoryEntryRef>) -> bool {
    !history.iter().any(|entry| entry.proof_hash == *proof_hash)
}

/// Thin alias kept local to avoid a circular re-export; identical shape to
/// `aec_core::ConsensusHistoryEntry`.
pub use aec_core::ConsensusHistoryEntry as ConsensusHistoryEntryRef;

/// Payload size below the configured cap.
pub fn resource_bound(mutation: &Mutation, cap_bytes: usize) -> bool {
    mutation.payload.len() <= cap_bytes
}
