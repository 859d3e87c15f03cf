use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    Ui,
    Network,
    Logic,
    Database,
}

/// Coarse error classification used as the predictor's context key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSignature {
    Timeout,
    Visual,
    Syntax,
    DbConn,
    Generic,
}

impl ErrorSignature {
    /// Classify a raw error message into a coarse context key. Grounded on
    /// the same kind of pattern-matching `HEURISTIC_PATCH` later uses to
    /// pick a rewrite.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") {
            ErrorSignature::Timeout
        } else if lower.contains("render") || lower.contains("layout") || lower.contains("visual") {
            ErrorSignature::Visual
        } else if lower.contains("syntaxerror") || lower.contains("unexpected token") {
            ErrorSignature::Syntax
        } else if lower.contains("connection") || lower.contains("db") {
            ErrorSignature::DbConn
        } else {
            ErrorSignature::Generic
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    NeuralMapRelocate,
    SemanticReconstruct,
    ResurrectNode,
    RotateNode,
    FallbackStub,
    HeuristicPatch,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Strategy::NeuralMapRelocate => "NEURAL_MAP_RELOCATE",
            Strategy::SemanticReconstruct => "SEMANTIC_RECONSTRUCT",
            Strategy::ResurrectNode => "RESURRECT_NODE",
            Strategy::RotateNode => "ROTATE_NODE",
            Strategy::FallbackStub => "FALLBACK_STUB",
            Strategy::HeuristicPatch => "HEURISTIC_PATCH",
        };
        write!(f, "{s}")
    }
}

/// Default strategy order per domain (`spec.md` §4.4). `DATABASE` has none —
/// the dispatcher rejects it before consulting this table.
pub fn default_order(domain: Domain) -> &'static [Strategy] {
    match domain {
        Domain::Ui => &[Strategy::NeuralMapRelocate, Strategy::SemanticReconstruct],
        Domain::Network => &[Strategy::ResurrectNode, Strategy::RotateNode, Strategy::FallbackStub],
        Domain::Logic => &[Strategy::HeuristicPatch],
        Domain::Database => &[],
    }
}

#[derive(Debug, Clone)]
pub struct HealContext {
    pub target_id: String,
    pub error_signature: ErrorSignature,
    pub from_heal_and_retry: bool,
}

#[derive(Debug, Clone)]
pub struct RepairArtifact {
    pub strategy: Strategy,
    pub payload: Vec<u8>,
    pub vitality_token: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DomainCounters {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}
