//! Pluggable predictor: given `(domain, error_signature)`, suggests the
//! strategy historically most successful for that context key. The
//! dispatcher falls through to the domain's default order if the predictor
//! errs or has no opinion.

use crate::types::{Domain, ErrorSignature, Strategy};
use parking_lot::RwLock;
use std::collections::HashMap;

pub trait Predictor: Send + Sync {
    fn predict(&self, domain: Domain, signature: ErrorSignature) -> Option<Strategy>;
    fn record_outcome(&self, domain: Domain, signature: ErrorSignature, strategy: Strategy, success: bool);
}

#[derive(Default, Clone, Copy)]
struct Tally {
    successes: u32,
    attempts: u32,
}

/// In-memory frequency predictor: picks the strategy with the highest
/// success rate observed for a context key, requiring at least one
/// success before it overrides the default order.
pub struct FrequencyPredictor {
    tallies: RwLock<HashMap<(Domain, ErrorSignature, Strategy), Tally>>,
}

impl FrequencyPredictor {
    pub fn new() -> Self {
        Self {
            tallies: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for FrequencyPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl Predictor for FrequencyPredictor {
    fn predict(&self, domain: Domain, signature: ErrorSignature) -> Option<Strategy> {
        let tallies = self.tallies.read();
        tallies
            .iter()
            .filter(|((d, s, _), tally)| *d == domain && *s == signature && tally.successes > 0)
            .max_by(|(_, a), (_, b)| {
                let rate_a = a.successes as f64 / a.attempts.max(1) as f64;
                let rate_b = b.successes as f64 / b.attempts.max(1) as f64;
                rate_a.partial_cmp(&rate_b).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|((_, _, strategy), _)| *strategy)
    }

    fn record_outcome(&self, domain: Domain, signature: ErrorSignature, strategy: Strategy, success: bool) {
        let mut tallies = self.tallies.write();
        let tally = tallies.entry((domain, signature, strategy)).or_default();
        tally.attempts += 1;
        if success {
            tally.successes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicts_nothing_without_history() {
        let predictor = FrequencyPredictor::new();
        assert!(predictor.predict(Domain::Logic, ErrorSignature::Syntax).is_none());
    }

    #[test]
    fn predicts_strategy_with_recorded_success() {
        let predictor = FrequencyPredictor::new();
        predictor.record_outcome(Domain::Logic, ErrorSignature::Syntax, Strategy::HeuristicPatch, true);
        assert_eq!(
            predictor.predict(Domain::Logic, ErrorSignature::Syntax),
            Some(Strategy::HeuristicPatch)
        );
    }
}
