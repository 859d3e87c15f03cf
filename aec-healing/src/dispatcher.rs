//! Healing Dispatcher (C4): domain-based strategy selection with
//! circuit-breaker and predictor support.

use crate::circuit::CircuitBreaker;
use crate::error::{HealingError, Result};
use crate::predictor::Predictor;
use crate::strategies;
use crate::types::{default_order, Domain, DomainCounters, HealContext, RepairArtifact, Strategy};
use aec_core::Clock;
use aec_token::{TokenService, TokenStatus};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub struct HealingDispatcher {
    circuit: CircuitBreaker,
    predictor: Arc<dyn Predictor>,
    tokens: Arc<TokenService>,
    network_ring: RwLock<Vec<String>>,
    counters: RwLock<HashMap<Domain, DomainCounters>>,
}

impl HealingDispatcher {
    pub fn new(clock: Arc<dyn Clock>, predictor: Arc<dyn Predictor>, tokens: Arc<TokenService>) -> Self {
        Self {
            circuit: CircuitBreaker::new(clock),
            predictor,
            tokens,
            network_ring: RwLock::new(Vec::new()),
            counters: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_network_ring(&self, ring: Vec<String>) {
        *self.network_ring.write() = ring;
    }

    pub fn circuit(&self) -> &CircuitBreaker {
        &self.circuit
    }

    pub fn counters(&self, domain: Domain) -> DomainCounters {
        self.counters.read().get(&domain).copied().unwrap_or_default()
    }

    /// Attempt repair strategies for `domain` in order until one succeeds.
    #[tracing::instrument(skip(self, payload), fields(domain = ?domain, target = %context.target_id))]
    pub fn heal(&self, domain: Domain, context: &HealContext, payload: &[u8]) -> Result<RepairArtifact> {
        if domain == Domain::Database {
            return Err(HealingError::NotImplemented);
        }

        let started = Instant::now();
        self.counters.write().entry(domain).or_default().attempts += 1;

        for strategy in self.strategy_order(domain, context) {
            let outcome = self.try_strategy(domain, strategy, context, payload);
            self.predictor
                .record_outcome(domain, context.error_signature, strategy, outcome.is_some());

            if let Some(patched) = outcome {
                let mut counters = self.counters.write();
                let entry = counters.entry(domain).or_default();
                entry.successes += 1;
                drop(counters);

                let status = if context.from_heal_and_retry {
                    TokenStatus::Recovering
                } else {
                    TokenStatus::Healthy
                };
                let vitality_token = self.tokens.issue(&context.target_id, status);

                tracing::info!(
                    domain = ?domain,
                    strategy = %strategy,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "healing:success"
                );

                return Ok(RepairArtifact {
                    strategy,
                    payload: patched,
                    vitality_token,
                });
            }
        }

        self.counters.write().entry(domain).or_default().failures += 1;
        tracing::warn!(domain = ?domain, "healing:failure");
        Err(HealingError::Exhausted { domain })
    }

    fn strategy_order(&self, domain: Domain, context: &HealContext) -> Vec<Strategy> {
        let default = default_order(domain);
        let mut order = Vec::with_capacity(default.len());
        if let Some(predicted) = self.predictor.predict(domain, context.error_signature) {
            if default.contains(&predicted) {
                order.push(predicted);
            }
        }
        for s in default {
            if !order.contains(s) {
                order.push(*s);
            }
        }
        order
    }

    fn try_strategy(&self, domain: Domain, strategy: Strategy, context: &HealContext, payload: &[u8]) -> Option<Vec<u8>> {
        match (domain, strategy) {
            (Domain::Ui, Strategy::NeuralMapRelocate) => strategies::neural_map_relocate(context, payload),
            (Domain::Ui, Strategy::SemanticReconstruct) => strategies::semantic_reconstruct(context, payload),
            (Domain::Network, Strategy::ResurrectNode) => strategies::resurrect_node(context, &self.circuit, payload),
            (Domain::Network, Strategy::RotateNode) => {
                strategies::rotate_node(context, &self.circuit, &self.network_ring.read(), payload)
            }
            (Domain::Network, Strategy::FallbackStub) => strategies::fallback_stub(context, payload),
            (Domain::Logic, Strategy::HeuristicPatch) => strategies::heuristic_patch(context, payload),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::FrequencyPredictor;
    use crate::types::ErrorSignature;
    use aec_core::FixedClock;

    fn dispatcher() -> HealingDispatcher {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(0));
        let tokens = Arc::new(TokenService::new(b"secret".to_vec(), clock.clone()).unwrap());
        HealingDispatcher::new(clock, Arc::new(FrequencyPredictor::new()), tokens)
    }

    #[test]
    fn logic_heals_unbalanced_braces() {
        let d = dispatcher();
        let ctx = HealContext {
            target_id: "moduleA".into(),
            error_signature: ErrorSignature::Syntax,
            from_heal_and_retry: true,
        };
        let artifact = d.heal(Domain::Logic, &ctx, b"function broken() {").unwrap();
        assert_eq!(artifact.strategy, Strategy::HeuristicPatch);
    }

    #[test]
    fn logic_exhausts_on_already_balanced_payload() {
        let d = dispatcher();
        let ctx = HealContext {
            target_id: "moduleA".into(),
            error_signature: ErrorSignature::Generic,
            from_heal_and_retry: true,
        };
        let result = d.heal(Domain::Logic, &ctx, b"return 42");
        assert!(matches!(result, Err(HealingError::Exhausted { .. })));
    }

    #[test]
    fn database_domain_not_implemented() {
        let d = dispatcher();
        let ctx = HealContext {
            target_id: "moduleA".into(),
            error_signature: ErrorSignature::DbConn,
            from_heal_and_retry: false,
        };
        assert!(matches!(d.heal(Domain::Database, &ctx, b""), Err(HealingError::NotImplemented)));
    }

    #[test]
    fn ui_falls_through_to_semantic_reconstruct() {
        let d = dispatcher();
        let ctx = HealContext {
            target_id: "moduleA".into(),
            error_signature: ErrorSignature::Generic,
            from_heal_and_retry: false,
        };
        let artifact = d.heal(Domain::Ui, &ctx, b"ui payload").unwrap();
        assert_eq!(artifact.strategy, Strategy::SemanticReconstruct);
    }

    #[test]
    fn network_rotates_to_next_alive_node() {
        let d = dispatcher();
        d.set_network_ring(vec!["node-a".into(), "node-b".into()]);
        for _ in 0..3 {
            d.circuit().record_failure("node-a");
        }
        let ctx = HealContext {
            target_id: "node-a".into(),
            error_signature: ErrorSignature::Timeout,
            from_heal_and_retry: false,
        };
        let artifact = d.heal(Domain::Network, &ctx, b"").unwrap();
        assert_eq!(artifact.strategy, Strategy::RotateNode);
    }
}
