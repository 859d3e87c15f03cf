//! Circuit breaker for `NETWORK` domain nodes (`spec.md` §3 `CircuitNode`).

use aec_core::Clock;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_THRESHOLD: u32 = 3;
const DEFAULT_PENALTY_MILLIS: i64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Copy)]
pub struct CircuitNode {
    pub consecutive_failures: u32,
    pub dead_until_millis: i64,
    pub total_latency_millis: u64,
    pub request_count: u64,
}

impl Default for CircuitNode {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            dead_until_millis: 0,
            total_latency_millis: 0,
            request_count: 0,
        }
    }
}

pub struct CircuitBreaker {
    nodes: RwLock<HashMap<String, CircuitNode>>,
    clock: Arc<dyn Clock>,
    threshold: u32,
    penalty_millis: i64,
}

impl CircuitBreaker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            clock,
            threshold: DEFAULT_THRESHOLD,
            penalty_millis: DEFAULT_PENALTY_MILLIS,
        }
    }

    /// A node is alive iff its penalty window has elapsed (lazy revival).
    pub fn is_alive(&self, node_id: &str) -> bool {
        let now = self.clock.now_millis();
        match self.nodes.read().get(node_id) {
            Some(node) => node.dead_until_millis <= now,
            None => true,
        }
    }

    pub fn record_success(&self, node_id: &str, latency_millis: u64) {
        let mut nodes = self.nodes.write();
        let node = nodes.entry(node_id.to_string()).or_default();
        node.consecutive_failures = node.consecutive_failures.saturating_sub(1);
        node.total_latency_millis += latency_millis;
        node.request_count += 1;
    }

    pub fn record_failure(&self, node_id: &str) {
        let now = self.clock.now_millis();
        let mut nodes = self.nodes.write();
        let node = nodes.entry(node_id.to_string()).or_default();
        node.consecutive_failures += 1;
        node.request_count += 1;
        if node.consecutive_failures >= self.threshold {
            node.dead_until_millis = now + self.penalty_millis;
        }
    }

    pub fn node(&self, node_id: &str) -> CircuitNode {
        self.nodes.read().get(node_id).copied().unwrap_or_default()
    }

    /// First alive node in round-robin order starting after `after`.
    pub fn next_alive(&self, ring: &[String], after: Option<&str>) -> Option<String> {
        if ring.is_empty() {
            return None;
        }
        let start = after
            .and_then(|id| ring.iter().position(|n| n == id))
            .map(|i| (i + 1) % ring.len())
            .unwrap_or(0);
        (0..ring.len())
            .map(|offset| &ring[(start + offset) % ring.len()])
            .find(|id| self.is_alive(id))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aec_core::FixedClock;

    #[test]
    fn node_dies_after_threshold_failures() {
        let clock = Arc::new(FixedClock::new(0));
        let breaker = CircuitBreaker::new(clock.clone());
        for _ in 0..3 {
            breaker.record_failure("node-a");
        }
        assert!(!breaker.is_alive("node-a"));
    }

    #[test]
    fn node_revives_after_penalty_elapses() {
        let clock = Arc::new(FixedClock::new(0));
        let breaker = CircuitBreaker::new(clock.clone());
        for _ in 0..3 {
            breaker.record_failure("node-a");
        }
        clock.advance(DEFAULT_PENALTY_MILLIS + 1);
        assert!(breaker.is_alive("node-a"));
    }

    #[test]
    fn success_decrements_but_not_below_zero() {
        let clock = Arc::new(FixedClock::new(0));
        let breaker = CircuitBreaker::new(clock);
        breaker.record_success("node-a", 10);
        assert_eq!(breaker.node("node-a").consecutive_failures, 0);
    }

    #[test]
    fn round_robin_skips_dead_nodes() {
        let clock = Arc::new(FixedClock::new(0));
        let breaker = CircuitBreaker::new(clock);
        for _ in 0..3 {
            breaker.record_failure("node-b");
        }
        let ring = vec!["node-a".to_string(), "node-b".to_string(), "node-c".to_string()];
        let next = breaker.next_alive(&ring, Some("node-a"));
        assert_eq!(next.as_deref(), Some("node-c"));
    }
}
