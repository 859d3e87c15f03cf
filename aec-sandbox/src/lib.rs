//! Sandbox (C1): determines whether a candidate mutation passes static and
//! dynamic safety before anything downstream touches it.

pub mod denylist;
pub mod executor;

pub use denylist::{Denylist, DenylistCategory};
pub use executor::{ExecutionOutcome, Executor, InProcessExecutor, ProcessExecutor, SANDBOX_ENV};

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("mutation payload is not valid UTF-8")]
    NotUtf8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub safe: bool,
    pub reason: Option<DenylistCategory>,
}

/// Default memory cap for dynamic execution (`spec.md` §4.1).
pub const DEFAULT_MEMORY_CAP_MB: u64 = 128;

pub struct Sandbox {
    denylist: Denylist,
    executor: Arc<dyn Executor>,
    #[allow(dead_code)]
    memory_cap_mb: u64,
}

impl Sandbox {
    /// Build a sandbox with the in-process fallback executor.
    pub fn new(memory_cap_mb: u64) -> Self {
        Self {
            denylist: Denylist::new(),
            executor: Arc::new(InProcessExecutor::new()),
            memory_cap_mb,
        }
    }

    /// Build a sandbox around an explicit executor (e.g. `ProcessExecutor`
    /// for OS-level isolation, or a test double).
    pub fn with_executor(memory_cap_mb: u64, executor: Arc<dyn Executor>) -> Self {
        Self {
            denylist: Denylist::new(),
            executor,
            memory_cap_mb,
        }
    }

    /// Static safety: a regex denylist over the mutation's textual form.
    /// A hit here is fatal for the workflow — never routed to healing.
    pub fn validate(&self, payload: &[u8]) -> ValidationResult {
        let text = String::from_utf8_lossy(payload);
        match self.denylist.first_match(&text) {
            Some(category) => {
                tracing::warn!(%category, "mutation rejected by static denylist");
                ValidationResult {
                    safe: false,
                    reason: Some(category),
                }
            }
            None => ValidationResult {
                safe: true,
                reason: None,
            },
        }
    }

    /// Dynamic safety: run the mutation to its deadline. A timeout or crash
    /// here is recoverable and routed to the healing dispatcher.
    pub async fn execute(&self, payload: &[u8], deadline: Duration) -> ExecutionOutcome {
        self.executor.run(payload, deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn validate_rejects_denylisted_payload() {
        let sandbox = Sandbox::new(DEFAULT_MEMORY_CAP_MB);
        let result = sandbox.validate(b"std::process::Command::new(\"rm\")");
        assert!(!result.safe);
        assert_eq!(result.reason, Some(DenylistCategory::ProcessSpawn));
    }

    #[test]
    fn validate_allows_benign_payload() {
        let sandbox = Sandbox::new(DEFAULT_MEMORY_CAP_MB);
        let result = sandbox.validate(b"return 42");
        assert!(result.safe);
    }

    #[tokio::test]
    async fn execute_runs_benign_payload_to_completion() {
        let sandbox = Sandbox::new(DEFAULT_MEMORY_CAP_MB);
        let outcome = sandbox.execute(b"return 42", Duration::from_millis(50)).await;
        assert!(outcome.ok);
    }

    #[tokio::test]
    async fn execute_surfaces_dynamic_crash() {
        let sandbox = Sandbox::new(DEFAULT_MEMORY_CAP_MB);
        let outcome = sandbox
            .execute(b"function broken() {", Duration::from_millis(50))
            .await;
        assert!(!outcome.ok);
    }
}
