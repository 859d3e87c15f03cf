//! Pluggable execution backend. `execute` honors the same contract
//! (wall-clock deadline, no host environment leakage, deterministic failure
//! mode) whether the backend is OS-level process isolation or the
//! in-process fallback.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

/// Env allowlist handed to an isolated execution context (`spec.md` §4.1):
/// nothing of the host's own environment survives.
pub const SANDBOX_ENV: &[(&str, &str)] = &[("TZ", "UTC"), ("ENV", "sandbox")];

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub ok: bool,
    pub stdout: String,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    fn success(stdout: impl Into<String>) -> Self {
        Self {
            ok: true,
            stdout: stdout.into(),
            error: None,
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            stdout: String::new(),
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, payload: &[u8], deadline: Duration) -> ExecutionOutcome;
}

/// In-process fallback. Real mutation semantics are outside this system's
/// scope, so the fallback validates the one dynamic property it can check
/// without an interpreter: brace balance, which stands in for "the mutation
/// is not even well-formed" and is what drives the heuristic-patch healing
/// strategy.
pub struct InProcessExecutor;

impl InProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    fn check_braces(text: &str) -> Result<(), String> {
        let mut depth: i32 = 0;
        for c in text.chars() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err("SyntaxError: Unexpected token }".to_string());
                    }
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err("SyntaxError: Unexpected end of input".to_string());
        }
        Ok(())
    }
}

impl Default for InProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for InProcessExecutor {
    async fn run(&self, payload: &[u8], deadline: Duration) -> ExecutionOutcome {
        let text = String::from_utf8_lossy(payload).to_string();
        let check = async { Self::check_braces(&text) };
        match tokio::time::timeout(deadline, check).await {
            Ok(Ok(())) => ExecutionOutcome::success(text.trim().to_string()),
            Ok(Err(e)) => ExecutionOutcome::failure(e),
            Err(_) => ExecutionOutcome::failure("SANDBOX_TIMEOUT"),
        }
    }
}

/// OS-level isolation: spawns a configured interpreter binary as a child
/// process under the sanitized environment, killing it if the deadline is
/// exceeded. Used when `interpreter_cmd` is configured; falls back to
/// `InProcessExecutor` otherwise.
pub struct ProcessExecutor {
    interpreter_cmd: String,
}

impl ProcessExecutor {
    pub fn new(interpreter_cmd: impl Into<String>) -> Self {
        Self {
            interpreter_cmd: interpreter_cmd.into(),
        }
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn run(&self, payload: &[u8], deadline: Duration) -> ExecutionOutcome {
        use tokio::io::AsyncWriteExt;

        let mut cmd = Command::new(&self.interpreter_cmd);
        cmd.kill_on_drop(true);
        cmd.env_clear();
        for (k, v) in SANDBOX_ENV {
            cmd.env(k, v);
        }
        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => return ExecutionOutcome::failure(format!("spawn failed: {e}")),
        };

        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(payload).await;
        }

        match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => {
                ExecutionOutcome::success(String::from_utf8_lossy(&output.stdout).to_string())
            }
            Ok(Ok(output)) => ExecutionOutcome::failure(String::from_utf8_lossy(&output.stderr).to_string()),
            Ok(Err(e)) => ExecutionOutcome::failure(format!("process error: {e}")),
            Err(_) => ExecutionOutcome::failure("SANDBOX_TIMEOUT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_process_accepts_balanced_payload() {
        let exec = InProcessExecutor::new();
        let outcome = exec.run(b"return { ok: true }", Duration::from_millis(100)).await;
        assert!(outcome.ok);
    }

    #[tokio::test]
    async fn in_process_rejects_unbalanced_payload() {
        let exec = InProcessExecutor::new();
        let outcome = exec.run(b"}", Duration::from_millis(100)).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.error.as_deref(), Some("SyntaxError: Unexpected token }"));
    }
}
