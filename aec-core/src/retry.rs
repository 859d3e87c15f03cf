//! Exponential backoff retry helper for the `PERSISTENCE_IO` recovery policy
//! in `spec.md` §7: up to 3 attempts, surfacing the last error on
//! exhaustion.

use std::thread::sleep;
use std::time::Duration;

/// Retry `f` up to `max_attempts` times with exponential backoff starting
/// at `base_delay`, returning the last error if every attempt fails.
pub fn with_backoff<T, E>(
    max_attempts: u32,
    base_delay: Duration,
    mut f: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E>
where
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) if attempt + 1 < max_attempts => {
                tracing::warn!(attempt, error = %e, "operation failed, retrying");
                sleep(base_delay * 2u32.pow(attempt));
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result: Result<i32, &str> = with_backoff(3, Duration::from_millis(1), |_| {
            let n = calls.get() + 1;
            calls.set(n);
            if n < 3 {
                Err("transient")
            } else {
                Ok(42)
            }
        });
        assert_eq!(result, Ok(42));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn surfaces_last_error_after_exhaustion() {
        let result: Result<i32, &str> = with_backoff(3, Duration::from_millis(1), |_| Err("nope"));
        assert_eq!(result, Err("nope"));
    }
}
