//! Bounded retry with exponential backoff for completion calls

use std::thread;
use std::time::Duration;

use super::LlmError;

pub const RETRY_ATTEMPTS: u32 = 3;
const BASE_RETRY_DELAY_MS: u64 = 500;

/// Runs `call` up to [`RETRY_ATTEMPTS`] times. Only transient failures are
/// retried; a fatal error is returned immediately.
pub fn with_retry<F>(mut call: F) -> Result<String, LlmError>
where
    F: FnMut() -> Result<String, LlmError>,
{
    let mut last_error = None;

    for attempt in 0..RETRY_ATTEMPTS {
        if attempt > 0 {
            let delay = BASE_RETRY_DELAY_MS * 2u64.pow(attempt - 1);
            thread::sleep(Duration::from_millis(delay));
        }

        match call() {
            Ok(text) => return Ok(text),
            Err(LlmError::Transient(msg)) => {
                tracing::warn!(
                    "Attempt {}/{} failed: {}",
                    attempt + 1,
                    RETRY_ATTEMPTS,
                    msg
                );
                last_error = Some(LlmError::Transient(msg));
            }
            Err(fatal) => return Err(fatal),
        }
    }

    Err(last_error.unwrap_or_else(|| LlmError::Transient("request failed".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_success_on_first_attempt() {
        let calls = Cell::new(0);
        let result = with_retry(|| {
            calls.set(calls.get() + 1);
            Ok("ok".to_string())
        });
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_transient_retried_until_success() {
        let calls = Cell::new(0);
        let result = with_retry(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(LlmError::Transient("503".to_string()))
            } else {
                Ok("ok".to_string())
            }
        });
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_transient_exhaustion() {
        let calls = Cell::new(0);
        let result = with_retry(|| -> Result<String, LlmError> {
            calls.set(calls.get() + 1);
            Err(LlmError::Transient("rate limited".to_string()))
        });
        assert!(matches!(result, Err(LlmError::Transient(_))));
        assert_eq!(calls.get(), RETRY_ATTEMPTS);
    }

    #[test]
    fn test_fatal_not_retried() {
        let calls = Cell::new(0);
        let result = with_retry(|| -> Result<String, LlmError> {
            calls.set(calls.get() + 1);
            Err(LlmError::Fatal("401".to_string()))
        });
        assert!(matches!(result, Err(LlmError::Fatal(_))));
        assert_eq!(calls.get(), 1);
    }
}
