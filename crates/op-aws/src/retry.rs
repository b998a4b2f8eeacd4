//! Error classification and retry with exponential backoff for aws CLI calls.
//!
//! The Organizations control plane is heavily rate limited. Throttling and
//! concurrent-modification errors are retried; everything else is returned
//! immediately.

use std::thread;
use std::time::Duration;

use op_reconcile::DirectoryError;

use crate::config::RetryConfig;

/// Error codes that mean "try again later".
const RETRYABLE_CODES: &[&str] = &[
    "TooManyRequestsException",
    "ConcurrentModificationException",
    "Throttling",
    "ThrottlingException",
];

/// Error codes that mean the referenced entity does not exist.
const NOT_FOUND_CODES: &[&str] = &[
    "PolicyNotFoundException",
    "TargetNotFoundException",
    "ParentNotFoundException",
    "OrganizationalUnitNotFoundException",
    "AccountNotFoundException",
];

/// Extract the service error code from aws CLI stderr.
///
/// The CLI reports service errors as
/// `An error occurred (<Code>) when calling the <Op> operation: <message>`.
pub(crate) fn error_code(stderr: &str) -> Option<&str> {
    let start = stderr.find("An error occurred (")? + "An error occurred (".len();
    let len = stderr[start..].find(')')?;
    Some(&stderr[start..start + len])
}

/// Map a failed invocation to a DirectoryError.
pub(crate) fn classify(operation: &str, stderr: &str) -> DirectoryError {
    let message = stderr.trim().to_string();
    match error_code(stderr) {
        Some(code) if RETRYABLE_CODES.contains(&code) => DirectoryError::Throttled {
            operation: operation.to_string(),
            message,
        },
        Some(code) if NOT_FOUND_CODES.contains(&code) => DirectoryError::NotFound(message),
        _ => DirectoryError::Backend {
            operation: operation.to_string(),
            message,
        },
    }
}

/// Run `call` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent.
///
/// Delays: base, 2×base, 4×base, … between attempts.
pub(crate) fn with_retry<T, F>(
    retry: &RetryConfig,
    operation: &str,
    mut call: F,
) -> Result<T, DirectoryError>
where
    F: FnMut() -> Result<T, DirectoryError>,
{
    let mut attempt = 0;
    loop {
        match call() {
            Err(err) if err.is_retryable() && attempt < retry.max_retries => {
                let backoff = 1u64 << attempt.min(16);
                let delay = Duration::from_millis(retry.base_delay_ms.saturating_mul(backoff));
                attempt += 1;
                tracing::warn!(
                    operation,
                    attempt,
                    max_retries = retry.max_retries,
                    "aws call throttled, retrying in {delay:?}: {err}"
                );
                thread::sleep(delay);
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THROTTLED: &str = "An error occurred (TooManyRequestsException) when calling the \
                             AttachPolicy operation (reached max retries: 2): Rate exceeded";

    fn no_delay(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay_ms: 0,
        }
    }

    #[test]
    fn extracts_error_code() {
        assert_eq!(error_code(THROTTLED), Some("TooManyRequestsException"));
        assert_eq!(error_code("Unable to locate credentials"), None);
    }

    #[test]
    fn classifies_throttling_not_found_and_other() {
        assert!(classify("attach-policy", THROTTLED).is_retryable());
        assert!(matches!(
            classify(
                "list-targets-for-policy",
                "An error occurred (PolicyNotFoundException) when calling the ListTargetsForPolicy operation: nope"
            ),
            DirectoryError::NotFound(_)
        ));
        match classify("create-policy", "An error occurred (DuplicatePolicyException) ...") {
            DirectoryError::Backend { operation, message } => {
                assert_eq!(operation, "create-policy");
                assert!(message.contains("DuplicatePolicyException"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn retries_throttling_until_success() {
        let mut calls = 0;
        let result = with_retry(&no_delay(3), "attach-policy", || {
            calls += 1;
            if calls < 3 {
                Err(classify("attach-policy", THROTTLED))
            } else {
                Ok("done")
            }
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 3);
    }

    #[test]
    fn gives_up_after_budget() {
        let mut calls = 0;
        let result: Result<(), _> = with_retry(&no_delay(2), "attach-policy", || {
            calls += 1;
            Err(classify("attach-policy", THROTTLED))
        });
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls, 3);
    }

    #[test]
    fn does_not_retry_permanent_errors() {
        let mut calls = 0;
        let result: Result<(), _> = with_retry(&no_delay(5), "update-policy", || {
            calls += 1;
            Err(classify("update-policy", "An error occurred (AccessDeniedException) ..."))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
