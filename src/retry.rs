use http::{Method, StatusCode};

use crate::error::TransportErrorKind;
use crate::EnvxResult;

/// Everything a retry policy gets to see about one failed attempt.
///
/// `status` is set only when a round trip completed and came back with a
/// response; a pure transport failure (connection refused, DNS, timeout)
/// carries no status at all.
#[derive(Clone, Debug)]
pub struct RetryDecision {
    pub attempt: usize,
    pub max_attempts: usize,
    pub method: Method,
    pub uri: String,
    pub status: Option<StatusCode>,
    pub transport: Option<TransportErrorKind>,
}

/// Decides, from one attempt's outcome, whether another attempt should be
/// issued. Returning `Err` replaces the attempt's error with the policy's
/// own and aborts the loop unconditionally.
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, decision: &RetryDecision) -> EnvxResult<bool>;
}

/// Default retry policy: retry only completed round trips that came back
/// 408 (request timeout) or 500 (server error). Failures without a response
/// object (connection failures, DNS errors, transport-level timeouts) are
/// surfaced immediately.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryOnStatus;

impl RetryPolicy for RetryOnStatus {
    fn should_retry(&self, decision: &RetryDecision) -> EnvxResult<bool> {
        let Some(status) = decision.status else {
            return Ok(false);
        };
        Ok(matches!(status.as_u16(), 408 | 500))
    }
}
