use std::time::Duration;

use crate::EnvxResult;

const BACKOFF_CEILING_ATTEMPT: usize = 13;
const BACKOFF_CEILING: Duration = Duration::from_secs(120);
const BACKOFF_STEP_MS: u64 = 100;

/// Maps an attempt index to the wait before that attempt is issued.
///
/// The policy may fail; an error aborts the retry loop immediately and is
/// surfaced to the caller unchanged.
pub trait BackoffPolicy: Send + Sync {
    fn delay(&self, attempt: usize) -> EnvxResult<Duration>;
}

/// Default backoff: `floor(attempt^e) * 100ms` (e = Euler's number),
/// flattening at a two-minute ceiling past attempt 13. Attempt 0 waits
/// nothing, so the first try is issued immediately.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExponentialBackoff;

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, attempt: usize) -> EnvxResult<Duration> {
        if attempt > BACKOFF_CEILING_ATTEMPT {
            return Ok(BACKOFF_CEILING);
        }
        let steps = (attempt as f64).powf(std::f64::consts::E) as u64;
        Ok(Duration::from_millis(steps * BACKOFF_STEP_MS))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{BackoffPolicy, ExponentialBackoff};

    #[test]
    fn first_attempt_waits_nothing() {
        let delay = ExponentialBackoff.delay(0).expect("delay should compute");
        assert_eq!(delay, Duration::ZERO);
    }

    #[test]
    fn early_attempts_follow_the_power_curve() {
        assert_eq!(
            ExponentialBackoff.delay(1).expect("delay should compute"),
            Duration::from_millis(100)
        );
        assert_eq!(
            ExponentialBackoff.delay(2).expect("delay should compute"),
            Duration::from_millis(600)
        );
    }

    #[test]
    fn curve_matches_formula_up_to_the_ceiling() {
        for attempt in 0..=13_usize {
            let expected =
                Duration::from_millis((attempt as f64).powf(std::f64::consts::E) as u64 * 100);
            assert_eq!(
                ExponentialBackoff
                    .delay(attempt)
                    .expect("delay should compute"),
                expected,
                "attempt {attempt}"
            );
        }
    }

    #[test]
    fn past_attempt_13_the_ceiling_applies() {
        for attempt in [14_usize, 20, 1000] {
            assert_eq!(
                ExponentialBackoff
                    .delay(attempt)
                    .expect("delay should compute"),
                Duration::from_secs(120),
                "attempt {attempt}"
            );
        }
    }
}
