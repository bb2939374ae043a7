use chrono::{DateTime, Duration, Utc};

use crate::gateway::errors::ProcessingError;

/// Default maximum acceptable difference between the caller's clock and ours.
pub const DEFAULT_MAX_CLOCK_SKEW_MS: i64 = 5 * 60 * 1000;
/// Default maximum age of a completed user authentication.
pub const DEFAULT_MAX_AUTH_AGE_MS: i64 = 20 * 60 * 1000;

/// The two freshness bounds enforced wherever a request carries a client-supplied timestamp or an
/// authentication artifact.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessBounds {
    pub max_clock_skew: Duration,
    pub max_auth_age: Duration,
}

impl Default for FreshnessBounds {
    fn default() -> Self {
        Self {
            max_clock_skew: Duration::milliseconds(DEFAULT_MAX_CLOCK_SKEW_MS),
            max_auth_age: Duration::milliseconds(DEFAULT_MAX_AUTH_AGE_MS),
        }
    }
}

impl FreshnessBounds {
    /// Checks a client-supplied call timestamp against the permitted clock skew, in either
    /// direction.
    pub fn check_clock_skew(&self, claimed: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ProcessingError> {
        let skew = (now - claimed).abs();
        if skew > self.max_clock_skew {
            return Err(ProcessingError::ClockSkewExceeded(format!(
                "Claimed {claimed}, but the provider clock reads {now}."
            )));
        }
        Ok(())
    }

    /// Checks that the user's authentication artifact is recent enough to act on.
    pub fn check_auth_age(&self, authenticated_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ProcessingError> {
        if now - authenticated_at > self.max_auth_age {
            return Err(ProcessingError::AuthenticationTooOld(format!(
                "User authenticated at {authenticated_at}, which is older than the permitted {} s.",
                self.max_auth_age.num_seconds()
            )));
        }
        Ok(())
    }
}
