//! Inclusion proof polling.
//!
//! A proof may lag its submission by a round or more. Polling retries
//! `NotFound` and transient transport errors with exponential backoff, up to
//! an attempt limit and an overall deadline. Running out of either leaves
//! the transfer indeterminate: the commitment may or may not be registered,
//! and the caller must re-query before building a new one.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use otx_token::{InclusionProof, RequestId};

use crate::{AggregatorClient, AggregatorError};

/// Retry schedule for proof retrieval.
#[derive(Clone, Debug, PartialEq)]
pub struct PollPolicy {
    /// Attempts before giving up (at least one is always made).
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Growth factor between delays; values below 1 are treated as 1.
    pub multiplier: f64,
    /// Overall time budget, measured from the first attempt.
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            deadline: Some(Duration::from_secs(60)),
        }
    }
}

impl PollPolicy {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let delay = self.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Polling failure.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// Retries ran out; registration status is unknown.
    #[error("request {request_id} indeterminate after {attempts} attempts")]
    Indeterminate {
        request_id: RequestId,
        attempts: u32,
    },

    /// Non-retryable aggregator error.
    #[error(transparent)]
    Aggregator(#[from] AggregatorError),
}

/// Fetch the inclusion proof for `request_id`, retrying per `policy`.
pub async fn poll_inclusion_proof(
    client: &dyn AggregatorClient,
    request_id: &RequestId,
    policy: &PollPolicy,
) -> Result<InclusionProof, PollError> {
    let started = Instant::now();
    let mut attempts = 0;
    while attempts < policy.max_attempts.max(1) {
        attempts += 1;
        match client.get_inclusion_proof(request_id).await {
            Ok(proof) => {
                debug!(request_id = %request_id, attempts, "inclusion proof received");
                return Ok(proof);
            }
            Err(e) if matches!(e, AggregatorError::NotFound(_)) || e.is_transient() => {
                debug!(request_id = %request_id, attempt = attempts, error = %e, "proof not available");
            }
            Err(e) => return Err(PollError::Aggregator(e)),
        }
        if attempts >= policy.max_attempts {
            break;
        }
        let delay = policy.delay_after(attempts);
        if let Some(deadline) = policy.deadline {
            if started.elapsed() + delay > deadline {
                break;
            }
        }
        tokio::time::sleep(delay).await;
    }
    warn!(request_id = %request_id, attempts, "gave up polling for inclusion proof");
    Err(PollError::Indeterminate {
        request_id: *request_id,
        attempts,
    })
}
