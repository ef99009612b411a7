// src/blockchain/retry.rs

//! Retry policy and the attempt state machine behind the resilient client.
//!
//! The state machine only counts attempts and computes delays. It does not
//! sleep or do I/O, so the same schedule can drive blocking or async callers.

use std::time::Duration;

/// Retry and timeout knobs for one logical RPC call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts made against each endpoint before moving to the next one.
    pub max_attempts: u32,
    /// Delay before the first retry on the same endpoint; doubles per retry.
    pub base_backoff: Duration,
    /// Upper bound for a single backoff delay.
    pub max_backoff: Duration,
    /// Upper bound for a single request/response round trip.
    pub attempt_timeout: Duration,
    /// Upper bound for the whole logical call, retries included.
    pub call_deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            attempt_timeout: Duration::from_secs(30),
            call_deadline: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub fn with_call_deadline(mut self, call_deadline: Duration) -> Self {
        self.call_deadline = call_deadline;
        self
    }

    /// `base_backoff * 2^attempt`, capped at `max_backoff`. `attempt` is the
    /// zero-based index of the attempt that just failed.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}

/// What the driver should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Wait, then try the same endpoint again.
    Retry { delay: Duration },
    /// The current endpoint spent its budget; move on without waiting.
    Advance,
    /// Every endpoint spent its budget.
    Exhausted,
}

/// Attempt counters for one logical call over `endpoint_count` endpoints.
#[derive(Debug, Clone)]
pub struct RetryState {
    endpoint_count: usize,
    endpoint_index: usize,
    attempt: u32,
    total_attempts: u32,
    max_attempts: u32,
}

impl RetryState {
    pub fn new(endpoint_count: usize, policy: &RetryPolicy) -> Self {
        Self {
            endpoint_count,
            endpoint_index: 0,
            attempt: 0,
            total_attempts: 0,
            max_attempts: policy.max_attempts.max(1),
        }
    }

    /// Index into the candidate list for the next attempt.
    pub fn endpoint_index(&self) -> usize {
        self.endpoint_index
    }

    /// Zero-based attempt number against the current endpoint.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Attempts started so far across all endpoints.
    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.endpoint_index >= self.endpoint_count
    }

    /// Marks the start of an attempt.
    pub fn begin_attempt(&mut self) {
        self.total_attempts += 1;
    }

    /// Advances the machine after a failed attempt.
    pub fn on_failure(&mut self, policy: &RetryPolicy) -> NextStep {
        let failed_attempt = self.attempt;
        self.attempt += 1;
        if self.attempt < self.max_attempts {
            return NextStep::Retry {
                delay: policy.backoff_for(failed_attempt),
            };
        }

        self.skip_endpoint()
    }

    /// Gives up on the current endpoint's remaining attempts.
    pub fn skip_endpoint(&mut self) -> NextStep {
        self.endpoint_index += 1;
        self.attempt = 0;
        if self.is_exhausted() {
            NextStep::Exhausted
        } else {
            NextStep::Advance
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy(5);
        assert_eq!(p.backoff_for(0), Duration::from_millis(100));
        assert_eq!(p.backoff_for(1), Duration::from_millis(200));
        assert_eq!(p.backoff_for(2), Duration::from_millis(350));
        assert_eq!(p.backoff_for(40), Duration::from_millis(350));
    }

    #[test]
    fn walks_every_endpoint_then_exhausts() {
        let p = policy(2);
        let mut state = RetryState::new(2, &p);
        let mut steps = Vec::new();
        while !state.is_exhausted() {
            state.begin_attempt();
            steps.push(state.on_failure(&p));
        }

        assert_eq!(
            steps,
            vec![
                NextStep::Retry { delay: Duration::from_millis(100) },
                NextStep::Advance,
                NextStep::Retry { delay: Duration::from_millis(100) },
                NextStep::Exhausted,
            ]
        );
        assert_eq!(state.total_attempts(), 4);
    }

    #[test]
    fn attempt_counter_resets_per_endpoint() {
        let p = policy(3);
        let mut state = RetryState::new(3, &p);
        state.begin_attempt();
        state.on_failure(&p);
        assert_eq!((state.endpoint_index(), state.attempt()), (0, 1));
        state.begin_attempt();
        state.on_failure(&p);
        state.begin_attempt();
        assert_eq!(state.on_failure(&p), NextStep::Advance);
        assert_eq!((state.endpoint_index(), state.attempt()), (1, 0));
    }

    #[test]
    fn skipping_an_endpoint_resets_its_attempts() {
        let p = policy(3);
        let mut state = RetryState::new(2, &p);
        state.begin_attempt();
        assert!(matches!(state.on_failure(&p), NextStep::Retry { .. }));

        assert_eq!(state.skip_endpoint(), NextStep::Advance);
        assert_eq!((state.endpoint_index(), state.attempt()), (1, 0));
        assert_eq!(state.skip_endpoint(), NextStep::Exhausted);
        assert_eq!(state.total_attempts(), 1);
    }

    #[test]
    fn zero_attempts_is_treated_as_one() {
        let p = policy(0);
        let mut state = RetryState::new(1, &p);
        state.begin_attempt();
        assert_eq!(state.on_failure(&p), NextStep::Exhausted);
        assert_eq!(state.total_attempts(), 1);
    }
}
