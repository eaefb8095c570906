use std::time::Duration;

/// Maximum consecutive reconnect attempts before the channel gives up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
/// Delay before the first reconnect attempt.
pub const BASE_DELAY_MS: u64 = 1000;
/// Upper bound for any single reconnect delay.
pub const MAX_DELAY_MS: u64 = 10_000;

/// Bounded exponential reconnect schedule with its attempt counter.
///
/// The counter never exceeds `max_attempts`. Once it reaches the maximum,
/// [`ReconnectPolicy::on_close`] stops producing delays until the next
/// successful open resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    base: Duration,
    cap: Duration,
    attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            MAX_RECONNECT_ATTEMPTS,
            Duration::from_millis(BASE_DELAY_MS),
            Duration::from_millis(MAX_DELAY_MS),
        )
    }
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, base: Duration, cap: Duration) -> Self {
        Self {
            max_attempts,
            base,
            cap,
            attempts: 0,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self.attempts = self.attempts.min(max_attempts);
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Delay for the given attempt index: `min(base * 2^attempt, cap)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Records a successful open.
    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    /// Records a close or failed attempt and returns the delay before the next
    /// attempt, or `None` when retries are exhausted.
    pub fn on_close(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        let delay = self.delay_for(self.attempts);
        self.attempts += 1;
        Some(delay)
    }

    /// Marks the schedule exhausted so no automatic reconnect follows.
    pub fn exhaust(&mut self) {
        self.attempts = self.max_attempts;
    }
}
