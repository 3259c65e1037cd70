use rand::Rng;
use std::time::Duration;

/// Reconnect delay policy: exponential backoff capped at `max`, plus jitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter: Duration) -> Self {
        Self { base, max, jitter }
    }

    /// `min(base * 2^attempt, max)`, without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
    }

    /// Delay before reconnect attempt `attempt` (0-indexed), jitter included
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.base_delay(attempt) + self.random_jitter()
    }

    /// Uniform in `[0, jitter)`
    fn random_jitter(&self) -> Duration {
        let window = self.jitter.as_millis() as u64;
        if window == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..window))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(crate::types::DEFAULT_RECONNECT_DELAY_MS),
            Duration::from_millis(crate::types::DEFAULT_MAX_RECONNECT_DELAY_MS),
            Duration::from_millis(crate::types::DEFAULT_RECONNECT_JITTER_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_delay_doubles_then_caps() {
        let backoff = Backoff::default();
        let expected = [1000, 2000, 4000, 8000, 16000, 30000, 30000];
        for (attempt, ms) in expected.iter().enumerate() {
            assert_eq!(
                backoff.base_delay(attempt as u32),
                Duration::from_millis(*ms)
            );
        }
    }

    #[test]
    fn test_delay_within_jitter_window() {
        let backoff = Backoff::default();
        for attempt in 0..=5u32 {
            let floor = (1000u64 << attempt).min(30000);
            for _ in 0..200 {
                let delay = backoff.next_delay(attempt).as_millis() as u64;
                assert!(
                    delay >= floor && delay < floor + 1000,
                    "attempt {} produced {}ms",
                    attempt,
                    delay
                );
            }
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let backoff = Backoff::default();
        assert_eq!(backoff.base_delay(64), Duration::from_millis(30000));
        assert_eq!(backoff.base_delay(u32::MAX), Duration::from_millis(30000));
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let backoff = Backoff::new(
            Duration::from_millis(10),
            Duration::from_millis(100),
            Duration::ZERO,
        );
        assert_eq!(backoff.next_delay(2), Duration::from_millis(40));
    }
}
