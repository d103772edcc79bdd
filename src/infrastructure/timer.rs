use crate::types::{RECONNECT_BASE_DELAY, RECONNECT_MAX_DELAY};
use std::time::Duration;

/// Exponential backoff for reconnection: `min(base * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectTimer {
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl ReconnectTimer {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay before the reconnect attempt with the given zero-based index
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // 2^20 already exceeds any sane cap; clamp so the shift cannot overflow
        let multiplier = 1_u64 << attempt.min(20);
        let delay = self
            .base_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

impl Default for ReconnectTimer {
    fn default() -> Self {
        Self::new(RECONNECT_BASE_DELAY, RECONNECT_MAX_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_from_base_delay() {
        let timer = ReconnectTimer::new(1000, 30_000);
        let delays: Vec<u64> = (0..5)
            .map(|attempt| timer.delay_for_attempt(attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    }

    #[test]
    fn caps_delay_at_max() {
        let timer = ReconnectTimer::default();
        assert_eq!(timer.delay_for_attempt(5), Duration::from_millis(30_000));
        assert_eq!(timer.delay_for_attempt(12), Duration::from_millis(30_000));
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let timer = ReconnectTimer::new(u64::MAX / 2, u64::MAX);
        assert_eq!(timer.delay_for_attempt(u32::MAX), Duration::from_millis(u64::MAX));
    }
}
