// src/rabbitmq/retry.rs
use std::time::Duration;

/// Fixed-count retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 5;

    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Policy for single-message fetches: 5 attempts, 100ms apart.
    pub fn fetch() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Duration::from_millis(100))
    }

    /// Policy for publishes: 5 attempts, 500ms apart.
    pub fn publish() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Duration::from_millis(500))
    }

    /// Whether another attempt follows attempt number `attempt` (1-based).
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(RetryPolicy::fetch().max_attempts, 5);
        assert_eq!(RetryPolicy::fetch().delay, Duration::from_millis(100));
        assert_eq!(RetryPolicy::publish().delay, Duration::from_millis(500));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_has_next() {
        let policy = RetryPolicy::fetch();
        assert!(policy.has_next(4));
        assert!(!policy.has_next(5));
    }
}
