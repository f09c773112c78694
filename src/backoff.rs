use rand::Rng;
use std::time::Duration;

/// Reconnection schedule: base delay doubling per attempt, capped, with
/// multiplicative jitter. The schedule itself is pure so it can be tested
/// without sleeping.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
    /// Fraction of the delay added as random jitter, in `[0.0, 1.0]`.
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(60),
            max_attempts: 5,
            jitter: 0.2,
        }
    }
}

impl BackoffPolicy {
    /// Deterministic delay before attempt `n` (1-based): `base * 2^(n-1)`,
    /// saturating at the cap.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(32);
        let delay = self.base.saturating_mul(1u32.checked_shl(shift).unwrap_or(u32::MAX));
        delay.min(self.cap)
    }

    /// Delay with jitter applied on top of the deterministic schedule.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if self.jitter <= 0.0 {
            return delay;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(0.0..=self.jitter);
        delay.mul_f64(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(100),
            cap: Duration::from_secs(2),
            max_attempts: 8,
            jitter: 0.0,
        }
    }

    #[test]
    fn delays_double_until_the_cap() {
        let p = policy();
        assert_eq!(p.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(p.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(p.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(p.delay_for_attempt(6), Duration::from_secs(2));
        assert_eq!(p.delay_for_attempt(30), Duration::from_secs(2));
    }

    #[test]
    fn schedule_is_non_decreasing() {
        let p = policy();
        let mut last = Duration::ZERO;
        for attempt in 1..=20 {
            let delay = p.delay_for_attempt(attempt);
            assert!(delay >= last);
            last = delay;
        }
    }

    #[test]
    fn jitter_stays_within_the_configured_fraction() {
        let p = BackoffPolicy {
            jitter: 0.5,
            ..policy()
        };
        for attempt in 1..=6 {
            let plain = p.delay_for_attempt(attempt);
            for _ in 0..50 {
                let jittered = p.jittered_delay(attempt);
                assert!(jittered >= plain);
                assert!(jittered <= plain.mul_f64(1.5) + Duration::from_nanos(1));
            }
        }
    }

    #[test]
    fn zero_jitter_matches_the_pure_schedule() {
        let p = policy();
        assert_eq!(p.jittered_delay(3), p.delay_for_attempt(3));
    }
}
