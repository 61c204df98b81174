use rand::Rng;
use std::time::Duration;

/// Exponential backoff with uniform jitter (§4.5): `base_delay * 2^(attempt-1)`,
/// randomized within ±`randomization_factor` of that value, capped at `max_delay`.
#[derive(Debug, Clone)]
pub(crate) struct ExponentialRandomBackoff {
    base_delay: Duration,
    max_delay: Duration,
    randomization_factor: f64,
}

impl ExponentialRandomBackoff {
    pub(crate) fn new(base_delay: Duration, max_delay: Duration, randomization_factor: f64) -> Self {
        Self {
            base_delay,
            max_delay,
            randomization_factor: randomization_factor.clamp(0.0, 1.0),
        }
    }

    /// `attempt` is 1-indexed: the delay before the first retry is
    /// `next_interval(1)`, i.e. `base_delay * 2^0`.
    pub(crate) fn next_interval(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = 2f64.powi(exponent as i32);
        let nominal = self.base_delay.mul_f64(multiplier).min(self.max_delay);
        self.randomize(nominal)
    }

    fn randomize(&self, duration: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return duration;
        }
        let mut rng = rand::thread_rng();
        let delta = duration.as_secs_f64() * self.randomization_factor;
        let min = (duration.as_secs_f64() - delta).max(0.0);
        let max = duration.as_secs_f64() + delta;
        let randomized = rng.gen_range(min..=max);
        Duration::from_secs_f64(randomized).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_exponentially_without_jitter() {
        let backoff = ExponentialRandomBackoff::new(Duration::from_millis(100), Duration::from_secs(60), 0.0);
        assert_eq!(backoff.next_interval(1), Duration::from_millis(100));
        assert_eq!(backoff.next_interval(2), Duration::from_millis(200));
        assert_eq!(backoff.next_interval(3), Duration::from_millis(400));
    }

    #[test]
    fn caps_at_max_delay() {
        let backoff = ExponentialRandomBackoff::new(Duration::from_secs(10), Duration::from_secs(30), 0.0);
        assert_eq!(backoff.next_interval(10), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_twenty_five_percent() {
        let backoff = ExponentialRandomBackoff::new(Duration::from_secs(10), Duration::from_secs(60), 0.25);
        for _ in 0..50 {
            let d = backoff.next_interval(2);
            assert!(d >= Duration::from_millis(15_000) && d <= Duration::from_millis(25_000), "{:?}", d);
        }
    }
}
