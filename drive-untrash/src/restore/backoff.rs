use rand::Rng;
use std::time::Duration;

/// Delay before a retry. `retry` is 1 for the first retry of a call.
pub trait DelayCurve: Send + Sync {
    fn next_delay(&self, retry: u32) -> Duration;
}

/// Capped exponential delay, optionally with full jitter.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: bool,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter: bool) -> Self {
        Self { base, max, jitter }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let mut rng = rand::thread_rng();
        self.delay_with_rng(attempt, &mut rng)
    }

    pub fn delay_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base_ms = self.base.as_millis().min(u128::from(u64::MAX)) as u64;
        let max_ms = self.max.as_millis().min(u128::from(u64::MAX)) as u64;
        let shift = attempt.min(16);
        let exp = base_ms.saturating_mul(1u64 << shift).min(max_ms);
        let delay_ms = if self.jitter {
            rng.gen_range(0..=exp)
        } else {
            exp
        };
        Duration::from_millis(delay_ms)
    }
}

impl DelayCurve for Backoff {
    fn next_delay(&self, retry: u32) -> Duration {
        self.delay(retry.saturating_sub(1))
    }
}

/// Curve tuned for Drive quota errors: `2^retry` seconds plus up to one
/// second of random jitter, with the exponent capped.
#[derive(Debug, Clone, Copy)]
pub struct DriveCurve {
    unit: Duration,
    jitter: Duration,
    max_exponent: u32,
}

impl Default for DriveCurve {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
            jitter: Duration::from_secs(1),
            max_exponent: 5,
        }
    }
}

impl DriveCurve {
    pub fn new(unit: Duration, jitter: Duration, max_exponent: u32) -> Self {
        Self {
            unit,
            jitter,
            max_exponent: max_exponent.min(16),
        }
    }

    pub fn delay_with_rng<R: Rng + ?Sized>(&self, retry: u32, rng: &mut R) -> Duration {
        let exponent = retry.min(self.max_exponent);
        let fixed = self.unit.saturating_mul(1u32 << exponent);
        let jitter_ms = self.jitter.as_millis().min(u128::from(u64::MAX)) as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..jitter_ms)
        };
        fixed.saturating_add(Duration::from_millis(extra))
    }
}

impl DelayCurve for DriveCurve {
    fn next_delay(&self, retry: u32) -> Duration {
        let mut rng = rand::thread_rng();
        self.delay_with_rng(retry, &mut rng)
    }
}
