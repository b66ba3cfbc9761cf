use rand::Rng;
use std::time::Duration;

/// Exponential backoff with jitter for the send client's internal retry loop: attempt 0 waits
/// ~1s, attempt 1 ~2s, attempt 2 ~4s, each jittered by up to 20% to avoid thundering-herd
/// retries across a fleet of workers.
pub fn delay_for_attempt(attempt: u32, base: Duration) -> Duration {
    let exp = base.as_millis().saturating_mul(1u128 << attempt.min(10));
    let jitter_frac: f64 = rand::thread_rng().gen_range(-0.2..=0.2);
    let jittered = (exp as f64) * (1.0 + jitter_frac);
    Duration::from_millis(jittered.max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_within_jitter_bounds() {
        let base = Duration::from_secs(1);
        for attempt in 0..3 {
            let delay = delay_for_attempt(attempt, base);
            let nominal = base.as_millis() as u64 * (1u64 << attempt);
            let lower = (nominal as f64 * 0.8) as u64;
            let upper = (nominal as f64 * 1.2) as u64;
            assert!(delay.as_millis() as u64 >= lower && delay.as_millis() as u64 <= upper + 1);
        }
    }
}
