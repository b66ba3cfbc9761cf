use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Rolling-window circuit breaker in front of the external send API.
///
/// Tracks outcomes over `window`; once `min_samples` have landed and the error rate reaches
/// `error_threshold`, the circuit opens and fails fast until `reset_after` elapses, at which
/// point a single half-open probe is allowed through.
pub struct CircuitBreaker {
    state: Mutex<State>,
    error_threshold: f64,
    reset_after: Duration,
    window: Duration,
    min_samples: u32,
}

struct State {
    phase: Phase,
    opened_at: Option<Instant>,
    samples: VecDeque<(Instant, bool)>, // (recorded_at, was_error)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitBreaker {
    pub fn new(error_threshold: f64, reset_after: Duration, window: Duration, min_samples: u32) -> Self {
        Self {
            state: Mutex::new(State { phase: Phase::Closed, opened_at: None, samples: VecDeque::new() }),
            error_threshold,
            reset_after,
            window,
            min_samples,
        }
    }

    /// Whether a call should be allowed through right now. Transitions Open -> HalfOpen once
    /// `reset_after` has elapsed, admitting exactly the caller that observes the transition.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.phase {
            Phase::Closed => true,
            Phase::HalfOpen => false, // a probe is already in flight
            Phase::Open => {
                let opened_at = state.opened_at.expect("Open phase always has opened_at set");
                if opened_at.elapsed() >= self.reset_after {
                    state.phase = Phase::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap();
        state.push_sample(false, self.window);
        if state.phase == Phase::HalfOpen {
            state.phase = Phase::Closed;
            state.opened_at = None;
            state.samples.clear();
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap();
        state.push_sample(true, self.window);

        if state.phase == Phase::HalfOpen {
            state.phase = Phase::Open;
            state.opened_at = Some(Instant::now());
            return;
        }

        if state.phase == Phase::Closed && state.samples.len() as u32 >= self.min_samples {
            let errors = state.samples.iter().filter(|(_, is_err)| *is_err).count() as f64;
            let rate = errors / state.samples.len() as f64;
            if rate >= self.error_threshold {
                state.phase = Phase::Open;
                state.opened_at = Some(Instant::now());
            }
        }
    }
}

impl State {
    fn push_sample(&mut self, is_error: bool, window: Duration) {
        let now = Instant::now();
        self.samples.push_back((now, is_error));
        while let Some((recorded_at, _)) = self.samples.front() {
            if now.duration_since(*recorded_at) > window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_by_default_and_allows_calls() {
        let breaker = CircuitBreaker::new(0.5, Duration::from_millis(50), Duration::from_secs(10), 4);
        assert!(breaker.allow());
    }

    #[test]
    fn opens_once_error_rate_crosses_threshold_with_enough_samples() {
        let breaker = CircuitBreaker::new(0.5, Duration::from_secs(30), Duration::from_secs(10), 4);
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.allow());
    }

    #[test]
    fn stays_closed_below_min_samples_even_if_all_fail() {
        let breaker = CircuitBreaker::new(0.5, Duration::from_secs(30), Duration::from_secs(10), 10);
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.allow());
    }

    #[test]
    fn half_open_probe_allowed_after_reset_timeout() {
        let breaker = CircuitBreaker::new(0.5, Duration::from_millis(10), Duration::from_secs(10), 2);
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.allow());
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.allow());
    }

    #[test]
    fn half_open_success_closes_the_circuit() {
        let breaker = CircuitBreaker::new(0.5, Duration::from_millis(10), Duration::from_secs(10), 2);
        breaker.record_failure();
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.allow());
        breaker.record_success();
        assert!(breaker.allow());
    }

    #[test]
    fn half_open_failure_reopens_the_circuit() {
        let breaker = CircuitBreaker::new(0.5, Duration::from_millis(10), Duration::from_secs(10), 2);
        breaker.record_failure();
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.allow());
        breaker.record_failure();
        assert!(!breaker.allow());
    }
}
