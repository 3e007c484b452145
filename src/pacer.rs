//! Outbound call pacing
//!
//! A token bucket gates every outbound HTTP call. Refill is continuous
//! (`capacity / 1000` tokens per millisecond) rather than reset per second,
//! so sustained throughput is bounded without bursts at second boundaries.
//!
//! The bucket starts with a single token: the first call is admitted
//! immediately and everything after is paced. Invocations may wait on
//! `acquire` concurrently; the state lock is only held across the
//! non-suspending refill/debit step, never across a sleep.

use parking_lot::Mutex;
use tokio::time::{Duration, Instant, sleep};

/// Token bucket that paces outbound calls to a configured rate
pub struct Pacer {
    state: Mutex<PacerState>,
    /// Maximum tokens held; equals the configured requests per second
    capacity: f64,
    refill_per_ms: f64,
}

struct PacerState {
    tokens: f64,
    last_refill: Instant,
}

impl Pacer {
    /// Create a pacer admitting `requests_per_second` sustained calls.
    ///
    /// A non-positive rate disables pacing entirely.
    #[must_use]
    pub fn new(requests_per_second: f64) -> Self {
        let capacity = requests_per_second.max(0.0);
        Self {
            state: Mutex::new(PacerState {
                tokens: capacity.min(1.0),
                last_refill: Instant::now(),
            }),
            capacity,
            refill_per_ms: capacity / 1000.0,
        }
    }

    /// Suspend until a token is available, then debit one.
    pub async fn acquire(&self) {
        if self.capacity <= 0.0 {
            return;
        }

        loop {
            let wait_ms = {
                let mut state = self.state.lock();
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                (1.0 - state.tokens) / self.refill_per_ms
            };
            sleep(Duration::from_secs_f64(wait_ms / 1000.0)).await;
        }
    }

    /// Current token count after refill (introspection and tests)
    #[must_use]
    pub fn available(&self) -> f64 {
        if self.capacity <= 0.0 {
            return f64::INFINITY;
        }
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut PacerState) {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(state.last_refill).as_secs_f64() * 1000.0;
        state.tokens = (state.tokens + elapsed_ms * self.refill_per_ms).min(self.capacity);
        state.last_refill = now;
    }
}
