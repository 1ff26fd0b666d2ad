//! Smoothed tokens-per-second estimate for the in-flight turn.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// The first few fragments of a turn arrive almost at once (a fixed
/// preamble from the generator) and are not timed.
const PREAMBLE_EVENTS: u64 = 4;

/// Fewer samples than this in the window report a rate of 0.
const MIN_SAMPLES: usize = 6;

const WINDOW: Duration = Duration::from_secs(5);

/// Guards against a zero time span between samples.
const MIN_SPAN_SECS: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct RateTracker {
    window: Duration,
    total: u64,
    events: VecDeque<Instant>,
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RateTracker {
    pub fn new() -> Self {
        Self::with_window(WINDOW)
    }

    fn with_window(window: Duration) -> Self {
        Self {
            window,
            total: 0,
            events: VecDeque::new(),
        }
    }

    /// Record one event now and return the current rate.
    pub fn step(&mut self) -> f64 {
        self.step_at(Instant::now())
    }

    /// Record one event at `now` and return the current rate.
    pub fn step_at(&mut self, now: Instant) -> f64 {
        self.total += 1;
        if self.total <= PREAMBLE_EVENTS {
            return 0.0;
        }

        self.events.push_back(now);
        while let Some(&oldest) = self.events.front() {
            if now.duration_since(oldest) > self.window {
                self.events.pop_front();
            } else {
                break;
            }
        }

        let n = self.events.len();
        if n < MIN_SAMPLES {
            return 0.0;
        }

        let (Some(first), Some(last)) = (self.events.front(), self.events.back()) else {
            return 0.0;
        };
        let span = last.duration_since(*first).as_secs_f64().max(MIN_SPAN_SECS);
        (n - 1) as f64 / span
    }

    /// Forget all timing so the next turn starts fresh.
    pub fn reset(&mut self) {
        self.events.clear();
        self.total = 0;
    }
}
