//! Sampling parameters derived from the two user-facing sliders.
//!
//! The sliders are not passed through as-is: length maps onto a token
//! budget through a power law and creativity maps onto a
//! (temperature, top_p) pair. Both maps are monotonic.

use serde::{Deserialize, Serialize};

/// Largest token budget the length slider can reach.
pub const MAX_TOKEN_BUDGET: u32 = 16384;

/// Exponent chosen so that a half-way slider gives a 4096 token budget.
const LENGTH_GAMMA: f64 = 2.0002642;

const TEMP_MIN: f64 = 0.2;
const TEMP_MAX: f64 = 1.2;
const TEMP_GAMMA: f64 = 1.3;

const TOP_P_MIN: f64 = 0.4;
const TOP_P_GAMMA: f64 = 0.55;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_len: u32,
    pub temperature: f64,
    /// Nucleus (top-p) cutoff
    pub top_p: f64,
    /// Always 0: top-k sampling is disabled
    pub top_k: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_len: 2048,
            temperature: 0.7,
            top_p: 0.8,
            top_k: 0,
        }
    }
}

impl GenerationParams {
    /// Build parameters from raw slider positions.
    pub fn from_sliders(creativity: f64, token_length: f64) -> Self {
        let mut params = Self::default();
        params.set_creativity(creativity);
        params.set_token_length(token_length);
        params
    }

    /// Map a length slider in `[0, 1]` onto a budget in `[1, 16384]`.
    pub fn set_token_length(&mut self, value: f64) {
        let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let budget = 1.0 + f64::from(MAX_TOKEN_BUDGET - 1) * v.powf(LENGTH_GAMMA);
        self.max_len = (budget.floor() as u32).clamp(1, MAX_TOKEN_BUDGET);
    }

    /// Map a creativity slider in `[1, 100]` onto temperature and top_p.
    ///
    /// At the bottom of the range only top_p (and top_k) are zeroed; the
    /// temperature keeps whatever value it had.
    pub fn set_creativity(&mut self, value: f64) {
        let c = if value.is_nan() { 1.0 } else { value.clamp(1.0, 100.0) };

        if c <= 1.0 {
            self.top_p = 0.0;
            self.top_k = 0;
            return;
        }

        let n = (c - 1.0) / 99.0;
        self.temperature = TEMP_MIN + n.powf(TEMP_GAMMA) * (TEMP_MAX - TEMP_MIN);
        self.top_p = (TOP_P_MIN + (1.0 - TOP_P_MIN) * n.powf(TOP_P_GAMMA)).clamp(0.0, 1.0);
    }
}
