//! Per-strategy choice between linear and logarithmic coordinates.
//!
//! Probabilities along the traced branch often decay exponentially in
//! lambda. Linear coordinates are well conditioned while a probability is
//! not tiny, but once it falls below the threshold the defining equations
//! become numerically degenerate and the coordinate switches to the
//! logarithm of the probability instead. The policy is re-examined after
//! every accepted step and any switch forces a refactorization of the
//! Jacobian.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Probabilities below this are represented by their logarithm. The same
/// threshold governs switching back; there is no hysteresis.
pub const LOG_THRESHOLD: f64 = 1.0e-3;

/// One flag per strategy: `true` means the coordinate holds log(sigma_k).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordMap {
    is_log: Vec<bool>,
}

impl CoordMap {
    /// Chooses the starting representation for each entry of `profile`.
    pub fn for_profile(profile: &[f64]) -> Self {
        Self {
            is_log: profile.iter().map(|&p| p < LOG_THRESHOLD).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.is_log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_log.is_empty()
    }

    pub fn is_log(&self, k: usize) -> bool {
        self.is_log[k]
    }

    /// Writes `profile` into the first `len()` entries of `x` in the
    /// current representation.
    pub fn encode(&self, profile: &[f64], x: &mut DVector<f64>) {
        for (k, &p) in profile.iter().enumerate() {
            x[k] = if self.is_log[k] { p.ln() } else { p };
        }
    }

    /// The probability represented by coordinate `k` of `x`.
    pub fn prob(&self, x: &DVector<f64>, k: usize) -> f64 {
        if self.is_log[k] {
            x[k].exp()
        } else {
            x[k]
        }
    }

    /// Decodes the first `len()` coordinates of `x` to plain probabilities.
    pub fn probabilities(&self, x: &DVector<f64>) -> Vec<f64> {
        (0..self.is_log.len()).map(|k| self.prob(x, k)).collect()
    }

    /// Re-examines every coordinate against the threshold, rewriting `x`
    /// in place where the representation changes. Returns true if any
    /// coordinate switched.
    pub fn rescan(&mut self, x: &mut DVector<f64>) -> bool {
        let mut switched = false;
        for k in 0..self.is_log.len() {
            if !self.is_log[k] && x[k] < LOG_THRESHOLD {
                x[k] = x[k].ln();
                self.is_log[k] = true;
                switched = true;
            } else if self.is_log[k] && x[k].exp() > LOG_THRESHOLD {
                x[k] = x[k].exp();
                self.is_log[k] = false;
                switched = true;
            }
        }
        switched
    }
}
