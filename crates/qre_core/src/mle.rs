//! Log-likelihood functionals for fitting observed play frequencies.
//!
//! Used by the tracer's maximum-likelihood mode: a sign change of the
//! directional derivative along the curve's tangent brackets a local
//! maximum of the likelihood of the observations.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::coords::CoordMap;

/// Empirical play frequencies, one weight per strategy in profile order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observations {
    weights: Vec<f64>,
}

impl Observations {
    pub fn new(weights: Vec<f64>) -> Self {
        Self { weights }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Sum of `o_k * log(sigma_k)` over the decoded profile.
    pub fn log_like(&self, probs: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(probs.iter())
            .map(|(o, p)| o * p.ln())
            .sum()
    }

    /// Directional derivative of the log-likelihood along `tangent` in the
    /// current coordinates: a log coordinate already moves log(sigma_k),
    /// a linear coordinate needs the 1/sigma_k factor.
    pub fn dir_deriv(&self, coords: &CoordMap, x: &DVector<f64>, tangent: &DVector<f64>) -> f64 {
        let mut total = 0.0;
        for (k, o) in self.weights.iter().enumerate() {
            if coords.is_log(k) {
                total += o * tangent[k];
            } else {
                total += o * tangent[k] / x[k];
            }
        }
        total
    }
}
