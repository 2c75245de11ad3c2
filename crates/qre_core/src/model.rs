//! The logit-response defining system F(x, lambda) = 0 and its Jacobian.
//!
//! For each player the first strategy is the lead: its row carries the
//! sum-to-one constraint, and every other strategy s gets the ratio
//! equation
//!
//!   log sigma(i, s) - log sigma(i, lead) - lambda * (u(i, s) - u(i, lead)) = 0.
//!
//! This is L equations in L + 1 unknowns (the profile coordinates plus
//! lambda), defining the one-dimensional correspondence the tracer
//! follows. Both evaluations reconstruct the probabilities and their
//! logarithms from whichever representation each coordinate currently
//! uses.

use nalgebra::{DMatrix, DVector};

use crate::coords::CoordMap;
use crate::game::PayoffOracle;

/// Decodes `x` into parallel probability and log-probability vectors.
fn decode(coords: &CoordMap, x: &DVector<f64>) -> (Vec<f64>, Vec<f64>) {
    let len = coords.len();
    let mut probs = Vec::with_capacity(len);
    let mut logs = Vec::with_capacity(len);
    for k in 0..len {
        if coords.is_log(k) {
            probs.push(x[k].exp());
            logs.push(x[k]);
        } else {
            probs.push(x[k]);
            logs.push(x[k].ln());
        }
    }
    (probs, logs)
}

/// Evaluates the residual into `out` (length L).
pub fn residual<O: PayoffOracle>(
    oracle: &O,
    coords: &CoordMap,
    x: &DVector<f64>,
    out: &mut DVector<f64>,
) {
    let layout = oracle.layout();
    let (probs, logs) = decode(coords, x);
    let lambda = x[layout.profile_len()];

    let mut row = 0;
    for pl in 0..layout.num_players() {
        for st in 0..layout.num_strategies(pl) {
            if st == 0 {
                let mut sum = -1.0;
                for m in 0..layout.num_strategies(pl) {
                    sum += probs[layout.index(pl, m)];
                }
                out[row] = sum;
            } else {
                out[row] = logs[layout.index(pl, st)] - logs[layout.index(pl, 0)]
                    - lambda * (oracle.payoff(pl, st, &probs) - oracle.payoff(pl, 0, &probs));
            }
            row += 1;
        }
    }
}

/// Fills the transposed Jacobian: `out` has shape (L+1) x L and entry
/// (k, r) holds the partial derivative of equation r with respect to
/// coordinate k, with the lambda derivative in the last row. Each column's
/// entries account for whether the corresponding coordinate is linear or
/// logarithmic.
pub fn jacobian<O: PayoffOracle>(
    oracle: &O,
    coords: &CoordMap,
    x: &DVector<f64>,
    out: &mut DMatrix<f64>,
) {
    let layout = oracle.layout();
    let len = layout.profile_len();
    let (probs, logs) = decode(coords, x);
    let lambda = x[len];

    out.fill(0.0);

    let mut row = 0;
    for pl in 0..layout.num_players() {
        for st in 0..layout.num_strategies(pl) {
            if st == 0 {
                // Sum-to-one equation: only the owner's block contributes,
                // and the lambda derivative is zero.
                for m in 0..layout.num_strategies(pl) {
                    let col = layout.index(pl, m);
                    out[(col, row)] = if coords.is_log(col) { probs[col] } else { 1.0 };
                }
            } else {
                let lead = layout.index(pl, 0);
                let own = layout.index(pl, st);
                out[(lead, row)] = if coords.is_log(lead) {
                    -1.0
                } else {
                    -1.0 / probs[lead]
                };
                out[(own, row)] = if coords.is_log(own) {
                    1.0
                } else {
                    1.0 / probs[own]
                };

                for pl2 in 0..layout.num_players() {
                    if pl2 == pl {
                        continue;
                    }
                    for m in 0..layout.num_strategies(pl2) {
                        let col = layout.index(pl2, m);
                        let diff = oracle.payoff_deriv(pl, st, pl2, m, &probs)
                            - oracle.payoff_deriv(pl, 0, pl2, m, &probs);
                        out[(col, row)] = if coords.is_log(col) {
                            -lambda * probs[col] * logs[col] * diff
                        } else {
                            -lambda * diff
                        };
                    }
                }

                out[(len, row)] = oracle.payoff(pl, 0, &probs) - oracle.payoff(pl, st, &probs);
            }
            row += 1;
        }
    }
}
