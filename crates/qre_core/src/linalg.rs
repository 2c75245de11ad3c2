//! QR factorization via Givens rotations for the tall rectangular systems
//! arising in curve tracing, plus the Newton corrector step operating on
//! the factored system.
//!
//! The matrix `b` handled here has shape (n+1) x n and stores the
//! transposed Jacobian of the defining system: entry (k, r) is the partial
//! derivative of equation r with respect to unknown k. After `qr_decomp`,
//! the last row of the orthogonal accumulator `q` spans the left null
//! space of the original matrix, which is the tangent direction of the
//! traced curve.

use nalgebra::{DMatrix, DVector};

/// Applies one Givens rotation to rows `l1` and `l2`, chosen to zero
/// `b[(l2, col)]` against `b[(l1, col)]`. The rotation is accumulated into
/// every column of `q` and into columns `from_col..` of `b`; the two
/// target entries are overwritten with (sqrt(c1^2 + c2^2), 0).
///
/// The magnitude factors out the larger of |c1|, |c2| so that neither
/// square can overflow.
pub fn givens(
    b: &mut DMatrix<f64>,
    q: &mut DMatrix<f64>,
    l1: usize,
    l2: usize,
    col: usize,
    from_col: usize,
) {
    let c1 = b[(l1, col)];
    let c2 = b[(l2, col)];
    if c1.abs() + c2.abs() == 0.0 {
        return;
    }

    let sn = if c2.abs() >= c1.abs() {
        (1.0 + (c1 / c2) * (c1 / c2)).sqrt() * c2.abs()
    } else {
        (1.0 + (c2 / c1) * (c2 / c1)).sqrt() * c1.abs()
    };
    let s1 = c1 / sn;
    let s2 = c2 / sn;

    for k in 0..q.ncols() {
        let sv1 = q[(l1, k)];
        let sv2 = q[(l2, k)];
        q[(l1, k)] = s1 * sv1 + s2 * sv2;
        q[(l2, k)] = -s2 * sv1 + s1 * sv2;
    }

    for k in from_col..b.ncols() {
        let sv1 = b[(l1, k)];
        let sv2 = b[(l2, k)];
        b[(l1, k)] = s1 * sv1 + s2 * sv2;
        b[(l2, k)] = -s2 * sv1 + s1 * sv2;
    }

    b[(l1, col)] = sn;
    b[(l2, col)] = 0.0;
}

/// Factors the tall matrix `b` in place. On return `b` holds the
/// upper-triangular factor on its top `ncols` rows (the remaining row is
/// zero) and `q` holds the accumulated rotations, so `q * b_original`
/// equals the triangular factor.
pub fn qr_decomp(b: &mut DMatrix<f64>, q: &mut DMatrix<f64>) {
    q.fill_with_identity();
    for m in 0..b.ncols() {
        for k in (m + 1)..b.nrows() {
            givens(b, q, m, k, m, m + 1);
        }
    }
}

/// One Newton corrector update on the factored system.
///
/// Solves R^T z = y by forward substitution over the triangular block of
/// `b`, forms the ambient correction s = Q^T z, applies `u -= s`, and
/// returns ||s||. The correction is orthogonal to the null space of the
/// Jacobian, so the iterate stays on the corrector hyperplane.
/// `y` is consumed as scratch space.
pub fn newton_step(
    q: &DMatrix<f64>,
    b: &DMatrix<f64>,
    u: &mut DVector<f64>,
    y: &mut DVector<f64>,
) -> f64 {
    let cols = b.ncols();
    for k in 0..cols {
        for l in 0..k {
            y[k] -= b[(l, k)] * y[l];
        }
        y[k] /= b[(k, k)];
    }

    let mut d = 0.0;
    for k in 0..b.nrows() {
        let mut s = 0.0;
        for l in 0..cols {
            s += q[(l, k)] * y[l];
        }
        u[k] -= s;
        d += s * s;
    }
    d.sqrt()
}
