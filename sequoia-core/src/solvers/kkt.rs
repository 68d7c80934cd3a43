//! Barrier KKT assembly shared by the interior-point code paths.
//!
//! The condensed primal-dual system has the quasi-definite form
//!
//! ```text
//! K = [ H + S_v + d I      J^T          ]
//!     [ J             -(S_s^-1 + d_c I) ]
//! ```
//!
//! where `S_v` is the diagonal barrier curvature of the variable bounds
//! and `S_s^-1` the inverted slack curvature of the constraint rows
//! (zero for equality rows). The matrix is assembled in lower-triangle
//! COO with regularization slots, so the inertia-correction loop can
//! rewrite the shifts in place. The expected inertia is `(n, m, 0)`.

use crate::linalg::coo::SymmetricCoo;
use sprs::CsMat;

/// Assemble the KKT matrix. `primal_diagonal` has length `n`,
/// `dual_diagonal` length `m` and holds the (nonnegative) values whose
/// negatives land on the (2,2) block diagonal. Regularization slots are
/// appended for all `n + m` diagonals; the caller sets them with
/// `set_regularization(|i| if i < n { delta } else { -delta_c })`.
pub fn assemble_kkt(
    hessian: Option<&SymmetricCoo>,
    jacobian: &CsMat<f64>,
    primal_diagonal: &[f64],
    dual_diagonal: &[f64],
) -> SymmetricCoo {
    let n = primal_diagonal.len();
    let m = dual_diagonal.len();
    debug_assert_eq!(jacobian.rows(), m);
    debug_assert_eq!(jacobian.cols(), n);

    let hessian_nnz = hessian.map_or(0, |h| h.nnz());
    let capacity = hessian_nnz + jacobian.nnz() + 2 * (n + m);
    let mut kkt = SymmetricCoo::with_capacity(n + m, capacity);

    if let Some(hessian) = hessian {
        debug_assert_eq!(hessian.dimension(), n);
        hessian.for_each(|row, column, value| kkt.insert(row, column, value));
    }
    for (i, &value) in primal_diagonal.iter().enumerate() {
        kkt.insert(i, i, value);
    }
    for (row, row_view) in jacobian.outer_iterator().enumerate() {
        for (column, &value) in row_view.iter() {
            kkt.insert(n + row, column, value);
        }
    }
    for (j, &value) in dual_diagonal.iter().enumerate() {
        kkt.insert(n + j, n + j, -value);
    }
    kkt.add_regularization_slots();
    kkt
}

/// Largest step `a` in `(0, 1]` with
/// `gap_i + a * step_i >= (1 - tau) * gap_i` for every positive gap: the
/// fraction-to-the-boundary rule.
pub fn fraction_to_boundary(gaps: &[f64], steps: &[f64], tau: f64) -> f64 {
    debug_assert_eq!(gaps.len(), steps.len());
    let mut alpha: f64 = 1.0;
    for (&gap, &step) in gaps.iter().zip(steps.iter()) {
        if step < 0.0 && gap.is_finite() {
            alpha = alpha.min(-tau * gap / step);
        }
    }
    alpha.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    #[test]
    fn test_assemble_shape() {
        // H = [[2]], J = [[1]]
        let mut hessian = SymmetricCoo::new(1);
        hessian.insert(0, 0, 2.0);
        let mut jacobian = TriMat::new((1, 1));
        jacobian.add_triplet(0, 0, 1.0);
        let jacobian = jacobian.to_csr();

        let mut kkt = assemble_kkt(Some(&hessian), &jacobian, &[0.5], &[0.25]);
        kkt.set_regularization(|_| 0.0);

        // K = [[2.5, 1], [1, -0.25]]
        let mut y = vec![0.0; 2];
        kkt.multiply(&[1.0, 1.0], &mut y);
        assert!((y[0] - 3.5).abs() < 1e-15);
        assert!((y[1] - 0.75).abs() < 1e-15);
    }

    #[test]
    fn test_fraction_to_boundary() {
        // gap 1.0 shrinking at rate -2: boundary at a = 0.5, rule keeps
        // a fraction tau of the gap
        let alpha = fraction_to_boundary(&[1.0, 5.0], &[-2.0, 1.0], 0.99);
        assert!((alpha - 0.495).abs() < 1e-12);
        // no shrinking step: full step
        assert_eq!(fraction_to_boundary(&[1.0], &[1.0], 0.99), 1.0);
    }
}
