//! Sparse and dense linear algebra primitives.
//!
//! Rectangular matrices (the constraint Jacobian) use `sprs`; the symmetric
//! matrices that feed the factorization are the dedicated COO/CSC types in
//! this module, which carry diagonal regularization slots.

pub mod coo;
pub mod csc;
pub mod vector;

use sprs::CsMat;

/// Jacobian-vector product `y += J d` for a row-indexed (CSR) matrix.
pub fn jacobian_vector_product(jacobian: &CsMat<f64>, d: &[f64], y: &mut [f64]) {
    debug_assert_eq!(jacobian.rows(), y.len());
    for (row, row_view) in jacobian.outer_iterator().enumerate() {
        let mut acc = 0.0;
        for (col, &value) in row_view.iter() {
            acc += value * d[col];
        }
        y[row] += acc;
    }
}

/// Transposed Jacobian-vector product `y += J^T lambda`.
pub fn jacobian_transpose_product(jacobian: &CsMat<f64>, lambda: &[f64], y: &mut [f64]) {
    debug_assert_eq!(jacobian.cols(), y.len());
    for (row, row_view) in jacobian.outer_iterator().enumerate() {
        let multiplier = lambda[row];
        if multiplier == 0.0 {
            continue;
        }
        for (col, &value) in row_view.iter() {
            y[col] += value * multiplier;
        }
    }
}
