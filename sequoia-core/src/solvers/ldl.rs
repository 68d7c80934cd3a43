//! LDL^T factorization backend.
//!
//! Wraps the `ldl` crate behind [`SymmetricIndefiniteSolver`]. The input
//! COO matrix is converted to upper-triangle CSC once per sparsity
//! pattern; numeric refactorizations with an unchanged pattern (the
//! regularization loops) reuse the cached elimination tree, scatter map
//! and workspaces, which grow monotonically to the largest observed size.
//!
//! Unlike a pivoting factorization, LDL^T without pivoting can break down
//! on an indefinite matrix. Breakdown is reported through the singularity
//! flag; the regularization loops respond by increasing the diagonal
//! shift, after which the factorization exists and its D diagonal reveals
//! the true inertia. No dynamic pivot perturbation is applied here: the
//! inertia must stay honest for convexification to work.

use super::{Inertia, SymmetricIndefiniteSolver};
use crate::error::SolverError;
use crate::linalg::coo::SymmetricCoo;
use crate::linalg::csc::SymmetricCsc;

// pivots below RELATIVE_PIVOT_TOLERANCE * max|d| count as zero
const RELATIVE_PIVOT_TOLERANCE: f64 = 1e-14;

struct CachedPattern {
    row_indices: Vec<usize>,
    column_indices: Vec<usize>,
    csc: SymmetricCsc,
    scatter: Vec<usize>,
    etree: Vec<Option<usize>>,
    l_nz: Vec<usize>,
}

struct Factors {
    l_p: Vec<usize>,
    l_i: Vec<usize>,
    l_x: Vec<f64>,
    d: Vec<f64>,
    d_inv: Vec<f64>,
}

/// Default symmetric-indefinite backend ("ldl").
pub struct LdlSolver {
    dimension: usize,
    pattern: Option<CachedPattern>,
    factors: Option<Factors>,
    inertia: Inertia,
    singular: bool,
    bwork: Vec<ldl::Marker>,
    iwork: Vec<usize>,
    fwork: Vec<f64>,
}

impl LdlSolver {
    pub fn new() -> Self {
        Self {
            dimension: 0,
            pattern: None,
            factors: None,
            inertia: Inertia {
                positive: 0,
                negative: 0,
                zero: 0,
            },
            singular: false,
            bwork: Vec::new(),
            iwork: Vec::new(),
            fwork: Vec::new(),
        }
    }

    fn ensure_workspaces(&mut self, n: usize) {
        if self.bwork.len() < n {
            self.bwork.resize(n, ldl::Marker::Unused);
        }
        if self.iwork.len() < 3 * n {
            self.iwork.resize(3 * n, 0);
        }
        if self.fwork.len() < n {
            self.fwork.resize(n, 0.0);
        }
    }

    fn pattern_matches(&self, matrix: &SymmetricCoo) -> bool {
        match &self.pattern {
            Some(cached) => {
                self.dimension == matrix.dimension()
                    && cached.row_indices == matrix.row_indices()
                    && cached.column_indices == matrix.column_indices()
            }
            None => false,
        }
    }

    fn rebuild_pattern(&mut self, matrix: &SymmetricCoo) -> Result<(), SolverError> {
        let n = matrix.dimension();
        let (csc, scatter) = SymmetricCsc::from_coo(matrix);

        let mut work = vec![0usize; n];
        let mut l_nz = vec![0usize; n];
        let mut etree = vec![None; n];
        ldl::etree(
            n,
            csc.column_starts(),
            csc.row_indices(),
            &mut work,
            &mut l_nz,
            &mut etree,
        )
        .map_err(|_| {
            SolverError::Numerical("elimination tree computation failed".to_string())
        })?;

        self.dimension = n;
        self.pattern = Some(CachedPattern {
            row_indices: matrix.row_indices().to_vec(),
            column_indices: matrix.column_indices().to_vec(),
            csc,
            scatter,
            etree,
            l_nz,
        });
        self.factors = None;
        Ok(())
    }
}

impl Default for LdlSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SymmetricIndefiniteSolver for LdlSolver {
    fn factorize(&mut self, matrix: &SymmetricCoo) -> Result<(), SolverError> {
        if !self.pattern_matches(matrix) {
            self.rebuild_pattern(matrix)?;
        } else {
            let pattern = self.pattern.as_mut().unwrap();
            pattern.csc.refresh_from_coo(matrix, &pattern.scatter);
        }
        let n = self.dimension;
        self.ensure_workspaces(n);
        let pattern = self.pattern.as_ref().unwrap();

        let nnz_l: usize = pattern.l_nz.iter().sum();
        let factors = self.factors.get_or_insert_with(|| Factors {
            l_p: Vec::new(),
            l_i: Vec::new(),
            l_x: Vec::new(),
            d: Vec::new(),
            d_inv: Vec::new(),
        });
        factors.l_p.resize(n + 1, 0);
        factors.l_i.resize(nnz_l, 0);
        factors.l_x.resize(nnz_l, 0.0);
        factors.d.resize(n, 0.0);
        factors.d_inv.resize(n, 0.0);

        self.bwork[..n].fill(ldl::Marker::Unused);
        self.iwork[..3 * n].fill(0);
        self.fwork[..n].fill(0.0);

        let result = ldl::factor(
            n,
            pattern.csc.column_starts(),
            pattern.csc.row_indices(),
            pattern.csc.entries(),
            &mut factors.l_p,
            &mut factors.l_i,
            &mut factors.l_x,
            &mut factors.d,
            &mut factors.d_inv,
            &pattern.l_nz,
            &pattern.etree,
            &mut self.bwork[..n],
            &mut self.iwork[..3 * n],
            &mut self.fwork[..n],
        );

        match result {
            Ok(_) => {
                let d = &factors.d;
                let max_pivot = d.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()));
                let tiny = RELATIVE_PIVOT_TOLERANCE * max_pivot.max(1.0);
                let mut positive = 0;
                let mut negative = 0;
                let mut zero = 0;
                for &pivot in d.iter() {
                    if pivot.abs() <= tiny {
                        zero += 1;
                    } else if pivot > 0.0 {
                        positive += 1;
                    } else {
                        negative += 1;
                    }
                }
                self.inertia = Inertia {
                    positive,
                    negative,
                    zero,
                };
                self.singular = zero > 0;
            }
            Err(_) => {
                // breakdown: a structurally or numerically zero pivot
                self.factors = None;
                self.inertia = Inertia {
                    positive: 0,
                    negative: 0,
                    zero: n,
                };
                self.singular = true;
            }
        }
        Ok(())
    }

    fn inertia(&self) -> Inertia {
        self.inertia
    }

    fn is_singular(&self) -> bool {
        self.singular
    }

    fn rank(&self) -> usize {
        self.dimension - self.inertia.zero
    }

    fn solve(&self, rhs: &[f64], solution: &mut [f64]) {
        assert_eq!(rhs.len(), self.dimension);
        assert_eq!(solution.len(), self.dimension);
        let factors = self
            .factors
            .as_ref()
            .expect("solve requires a successful factorization");
        solution.copy_from_slice(rhs);
        ldl::solve(
            self.dimension,
            &factors.l_p,
            &factors.l_i,
            &factors.l_x,
            &factors.d_inv,
            solution,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_definite() {
        // [[2, 1], [1, 2]]
        let mut matrix = SymmetricCoo::new(2);
        matrix.insert(0, 0, 2.0);
        matrix.insert(1, 0, 1.0);
        matrix.insert(1, 1, 2.0);

        let mut solver = LdlSolver::new();
        solver.factorize(&matrix).unwrap();
        assert!(!solver.is_singular());
        assert!(solver.inertia().matches(2, 0));
        assert_eq!(solver.rank(), 2);

        let mut x = vec![0.0; 2];
        solver.solve(&[3.0, 3.0], &mut x);
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_quasi_definite_inertia() {
        // [[1, 0, 1], [0, 1, 1], [1, 1, -1]]: a 2+1 saddle system
        let mut matrix = SymmetricCoo::new(3);
        matrix.insert(0, 0, 1.0);
        matrix.insert(1, 1, 1.0);
        matrix.insert(2, 0, 1.0);
        matrix.insert(2, 1, 1.0);
        matrix.insert(2, 2, -1.0);

        let mut solver = LdlSolver::new();
        solver.factorize(&matrix).unwrap();
        assert!(solver.inertia().matches(2, 1));
    }

    #[test]
    fn test_refactorize_with_regularization() {
        // indefinite diagonal pushed positive definite by the slots
        let mut matrix = SymmetricCoo::new(2);
        matrix.insert(0, 0, 1.0);
        matrix.insert(1, 1, -0.5);
        matrix.add_regularization_slots();

        let mut solver = LdlSolver::new();
        solver.factorize(&matrix).unwrap();
        assert!(solver.inertia().matches(1, 1));

        matrix.set_regularization(|_| 1.0);
        solver.factorize(&matrix).unwrap();
        assert!(solver.inertia().matches(2, 0));
    }

    #[test]
    fn test_singular_matrix_flagged() {
        let mut matrix = SymmetricCoo::new(2);
        matrix.insert(0, 0, 1.0);
        matrix.insert(1, 0, 1.0);
        matrix.insert(1, 1, 1.0); // [[1,1],[1,1]], rank 1

        let mut solver = LdlSolver::new();
        solver.factorize(&matrix).unwrap();
        assert!(solver.is_singular());
        assert_eq!(solver.rank(), 1);
    }
}
