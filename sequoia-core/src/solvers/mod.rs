//! Solver collaborator interfaces and default backends.
//!
//! The core consumes two primitives through the traits below: a direct
//! symmetric-indefinite factorization (inertia-revealing, for
//! convexification and the interior-point subproblem) and a convex QP/LP
//! solver. Backends are selected by name through the option map.

pub mod kkt;
pub mod ldl;
pub mod qp_ipm;

use crate::error::SolverError;
use crate::linalg::coo::SymmetricCoo;
use crate::model::Range;
use sprs::CsMat;

/// Eigenvalue-sign counts of a factorized matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inertia {
    pub positive: usize,
    pub negative: usize,
    pub zero: usize,
}

impl Inertia {
    /// True for the expected `(positive, negative, 0)` signature.
    pub fn matches(&self, positive: usize, negative: usize) -> bool {
        self.positive == positive && self.negative == negative && self.zero == 0
    }
}

/// Direct factorization of a sparse symmetric indefinite matrix.
///
/// `factorize` reports breakdown through the singularity flag rather than
/// an error: callers regularize and retry. `Err` is reserved for invalid
/// input.
pub trait SymmetricIndefiniteSolver {
    /// Factorize a matrix given in (lower-triangle) COO form.
    fn factorize(&mut self, matrix: &SymmetricCoo) -> Result<(), SolverError>;

    /// Inertia of the last factorization.
    fn inertia(&self) -> Inertia;

    /// True when the last factorization broke down or produced a
    /// numerically zero pivot.
    fn is_singular(&self) -> bool;

    /// Rank estimate of the last factorization.
    fn rank(&self) -> usize;

    /// Solve `K x = rhs` with the last factorization.
    fn solve(&self, rhs: &[f64], solution: &mut [f64]);
}

/// Build a symmetric-indefinite solver backend by name.
pub fn create_symmetric_solver(
    name: &str,
) -> Result<Box<dyn SymmetricIndefiniteSolver>, SolverError> {
    match name {
        "ldl" => Ok(Box::new(ldl::LdlSolver::new())),
        other => Err(SolverError::invalid_option(
            "linear_solver",
            format!("unknown linear solver {:?}; available: ldl", other),
        )),
    }
}

/// Status of a QP/LP solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Suboptimal,
}

/// A convex QP in the form
///
/// ```text
/// minimize    (1/2) v^T H v + g^T v
/// subject to  c_L <= A v <= c_U
///             v_L <= v <= v_U
/// ```
///
/// `H = None` makes it an LP. `initial_point` is a warm-start hint.
pub struct QpProblem<'a> {
    pub hessian: Option<&'a SymmetricCoo>,
    pub gradient: &'a [f64],
    /// Row-indexed (CSR) constraint matrix.
    pub jacobian: &'a CsMat<f64>,
    pub variable_bounds: &'a [Range],
    pub constraint_bounds: &'a [Range],
    pub initial_point: &'a [f64],
}

impl<'a> QpProblem<'a> {
    pub fn num_variables(&self) -> usize {
        self.gradient.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraint_bounds.len()
    }
}

/// Solution of a QP/LP solve.
///
/// Multiplier convention: `H v + g - A^T lambda - z_L + z_U = 0` with
/// `z_L, z_U >= 0`; `lambda_j >= 0` when the lower side of row `j` is
/// active, `lambda_j <= 0` at the upper side.
#[derive(Debug, Clone)]
pub struct QpSolution {
    pub primals: Vec<f64>,
    pub constraint_multipliers: Vec<f64>,
    pub lower_bound_multipliers: Vec<f64>,
    pub upper_bound_multipliers: Vec<f64>,
    pub status: QpStatus,
    /// Objective value of the QP at the returned point.
    pub objective: f64,
    pub iterations: usize,
}

/// A convex QP/LP solver primitive.
pub trait QpSolver {
    /// Size workspaces for problems of at most `num_variables` variables
    /// and `num_constraints` constraints.
    fn allocate(&mut self, num_variables: usize, num_constraints: usize);

    fn solve(&mut self, problem: &QpProblem) -> Result<QpSolution, SolverError>;
}

/// Build a QP solver backend by name.
pub fn create_qp_solver(name: &str) -> Result<Box<dyn QpSolver>, SolverError> {
    match name {
        "ipqp" => Ok(Box::new(qp_ipm::InteriorPointQpSolver::new())),
        other => Err(SolverError::invalid_option(
            "QP_solver",
            format!("unknown QP solver {:?}; available: ipqp", other),
        )),
    }
}
