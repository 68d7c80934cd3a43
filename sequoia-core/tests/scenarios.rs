//! End-to-end solves of small analytic problems.

use sequoia_core::linalg::coo::SymmetricCoo;
use sequoia_core::{minimize, Model, Options, Range, SolveStatus, SolverError};
use sprs::{CsMat, TriMat};

// ---------------------------------------------------------------------------
// models

/// Rosenbrock: f(x, y) = (1-x)^2 + 100 (y - x^2)^2, unconstrained.
/// The gradient oracle can carry a deterministic perturbation to emulate a
/// noisy model.
struct Rosenbrock {
    bounds: Vec<Range>,
    constraint_bounds: Vec<Range>,
    gradient_noise: f64,
}

impl Rosenbrock {
    fn new(gradient_noise: f64) -> Self {
        Self {
            bounds: vec![Range::UNBOUNDED; 2],
            constraint_bounds: Vec::new(),
            gradient_noise,
        }
    }
}

impl Model for Rosenbrock {
    fn num_variables(&self) -> usize {
        2
    }
    fn num_constraints(&self) -> usize {
        0
    }
    fn variable_bounds(&self) -> &[Range] {
        &self.bounds
    }
    fn constraint_bounds(&self) -> &[Range] {
        &self.constraint_bounds
    }
    fn initial_primals(&self) -> Vec<f64> {
        vec![-1.2, 1.0]
    }
    fn objective(&self, x: &[f64]) -> Result<f64, SolverError> {
        Ok((1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2))
    }
    fn objective_gradient(&self, x: &[f64]) -> Result<Vec<f64>, SolverError> {
        let c = x[1] - x[0] * x[0];
        let mut gradient = vec![-2.0 * (1.0 - x[0]) - 400.0 * x[0] * c, 200.0 * c];
        if self.gradient_noise > 0.0 {
            // a perturbation along the gradient itself: the reported
            // stationarity never drops below the noise level, while the
            // direction stays a descent direction
            let length = (gradient[0] * gradient[0] + gradient[1] * gradient[1]).sqrt();
            if length > 1e-300 {
                let scale = 1.0 + self.gradient_noise / length;
                gradient[0] *= scale;
                gradient[1] *= scale;
            }
        }
        Ok(gradient)
    }
    fn constraints(&self, _x: &[f64]) -> Result<Vec<f64>, SolverError> {
        Ok(Vec::new())
    }
    fn jacobian(&self, _x: &[f64]) -> Result<CsMat<f64>, SolverError> {
        Ok(TriMat::new((0, 2)).to_csr())
    }
    fn lagrangian_hessian(
        &self,
        x: &[f64],
        objective_multiplier: f64,
        _multipliers: &[f64],
    ) -> Result<SymmetricCoo, SolverError> {
        let mut hessian = SymmetricCoo::new(2);
        let s = objective_multiplier;
        hessian.insert(0, 0, s * (2.0 - 400.0 * x[1] + 1200.0 * x[0] * x[0]));
        hessian.insert(1, 0, s * (-400.0 * x[0]));
        hessian.insert(1, 1, s * 200.0);
        Ok(hessian)
    }
}

/// HS071: min x1 x4 (x1 + x2 + x3) + x3
/// s.t. x1 x2 x3 x4 >= 25, x1^2 + x2^2 + x3^2 + x4^2 = 40, 1 <= x <= 5.
struct Hs071 {
    bounds: Vec<Range>,
    constraint_bounds: Vec<Range>,
}

impl Hs071 {
    fn new() -> Self {
        Self {
            bounds: vec![Range::new(1.0, 5.0); 4],
            constraint_bounds: vec![Range::lower_bounded(25.0), Range::equality(40.0)],
        }
    }
}

impl Model for Hs071 {
    fn num_variables(&self) -> usize {
        4
    }
    fn num_constraints(&self) -> usize {
        2
    }
    fn variable_bounds(&self) -> &[Range] {
        &self.bounds
    }
    fn constraint_bounds(&self) -> &[Range] {
        &self.constraint_bounds
    }
    fn initial_primals(&self) -> Vec<f64> {
        vec![1.0, 5.0, 5.0, 1.0]
    }
    fn objective(&self, x: &[f64]) -> Result<f64, SolverError> {
        Ok(x[0] * x[3] * (x[0] + x[1] + x[2]) + x[2])
    }
    fn objective_gradient(&self, x: &[f64]) -> Result<Vec<f64>, SolverError> {
        Ok(vec![
            x[3] * (2.0 * x[0] + x[1] + x[2]),
            x[0] * x[3],
            x[0] * x[3] + 1.0,
            x[0] * (x[0] + x[1] + x[2]),
        ])
    }
    fn constraints(&self, x: &[f64]) -> Result<Vec<f64>, SolverError> {
        Ok(vec![
            x[0] * x[1] * x[2] * x[3],
            x[0] * x[0] + x[1] * x[1] + x[2] * x[2] + x[3] * x[3],
        ])
    }
    fn jacobian(&self, x: &[f64]) -> Result<CsMat<f64>, SolverError> {
        let mut jacobian = TriMat::new((2, 4));
        jacobian.add_triplet(0, 0, x[1] * x[2] * x[3]);
        jacobian.add_triplet(0, 1, x[0] * x[2] * x[3]);
        jacobian.add_triplet(0, 2, x[0] * x[1] * x[3]);
        jacobian.add_triplet(0, 3, x[0] * x[1] * x[2]);
        for i in 0..4 {
            jacobian.add_triplet(1, i, 2.0 * x[i]);
        }
        Ok(jacobian.to_csr())
    }
    fn lagrangian_hessian(
        &self,
        x: &[f64],
        objective_multiplier: f64,
        multipliers: &[f64],
    ) -> Result<SymmetricCoo, SolverError> {
        let s = objective_multiplier;
        let l1 = multipliers[0];
        let l2 = multipliers[1];
        let mut hessian = SymmetricCoo::new(4);
        // s*f'' - l1*c1'' - l2*c2''
        hessian.insert(0, 0, s * 2.0 * x[3] - l2 * 2.0);
        hessian.insert(1, 0, s * x[3] - l1 * x[2] * x[3]);
        hessian.insert(1, 1, -l2 * 2.0);
        hessian.insert(2, 0, s * x[3] - l1 * x[1] * x[3]);
        hessian.insert(2, 1, -l1 * x[0] * x[3]);
        hessian.insert(2, 2, -l2 * 2.0);
        hessian.insert(3, 0, s * (2.0 * x[0] + x[1] + x[2]) - l1 * x[1] * x[2]);
        hessian.insert(3, 1, s * x[0] - l1 * x[0] * x[2]);
        hessian.insert(3, 2, s * x[0] - l1 * x[0] * x[1]);
        hessian.insert(3, 3, -l2 * 2.0);
        Ok(hessian)
    }
}

/// Infeasible toy: min x s.t. x <= -1 and x >= 1.
struct InfeasibleToy {
    bounds: Vec<Range>,
    constraint_bounds: Vec<Range>,
}

impl InfeasibleToy {
    fn new() -> Self {
        Self {
            bounds: vec![Range::UNBOUNDED],
            constraint_bounds: vec![Range::upper_bounded(-1.0), Range::lower_bounded(1.0)],
        }
    }
}

impl Model for InfeasibleToy {
    fn num_variables(&self) -> usize {
        1
    }
    fn num_constraints(&self) -> usize {
        2
    }
    fn variable_bounds(&self) -> &[Range] {
        &self.bounds
    }
    fn constraint_bounds(&self) -> &[Range] {
        &self.constraint_bounds
    }
    fn initial_primals(&self) -> Vec<f64> {
        vec![0.0]
    }
    fn objective(&self, x: &[f64]) -> Result<f64, SolverError> {
        Ok(x[0])
    }
    fn objective_gradient(&self, _x: &[f64]) -> Result<Vec<f64>, SolverError> {
        Ok(vec![1.0])
    }
    fn constraints(&self, x: &[f64]) -> Result<Vec<f64>, SolverError> {
        Ok(vec![x[0], x[0]])
    }
    fn jacobian(&self, _x: &[f64]) -> Result<CsMat<f64>, SolverError> {
        let mut jacobian = TriMat::new((2, 1));
        jacobian.add_triplet(0, 0, 1.0);
        jacobian.add_triplet(1, 0, 1.0);
        Ok(jacobian.to_csr())
    }
    fn lagrangian_hessian(
        &self,
        _x: &[f64],
        _objective_multiplier: f64,
        _multipliers: &[f64],
    ) -> Result<SymmetricCoo, SolverError> {
        Ok(SymmetricCoo::new(1))
    }
}

/// Degenerate equality pair: min x1^2 s.t. x1 + x2 = 1, x1 - x2 = 1.
struct DegenerateEquality {
    bounds: Vec<Range>,
    constraint_bounds: Vec<Range>,
}

impl DegenerateEquality {
    fn new() -> Self {
        Self {
            bounds: vec![Range::UNBOUNDED; 2],
            constraint_bounds: vec![Range::equality(1.0), Range::equality(1.0)],
        }
    }
}

impl Model for DegenerateEquality {
    fn num_variables(&self) -> usize {
        2
    }
    fn num_constraints(&self) -> usize {
        2
    }
    fn variable_bounds(&self) -> &[Range] {
        &self.bounds
    }
    fn constraint_bounds(&self) -> &[Range] {
        &self.constraint_bounds
    }
    fn initial_primals(&self) -> Vec<f64> {
        vec![0.0, 0.0]
    }
    fn objective(&self, x: &[f64]) -> Result<f64, SolverError> {
        Ok(x[0] * x[0])
    }
    fn objective_gradient(&self, x: &[f64]) -> Result<Vec<f64>, SolverError> {
        Ok(vec![2.0 * x[0], 0.0])
    }
    fn constraints(&self, x: &[f64]) -> Result<Vec<f64>, SolverError> {
        Ok(vec![x[0] + x[1], x[0] - x[1]])
    }
    fn jacobian(&self, _x: &[f64]) -> Result<CsMat<f64>, SolverError> {
        let mut jacobian = TriMat::new((2, 2));
        jacobian.add_triplet(0, 0, 1.0);
        jacobian.add_triplet(0, 1, 1.0);
        jacobian.add_triplet(1, 0, 1.0);
        jacobian.add_triplet(1, 1, -1.0);
        Ok(jacobian.to_csr())
    }
    fn lagrangian_hessian(
        &self,
        _x: &[f64],
        objective_multiplier: f64,
        _multipliers: &[f64],
    ) -> Result<SymmetricCoo, SolverError> {
        let mut hessian = SymmetricCoo::new(2);
        hessian.insert(0, 0, 2.0 * objective_multiplier);
        Ok(hessian)
    }
}

/// Conflicting circle: min x1 s.t. x1^2 + x2^2 <= 1 and x1 >= 2.
/// The two constraints are jointly infeasible; the nearest violation
/// minimizer is (1, 0).
struct ConflictingCircle {
    bounds: Vec<Range>,
    constraint_bounds: Vec<Range>,
}

impl ConflictingCircle {
    fn new() -> Self {
        Self {
            bounds: vec![Range::UNBOUNDED; 2],
            constraint_bounds: vec![Range::upper_bounded(1.0), Range::lower_bounded(2.0)],
        }
    }
}

impl Model for ConflictingCircle {
    fn num_variables(&self) -> usize {
        2
    }
    fn num_constraints(&self) -> usize {
        2
    }
    fn variable_bounds(&self) -> &[Range] {
        &self.bounds
    }
    fn constraint_bounds(&self) -> &[Range] {
        &self.constraint_bounds
    }
    fn initial_primals(&self) -> Vec<f64> {
        vec![0.0, 0.0]
    }
    fn objective(&self, x: &[f64]) -> Result<f64, SolverError> {
        Ok(x[0])
    }
    fn objective_gradient(&self, _x: &[f64]) -> Result<Vec<f64>, SolverError> {
        Ok(vec![1.0, 0.0])
    }
    fn constraints(&self, x: &[f64]) -> Result<Vec<f64>, SolverError> {
        Ok(vec![x[0] * x[0] + x[1] * x[1], x[0]])
    }
    fn jacobian(&self, x: &[f64]) -> Result<CsMat<f64>, SolverError> {
        let mut jacobian = TriMat::new((2, 2));
        jacobian.add_triplet(0, 0, 2.0 * x[0]);
        jacobian.add_triplet(0, 1, 2.0 * x[1]);
        jacobian.add_triplet(1, 0, 1.0);
        Ok(jacobian.to_csr())
    }
    fn lagrangian_hessian(
        &self,
        _x: &[f64],
        _objective_multiplier: f64,
        multipliers: &[f64],
    ) -> Result<SymmetricCoo, SolverError> {
        let mut hessian = SymmetricCoo::new(2);
        hessian.insert(0, 0, -2.0 * multipliers[0]);
        hessian.insert(1, 1, -2.0 * multipliers[0]);
        Ok(hessian)
    }
}

// ---------------------------------------------------------------------------
// scenarios

#[test]
fn rosenbrock_converges_to_kkt_point() {
    let model = Rosenbrock::new(0.0);
    let result = minimize(&model, &Options::new()).unwrap();

    assert_eq!(result.status, SolveStatus::KktPoint);
    assert!((result.x[0] - 1.0).abs() <= 1e-6, "x = {:?}", result.x);
    assert!((result.x[1] - 1.0).abs() <= 1e-6, "x = {:?}", result.x);
    assert!(
        result.info.stationarity <= 1e-8,
        "stationarity = {:e}",
        result.info.stationarity
    );
    assert!(
        result.info.iterations <= 30,
        "iterations = {}",
        result.info.iterations
    );
}

#[test]
fn hs071_reaches_known_optimum() {
    let model = Hs071::new();
    let mut options = Options::new();
    options.set_str("constraint_relaxation", "l1_relaxation");
    let result = minimize(&model, &options).unwrap();

    assert_eq!(result.status, SolveStatus::KktPoint);
    assert!(
        (result.objective - 17.0140173).abs() <= 1e-4,
        "objective = {}",
        result.objective
    );
    assert!(result.infeasibility <= 1e-7);
    assert!(result.info.iterations <= 100);
    // x1 sits at its lower bound
    assert!((result.x[0] - 1.0).abs() <= 1e-5);
}

#[test]
fn infeasible_toy_is_an_fj_point_with_zero_penalty() {
    let model = InfeasibleToy::new();
    let mut options = Options::new();
    options.set_str("constraint_relaxation", "l1_relaxation");
    let result = minimize(&model, &options).unwrap();

    assert_eq!(result.status, SolveStatus::FjPoint);
    assert_eq!(result.info.penalty_parameter, 0.0);
    assert!(result.info.iterations <= 20);
    // the whole segment [-1, 1] is violation-stationary with violation 2
    assert!((result.infeasibility - 2.0).abs() <= 1e-6);
}

#[test]
fn degenerate_equalities_solved_in_a_step() {
    let model = DegenerateEquality::new();
    let result = minimize(&model, &Options::new()).unwrap();

    assert_eq!(result.status, SolveStatus::KktPoint);
    assert!((result.x[0] - 1.0).abs() <= 1e-8, "x = {:?}", result.x);
    assert!(result.x[1].abs() <= 1e-8, "x = {:?}", result.x);
    assert!(result.info.iterations <= 3);
}

#[test]
fn conflicting_constraints_trigger_restoration() {
    let model = ConflictingCircle::new();
    let mut options = Options::new();
    options.set_str("constraint_relaxation", "feasibility_restoration");
    options.set_str("globalization_mechanism", "trust_region");
    let result = minimize(&model, &options).unwrap();

    assert_eq!(result.status, SolveStatus::FjPoint);
    // the violation minimizer is (1, 0) with x1 >= 2 still violated
    assert!((result.x[0] - 1.0).abs() <= 1e-4, "x = {:?}", result.x);
    assert!(result.x[1].abs() <= 1e-4, "x = {:?}", result.x);
    assert!(result.infeasibility >= 0.5);
    assert!(result.info.iterations <= 50);
}

#[test]
fn noisy_gradient_terminates_on_loose_tolerance() {
    let model = Rosenbrock::new(1e-9);
    let mut options = Options::new();
    options.set_float("tolerance", 1e-16);
    options.set_float("loose_tolerance", 1e-6);
    options.set_int("loose_tolerance_consecutive_iteration_threshold", 3);
    let result = minimize(&model, &options).unwrap();

    assert_eq!(result.status, SolveStatus::KktPoint);
    assert!(result.info.loose_tolerance_used);
    assert!((result.x[0] - 1.0).abs() <= 1e-4);
    assert!((result.x[1] - 1.0).abs() <= 1e-4);
    // the reported stationarity floor sits at the noise level
    assert!(result.info.stationarity > 1e-16);
    assert!(result.info.stationarity <= 1e-6);
}

/// Bounded quadratic: min (x - 2)^2 over x in [0, 1]; minimizer x = 1 at
/// the upper bound.
struct BoundedQuadratic {
    bounds: Vec<Range>,
    constraint_bounds: Vec<Range>,
}

impl BoundedQuadratic {
    fn new() -> Self {
        Self {
            bounds: vec![Range::new(0.0, 1.0)],
            constraint_bounds: Vec::new(),
        }
    }
}

impl Model for BoundedQuadratic {
    fn num_variables(&self) -> usize {
        1
    }
    fn num_constraints(&self) -> usize {
        0
    }
    fn variable_bounds(&self) -> &[Range] {
        &self.bounds
    }
    fn constraint_bounds(&self) -> &[Range] {
        &self.constraint_bounds
    }
    fn initial_primals(&self) -> Vec<f64> {
        vec![0.5]
    }
    fn objective(&self, x: &[f64]) -> Result<f64, SolverError> {
        Ok((x[0] - 2.0).powi(2))
    }
    fn objective_gradient(&self, x: &[f64]) -> Result<Vec<f64>, SolverError> {
        Ok(vec![2.0 * (x[0] - 2.0)])
    }
    fn constraints(&self, _x: &[f64]) -> Result<Vec<f64>, SolverError> {
        Ok(Vec::new())
    }
    fn jacobian(&self, _x: &[f64]) -> Result<CsMat<f64>, SolverError> {
        Ok(TriMat::new((0, 1)).to_csr())
    }
    fn lagrangian_hessian(
        &self,
        _x: &[f64],
        objective_multiplier: f64,
        _multipliers: &[f64],
    ) -> Result<SymmetricCoo, SolverError> {
        let mut hessian = SymmetricCoo::new(1);
        hessian.insert(0, 0, 2.0 * objective_multiplier);
        Ok(hessian)
    }
}

#[test]
fn interior_point_subproblem_solves_rosenbrock() {
    let model = Rosenbrock::new(0.0);
    let mut options = Options::new();
    options.set_str("subproblem", "primal_dual_interior_point");
    options.set_float("tolerance", 1e-6);
    let result = minimize(&model, &options).unwrap();

    assert_eq!(result.status, SolveStatus::KktPoint);
    assert!((result.x[0] - 1.0).abs() <= 1e-4, "x = {:?}", result.x);
    assert!((result.x[1] - 1.0).abs() <= 1e-4, "x = {:?}", result.x);
    assert!(result.info.iterations <= 100);
}

#[test]
fn interior_point_subproblem_handles_active_bound() {
    let model = BoundedQuadratic::new();
    let mut options = Options::new();
    options.set_str("subproblem", "primal_dual_interior_point");
    options.set_float("tolerance", 1e-6);
    let result = minimize(&model, &options).unwrap();

    assert_eq!(result.status, SolveStatus::KktPoint);
    assert!((result.x[0] - 1.0).abs() <= 1e-4, "x = {:?}", result.x);
    // the upper-bound multiplier converges to |f'(1)| = 2
    assert!(
        (result.multipliers.upper_bounds[0] - 2.0).abs() <= 1e-2,
        "z_U = {:?}",
        result.multipliers.upper_bounds
    );
    assert!(result.info.iterations <= 300);
}

#[test]
fn statistics_rows_cover_every_iteration() {
    let model = Rosenbrock::new(0.0);
    let result = minimize(&model, &Options::new()).unwrap();
    // one initial row plus one per accepted iteration
    assert_eq!(result.statistics.len(), result.info.iterations + 1);
    assert_eq!(result.statistics[0].status, "initial");
}

#[test]
fn penalty_parameter_is_monotone() {
    let model = InfeasibleToy::new();
    let mut options = Options::new();
    options.set_str("constraint_relaxation", "l1_relaxation");
    let result = minimize(&model, &options).unwrap();
    let mut previous = 1.0_f64;
    for row in &result.statistics {
        assert!(row.penalty_parameter <= previous + 1e-15);
        previous = row.penalty_parameter;
    }
}

#[test]
fn invalid_options_are_surfaced_before_iterating() {
    let model = Rosenbrock::new(0.0);
    let mut options = Options::new();
    options.set_str("subproblem", "SOCP");
    assert!(minimize(&model, &options).is_err());
}
