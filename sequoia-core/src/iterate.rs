//! Iterates: primal-dual points with memoized oracle evaluations.
//!
//! An iterate owns the caches of its oracle evaluations; each oracle kind
//! is evaluated at most once per iterate. The caches are `Option`-backed
//! and filled through `&mut` accessors, so the single-mutator lifecycle is
//! enforced by the borrow checker rather than by evaluation flags.

use crate::direction::Direction;
use crate::error::SolverError;
use crate::linalg::vector::{all_finite, norm_1};
use crate::model::Model;
use sprs::CsMat;

/// Dual variables of the NLP.
#[derive(Debug, Clone)]
pub struct Multipliers {
    /// Constraint multipliers.
    pub constraints: Vec<f64>,
    /// Lower-bound multipliers, nonnegative.
    pub lower_bounds: Vec<f64>,
    /// Upper-bound multipliers, nonnegative.
    pub upper_bounds: Vec<f64>,
    /// Objective multiplier.
    pub objective: f64,
}

impl Multipliers {
    pub fn zero(num_variables: usize, num_constraints: usize) -> Self {
        Self {
            constraints: vec![0.0; num_constraints],
            lower_bounds: vec![0.0; num_variables],
            upper_bounds: vec![0.0; num_variables],
            objective: 1.0,
        }
    }

    /// Sum of the L1 norms of all dual variables.
    pub fn norm_1(&self) -> f64 {
        norm_1(&self.constraints) + norm_1(&self.lower_bounds) + norm_1(&self.upper_bounds)
    }
}

/// Scaled optimality measure: the objective in the optimality phase, the
/// constraint violation in restoration.
#[derive(Debug, Clone, Copy)]
pub enum ScaledOptimality {
    Objective(f64),
    ConstraintViolation(f64),
}

impl ScaledOptimality {
    pub fn evaluate(&self, objective_multiplier: f64) -> f64 {
        match *self {
            ScaledOptimality::Objective(f) => objective_multiplier * f,
            ScaledOptimality::ConstraintViolation(v) => v,
        }
    }
}

/// Progress measures used by the globalization strategies.
#[derive(Debug, Clone, Copy)]
pub struct ProgressMeasures {
    pub infeasibility: f64,
    pub scaled_optimality: ScaledOptimality,
    /// Barrier term of the interior-point subproblem; 0 for QP/LP.
    pub unscaled_optimality: f64,
}

impl ProgressMeasures {
    pub fn unset() -> Self {
        Self {
            infeasibility: 0.0,
            scaled_optimality: ScaledOptimality::Objective(0.0),
            unscaled_optimality: 0.0,
        }
    }

    /// Scalar merit `phi = s*f + h (+ barrier)`.
    pub fn merit(&self, objective_multiplier: f64) -> f64 {
        self.infeasibility
            + self.scaled_optimality.evaluate(objective_multiplier)
            + self.unscaled_optimality
    }
}

/// Scaled dual residuals of an iterate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DualResiduals {
    pub stationarity: f64,
    pub complementarity: f64,
    /// Residuals with a zero objective multiplier (Fritz-John).
    pub fj_stationarity: f64,
    pub fj_complementarity: f64,
}

/// First-order classification of an iterate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    NotOptimal,
    KktPoint,
    FjPoint,
    FeasibleSmallStep,
    InfeasibleSmallStep,
}

/// A primal-dual point with cached evaluations and progress accounting.
#[derive(Debug, Clone)]
pub struct Iterate {
    pub x: Vec<f64>,
    pub multipliers: Multipliers,
    objective: Option<f64>,
    objective_gradient: Option<Vec<f64>>,
    constraints: Option<Vec<f64>>,
    jacobian: Option<CsMat<f64>>,
    pub progress: ProgressMeasures,
    pub residuals: DualResiduals,
    pub status: TerminationStatus,
}

impl Iterate {
    pub fn new(x: Vec<f64>, multipliers: Multipliers) -> Self {
        Self {
            x,
            multipliers,
            objective: None,
            objective_gradient: None,
            constraints: None,
            jacobian: None,
            progress: ProgressMeasures::unset(),
            residuals: DualResiduals::default(),
            status: TerminationStatus::NotOptimal,
        }
    }

    /// Build the trial point `x + a*d`, `m + a*(m_hat - m)` from a
    /// direction. Caches start empty: evaluations at the trial happen at
    /// most once, after those of the current iterate.
    pub fn trial(current: &Iterate, direction: &Direction, step_length: f64) -> Self {
        let mut x = current.x.clone();
        for (xi, &di) in x.iter_mut().zip(direction.primals.iter()) {
            *xi += step_length * di;
        }
        let interpolate = |from: &[f64], to: &[f64]| -> Vec<f64> {
            from.iter()
                .zip(to.iter())
                .map(|(&a, &b)| a + step_length * (b - a))
                .collect()
        };
        let multipliers = Multipliers {
            constraints: interpolate(
                &current.multipliers.constraints,
                &direction.constraint_multipliers,
            ),
            lower_bounds: interpolate(
                &current.multipliers.lower_bounds,
                &direction.lower_bound_multipliers,
            ),
            upper_bounds: interpolate(
                &current.multipliers.upper_bounds,
                &direction.upper_bound_multipliers,
            ),
            objective: current.multipliers.objective,
        };
        Iterate::new(x, multipliers)
    }

    /// Evaluate and cache the objective (sign-adjusted for maximization).
    pub fn evaluate_objective(&mut self, model: &dyn Model) -> Result<f64, SolverError> {
        if self.objective.is_none() {
            let value = model.objective_sign() * model.objective(&self.x)?;
            if !value.is_finite() {
                return Err(SolverError::Oracle(
                    "objective evaluated to a non-finite value".to_string(),
                ));
            }
            self.objective = Some(value);
        }
        Ok(self.objective.unwrap())
    }

    pub fn evaluate_objective_gradient(&mut self, model: &dyn Model) -> Result<(), SolverError> {
        if self.objective_gradient.is_none() {
            let mut gradient = model.objective_gradient(&self.x)?;
            if model.objective_sign() < 0.0 {
                for g in gradient.iter_mut() {
                    *g = -*g;
                }
            }
            if !all_finite(&gradient) {
                return Err(SolverError::Oracle(
                    "objective gradient has non-finite entries".to_string(),
                ));
            }
            self.objective_gradient = Some(gradient);
        }
        Ok(())
    }

    pub fn evaluate_constraints(&mut self, model: &dyn Model) -> Result<(), SolverError> {
        if self.constraints.is_none() {
            let constraints = model.constraints(&self.x)?;
            if !all_finite(&constraints) {
                return Err(SolverError::Oracle(
                    "constraints have non-finite entries".to_string(),
                ));
            }
            self.constraints = Some(constraints);
        }
        Ok(())
    }

    pub fn evaluate_jacobian(&mut self, model: &dyn Model) -> Result<(), SolverError> {
        if self.jacobian.is_none() {
            self.jacobian = Some(model.jacobian(&self.x)?);
        }
        Ok(())
    }

    /// Cached objective. Panics when not evaluated.
    pub fn objective(&self) -> f64 {
        self.objective.expect("objective was not evaluated")
    }

    pub fn objective_gradient(&self) -> &[f64] {
        self.objective_gradient
            .as_deref()
            .expect("objective gradient was not evaluated")
    }

    pub fn constraints(&self) -> &[f64] {
        self.constraints
            .as_deref()
            .expect("constraints were not evaluated")
    }

    pub fn jacobian(&self) -> &CsMat<f64> {
        self.jacobian
            .as_ref()
            .expect("Jacobian was not evaluated")
    }

    pub fn has_constraints(&self) -> bool {
        self.constraints.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::{Direction, SubproblemStatus};
    use crate::linalg::coo::SymmetricCoo;
    use crate::model::Range;
    use sprs::TriMat;

    struct CountingModel {
        bounds: Vec<Range>,
        constraint_bounds: Vec<Range>,
        calls: std::cell::Cell<usize>,
    }

    impl CountingModel {
        fn new() -> Self {
            Self {
                bounds: vec![Range::UNBOUNDED; 2],
                constraint_bounds: Vec::new(),
                calls: std::cell::Cell::new(0),
            }
        }
    }

    impl Model for CountingModel {
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
            vec![0.0, 0.0]
        }
        fn objective(&self, x: &[f64]) -> Result<f64, SolverError> {
            self.calls.set(self.calls.get() + 1);
            Ok(x[0] * x[0] + x[1] * x[1])
        }
        fn objective_gradient(&self, x: &[f64]) -> Result<Vec<f64>, SolverError> {
            Ok(vec![2.0 * x[0], 2.0 * x[1]])
        }
        fn constraints(&self, _x: &[f64]) -> Result<Vec<f64>, SolverError> {
            Ok(Vec::new())
        }
        fn jacobian(&self, _x: &[f64]) -> Result<sprs::CsMat<f64>, SolverError> {
            Ok(TriMat::new((0, 2)).to_csr())
        }
        fn lagrangian_hessian(
            &self,
            _x: &[f64],
            objective_multiplier: f64,
            _multipliers: &[f64],
        ) -> Result<SymmetricCoo, SolverError> {
            let mut hessian = SymmetricCoo::new(2);
            hessian.insert(0, 0, 2.0 * objective_multiplier);
            hessian.insert(1, 1, 2.0 * objective_multiplier);
            Ok(hessian)
        }
    }

    #[test]
    fn test_objective_evaluated_once() {
        let model = CountingModel::new();
        let mut iterate = Iterate::new(vec![1.0, 2.0], Multipliers::zero(2, 0));
        assert_eq!(iterate.evaluate_objective(&model).unwrap(), 5.0);
        assert_eq!(iterate.evaluate_objective(&model).unwrap(), 5.0);
        assert_eq!(model.calls.get(), 1);
    }

    #[test]
    fn test_trial_interpolates_multipliers() {
        let current = Iterate::new(vec![0.0], {
            let mut m = Multipliers::zero(1, 1);
            m.constraints[0] = 1.0;
            m
        });
        let mut direction = Direction::error(1, 1);
        direction.primals = vec![2.0];
        direction.constraint_multipliers = vec![3.0];
        direction.status = SubproblemStatus::Optimal;

        let trial = Iterate::trial(&current, &direction, 0.5);
        assert_eq!(trial.x, vec![1.0]);
        // lambda + a*(lambda_hat - lambda) = 1 + 0.5*(3 - 1) = 2
        assert_eq!(trial.multipliers.constraints, vec![2.0]);
    }
}
