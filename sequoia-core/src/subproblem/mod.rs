//! Inequality-handling methods: the local models solved at each iterate.
//!
//! A subproblem linearizes the NLP around the current iterate in direction
//! space and produces a [`Direction`]. Three methods exist, selected once
//! at build time: QP, LP, and a primal-dual interior-point method. All
//! three operate on the same [`LocalModel`], which optionally carries
//! elastic columns when a constraint-relaxation strategy owns them.

pub mod interior_point;
pub mod lp;
pub mod qp;

use crate::direction::{
    ConstraintFeasibility, ConstraintPartition, Direction, Phase,
};
use crate::error::SolverError;
use crate::iterate::Iterate;
use crate::linalg::coo::SymmetricCoo;
use crate::model::{ConstraintStatus, Model, Range};
use crate::options::{Settings, SubproblemChoice};
use sprs::{CsMat, TriMat};

/// Elastic-variable bookkeeping: which constraint sides carry a
/// nonnegative slack absorbing violation. Elastics are subproblem-local
/// variables appended after the original ones.
#[derive(Debug, Clone)]
pub struct ElasticVariables {
    /// Per constraint: elastic index raising the row value (lower side).
    pub plus: Vec<Option<usize>>,
    /// Per constraint: elastic index lowering the row value (upper side).
    pub minus: Vec<Option<usize>>,
    pub count: usize,
}

impl ElasticVariables {
    pub fn new(constraint_bounds: &[Range]) -> Self {
        let mut plus = Vec::with_capacity(constraint_bounds.len());
        let mut minus = Vec::with_capacity(constraint_bounds.len());
        let mut count = 0;
        for range in constraint_bounds {
            match range.status() {
                ConstraintStatus::Equality | ConstraintStatus::BoundedBothSides => {
                    plus.push(Some(count));
                    minus.push(Some(count + 1));
                    count += 2;
                }
                ConstraintStatus::BoundedLower => {
                    plus.push(Some(count));
                    minus.push(None);
                    count += 1;
                }
                ConstraintStatus::BoundedUpper => {
                    plus.push(None);
                    minus.push(Some(count));
                    count += 1;
                }
                ConstraintStatus::Unbounded => {
                    plus.push(None);
                    minus.push(None);
                }
            }
        }
        Self { plus, minus, count }
    }

    /// Elastic start values from the current constraint slacks.
    pub fn initial_values(&self, constraints: &[f64], bounds: &[Range]) -> Vec<f64> {
        let mut values = vec![0.0; self.count];
        for (j, range) in bounds.iter().enumerate() {
            if let Some(k) = self.plus[j] {
                values[k] = (range.lower - constraints[j]).max(0.0);
            }
            if let Some(k) = self.minus[j] {
                values[k] = (constraints[j] - range.upper).max(0.0);
            }
        }
        values
    }

    /// Sum of the elastic components: the linear model of the violation.
    pub fn linear_model(&self, elastics: &[f64]) -> f64 {
        elastics.iter().sum()
    }

    /// Partition the constraints by the sign of the active elastics.
    pub fn partition(&self, elastics: &[f64], tolerance: f64) -> ConstraintPartition {
        let m = self.plus.len();
        let mut partition = ConstraintPartition::all_feasible(m);
        for j in 0..m {
            let below = self.plus[j].map_or(0.0, |k| elastics[k]);
            let above = self.minus[j].map_or(0.0, |k| elastics[k]);
            if below > tolerance && below >= above {
                partition.feasibility[j] = ConstraintFeasibility::InfeasibleLower;
                partition.infeasible.push(j);
            } else if above > tolerance {
                partition.feasibility[j] = ConstraintFeasibility::InfeasibleUpper;
                partition.infeasible.push(j);
            }
        }
        partition
    }
}

/// What the constraint-relaxation strategy asks the subproblem to solve.
pub struct SubproblemRequest<'a> {
    /// Scales the objective part of the local model (`rho` of the penalty
    /// strategy, 0 in restoration).
    pub objective_multiplier: f64,
    pub elastics: Option<&'a ElasticVariables>,
    pub trust_region_radius: Option<f64>,
    /// Warm start for the original primals.
    pub initial_point: Option<&'a [f64]>,
    pub phase: Phase,
}

/// The local model in direction space: gradient, Hessian and linearized
/// constraints of `min s*f + 1^T e` around the current iterate.
pub struct LocalModel {
    pub num_original: usize,
    pub num_elastic: usize,
    pub objective_multiplier: f64,
    /// Length `n + ne`: scaled objective gradient, then elastic costs.
    pub gradient: Vec<f64>,
    /// Dimension `n + ne`; entries confined to the original block.
    pub hessian: SymmetricCoo,
    /// `m x (n + ne)` row-indexed Jacobian with elastic columns of +-1.
    pub jacobian: CsMat<f64>,
    pub variable_bounds: Vec<Range>,
    pub constraint_bounds: Vec<Range>,
    pub initial_point: Vec<f64>,
}

/// Assemble the local model at an iterate. `hessian` is the
/// (possibly convexified) `n x n` Lagrangian Hessian.
pub fn build_local_model(
    model: &dyn Model,
    iterate: &mut Iterate,
    hessian: SymmetricCoo,
    request: &SubproblemRequest,
) -> Result<LocalModel, SolverError> {
    let n = model.num_variables();
    let m = model.num_constraints();
    let ne = request.elastics.map_or(0, |e| e.count);
    let total = n + ne;

    iterate.evaluate_objective_gradient(model)?;
    iterate.evaluate_constraints(model)?;
    iterate.evaluate_jacobian(model)?;

    let mut gradient = vec![0.0; total];
    for (gi, &value) in gradient.iter_mut().zip(iterate.objective_gradient().iter()) {
        *gi = request.objective_multiplier * value;
    }
    for gi in gradient[n..].iter_mut() {
        *gi = 1.0;
    }

    let mut extended_hessian = SymmetricCoo::with_capacity(total, hessian.nnz());
    hessian.for_each(|row, column, value| extended_hessian.insert(row, column, value));

    let mut jacobian = TriMat::new((m, total));
    for (row, row_view) in iterate.jacobian().outer_iterator().enumerate() {
        for (column, &value) in row_view.iter() {
            jacobian.add_triplet(row, column, value);
        }
    }
    if let Some(elastics) = request.elastics {
        for j in 0..m {
            if let Some(k) = elastics.plus[j] {
                jacobian.add_triplet(j, n + k, 1.0);
            }
            if let Some(k) = elastics.minus[j] {
                jacobian.add_triplet(j, n + k, -1.0);
            }
        }
    }
    let jacobian = jacobian.to_csr();

    let mut variable_bounds = Vec::with_capacity(total);
    for (i, range) in model.variable_bounds().iter().enumerate() {
        let mut lower = range.lower - iterate.x[i];
        let mut upper = range.upper - iterate.x[i];
        if let Some(radius) = request.trust_region_radius {
            lower = lower.max(-radius);
            upper = upper.min(radius);
        }
        variable_bounds.push(Range::new(lower, upper));
    }
    variable_bounds.extend(std::iter::repeat(Range::lower_bounded(0.0)).take(ne));

    let constraints = iterate.constraints();
    let constraint_bounds: Vec<Range> = model
        .constraint_bounds()
        .iter()
        .zip(constraints.iter())
        .map(|(range, &value)| Range::new(range.lower - value, range.upper - value))
        .collect();

    let mut initial_point = vec![0.0; total];
    if let Some(seed) = request.initial_point {
        initial_point[..n.min(seed.len())].copy_from_slice(&seed[..n.min(seed.len())]);
    }
    if let Some(elastics) = request.elastics {
        let values = elastics.initial_values(constraints, model.constraint_bounds());
        initial_point[n..].copy_from_slice(&values);
    }

    Ok(LocalModel {
        num_original: n,
        num_elastic: ne,
        objective_multiplier: request.objective_multiplier,
        gradient,
        hessian: extended_hessian,
        jacobian,
        variable_bounds,
        constraint_bounds,
        initial_point,
    })
}

/// The inequality-handling method chosen at build time.
pub enum InequalityHandlingMethod {
    Qp(qp::QpSubproblem),
    Lp(lp::LpSubproblem),
    InteriorPoint(interior_point::InteriorPointSubproblem),
}

impl InequalityHandlingMethod {
    pub fn from_settings(settings: &Settings) -> Result<Self, SolverError> {
        match settings.subproblem {
            SubproblemChoice::Qp => Ok(Self::Qp(qp::QpSubproblem::from_settings(settings)?)),
            SubproblemChoice::Lp => Ok(Self::Lp(lp::LpSubproblem::from_settings(settings)?)),
            SubproblemChoice::PrimalDualInteriorPoint => Ok(Self::InteriorPoint(
                interior_point::InteriorPointSubproblem::from_settings(settings)?,
            )),
        }
    }

    /// Solve the local model at the iterate and return a direction.
    pub fn solve(
        &mut self,
        model: &dyn Model,
        iterate: &mut Iterate,
        request: &SubproblemRequest,
    ) -> Result<Direction, SolverError> {
        match self {
            Self::Qp(subproblem) => subproblem.solve(model, iterate, request),
            Self::Lp(subproblem) => subproblem.solve(model, iterate, request),
            Self::InteriorPoint(subproblem) => subproblem.solve(model, iterate, request),
        }
    }

    /// The unscaled optimality measure at an iterate: the barrier term of
    /// the interior-point method, 0 otherwise.
    pub fn unscaled_optimality(&self, model: &dyn Model, iterate: &Iterate) -> f64 {
        match self {
            Self::InteriorPoint(subproblem) => subproblem.barrier_term(model, iterate),
            _ => 0.0,
        }
    }

    pub fn subproblems_solved(&self) -> usize {
        match self {
            Self::Qp(subproblem) => subproblem.subproblems_solved,
            Self::Lp(subproblem) => subproblem.subproblems_solved,
            Self::InteriorPoint(subproblem) => subproblem.subproblems_solved,
        }
    }

    pub fn hessian_evaluations(&self) -> usize {
        match self {
            Self::Qp(subproblem) => subproblem.hessian_evaluations,
            Self::Lp(_) => 0,
            Self::InteriorPoint(subproblem) => subproblem.hessian_evaluations,
        }
    }
}
