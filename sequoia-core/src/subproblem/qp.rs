//! QP inequality-handling method.
//!
//! Minimizes the quadratic model
//! `(1/2) d^T H d + s*grad_f^T d (+ 1^T e)` over the linearized
//! constraints and the (trust-region-clipped) bound box, with H from the
//! configured Hessian model.

use super::{build_local_model, LocalModel, SubproblemRequest};
use crate::direction::{Direction, OptimalityReductionModel, SubproblemStatus};
use crate::error::SolverError;
use crate::hessian::HessianModel;
use crate::iterate::Iterate;
use crate::linalg::vector::dot;
use crate::model::Model;
use crate::options::Settings;
use crate::solvers::{create_qp_solver, QpProblem, QpSolver, QpStatus};

const PARTITION_TOLERANCE: f64 = 1e-9;

pub struct QpSubproblem {
    hessian_model: HessianModel,
    qp_solver: Box<dyn QpSolver>,
    pub subproblems_solved: usize,
    pub hessian_evaluations: usize,
}

impl QpSubproblem {
    pub fn from_settings(settings: &Settings) -> Result<Self, SolverError> {
        Ok(Self {
            hessian_model: HessianModel::from_settings(settings)?,
            qp_solver: create_qp_solver(&settings.qp_solver)?,
            subproblems_solved: 0,
            hessian_evaluations: 0,
        })
    }

    pub fn solve(
        &mut self,
        model: &dyn Model,
        iterate: &mut Iterate,
        request: &SubproblemRequest,
    ) -> Result<Direction, SolverError> {
        let hessian = self.hessian_model.evaluate(
            model,
            &iterate.x,
            request.objective_multiplier,
            &iterate.multipliers.constraints,
        )?;
        self.hessian_evaluations += 1;
        let local = build_local_model(model, iterate, hessian, request)?;
        let direction = solve_local_qp(
            self.qp_solver.as_mut(),
            model,
            iterate,
            &local,
            request,
        )?;
        self.subproblems_solved += 1;
        Ok(direction)
    }
}

/// Solve an assembled local model with a QP solver and unpack the
/// direction. Shared with the LP method.
pub(super) fn solve_local_qp(
    qp_solver: &mut dyn QpSolver,
    model: &dyn Model,
    iterate: &Iterate,
    local: &LocalModel,
    request: &SubproblemRequest,
) -> Result<Direction, SolverError> {
    let n = local.num_original;
    qp_solver.allocate(n + local.num_elastic, local.constraint_bounds.len());
    let problem = QpProblem {
        hessian: if local.hessian.nnz() > 0 {
            Some(&local.hessian)
        } else {
            None
        },
        gradient: &local.gradient,
        jacobian: &local.jacobian,
        variable_bounds: &local.variable_bounds,
        constraint_bounds: &local.constraint_bounds,
        initial_point: &local.initial_point,
    };
    let solution = qp_solver.solve(&problem)?;

    let mut direction = Direction::error(n, model.num_constraints());
    direction.primals = solution.primals[..n].to_vec();
    direction.elastics = solution.primals[n..].to_vec();
    direction.constraint_multipliers = solution.constraint_multipliers;
    direction.lower_bound_multipliers = solution.lower_bound_multipliers[..n].to_vec();
    direction.upper_bound_multipliers = solution.upper_bound_multipliers[..n].to_vec();
    direction.objective_multiplier = request.objective_multiplier;
    direction.phase = request.phase;
    direction.subproblem_objective = solution.objective;
    direction.status = match solution.status {
        QpStatus::Optimal | QpStatus::Suboptimal => SubproblemStatus::Optimal,
        QpStatus::Infeasible => SubproblemStatus::Infeasible,
        QpStatus::Unbounded => SubproblemStatus::Unbounded,
    };
    direction.optimality_reduction = OptimalityReductionModel {
        directional_derivative: dot(iterate.objective_gradient(), &direction.primals),
        curvature: local.hessian.quadratic_form(&solution.primals),
    };
    if let Some(elastics) = request.elastics {
        direction.constraint_partition =
            Some(elastics.partition(&direction.elastics, PARTITION_TOLERANCE));
    }
    direction.update_norm();
    Ok(direction)
}
