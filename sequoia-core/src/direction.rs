//! Search directions produced by the subproblem layer.

use crate::linalg::vector::norm_inf;

/// Outcome of a local subproblem solve.
///
/// Infeasibility and unboundedness are ordinary values here, not errors:
/// the constraint-relaxation layer branches on them (phase switch,
/// trust-region shrink).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubproblemStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Error,
}

/// Phase of the constraint-relaxation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Optimality,
    FeasibilityRestoration,
}

/// Feasibility of one constraint at a trial point, by the sign of its
/// slack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintFeasibility {
    Feasible,
    InfeasibleLower,
    InfeasibleUpper,
}

/// Partition of the constraints into feasible and infeasible sets.
#[derive(Debug, Clone)]
pub struct ConstraintPartition {
    pub feasibility: Vec<ConstraintFeasibility>,
    /// Indices of the infeasible constraints, in order.
    pub infeasible: Vec<usize>,
}

impl ConstraintPartition {
    pub fn all_feasible(num_constraints: usize) -> Self {
        Self {
            feasibility: vec![ConstraintFeasibility::Feasible; num_constraints],
            infeasible: Vec::new(),
        }
    }
}

/// Predicted scaled-optimality reduction of a step, as plain data:
/// `evaluate(a, s) = a * (-s * g^T d) - 0.5 * a^2 * d^T H d`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimalityReductionModel {
    /// `g^T d` with the unscaled objective gradient.
    pub directional_derivative: f64,
    /// `d^T H d` with the (possibly convexified) local Hessian.
    pub curvature: f64,
}

impl OptimalityReductionModel {
    pub fn evaluate(&self, step_length: f64, objective_multiplier: f64) -> f64 {
        step_length
            * (-objective_multiplier * self.directional_derivative
                - 0.5 * step_length * self.curvature)
    }
}

/// A search direction with its local-model multipliers.
#[derive(Debug, Clone)]
pub struct Direction {
    /// Step in the original variables.
    pub primals: Vec<f64>,
    /// Values of the subproblem's elastic variables (empty without
    /// relaxation).
    pub elastics: Vec<f64>,
    /// New constraint-multiplier estimates of the local model.
    pub constraint_multipliers: Vec<f64>,
    /// New lower-bound multiplier estimates (nonnegative).
    pub lower_bound_multipliers: Vec<f64>,
    /// New upper-bound multiplier estimates (nonnegative).
    pub upper_bound_multipliers: Vec<f64>,
    /// Objective multiplier of the local model (0 in restoration).
    pub objective_multiplier: f64,
    pub status: SubproblemStatus,
    pub phase: Phase,
    /// `||primals||_inf`.
    pub norm: f64,
    /// Objective value of the local model at the solution.
    pub subproblem_objective: f64,
    pub constraint_partition: Option<ConstraintPartition>,
    pub optimality_reduction: OptimalityReductionModel,
}

impl Direction {
    pub fn error(num_variables: usize, num_constraints: usize) -> Self {
        Self {
            primals: vec![0.0; num_variables],
            elastics: Vec::new(),
            constraint_multipliers: vec![0.0; num_constraints],
            lower_bound_multipliers: vec![0.0; num_variables],
            upper_bound_multipliers: vec![0.0; num_variables],
            objective_multiplier: 1.0,
            status: SubproblemStatus::Error,
            phase: Phase::Optimality,
            norm: 0.0,
            subproblem_objective: 0.0,
            constraint_partition: None,
            optimality_reduction: OptimalityReductionModel::default(),
        }
    }

    /// Recompute the cached infinity norm of the primal step.
    pub fn update_norm(&mut self) {
        self.norm = norm_inf(&self.primals);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduction_model() {
        let model = OptimalityReductionModel {
            directional_derivative: -2.0,
            curvature: 1.0,
        };
        // a=1, s=1: -(1)(-2) - 0.5*1 = 1.5
        assert!((model.evaluate(1.0, 1.0) - 1.5).abs() < 1e-15);
        // a=0.5, s=0: pure curvature term
        assert!((model.evaluate(0.5, 0.0) + 0.125).abs() < 1e-15);
    }
}
