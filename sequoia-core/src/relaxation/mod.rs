//! Constraint-relaxation strategies.
//!
//! The strategy decides how the original problem and the reformulated
//! feasibility problem alternate: `FeasibilityRestoration` switches
//! phases, `L1Relaxation` drives an exact-penalty parameter. The driver
//! talks to the [`ConstraintRelaxationStrategy`] enum only.

pub mod feasibility_restoration;
pub mod l1_relaxation;

use crate::direction::{Direction, Phase};
use crate::error::SolverError;
use crate::iterate::{DualResiduals, Iterate, ProgressMeasures, ScaledOptimality, TerminationStatus};
use crate::model::{total_violation, Model};
use crate::options::Settings;
use crate::progress;
use crate::subproblem::InequalityHandlingMethod;

pub use feasibility_restoration::FeasibilityRestoration;
pub use l1_relaxation::L1Relaxation;

pub enum ConstraintRelaxationStrategy {
    FeasibilityRestoration(FeasibilityRestoration),
    L1Relaxation(L1Relaxation),
}

impl ConstraintRelaxationStrategy {
    pub fn from_settings(settings: &Settings, model: &dyn Model) -> Result<Self, SolverError> {
        match settings.constraint_relaxation {
            crate::options::RelaxationChoice::FeasibilityRestoration => Ok(
                Self::FeasibilityRestoration(FeasibilityRestoration::new(settings, model)?),
            ),
            crate::options::RelaxationChoice::L1Relaxation => {
                Ok(Self::L1Relaxation(L1Relaxation::new(settings, model)?))
            }
        }
    }

    /// Evaluate the first iterate: progress measures, residuals, status.
    pub fn initialize(
        &mut self,
        model: &dyn Model,
        iterate: &mut Iterate,
    ) -> Result<(), SolverError> {
        match self {
            Self::FeasibilityRestoration(strategy) => strategy.initialize(model, iterate),
            Self::L1Relaxation(strategy) => strategy.initialize(model, iterate),
        }
    }

    pub fn compute_feasible_direction(
        &mut self,
        model: &dyn Model,
        iterate: &mut Iterate,
        trust_region_radius: Option<f64>,
    ) -> Result<Direction, SolverError> {
        match self {
            Self::FeasibilityRestoration(strategy) => {
                strategy.compute_feasible_direction(model, iterate, trust_region_radius)
            }
            Self::L1Relaxation(strategy) => {
                strategy.compute_feasible_direction(model, iterate, trust_region_radius)
            }
        }
    }

    /// Run the globalization test on a trial point. On acceptance the
    /// trial's residuals and termination status are filled in.
    pub fn is_iterate_acceptable(
        &mut self,
        model: &dyn Model,
        current: &mut Iterate,
        trial: &mut Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> Result<bool, SolverError> {
        match self {
            Self::FeasibilityRestoration(strategy) => {
                strategy.is_iterate_acceptable(model, current, trial, direction, step_length)
            }
            Self::L1Relaxation(strategy) => {
                strategy.is_iterate_acceptable(model, current, trial, direction, step_length)
            }
        }
    }

    /// Classify an accepted iterate at the given tolerance. Pure: the
    /// iterate is not modified.
    pub fn classify(
        &self,
        model: &dyn Model,
        iterate: &Iterate,
        tolerance: f64,
        step_norm: f64,
    ) -> TerminationStatus {
        match self {
            Self::FeasibilityRestoration(strategy) => {
                strategy.classify(model, iterate, tolerance, step_norm)
            }
            Self::L1Relaxation(strategy) => {
                strategy.classify(model, iterate, tolerance, step_norm)
            }
        }
    }

    /// Post-process the multipliers of an iterate reported as a KKT point
    /// (the penalty strategy rescales them by `1/rho`).
    pub fn finalize_kkt_multipliers(&self, iterate: &mut Iterate) {
        if let Self::L1Relaxation(strategy) = self {
            strategy.finalize_kkt_multipliers(iterate);
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Self::FeasibilityRestoration(strategy) => strategy.current_phase,
            Self::L1Relaxation(_) => Phase::Optimality,
        }
    }

    pub fn penalty_parameter(&self) -> f64 {
        match self {
            Self::FeasibilityRestoration(_) => 1.0,
            Self::L1Relaxation(strategy) => strategy.penalty_parameter,
        }
    }

    pub fn subproblems_solved(&self) -> usize {
        match self {
            Self::FeasibilityRestoration(strategy) => strategy.subproblem.subproblems_solved(),
            Self::L1Relaxation(strategy) => strategy.subproblem.subproblems_solved(),
        }
    }

    pub fn hessian_evaluations(&self) -> usize {
        match self {
            Self::FeasibilityRestoration(strategy) => strategy.subproblem.hessian_evaluations(),
            Self::L1Relaxation(strategy) => strategy.subproblem.hessian_evaluations(),
        }
    }
}

/// Progress measures of the optimality phase: constraint violation,
/// scaled objective, subproblem barrier term.
pub(crate) fn evaluate_optimality_measures(
    model: &dyn Model,
    subproblem: &InequalityHandlingMethod,
    iterate: &mut Iterate,
    settings: &Settings,
) -> Result<(), SolverError> {
    iterate.evaluate_constraints(model)?;
    iterate.evaluate_objective(model)?;
    let infeasibility = total_violation(
        &iterate.x,
        model.variable_bounds(),
        iterate.constraints(),
        model.constraint_bounds(),
        settings.progress_norm,
    );
    iterate.progress = ProgressMeasures {
        infeasibility,
        scaled_optimality: ScaledOptimality::Objective(iterate.objective()),
        unscaled_optimality: subproblem.unscaled_optimality(model, iterate),
    };
    Ok(())
}

/// Progress measures of the restoration phase: the violation becomes the
/// optimality measure and the infeasibility measure is zero.
pub(crate) fn evaluate_restoration_measures(
    model: &dyn Model,
    subproblem: &InequalityHandlingMethod,
    iterate: &mut Iterate,
    settings: &Settings,
) -> Result<(), SolverError> {
    iterate.evaluate_constraints(model)?;
    let violation = total_violation(
        &iterate.x,
        model.variable_bounds(),
        iterate.constraints(),
        model.constraint_bounds(),
        settings.progress_norm,
    );
    iterate.progress = ProgressMeasures {
        infeasibility: 0.0,
        scaled_optimality: ScaledOptimality::ConstraintViolation(violation),
        unscaled_optimality: subproblem.unscaled_optimality(model, iterate),
    };
    Ok(())
}

/// Fill in the scaled dual residuals of an iterate, at objective
/// multipliers 1 (KKT) and 0 (Fritz-John).
pub(crate) fn compute_dual_residuals(
    model: &dyn Model,
    iterate: &mut Iterate,
    settings: &Settings,
) -> Result<(), SolverError> {
    iterate.evaluate_objective_gradient(model)?;
    iterate.evaluate_constraints(model)?;
    iterate.evaluate_jacobian(model)?;
    let (stationarity, complementarity) = progress::dual_residuals(
        model,
        iterate,
        1.0,
        settings.residual_norm,
        settings.residual_scaling_threshold,
    );
    let (fj_stationarity, fj_complementarity) = progress::dual_residuals(
        model,
        iterate,
        0.0,
        settings.residual_norm,
        settings.residual_scaling_threshold,
    );
    iterate.residuals = DualResiduals {
        stationarity,
        complementarity,
        fj_stationarity,
        fj_complementarity,
    };
    Ok(())
}
