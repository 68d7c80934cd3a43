//! l1 exact-penalty constraint-relaxation strategy.
//!
//! Reformulates the NLP with nonnegative elastic variables absorbing the
//! constraint violation and minimizes `rho*f(x) + 1^T e`. The penalty
//! parameter follows Byrd, Nocedal and Waltz ("Infeasibility detection
//! and SQP methods for nonlinear optimization"): at each outer step the
//! subproblem is re-solved at geometrically decreasing `rho` until the
//! step recovers a fraction of the violation decrease and of the
//! objective decrease of the ideal (`rho = 0`) subproblem.

use super::{compute_dual_residuals, evaluate_optimality_measures};
use crate::direction::{Direction, Phase};
use crate::error::SolverError;
use crate::globalization::{GlobalizationStrategy, PredictedReduction};
use crate::iterate::{Iterate, Multipliers, TerminationStatus};
use crate::model::{constraint_violation, Model};
use crate::options::Settings;
use crate::progress::{combined_error, linearized_constraint_violation};
use crate::subproblem::{ElasticVariables, InequalityHandlingMethod, SubproblemRequest};

// elastic sums below this are treated as a feasible linearization
const LINEAR_MODEL_TOLERANCE: f64 = 1e-9;

pub struct L1Relaxation {
    pub penalty_parameter: f64,
    pub(crate) subproblem: InequalityHandlingMethod,
    globalization: GlobalizationStrategy,
    elastics: ElasticVariables,
    settings: Settings,
    /// Elastic sum of the direction last returned.
    last_linear_model: f64,
    /// Combined errors of the last accepted iterate, at the current rho
    /// and at rho = 0.
    last_error_rho: f64,
    last_error_zero: f64,
}

impl L1Relaxation {
    pub fn new(settings: &Settings, model: &dyn Model) -> Result<Self, SolverError> {
        Ok(Self {
            penalty_parameter: settings.penalty.rho_init,
            subproblem: InequalityHandlingMethod::from_settings(settings)?,
            globalization: GlobalizationStrategy::from_settings(settings),
            elastics: ElasticVariables::new(model.constraint_bounds()),
            settings: settings.clone(),
            last_linear_model: 0.0,
            last_error_rho: f64::INFINITY,
            last_error_zero: f64::INFINITY,
        })
    }

    pub fn initialize(
        &mut self,
        model: &dyn Model,
        iterate: &mut Iterate,
    ) -> Result<(), SolverError> {
        evaluate_optimality_measures(model, &self.subproblem, iterate, &self.settings)?;
        compute_dual_residuals(model, iterate, &self.settings)?;
        self.last_error_rho =
            combined_error(model, iterate, &iterate.multipliers, self.penalty_parameter);
        self.last_error_zero = combined_error(model, iterate, &iterate.multipliers, 0.0);
        self.globalization.initialize(&iterate.progress);
        iterate.status = self.classify(model, iterate, self.settings.tolerance, f64::INFINITY);
        Ok(())
    }

    fn solve_subproblem(
        &mut self,
        model: &dyn Model,
        iterate: &mut Iterate,
        rho: f64,
        trust_region_radius: Option<f64>,
    ) -> Result<Direction, SolverError> {
        let request = SubproblemRequest {
            objective_multiplier: rho,
            elastics: Some(&self.elastics),
            trust_region_radius,
            initial_point: None,
            phase: Phase::Optimality,
        };
        self.subproblem.solve(model, iterate, &request)
    }

    fn direction_multipliers(direction: &Direction) -> Multipliers {
        Multipliers {
            constraints: direction.constraint_multipliers.clone(),
            lower_bounds: direction.lower_bound_multipliers.clone(),
            upper_bounds: direction.upper_bound_multipliers.clone(),
            objective: direction.objective_multiplier,
        }
    }

    pub fn compute_feasible_direction(
        &mut self,
        model: &dyn Model,
        iterate: &mut Iterate,
        trust_region_radius: Option<f64>,
    ) -> Result<Direction, SolverError> {
        // stage a: solve at the current penalty parameter
        let mut direction =
            self.solve_subproblem(model, iterate, self.penalty_parameter, trust_region_radius)?;

        if self.penalty_parameter > 0.0 {
            let linear_model = self.elastics.linear_model(&direction.elastics);
            if linear_model > LINEAR_MODEL_TOLERANCE {
                let current_penalty = self.penalty_parameter;

                // stage c: the ideal subproblem ignores the objective
                let ideal = self.solve_subproblem(model, iterate, 0.0, trust_region_radius)?;
                let ideal_linear_model = self.elastics.linear_model(&ideal.elastics);
                let ideal_multipliers = Self::direction_multipliers(&ideal);
                let ideal_error = combined_error(model, iterate, &ideal_multipliers, 0.0);

                if ideal_error <= 1e-2 * self.settings.tolerance {
                    // the iterate is already stationary for the
                    // feasibility problem
                    self.penalty_parameter = 0.0;
                    direction = ideal;
                } else {
                    let residual = iterate.progress.infeasibility;
                    let epsilon1 = self.settings.penalty.epsilon1;
                    let epsilon2 = self.settings.penalty.epsilon2;

                    // stages d/e: shrink rho until both conditions hold
                    let mut condition1 = false;
                    let mut condition2 = false;
                    while !condition2 {
                        self.penalty_parameter *= self.settings.penalty.tau;
                        if self.penalty_parameter < self.settings.penalty.rho_min {
                            self.penalty_parameter = 0.0;
                            break;
                        }
                        direction = self.solve_subproblem(
                            model,
                            iterate,
                            self.penalty_parameter,
                            trust_region_radius,
                        )?;
                        let trial_linear_model =
                            self.elastics.linear_model(&direction.elastics);
                        if !condition1 {
                            let ideal_feasible =
                                ideal_linear_model <= LINEAR_MODEL_TOLERANCE;
                            condition1 = (ideal_feasible
                                && trial_linear_model <= LINEAR_MODEL_TOLERANCE)
                                || (!ideal_feasible
                                    && residual - trial_linear_model
                                        >= epsilon1 * (residual - ideal_linear_model));
                        }
                        if condition1
                            && residual - direction.subproblem_objective
                                >= epsilon2 * (residual - ideal.subproblem_objective)
                        {
                            condition2 = true;
                        }
                    }

                    // stage f: cap by the scaled ideal error
                    let term = ideal_error / residual.max(1.0);
                    self.penalty_parameter = self.penalty_parameter.min(term * term);

                    if self.penalty_parameter < current_penalty {
                        if diagnostics_enabled() {
                            eprintln!(
                                "penalty parameter decreased to {:e}",
                                self.penalty_parameter
                            );
                        }
                        if self.penalty_parameter == 0.0 {
                            direction = ideal;
                        } else {
                            direction = self.solve_subproblem(
                                model,
                                iterate,
                                self.penalty_parameter,
                                trust_region_radius,
                            )?;
                        }
                    }
                }
            }
        }

        direction.objective_multiplier = self.penalty_parameter;
        self.last_linear_model = self.elastics.linear_model(&direction.elastics);
        Ok(direction)
    }

    pub fn is_iterate_acceptable(
        &mut self,
        model: &dyn Model,
        current: &mut Iterate,
        trial: &mut Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> Result<bool, SolverError> {
        current.progress.unscaled_optimality =
            self.subproblem.unscaled_optimality(model, current);
        evaluate_optimality_measures(model, &self.subproblem, trial, &self.settings)?;

        let step_norm = step_length * direction.norm;
        let accept = if step_norm <= self.settings.tolerance / 100.0 {
            trial.evaluate_objective(model)?;
            true
        } else {
            let residual = current.progress.infeasibility;
            let current_violation = constraint_violation(
                current.constraints(),
                model.constraint_bounds(),
                self.settings.progress_norm,
            );
            let linearized = linearized_constraint_violation(
                model,
                current,
                direction,
                step_length,
                self.settings.progress_norm,
            );
            let predicted = PredictedReduction {
                infeasibility: current_violation - linearized,
                optimality: direction
                    .optimality_reduction
                    .evaluate(step_length, self.penalty_parameter),
                merit_reference: step_length * (residual - self.last_linear_model),
            };
            self.globalization.is_iterate_acceptable(
                &current.progress,
                &trial.progress,
                &predicted,
                self.penalty_parameter,
            )
        };

        if accept {
            compute_dual_residuals(model, trial, &self.settings)?;
            self.last_error_rho =
                combined_error(model, trial, &trial.multipliers, self.penalty_parameter);
            self.last_error_zero = combined_error(model, trial, &trial.multipliers, 0.0);
            trial.status = self.classify(model, trial, self.settings.tolerance, step_norm);
        }
        Ok(accept)
    }

    /// Classification by the combined error, as in the penalty method:
    /// KKT when the error at `rho` and the residual are small, Fritz-John
    /// when the error at zero penalty is small while the residual is not.
    pub fn classify(
        &self,
        model: &dyn Model,
        iterate: &Iterate,
        tolerance: f64,
        step_norm: f64,
    ) -> TerminationStatus {
        let residual = constraint_violation(
            iterate.constraints(),
            model.constraint_bounds(),
            self.settings.progress_norm,
        );
        let residual_cap = tolerance * model.num_constraints() as f64;
        if self.last_error_rho <= tolerance && residual <= residual_cap {
            return TerminationStatus::KktPoint;
        }
        if self.last_error_zero <= tolerance && residual > residual_cap {
            return TerminationStatus::FjPoint;
        }
        if step_norm <= tolerance / 100.0 {
            return if residual <= residual_cap {
                TerminationStatus::FeasibleSmallStep
            } else {
                TerminationStatus::InfeasibleSmallStep
            };
        }
        TerminationStatus::NotOptimal
    }

    /// Undo the penalty scaling of the multipliers of a KKT point.
    pub fn finalize_kkt_multipliers(&self, iterate: &mut Iterate) {
        if self.penalty_parameter > 0.0 && self.penalty_parameter < 1.0 {
            let scale = 1.0 / self.penalty_parameter;
            for multiplier in iterate
                .multipliers
                .constraints
                .iter_mut()
                .chain(iterate.multipliers.lower_bounds.iter_mut())
                .chain(iterate.multipliers.upper_bounds.iter_mut())
            {
                *multiplier *= scale;
            }
        }
    }
}

fn diagnostics_enabled() -> bool {
    std::env::var("SEQUOIA_DEBUG").map(|v| v == "1").unwrap_or(false)
}
