//! Feasibility-restoration constraint-relaxation strategy.
//!
//! Two phases, one globalization strategy per phase. The optimality phase
//! solves the plain local subproblem; when the subproblem reports an
//! infeasible linearization, the strategy solves a feasibility subproblem
//! (zero objective multiplier, elastic variables seeded from the failed
//! primals) and switches phases during acceptance. The strategy switches
//! back once the linearized violation vanishes at unit step and the trial
//! infeasibility improves on the best value registered with the
//! phase-2 strategy.

use super::{
    compute_dual_residuals, evaluate_optimality_measures, evaluate_restoration_measures,
};
use crate::direction::{Direction, Phase, SubproblemStatus};
use crate::error::SolverError;
use crate::globalization::{GlobalizationStrategy, PredictedReduction};
use crate::iterate::{Iterate, TerminationStatus};
use crate::model::{constraint_violation, Model};
use crate::options::Settings;
use crate::progress::linearized_constraint_violation;
use crate::subproblem::{ElasticVariables, InequalityHandlingMethod, SubproblemRequest};

pub struct FeasibilityRestoration {
    pub current_phase: Phase,
    pub(crate) subproblem: InequalityHandlingMethod,
    phase_1_strategy: GlobalizationStrategy,
    phase_2_strategy: GlobalizationStrategy,
    elastics: ElasticVariables,
    settings: Settings,
    /// Seed for the next feasibility subproblem.
    pending_initial_point: Option<Vec<f64>>,
}

impl FeasibilityRestoration {
    pub fn new(settings: &Settings, model: &dyn Model) -> Result<Self, SolverError> {
        Ok(Self {
            current_phase: Phase::Optimality,
            subproblem: InequalityHandlingMethod::from_settings(settings)?,
            phase_1_strategy: GlobalizationStrategy::from_settings(settings),
            phase_2_strategy: GlobalizationStrategy::from_settings(settings),
            elastics: ElasticVariables::new(model.constraint_bounds()),
            settings: settings.clone(),
            pending_initial_point: None,
        })
    }

    pub fn initialize(
        &mut self,
        model: &dyn Model,
        iterate: &mut Iterate,
    ) -> Result<(), SolverError> {
        evaluate_optimality_measures(model, &self.subproblem, iterate, &self.settings)?;
        compute_dual_residuals(model, iterate, &self.settings)?;
        self.phase_1_strategy.initialize(&iterate.progress);
        self.phase_2_strategy.initialize(&iterate.progress);
        iterate.status = self.classify(model, iterate, self.settings.tolerance, f64::INFINITY);
        Ok(())
    }

    pub fn compute_feasible_direction(
        &mut self,
        model: &dyn Model,
        iterate: &mut Iterate,
        trust_region_radius: Option<f64>,
    ) -> Result<Direction, SolverError> {
        match self.current_phase {
            Phase::Optimality => {
                let request = SubproblemRequest {
                    objective_multiplier: 1.0,
                    elastics: None,
                    trust_region_radius,
                    initial_point: None,
                    phase: Phase::Optimality,
                };
                let mut direction = self.subproblem.solve(model, iterate, &request)?;
                direction.objective_multiplier = 1.0;
                if direction.status == SubproblemStatus::Infeasible {
                    // minimize the violation instead, seeded from the
                    // failed primals
                    self.pending_initial_point = Some(direction.primals.clone());
                    return self.solve_feasibility_subproblem(
                        model,
                        iterate,
                        trust_region_radius,
                    );
                }
                Ok(direction)
            }
            Phase::FeasibilityRestoration => {
                self.solve_feasibility_subproblem(model, iterate, trust_region_radius)
            }
        }
    }

    fn solve_feasibility_subproblem(
        &mut self,
        model: &dyn Model,
        iterate: &mut Iterate,
        trust_region_radius: Option<f64>,
    ) -> Result<Direction, SolverError> {
        let seed = self.pending_initial_point.take();
        let request = SubproblemRequest {
            objective_multiplier: 0.0,
            elastics: Some(&self.elastics),
            trust_region_radius,
            initial_point: seed.as_deref(),
            phase: Phase::FeasibilityRestoration,
        };
        let mut direction = self.subproblem.solve(model, iterate, &request)?;
        direction.objective_multiplier = 0.0;
        Ok(direction)
    }

    /// Handle phase transitions and refresh the progress measures of the
    /// current and trial iterates.
    fn compute_progress_measures(
        &mut self,
        model: &dyn Model,
        current: &mut Iterate,
        trial: &mut Iterate,
        direction: &Direction,
    ) -> Result<(), SolverError> {
        if self.current_phase == Phase::Optimality && direction.objective_multiplier == 0.0 {
            self.switch_to_feasibility_restoration(model, current)?;
        } else if self.current_phase == Phase::FeasibilityRestoration {
            let linearized = linearized_constraint_violation(
                model,
                current,
                direction,
                1.0,
                self.settings.progress_norm,
            );
            if linearized <= self.settings.restoration_switch_tolerance {
                trial.evaluate_constraints(model)?;
                let trial_violation = constraint_violation(
                    trial.constraints(),
                    model.constraint_bounds(),
                    self.settings.progress_norm,
                );
                if self
                    .phase_2_strategy
                    .is_feasibility_iterate_acceptable(trial_violation)
                {
                    self.switch_to_optimality(model, current)?;
                }
            }
        }

        // the barrier parameter may have moved: refresh the unscaled
        // measure of the current iterate so both sides use the same model
        current.progress.unscaled_optimality =
            self.subproblem.unscaled_optimality(model, current);

        match self.current_phase {
            Phase::Optimality => {
                evaluate_optimality_measures(model, &self.subproblem, trial, &self.settings)
            }
            Phase::FeasibilityRestoration => {
                evaluate_restoration_measures(model, &self.subproblem, trial, &self.settings)
            }
        }
    }

    fn switch_to_feasibility_restoration(
        &mut self,
        model: &dyn Model,
        current: &mut Iterate,
    ) -> Result<(), SolverError> {
        if diagnostics_enabled() {
            eprintln!("restoration: entering the feasibility phase");
        }
        self.current_phase = Phase::FeasibilityRestoration;
        self.phase_2_strategy.register_current_progress(&current.progress);
        self.phase_1_strategy.reset();
        evaluate_restoration_measures(model, &self.subproblem, current, &self.settings)?;
        self.phase_1_strategy.register_current_progress(&current.progress);
        Ok(())
    }

    fn switch_to_optimality(
        &mut self,
        model: &dyn Model,
        current: &mut Iterate,
    ) -> Result<(), SolverError> {
        if diagnostics_enabled() {
            eprintln!("restoration: back to the optimality phase");
        }
        self.current_phase = Phase::Optimality;
        evaluate_optimality_measures(model, &self.subproblem, current, &self.settings)?;
        Ok(())
    }

    pub fn is_iterate_acceptable(
        &mut self,
        model: &dyn Model,
        current: &mut Iterate,
        trial: &mut Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> Result<bool, SolverError> {
        self.compute_progress_measures(model, current, trial, direction)?;

        let step_norm = step_length * direction.norm;
        let accept = if step_norm <= self.settings.tolerance / 100.0 {
            trial.evaluate_objective(model)?;
            true
        } else {
            let predicted = self.predicted_reduction(model, current, direction, step_length);
            let strategy = match self.current_phase {
                Phase::Optimality => &mut self.phase_2_strategy,
                Phase::FeasibilityRestoration => &mut self.phase_1_strategy,
            };
            strategy.is_iterate_acceptable(
                &current.progress,
                &trial.progress,
                &predicted,
                direction.objective_multiplier,
            )
        };

        if accept {
            compute_dual_residuals(model, trial, &self.settings)?;
            trial.status = self.classify(model, trial, self.settings.tolerance, step_norm);
        }
        Ok(accept)
    }

    fn predicted_reduction(
        &self,
        model: &dyn Model,
        current: &Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> PredictedReduction {
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
        let infeasibility_reduction = current_violation - linearized;
        let optimality_reduction = match self.current_phase {
            Phase::Optimality => direction
                .optimality_reduction
                .evaluate(step_length, direction.objective_multiplier),
            // in restoration the violation is the optimality measure
            Phase::FeasibilityRestoration => infeasibility_reduction,
        };
        PredictedReduction {
            infeasibility: match self.current_phase {
                Phase::Optimality => infeasibility_reduction,
                Phase::FeasibilityRestoration => 0.0,
            },
            optimality: optimality_reduction,
            merit_reference: infeasibility_reduction.max(0.0) + optimality_reduction.max(0.0),
        }
    }

    /// Residual-based first-order classification.
    pub fn classify(
        &self,
        model: &dyn Model,
        iterate: &Iterate,
        tolerance: f64,
        step_norm: f64,
    ) -> TerminationStatus {
        let feasibility = constraint_violation(
            iterate.constraints(),
            model.constraint_bounds(),
            self.settings.residual_norm,
        );
        let residuals = &iterate.residuals;
        if residuals.stationarity <= tolerance
            && residuals.complementarity <= tolerance
            && feasibility <= tolerance
        {
            return TerminationStatus::KktPoint;
        }
        if residuals.fj_stationarity <= tolerance
            && residuals.fj_complementarity <= tolerance
            && feasibility > tolerance
            && iterate.multipliers.norm_1() > tolerance
        {
            return TerminationStatus::FjPoint;
        }
        if step_norm <= tolerance / 100.0 {
            return if feasibility <= tolerance {
                TerminationStatus::FeasibleSmallStep
            } else {
                TerminationStatus::InfeasibleSmallStep
            };
        }
        TerminationStatus::NotOptimal
    }
}

fn diagnostics_enabled() -> bool {
    std::env::var("SEQUOIA_DEBUG").map(|v| v == "1").unwrap_or(false)
}
