//! The outer iteration driver.
//!
//! A single-threaded fixed-point loop: termination check, direction from
//! the constraint-relaxation strategy, trial point, globalized acceptance
//! with a line-search or trust-region mechanism. Cancellation (iteration
//! and wall-clock limits) is only checked between outer iterations.

use crate::direction::{Phase, SubproblemStatus};
use crate::error::SolverError;
use crate::iterate::{Iterate, Multipliers, TerminationStatus};
use crate::linalg::vector::norm_inf;
use crate::model::{total_violation, Model};
use crate::options::{MechanismChoice, Options, Settings, SubproblemChoice};
use crate::relaxation::ConstraintRelaxationStrategy;
use crate::statistics::{Statistics, StatisticsRow};
use std::time::Instant;

/// Final status of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// First-order optimal point.
    KktPoint,
    /// Fritz-John point: infeasible stationary or degenerate.
    FjPoint,
    FeasibleSmallStep,
    InfeasibleSmallStep,
    MaxIterations,
    TimeLimit,
    /// Objective unbounded below along feasible iterates.
    Unbounded,
    NumericalError,
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SolveStatus::KktPoint => "KKT point",
            SolveStatus::FjPoint => "Fritz-John point",
            SolveStatus::FeasibleSmallStep => "feasible small step",
            SolveStatus::InfeasibleSmallStep => "infeasible small step",
            SolveStatus::MaxIterations => "iteration limit",
            SolveStatus::TimeLimit => "time limit",
            SolveStatus::Unbounded => "unbounded objective",
            SolveStatus::NumericalError => "numerical error",
        };
        write!(f, "{}", name)
    }
}

/// Solve diagnostics.
#[derive(Debug, Clone)]
pub struct SolveInfo {
    pub iterations: usize,
    pub solve_time_ms: u64,
    pub subproblems_solved: usize,
    pub hessian_evaluations: usize,
    /// True when termination used the loose tolerance.
    pub loose_tolerance_used: bool,
    pub stationarity: f64,
    pub complementarity: f64,
    pub penalty_parameter: f64,
}

/// Result of a solve: the last accepted iterate and its diagnostics.
pub struct SolveResult {
    pub status: SolveStatus,
    pub x: Vec<f64>,
    pub multipliers: Multipliers,
    /// Objective in the model's original sense.
    pub objective: f64,
    pub infeasibility: f64,
    pub info: SolveInfo,
    pub statistics: Vec<StatisticsRow>,
}

/// The outer loop.
pub struct Optimizer {
    settings: Settings,
}

impl Optimizer {
    pub fn new(options: &Options) -> Result<Self, SolverError> {
        Ok(Self {
            settings: Settings::from_options(options)?,
        })
    }

    pub fn from_settings(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn solve(&self, model: &dyn Model) -> Result<SolveResult, SolverError> {
        let settings = &self.settings;
        let start = Instant::now();
        let mut statistics = Statistics::new(settings.verbose);

        let mut x = model.initial_primals();
        if x.len() != model.num_variables() {
            return Err(SolverError::Oracle(format!(
                "initial point has length {}, expected {}",
                x.len(),
                model.num_variables()
            )));
        }
        project_initial_point(&mut x, model, settings);

        let mut multipliers =
            Multipliers::zero(model.num_variables(), model.num_constraints());
        multipliers.constraints = model.initial_multipliers();

        let mut relaxation = ConstraintRelaxationStrategy::from_settings(settings, model)?;
        let mut current = Iterate::new(x, multipliers);
        relaxation.initialize(model, &mut current)?;
        current.evaluate_objective(model)?;
        statistics.add_row(self.row(0, &relaxation, &current, 0.0, 0.0, "initial"));

        let mut radius = settings.trust_region.radius_init;
        let mut loose_counter = 0usize;
        let mut loose_used = false;
        let mut iterations = 0usize;

        loop {
            // termination on the classified status of the current iterate
            if current.status != TerminationStatus::NotOptimal {
                let mapped_status = map_status(current.status);
                return Ok(self.finish(
                    model,
                    &relaxation,
                    current,
                    statistics,
                    mapped_status,
                    iterations,
                    loose_used,
                    start,
                ));
            }
            if iterations >= settings.max_iterations {
                return Ok(self.finish(
                    model,
                    &relaxation,
                    current,
                    statistics,
                    SolveStatus::MaxIterations,
                    iterations,
                    loose_used,
                    start,
                ));
            }
            if let Some(limit) = settings.time_limit {
                if start.elapsed().as_secs_f64() > limit {
                    return Ok(self.finish(
                        model,
                        &relaxation,
                        current,
                        statistics,
                        SolveStatus::TimeLimit,
                        iterations,
                        loose_used,
                        start,
                    ));
                }
            }
            if norm_inf(&current.x) > settings.divergence_threshold {
                return Ok(self.finish(
                    model,
                    &relaxation,
                    current,
                    statistics,
                    SolveStatus::NumericalError,
                    iterations,
                    loose_used,
                    start,
                ));
            }

            iterations += 1;
            let outcome = match settings.mechanism {
                MechanismChoice::LineSearch => {
                    self.line_search_step(model, &mut relaxation, &mut current)?
                }
                MechanismChoice::TrustRegion => {
                    self.trust_region_step(model, &mut relaxation, &mut current, &mut radius)?
                }
            };
            let (step, direction_norm, step_norm) = match outcome {
                StepOutcome::Accepted {
                    step,
                    direction_norm,
                    step_norm,
                } => (step, direction_norm, step_norm),
                StepOutcome::Failed => {
                    return Ok(self.finish(
                        model,
                        &relaxation,
                        current,
                        statistics,
                        SolveStatus::NumericalError,
                        iterations,
                        loose_used,
                        start,
                    ));
                }
            };

            current.evaluate_objective(model)?;
            statistics.add_row(self.row(
                iterations,
                &relaxation,
                &current,
                direction_norm,
                step,
                "accepted",
            ));

            // unbounded objective along feasible iterates
            if current.objective() < settings.unbounded_objective_threshold {
                return Ok(self.finish(
                    model,
                    &relaxation,
                    current,
                    statistics,
                    SolveStatus::Unbounded,
                    iterations,
                    loose_used,
                    start,
                ));
            }

            // loose-tolerance bookkeeping: only in the optimality phase
            if current.status == TerminationStatus::NotOptimal
                && settings.loose_tolerance_consecutive_iteration_threshold > 0
            {
                if relaxation.phase() == Phase::Optimality {
                    let loose_status = relaxation.classify(
                        model,
                        &current,
                        settings.loose_tolerance,
                        step_norm,
                    );
                    if loose_status == TerminationStatus::KktPoint {
                        loose_counter += 1;
                    } else {
                        loose_counter = 0;
                    }
                    if loose_counter
                        >= settings.loose_tolerance_consecutive_iteration_threshold
                    {
                        current.status = TerminationStatus::KktPoint;
                        loose_used = true;
                    }
                } else {
                    loose_counter = 0;
                }
            }
        }
    }

    fn line_search_step(
        &self,
        model: &dyn Model,
        relaxation: &mut ConstraintRelaxationStrategy,
        current: &mut Iterate,
    ) -> Result<StepOutcome, SolverError> {
        let direction = relaxation.compute_feasible_direction(model, current, None)?;
        match direction.status {
            SubproblemStatus::Optimal => {}
            _ => return Ok(StepOutcome::Failed),
        }

        let mut step = 1.0;
        while step >= self.settings.line_search_min_step {
            let mut trial = Iterate::trial(current, &direction, step);
            if relaxation.is_iterate_acceptable(model, current, &mut trial, &direction, step)? {
                let step_norm = step * direction.norm;
                *current = trial;
                return Ok(StepOutcome::Accepted {
                    step,
                    direction_norm: direction.norm,
                    step_norm,
                });
            }
            step *= self.settings.line_search_backtrack;
        }
        Ok(StepOutcome::Failed)
    }

    fn trust_region_step(
        &self,
        model: &dyn Model,
        relaxation: &mut ConstraintRelaxationStrategy,
        current: &mut Iterate,
        radius: &mut f64,
    ) -> Result<StepOutcome, SolverError> {
        let tr = &self.settings.trust_region;
        loop {
            let direction = relaxation.compute_feasible_direction(model, current, Some(*radius))?;
            match direction.status {
                SubproblemStatus::Optimal => {}
                SubproblemStatus::Unbounded => {
                    *radius *= tr.decrease_factor;
                    if *radius < tr.radius_min {
                        return Ok(StepOutcome::Failed);
                    }
                    continue;
                }
                _ => return Ok(StepOutcome::Failed),
            }

            let mut trial = Iterate::trial(current, &direction, 1.0);
            if relaxation.is_iterate_acceptable(model, current, &mut trial, &direction, 1.0)? {
                let step_norm = direction.norm;
                // grow the radius when the step used most of it
                if direction.norm >= tr.activity_fraction * *radius {
                    *radius = (tr.increase_factor * *radius).min(tr.radius_max);
                }
                let step = *radius;
                *current = trial;
                return Ok(StepOutcome::Accepted {
                    step,
                    direction_norm: direction.norm,
                    step_norm,
                });
            }
            *radius *= tr.decrease_factor;
            if *radius < tr.radius_min {
                return Ok(StepOutcome::Failed);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        model: &dyn Model,
        relaxation: &ConstraintRelaxationStrategy,
        mut current: Iterate,
        statistics: Statistics,
        status: SolveStatus,
        iterations: usize,
        loose_used: bool,
        start: Instant,
    ) -> SolveResult {
        if status == SolveStatus::KktPoint {
            relaxation.finalize_kkt_multipliers(&mut current);
        }
        let objective = match current.evaluate_objective(model) {
            Ok(value) => model.objective_sign() * value,
            Err(_) => f64::NAN,
        };
        let infeasibility = if current.has_constraints() {
            total_violation(
                &current.x,
                model.variable_bounds(),
                current.constraints(),
                model.constraint_bounds(),
                self.settings.progress_norm,
            )
        } else {
            0.0
        };
        let info = SolveInfo {
            iterations,
            solve_time_ms: start.elapsed().as_millis() as u64,
            subproblems_solved: relaxation.subproblems_solved(),
            hessian_evaluations: relaxation.hessian_evaluations(),
            loose_tolerance_used: loose_used,
            stationarity: current.residuals.stationarity,
            complementarity: current.residuals.complementarity,
            penalty_parameter: relaxation.penalty_parameter(),
        };
        SolveResult {
            status,
            x: current.x.clone(),
            multipliers: current.multipliers.clone(),
            objective,
            infeasibility,
            info,
            statistics: statistics.into_rows(),
        }
    }

    fn row(
        &self,
        iteration: usize,
        relaxation: &ConstraintRelaxationStrategy,
        iterate: &Iterate,
        direction_norm: f64,
        step: f64,
        status: &'static str,
    ) -> StatisticsRow {
        StatisticsRow {
            iteration,
            phase: relaxation.phase(),
            penalty_parameter: relaxation.penalty_parameter(),
            direction_norm,
            step,
            objective: iterate.objective(),
            infeasibility: iterate.progress.infeasibility,
            status,
        }
    }
}

enum StepOutcome {
    Accepted {
        step: f64,
        direction_norm: f64,
        step_norm: f64,
    },
    Failed,
}

fn map_status(status: TerminationStatus) -> SolveStatus {
    match status {
        TerminationStatus::KktPoint => SolveStatus::KktPoint,
        TerminationStatus::FjPoint => SolveStatus::FjPoint,
        TerminationStatus::FeasibleSmallStep => SolveStatus::FeasibleSmallStep,
        TerminationStatus::InfeasibleSmallStep => SolveStatus::InfeasibleSmallStep,
        TerminationStatus::NotOptimal => SolveStatus::NumericalError,
    }
}

/// Project the initial point onto the bounds; the interior-point method
/// needs it strictly inside.
fn project_initial_point(x: &mut [f64], model: &dyn Model, settings: &Settings) {
    for (value, range) in x.iter_mut().zip(model.variable_bounds().iter()) {
        if settings.subproblem == SubproblemChoice::PrimalDualInteriorPoint {
            let width = range.upper - range.lower;
            if range.lower.is_finite() && range.upper.is_finite() {
                let pad = (0.01 * width).min(1.0).max(0.0);
                *value = value.clamp(range.lower + pad, range.upper - pad);
            } else if range.lower.is_finite() {
                *value = value.max(range.lower + 0.01 * (1.0 + range.lower.abs()));
            } else if range.upper.is_finite() {
                *value = value.min(range.upper - 0.01 * (1.0 + range.upper.abs()));
            }
        } else {
            *value = range.project(*value);
        }
    }
}
