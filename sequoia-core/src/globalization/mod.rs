//! Globalization strategies: trial-point acceptance tests.

pub mod filter;
pub mod merit;

use crate::iterate::ProgressMeasures;
use crate::options::{Settings, StrategyChoice};

/// Predicted reductions of a trial step, already evaluated at the trial
/// step length.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictedReduction {
    /// `h(x) - h_lin(x + a d)`.
    pub infeasibility: f64,
    /// Predicted scaled-optimality decrease at the current objective
    /// multiplier.
    pub optimality: f64,
    /// `a * (residual - m(d))`: the reference decrease of the merit test.
    pub merit_reference: f64,
}

/// The acceptance strategy chosen at build time.
pub enum GlobalizationStrategy {
    Merit(merit::MeritFunction),
    Filter(filter::FilterMethod),
}

impl GlobalizationStrategy {
    pub fn from_settings(settings: &Settings) -> Self {
        match settings.strategy {
            StrategyChoice::MeritFunction => {
                Self::Merit(merit::MeritFunction::new(settings.penalty.eta))
            }
            StrategyChoice::FilterMethod => Self::Filter(filter::FilterMethod::new(
                settings.filter,
                filter::FilterVariant::Waechter,
            )),
            StrategyChoice::FletcherFilter => Self::Filter(filter::FilterMethod::new(
                settings.filter,
                filter::FilterVariant::Fletcher,
            )),
        }
    }

    /// Register the measures of the first iterate.
    pub fn initialize(&mut self, measures: &ProgressMeasures) {
        match self {
            Self::Merit(strategy) => strategy.register_current_progress(measures),
            Self::Filter(strategy) => strategy.initialize(measures),
        }
    }

    /// Forget all history (called on phase switches).
    pub fn reset(&mut self) {
        match self {
            Self::Merit(strategy) => strategy.reset(),
            Self::Filter(strategy) => strategy.reset(),
        }
    }

    /// Store a copy of the current progress (never a reference to the
    /// iterate).
    pub fn register_current_progress(&mut self, measures: &ProgressMeasures) {
        match self {
            Self::Merit(strategy) => strategy.register_current_progress(measures),
            Self::Filter(strategy) => strategy.register_current_progress(measures),
        }
    }

    /// The acceptance test.
    pub fn is_iterate_acceptable(
        &mut self,
        current: &ProgressMeasures,
        trial: &ProgressMeasures,
        predicted: &PredictedReduction,
        objective_multiplier: f64,
    ) -> bool {
        match self {
            Self::Merit(strategy) => {
                strategy.is_iterate_acceptable(current, trial, predicted, objective_multiplier)
            }
            Self::Filter(strategy) => {
                strategy.is_iterate_acceptable(current, trial, predicted, objective_multiplier)
            }
        }
    }

    /// Does this infeasibility improve on the best known one? Used by the
    /// restoration strategy for its switch-back test.
    pub fn is_feasibility_iterate_acceptable(&self, infeasibility: f64) -> bool {
        match self {
            Self::Merit(strategy) => strategy.is_feasibility_iterate_acceptable(infeasibility),
            Self::Filter(strategy) => strategy.is_feasibility_iterate_acceptable(infeasibility),
        }
    }
}
