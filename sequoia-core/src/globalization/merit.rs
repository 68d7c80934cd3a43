//! The l1 exact-penalty merit function.
//!
//! A trial point at step length `a` is accepted when
//!
//! ```text
//! phi(x; rho) - phi(x + a*d; rho) >= eta * a * (residual(x) - m(d))
//! ```
//!
//! with `phi(x; rho) = rho*f(x) + ||violation(c(x))||`. The penalty
//! parameter is owned by the constraint-relaxation strategy and arrives
//! here as the objective multiplier of the progress measures.

use super::PredictedReduction;
use crate::iterate::ProgressMeasures;

pub struct MeritFunction {
    eta: f64,
    smallest_infeasibility: f64,
}

impl MeritFunction {
    pub fn new(eta: f64) -> Self {
        Self {
            eta,
            smallest_infeasibility: f64::INFINITY,
        }
    }

    pub fn reset(&mut self) {
        self.smallest_infeasibility = f64::INFINITY;
    }

    pub fn register_current_progress(&mut self, measures: &ProgressMeasures) {
        self.smallest_infeasibility = self.smallest_infeasibility.min(measures.infeasibility);
    }

    pub fn is_iterate_acceptable(
        &mut self,
        current: &ProgressMeasures,
        trial: &ProgressMeasures,
        predicted: &PredictedReduction,
        objective_multiplier: f64,
    ) -> bool {
        let current_merit = current.merit(objective_multiplier);
        let trial_merit = trial.merit(objective_multiplier);
        let required_decrease = self.eta * predicted.merit_reference.max(0.0);
        let accept = current_merit - trial_merit >= required_decrease;
        if accept {
            self.smallest_infeasibility =
                self.smallest_infeasibility.min(trial.infeasibility);
        }
        accept
    }

    pub fn is_feasibility_iterate_acceptable(&self, infeasibility: f64) -> bool {
        infeasibility < self.smallest_infeasibility
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterate::ScaledOptimality;

    fn measures(infeasibility: f64, objective: f64) -> ProgressMeasures {
        ProgressMeasures {
            infeasibility,
            scaled_optimality: ScaledOptimality::Objective(objective),
            unscaled_optimality: 0.0,
        }
    }

    #[test]
    fn test_sufficient_decrease_accepted() {
        let mut merit = MeritFunction::new(1e-8);
        let current = measures(1.0, 5.0);
        let trial = measures(0.5, 4.9);
        let predicted = PredictedReduction {
            infeasibility: 0.5,
            optimality: 0.1,
            merit_reference: 0.5,
        };
        assert!(merit.is_iterate_acceptable(&current, &trial, &predicted, 1.0));
    }

    #[test]
    fn test_increase_rejected() {
        let mut merit = MeritFunction::new(1e-8);
        let current = measures(0.1, 1.0);
        let trial = measures(0.5, 1.2);
        let predicted = PredictedReduction {
            infeasibility: 0.0,
            optimality: 0.0,
            merit_reference: 0.4,
        };
        assert!(!merit.is_iterate_acceptable(&current, &trial, &predicted, 1.0));
    }

    #[test]
    fn test_feasibility_improvement_tracked() {
        let mut merit = MeritFunction::new(1e-8);
        merit.register_current_progress(&measures(2.0, 0.0));
        assert!(merit.is_feasibility_iterate_acceptable(1.0));
        assert!(!merit.is_feasibility_iterate_acceptable(3.0));
    }
}
