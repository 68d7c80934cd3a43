//! Filter globalization: acceptance against a set of non-dominated
//! (infeasibility, optimality) pairs.
//!
//! A trial (h', f') is acceptable to an entry (h, f) when
//! `h' <= beta*h` or `f' <= f - gamma*h`. The Waechter variant adds a
//! switching condition: when the predicted optimality reduction dominates
//! `kappa * h^s_h`, an Armijo-type sufficient decrease of f is also
//! required. The Fletcher variant accepts by the envelope alone.

use super::PredictedReduction;
use crate::iterate::ProgressMeasures;
use crate::options::FilterSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVariant {
    Waechter,
    Fletcher,
}

#[derive(Debug, Clone, Copy)]
struct FilterEntry {
    infeasibility: f64,
    optimality: f64,
}

pub struct FilterMethod {
    settings: FilterSettings,
    variant: FilterVariant,
    entries: Vec<FilterEntry>,
    /// Upper bound on acceptable infeasibility, set from the first
    /// iterate.
    infeasibility_cap: f64,
    current: Option<FilterEntry>,
}

impl FilterMethod {
    pub fn new(settings: FilterSettings, variant: FilterVariant) -> Self {
        Self {
            settings,
            variant,
            entries: Vec::new(),
            infeasibility_cap: f64::INFINITY,
            current: None,
        }
    }

    pub fn initialize(&mut self, measures: &ProgressMeasures) {
        self.infeasibility_cap = 1e4 * measures.infeasibility.max(1.0);
        self.register_current_progress(measures);
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.current = None;
    }

    pub fn register_current_progress(&mut self, measures: &ProgressMeasures) {
        self.current = Some(FilterEntry {
            infeasibility: measures.infeasibility,
            optimality: measures.scaled_optimality.evaluate(1.0) + measures.unscaled_optimality,
        });
    }

    fn acceptable_to_entry(&self, entry: &FilterEntry, infeasibility: f64, optimality: f64) -> bool {
        infeasibility <= self.settings.beta * entry.infeasibility
            || optimality <= entry.optimality - self.settings.gamma * entry.infeasibility
    }

    fn acceptable(&self, infeasibility: f64, optimality: f64) -> bool {
        if infeasibility > self.infeasibility_cap {
            return false;
        }
        self.entries
            .iter()
            .all(|entry| self.acceptable_to_entry(entry, infeasibility, optimality))
    }

    fn add(&mut self, infeasibility: f64, optimality: f64) {
        self.entries.retain(|entry| {
            !(infeasibility <= entry.infeasibility && optimality <= entry.optimality)
        });
        if self.entries.len() < self.settings.capacity {
            self.entries.push(FilterEntry {
                infeasibility,
                optimality,
            });
        }
    }

    pub fn is_iterate_acceptable(
        &mut self,
        current: &ProgressMeasures,
        trial: &ProgressMeasures,
        predicted: &PredictedReduction,
        _objective_multiplier: f64,
    ) -> bool {
        let trial_h = trial.infeasibility;
        let trial_f = trial.scaled_optimality.evaluate(1.0) + trial.unscaled_optimality;
        let current_h = current.infeasibility;
        let current_f = current.scaled_optimality.evaluate(1.0) + current.unscaled_optimality;

        // acceptable to the filter and to the current pair
        let envelope_ok = self.acceptable(trial_h, trial_f)
            && self.acceptable_to_entry(
                &FilterEntry {
                    infeasibility: current_h,
                    optimality: current_f,
                },
                trial_h,
                trial_f,
            );
        if !envelope_ok {
            return false;
        }

        let accept = match self.variant {
            FilterVariant::Fletcher => true,
            FilterVariant::Waechter => {
                let switching = predicted.optimality
                    >= self.settings.kappa * current_h.powf(self.settings.s_h);
                if switching {
                    // f-type iteration: sufficient objective reduction
                    current_f - trial_f >= self.settings.armijo_fraction * predicted.optimality
                } else {
                    // h-type iteration: the envelope decides
                    true
                }
            }
        };
        if accept {
            self.add(trial_h, trial_f);
            self.current = Some(FilterEntry {
                infeasibility: trial_h,
                optimality: trial_f,
            });
        }
        accept
    }

    pub fn is_feasibility_iterate_acceptable(&self, infeasibility: f64) -> bool {
        let smallest = self
            .entries
            .iter()
            .map(|entry| entry.infeasibility)
            .chain(self.current.iter().map(|entry| entry.infeasibility))
            .fold(f64::INFINITY, f64::min);
        infeasibility < self.settings.beta * smallest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterate::ScaledOptimality;
    use crate::options::Settings;

    fn measures(infeasibility: f64, objective: f64) -> ProgressMeasures {
        ProgressMeasures {
            infeasibility,
            scaled_optimality: ScaledOptimality::Objective(objective),
            unscaled_optimality: 0.0,
        }
    }

    fn filter(variant: FilterVariant) -> FilterMethod {
        let mut method = FilterMethod::new(Settings::default().filter, variant);
        method.initialize(&measures(1.0, 10.0));
        method
    }

    #[test]
    fn test_improvement_in_both_accepted() {
        let mut method = filter(FilterVariant::Fletcher);
        let predicted = PredictedReduction::default();
        assert!(method.is_iterate_acceptable(
            &measures(1.0, 10.0),
            &measures(0.5, 9.0),
            &predicted,
            1.0
        ));
    }

    #[test]
    fn test_dominated_pair_rejected() {
        let mut method = filter(FilterVariant::Fletcher);
        let predicted = PredictedReduction::default();
        // worse in both than the current pair
        assert!(!method.is_iterate_acceptable(
            &measures(1.0, 10.0),
            &measures(1.5, 11.0),
            &predicted,
            1.0
        ));
    }

    #[test]
    fn test_dominated_entries_purged() {
        let mut method = filter(FilterVariant::Fletcher);
        let predicted = PredictedReduction::default();
        assert!(method.is_iterate_acceptable(
            &measures(1.0, 10.0),
            &measures(0.5, 9.0),
            &predicted,
            1.0
        ));
        assert!(method.is_iterate_acceptable(
            &measures(0.5, 9.0),
            &measures(0.25, 8.0),
            &predicted,
            1.0
        ));
        // the dominated (0.5, 9.0) entry was purged on insertion
        assert_eq!(method.entries.len(), 1);
        assert_eq!(method.entries[0].infeasibility, 0.25);
    }

    #[test]
    fn test_waechter_f_type_requires_armijo() {
        let mut method = filter(FilterVariant::Waechter);
        // near-feasible current point, large predicted optimality
        // reduction, but the trial barely improves f: rejected
        let predicted = PredictedReduction {
            infeasibility: 0.0,
            optimality: 1.0,
            merit_reference: 1.0,
        };
        assert!(!method.is_iterate_acceptable(
            &measures(1e-12, 10.0),
            &measures(1e-12, 10.0 - 1e-9),
            &predicted,
            1.0
        ));
    }

    #[test]
    fn test_feasibility_improvement() {
        let method = filter(FilterVariant::Waechter);
        assert!(method.is_feasibility_iterate_acceptable(0.5));
        assert!(!method.is_feasibility_iterate_acceptable(2.0));
    }
}
