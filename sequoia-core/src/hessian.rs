//! Hessian models: exact, zero, and convexified.
//!
//! The convexified model regularizes the exact Lagrangian Hessian as
//! `H + delta*I` until a trial factorization is positive definite, so the
//! QP subproblem always receives a convex model. The same trial schedule
//! is reused by the interior-point subproblem on its full KKT matrix.

use crate::error::SolverError;
use crate::linalg::coo::SymmetricCoo;
use crate::model::Model;
use crate::options::{HessianChoice, RegularizationSettings, Settings};
use crate::solvers::{create_symmetric_solver, SymmetricIndefiniteSolver};

/// Trial sequence of the inertia-correction shift.
///
/// First attempt is always `delta = 0`; on wrong inertia the shift starts
/// at `max(delta_min, kappa * max(delta_last, delta_init))` and multiplies
/// by `kappa` per retry, failing beyond `delta_max`. The last successful
/// shift persists across outer iterations, halved at store time.
#[derive(Debug, Clone)]
pub struct RegularizationSchedule {
    settings: RegularizationSettings,
    delta_last: f64,
}

impl RegularizationSchedule {
    pub fn new(settings: RegularizationSettings) -> Self {
        Self {
            settings,
            delta_last: 0.0,
        }
    }

    /// Shift for attempt `k` (0-based).
    pub fn delta(&self, attempt: usize) -> f64 {
        if attempt == 0 {
            return 0.0;
        }
        let first = (self.settings.increase_factor
            * self.delta_last.max(self.settings.delta_init))
        .max(self.settings.delta_min);
        first * self
            .settings
            .increase_factor
            .powi(attempt as i32 - 1)
    }

    pub fn exceeded(&self, delta: f64) -> bool {
        delta > self.settings.delta_max
    }

    /// Record the shift that produced the required inertia.
    pub fn register_success(&mut self, delta: f64) {
        if delta > 0.0 {
            self.delta_last = (delta / 2.0).max(self.settings.delta_min);
        }
    }
}

/// Convexified Hessian: exact model plus inertia correction.
pub struct ConvexifiedHessian {
    schedule: RegularizationSchedule,
    linear_solver: Box<dyn SymmetricIndefiniteSolver>,
}

/// The Hessian of the local model. The variant set is closed: selected
/// once from the options at build time.
pub enum HessianModel {
    Exact,
    Zero,
    Convexified(ConvexifiedHessian),
}

impl HessianModel {
    pub fn from_settings(settings: &Settings) -> Result<Self, SolverError> {
        match (settings.hessian_model, settings.convexify) {
            (HessianChoice::Zero, _) => Ok(HessianModel::Zero),
            (HessianChoice::Exact, false) => Ok(HessianModel::Exact),
            (HessianChoice::Exact, true) => Ok(HessianModel::Convexified(ConvexifiedHessian {
                schedule: RegularizationSchedule::new(settings.regularization),
                linear_solver: create_symmetric_solver(&settings.linear_solver)?,
            })),
        }
    }

    /// Evaluate the Hessian of the Lagrangian at `(x, objective_multiplier,
    /// multipliers)`, convexified when the model asks for it.
    pub fn evaluate(
        &mut self,
        model: &dyn Model,
        x: &[f64],
        objective_multiplier: f64,
        multipliers: &[f64],
    ) -> Result<SymmetricCoo, SolverError> {
        match self {
            HessianModel::Zero => Ok(SymmetricCoo::new(model.num_variables())),
            HessianModel::Exact => {
                model.lagrangian_hessian(x, objective_multiplier, multipliers)
            }
            HessianModel::Convexified(convexified) => {
                let mut hessian =
                    model.lagrangian_hessian(x, objective_multiplier, multipliers)?;
                hessian.add_regularization_slots();
                convexified.regularize(&mut hessian)?;
                Ok(hessian)
            }
        }
    }
}

impl ConvexifiedHessian {
    /// Shift the diagonal until the factorization has inertia `(n, 0, 0)`.
    /// The shift stays in the matrix's regularization slots.
    fn regularize(&mut self, hessian: &mut SymmetricCoo) -> Result<(), SolverError> {
        let dimension = hessian.dimension();
        let mut attempt = 0;
        loop {
            let delta = self.schedule.delta(attempt);
            if self.schedule.exceeded(delta) {
                return Err(SolverError::Numerical(format!(
                    "Hessian could not be convexified below the shift cap ({:e})",
                    delta
                )));
            }
            hessian.set_regularization(|_| delta);
            self.linear_solver.factorize(hessian)?;
            if !self.linear_solver.is_singular()
                && self.linear_solver.inertia().matches(dimension, 0)
            {
                self.schedule.register_success(delta);
                return Ok(());
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Settings;

    #[test]
    fn test_schedule_starts_at_zero() {
        let schedule = RegularizationSchedule::new(Settings::default().regularization);
        assert_eq!(schedule.delta(0), 0.0);
        // first nonzero trial: kappa * delta_init
        assert!((schedule.delta(1) - 8e-4).abs() < 1e-12);
        assert!((schedule.delta(2) - 6.4e-3).abs() < 1e-12);
    }

    #[test]
    fn test_schedule_persists_halved() {
        let mut schedule = RegularizationSchedule::new(Settings::default().regularization);
        schedule.register_success(0.8);
        // next first trial: kappa * max(delta_last, delta_init) = 8 * 0.4
        assert!((schedule.delta(1) - 3.2).abs() < 1e-12);
    }

    #[test]
    fn test_convexification_fixes_indefinite_hessian() {
        let settings = Settings::default();
        let mut convexified = ConvexifiedHessian {
            schedule: RegularizationSchedule::new(settings.regularization),
            linear_solver: create_symmetric_solver("ldl").unwrap(),
        };
        // [[1, 0], [0, -2]]: needs delta > 2
        let mut hessian = SymmetricCoo::new(2);
        hessian.insert(0, 0, 1.0);
        hessian.insert(1, 1, -2.0);
        hessian.add_regularization_slots();
        convexified.regularize(&mut hessian).unwrap();

        // the regularized matrix is positive definite
        assert!(hessian.quadratic_form(&[0.0, 1.0]) > 0.0);
        assert!(hessian.quadratic_form(&[1.0, 0.0]) > 0.0);
    }
}
