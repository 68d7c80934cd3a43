//! Primal-dual interior-point inequality-handling method.
//!
//! One barrier Newton step per outer iteration: slacks for the linearized
//! constraints, log barriers on every finite bound side, a persistent
//! barrier parameter updated once the current-mu subproblem is solved to a
//! mu-dependent tolerance, and the fraction-to-the-boundary rule baked
//! into the returned direction (so any damped step the globalization
//! settles on keeps the iterate strictly interior).
//!
//! Dual state lives in the iterate's multipliers; slacks are re-anchored
//! at the current constraint values on every call.

use super::{build_local_model, SubproblemRequest};
use crate::direction::{Direction, OptimalityReductionModel, SubproblemStatus};
use crate::error::SolverError;
use crate::hessian::RegularizationSchedule;
use crate::iterate::Iterate;
use crate::linalg::vector::{dot, norm_inf};
use crate::linalg::{jacobian_transpose_product, jacobian_vector_product};
use crate::model::{ConstraintStatus, Model, Range};
use crate::options::{IpmSettings, Settings};
use crate::solvers::kkt::{assemble_kkt, fraction_to_boundary};
use crate::solvers::{create_symmetric_solver, SymmetricIndefiniteSolver};

const DUAL_FLOOR: f64 = 1e-8;
const DUAL_REGULARIZATION: f64 = 1e-8;
const GAP_FLOOR: f64 = 1e-12;

pub struct InteriorPointSubproblem {
    settings: IpmSettings,
    mu: f64,
    schedule: RegularizationSchedule,
    linear_solver: Box<dyn SymmetricIndefiniteSolver>,
    pub subproblems_solved: usize,
    pub hessian_evaluations: usize,
}

impl InteriorPointSubproblem {
    pub fn from_settings(settings: &Settings) -> Result<Self, SolverError> {
        Ok(Self {
            settings: settings.ipm,
            mu: settings.ipm.mu_init,
            schedule: RegularizationSchedule::new(settings.regularization),
            linear_solver: create_symmetric_solver(&settings.linear_solver)?,
            subproblems_solved: 0,
            hessian_evaluations: 0,
        })
    }

    /// Barrier term `-mu * sum(log(gaps))` at an iterate, with clamped
    /// gaps so the measure stays finite at slightly violated points.
    pub fn barrier_term(&self, model: &dyn Model, iterate: &Iterate) -> f64 {
        let mut total = 0.0;
        for (i, range) in model.variable_bounds().iter().enumerate() {
            if range.lower.is_finite() {
                total += (iterate.x[i] - range.lower).max(GAP_FLOOR).ln();
            }
            if range.upper.is_finite() {
                total += (range.upper - iterate.x[i]).max(GAP_FLOOR).ln();
            }
        }
        if iterate.has_constraints() {
            for (j, range) in model.constraint_bounds().iter().enumerate() {
                if range.status() == ConstraintStatus::Equality {
                    continue;
                }
                let value = iterate.constraints()[j];
                if range.lower.is_finite() {
                    total += (value - range.lower).max(GAP_FLOOR).ln();
                }
                if range.upper.is_finite() {
                    total += (range.upper - value).max(GAP_FLOOR).ln();
                }
            }
        }
        -self.mu * total
    }

    pub fn solve(
        &mut self,
        model: &dyn Model,
        iterate: &mut Iterate,
        request: &SubproblemRequest,
    ) -> Result<Direction, SolverError> {
        let hessian = model.lagrangian_hessian(
            &iterate.x,
            request.objective_multiplier,
            &iterate.multipliers.constraints,
        )?;
        self.hessian_evaluations += 1;
        let local = build_local_model(model, iterate, hessian, request)?;
        let n = local.num_original;
        let total = n + local.num_elastic;
        let m = local.constraint_bounds.len();

        // primal start: the warm-start point, pushed inside the box only
        // when it is not already strictly interior (d = 0 always is, since
        // the iterate itself is kept strictly inside its bounds)
        let margin = self.mu.min(1e-2);
        let mut v = vec![0.0; total];
        for i in 0..total {
            let range = &local.variable_bounds[i];
            let value = local.initial_point[i];
            v[i] = if value > range.lower && value < range.upper {
                value
            } else {
                interior(value, range, margin)
            };
        }
        let mut s = vec![0.0; m];
        for j in 0..m {
            let range = &local.constraint_bounds[j];
            s[j] = match range.status() {
                ConstraintStatus::Equality => range.lower,
                ConstraintStatus::Unbounded => 0.0,
                _ => interior(0.0, range, margin),
            };
        }

        // dual start from the iterate's multipliers
        let mut zl = vec![0.0; total];
        let mut zu = vec![0.0; total];
        for i in 0..total {
            let range = &local.variable_bounds[i];
            if range.lower.is_finite() {
                let previous = if i < n {
                    iterate.multipliers.lower_bounds[i]
                } else {
                    0.0
                };
                zl[i] = previous.max(DUAL_FLOOR);
            }
            if range.upper.is_finite() {
                let previous = if i < n {
                    iterate.multipliers.upper_bounds[i]
                } else {
                    0.0
                };
                zu[i] = previous.max(DUAL_FLOOR);
            }
        }
        let mut y = vec![0.0; m];
        let mut wl = vec![0.0; m];
        let mut wu = vec![0.0; m];
        for j in 0..m {
            let range = &local.constraint_bounds[j];
            let lambda = iterate.multipliers.constraints[j];
            y[j] = -lambda;
            if range.status() == ConstraintStatus::Equality {
                continue;
            }
            if range.lower.is_finite() {
                wl[j] = lambda.max(DUAL_FLOOR);
            }
            if range.upper.is_finite() {
                wu[j] = (-lambda).max(DUAL_FLOOR);
            }
        }

        // residuals at the start point
        let mut hv = vec![0.0; total];
        local.hessian.multiply(&v, &mut hv);
        let mut r_v = vec![0.0; total];
        for i in 0..total {
            r_v[i] = hv[i] + local.gradient[i] - zl[i] + zu[i];
        }
        jacobian_transpose_product(&local.jacobian, &y, &mut r_v);
        let mut r_p = vec![0.0; m];
        jacobian_vector_product(&local.jacobian, &v, &mut r_p);
        for j in 0..m {
            r_p[j] -= s[j];
        }

        // barrier error drives the mu schedule
        let mut complementarity_error = 0.0_f64;
        for i in 0..total {
            let range = &local.variable_bounds[i];
            if range.lower.is_finite() {
                complementarity_error = complementarity_error
                    .max((zl[i] * (v[i] - range.lower) - self.mu).abs());
            }
            if range.upper.is_finite() {
                complementarity_error = complementarity_error
                    .max((zu[i] * (range.upper - v[i]) - self.mu).abs());
            }
        }
        for j in 0..m {
            let range = &local.constraint_bounds[j];
            if range.status() == ConstraintStatus::Equality {
                continue;
            }
            if range.lower.is_finite() {
                complementarity_error = complementarity_error
                    .max((wl[j] * (s[j] - range.lower) - self.mu).abs());
            }
            if range.upper.is_finite() {
                complementarity_error = complementarity_error
                    .max((wu[j] * (range.upper - s[j]) - self.mu).abs());
            }
        }
        let barrier_error = norm_inf(&r_v)
            .max(norm_inf(&r_p))
            .max(complementarity_error);
        if barrier_error <= self.settings.kappa_epsilon * self.mu {
            self.mu = self
                .settings
                .mu_min
                .max((self.settings.kappa_mu * self.mu).min(self.mu.powf(self.settings.theta_mu)));
        }
        let tau = self.settings.tau_min.max(1.0 - self.mu);

        // barrier curvature diagonals
        let mut primal_diagonal = vec![0.0; total];
        for i in 0..total {
            let range = &local.variable_bounds[i];
            if range.lower.is_finite() {
                primal_diagonal[i] += zl[i] / (v[i] - range.lower);
            }
            if range.upper.is_finite() {
                primal_diagonal[i] += zu[i] / (range.upper - v[i]);
            }
        }
        let mut dual_diagonal = vec![0.0; m];
        for j in 0..m {
            let range = &local.constraint_bounds[j];
            dual_diagonal[j] = match range.status() {
                ConstraintStatus::Equality => 0.0,
                ConstraintStatus::Unbounded => 1e16,
                _ => {
                    let mut sigma = 0.0;
                    if range.lower.is_finite() {
                        sigma += wl[j] / (s[j] - range.lower);
                    }
                    if range.upper.is_finite() {
                        sigma += wu[j] / (range.upper - s[j]);
                    }
                    1.0 / sigma
                }
            };
        }

        let mut kkt = assemble_kkt(
            Some(&local.hessian),
            &local.jacobian,
            &primal_diagonal,
            &dual_diagonal,
        );
        // inertia correction on the full KKT matrix
        let mut attempt = 0;
        let delta = loop {
            let delta = self.schedule.delta(attempt);
            if self.schedule.exceeded(delta) {
                return Err(SolverError::Numerical(
                    "interior-point KKT matrix could not be regularized".to_string(),
                ));
            }
            kkt.set_regularization(|i| {
                if i < total {
                    delta
                } else {
                    -DUAL_REGULARIZATION
                }
            });
            self.linear_solver.factorize(&kkt)?;
            if !self.linear_solver.is_singular()
                && self.linear_solver.inertia().matches(total, m)
            {
                break delta;
            }
            attempt += 1;
        };
        self.schedule.register_success(delta);

        // Newton right-hand side at the barrier target
        let mu = self.mu;
        let mut rhs = vec![0.0; total + m];
        for i in 0..total {
            // r_v with the bound-dual part replaced by the barrier gradient
            let mut value = r_v[i] + zl[i] - zu[i];
            let range = &local.variable_bounds[i];
            if range.lower.is_finite() {
                value -= mu / (v[i] - range.lower);
            }
            if range.upper.is_finite() {
                value += mu / (range.upper - v[i]);
            }
            rhs[i] = -value;
        }
        for j in 0..m {
            let range = &local.constraint_bounds[j];
            let mut value = -r_p[j];
            if range.status() != ConstraintStatus::Equality
                && range.status() != ConstraintStatus::Unbounded
            {
                let mut shifted = y[j];
                if range.lower.is_finite() {
                    shifted += mu / (s[j] - range.lower);
                }
                if range.upper.is_finite() {
                    shifted -= mu / (range.upper - s[j]);
                }
                value += dual_diagonal[j] * shifted;
            }
            rhs[total + j] = value;
        }
        let mut solution = vec![0.0; total + m];
        self.linear_solver.solve(&rhs, &mut solution);
        let dv = &solution[..total];
        let dy = &solution[total..];

        // recover slack and dual steps
        let mut ds = vec![0.0; m];
        let mut dwl = vec![0.0; m];
        let mut dwu = vec![0.0; m];
        for j in 0..m {
            let range = &local.constraint_bounds[j];
            match range.status() {
                ConstraintStatus::Equality => {}
                ConstraintStatus::Unbounded => {
                    let mut adv = 0.0;
                    if let Some(row_view) = local.jacobian.outer_view(j) {
                        for (column, &value) in row_view.iter() {
                            adv += value * dv[column];
                        }
                    }
                    ds[j] = adv;
                }
                _ => {
                    let mut shifted = y[j] + dy[j];
                    if range.lower.is_finite() {
                        shifted += mu / (s[j] - range.lower);
                    }
                    if range.upper.is_finite() {
                        shifted -= mu / (range.upper - s[j]);
                    }
                    ds[j] = dual_diagonal[j] * shifted;
                    if range.lower.is_finite() {
                        let gap = s[j] - range.lower;
                        dwl[j] = mu / gap - wl[j] - wl[j] / gap * ds[j];
                    }
                    if range.upper.is_finite() {
                        let gap = range.upper - s[j];
                        dwu[j] = mu / gap - wu[j] + wu[j] / gap * ds[j];
                    }
                }
            }
        }
        let mut dzl = vec![0.0; total];
        let mut dzu = vec![0.0; total];
        for i in 0..total {
            let range = &local.variable_bounds[i];
            if range.lower.is_finite() {
                let gap = v[i] - range.lower;
                dzl[i] = mu / gap - zl[i] - zl[i] / gap * dv[i];
            }
            if range.upper.is_finite() {
                let gap = range.upper - v[i];
                dzu[i] = mu / gap - zu[i] + zu[i] / gap * dv[i];
            }
        }

        // fraction to the boundary: scale the primal direction once, so
        // every damped step x + a*d stays strictly interior
        let mut primal_gaps = Vec::new();
        let mut primal_steps = Vec::new();
        for i in 0..total {
            let range = &local.variable_bounds[i];
            if range.lower.is_finite() {
                primal_gaps.push(v[i] - range.lower);
                primal_steps.push(dv[i]);
            }
            if range.upper.is_finite() {
                primal_gaps.push(range.upper - v[i]);
                primal_steps.push(-dv[i]);
            }
        }
        for j in 0..m {
            let range = &local.constraint_bounds[j];
            if range.status() == ConstraintStatus::Equality {
                continue;
            }
            if range.lower.is_finite() {
                primal_gaps.push(s[j] - range.lower);
                primal_steps.push(ds[j]);
            }
            if range.upper.is_finite() {
                primal_gaps.push(range.upper - s[j]);
                primal_steps.push(-ds[j]);
            }
        }
        let alpha_primal = fraction_to_boundary(&primal_gaps, &primal_steps, tau);

        let mut duals = Vec::new();
        let mut dual_steps = Vec::new();
        for i in 0..total {
            let range = &local.variable_bounds[i];
            if range.lower.is_finite() {
                duals.push(zl[i]);
                dual_steps.push(dzl[i]);
            }
            if range.upper.is_finite() {
                duals.push(zu[i]);
                dual_steps.push(dzu[i]);
            }
        }
        for j in 0..m {
            let range = &local.constraint_bounds[j];
            if range.status() == ConstraintStatus::Equality {
                continue;
            }
            if range.lower.is_finite() {
                duals.push(wl[j]);
                dual_steps.push(dwl[j]);
            }
            if range.upper.is_finite() {
                duals.push(wu[j]);
                dual_steps.push(dwu[j]);
            }
        }
        let alpha_dual = fraction_to_boundary(&duals, &dual_steps, tau);

        let v_new: Vec<f64> = (0..total).map(|i| v[i] + alpha_primal * dv[i]).collect();

        let mut direction = Direction::error(n, m);
        direction.primals = v_new[..n].to_vec();
        direction.elastics = v_new[n..].to_vec();
        direction.constraint_multipliers = (0..m)
            .map(|j| -(y[j] + alpha_dual * dy[j]))
            .collect();
        direction.lower_bound_multipliers =
            (0..n).map(|i| zl[i] + alpha_dual * dzl[i]).collect();
        direction.upper_bound_multipliers =
            (0..n).map(|i| zu[i] + alpha_dual * dzu[i]).collect();
        direction.objective_multiplier = request.objective_multiplier;
        direction.phase = request.phase;
        direction.status = SubproblemStatus::Optimal;
        direction.subproblem_objective =
            dot(&local.gradient, &v_new) + 0.5 * local.hessian.quadratic_form(&v_new);
        direction.optimality_reduction = OptimalityReductionModel {
            directional_derivative: dot(iterate.objective_gradient(), &direction.primals),
            curvature: local.hessian.quadratic_form(&v_new),
        };
        if let Some(elastics) = request.elastics {
            direction.constraint_partition = Some(elastics.partition(&direction.elastics, 1e-9));
        }
        direction.update_norm();
        self.subproblems_solved += 1;
        Ok(direction)
    }
}

// strictly interior value of a (nonempty) range, at least `margin` away
// from each finite side (the margin shrinks with the barrier parameter so
// the re-anchoring never pushes iterates off the central path)
fn interior(value: f64, range: &Range, margin: f64) -> f64 {
    let width = range.upper - range.lower;
    if range.lower.is_finite() && range.upper.is_finite() {
        if width <= GAP_FLOOR {
            return 0.5 * (range.lower + range.upper);
        }
        let pad = margin.min(0.25 * width);
        value.clamp(range.lower + pad, range.upper - pad)
    } else if range.lower.is_finite() {
        value.max(range.lower + margin)
    } else if range.upper.is_finite() {
        value.min(range.upper - margin)
    } else {
        value
    }
}
