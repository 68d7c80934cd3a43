//! Default QP/LP backend: a primal-dual interior-point method.
//!
//! Solves `min (1/2) v^T H v + g^T v` over `c_L <= A v <= c_U`,
//! `v_L <= v <= v_U` in the slack form `A v - s = 0`, `s` boxed, with log
//! barriers on every finite bound side and a Mehrotra-style adaptive
//! centering parameter. The condensed Newton system is the quasi-definite
//! KKT matrix of [`super::kkt`], factorized by the LDL backend.
//!
//! Infeasibility of the linearized constraints is classified with an
//! elastic phase-1 LP (always feasible by construction): a positive
//! minimal elastic sum means the QP is infeasible. Unboundedness is
//! flagged when the primal iterates diverge.

use super::kkt::{assemble_kkt, fraction_to_boundary};
use super::ldl::LdlSolver;
use super::{QpProblem, QpSolution, QpSolver, QpStatus, SymmetricIndefiniteSolver};
use crate::error::SolverError;
use crate::linalg::vector::norm_inf;
use crate::linalg::{jacobian_transpose_product, jacobian_vector_product};
use crate::model::{ConstraintStatus, Range};
use sprs::TriMat;

const MAX_ITERATIONS: usize = 200;
const RESIDUAL_TOLERANCE: f64 = 1e-10;
const COMPLEMENTARITY_TOLERANCE: f64 = 1e-11;
const FEASIBILITY_TOLERANCE: f64 = 1e-7;
const BOUNDARY_FRACTION: f64 = 0.995;
// curvature used to pin variables with a degenerate (width ~ 0) box
const PIN_CURVATURE: f64 = 1e16;
const DIVERGENCE_THRESHOLD: f64 = 1e9;

/// Default QP solver backend ("ipqp").
pub struct InteriorPointQpSolver {
    linear_solver: LdlSolver,
    max_iterations: usize,
}

impl InteriorPointQpSolver {
    pub fn new() -> Self {
        Self {
            linear_solver: LdlSolver::new(),
            max_iterations: MAX_ITERATIONS,
        }
    }
}

impl Default for InteriorPointQpSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl QpSolver for InteriorPointQpSolver {
    fn allocate(&mut self, _num_variables: usize, _num_constraints: usize) {
        // workspaces grow on demand inside the LDL backend
    }

    fn solve(&mut self, problem: &QpProblem) -> Result<QpSolution, SolverError> {
        let mut solution = self.solve_barrier(problem)?;
        if solution.status == QpStatus::Suboptimal {
            // classify: infeasible linearization or mere numerical stall
            solution.status = if self.linearization_is_infeasible(problem)? {
                QpStatus::Infeasible
            } else {
                QpStatus::Suboptimal
            };
        }
        Ok(solution)
    }
}

// one strictly interior value per bounded side (Ipopt-style push)
fn push_to_interior(value: f64, range: &Range) -> f64 {
    let width = range.upper - range.lower;
    if range.lower.is_finite() && range.upper.is_finite() {
        let pad = (0.01 * width).min(0.01 * (1.0 + range.lower.abs().max(range.upper.abs())));
        value.clamp(range.lower + pad, range.upper - pad)
    } else if range.lower.is_finite() {
        value.max(range.lower + 0.01 * (1.0 + range.lower.abs()))
    } else if range.upper.is_finite() {
        value.min(range.upper - 0.01 * (1.0 + range.upper.abs()))
    } else {
        value
    }
}

fn is_pinned(range: &Range) -> bool {
    range.lower.is_finite() && range.upper - range.lower < 1e-12
}

struct BarrierState {
    // primal
    v: Vec<f64>,
    s: Vec<f64>,
    // equality dual
    y: Vec<f64>,
    // bound duals, all nonnegative
    zl: Vec<f64>,
    zu: Vec<f64>,
    wl: Vec<f64>,
    wu: Vec<f64>,
}

struct Step {
    dv: Vec<f64>,
    ds: Vec<f64>,
    dy: Vec<f64>,
    dzl: Vec<f64>,
    dzu: Vec<f64>,
    dwl: Vec<f64>,
    dwu: Vec<f64>,
}

impl InteriorPointQpSolver {
    fn solve_barrier(&mut self, problem: &QpProblem) -> Result<QpSolution, SolverError> {
        let n = problem.num_variables();
        let m = problem.num_constraints();
        let var_bounds = problem.variable_bounds;
        let con_bounds = problem.constraint_bounds;

        let pinned: Vec<bool> = var_bounds.iter().map(is_pinned).collect();

        // strictly interior primal start
        let mut state = BarrierState {
            v: problem
                .initial_point
                .iter()
                .zip(var_bounds.iter())
                .map(|(&value, range)| {
                    if is_pinned(range) {
                        range.lower
                    } else {
                        push_to_interior(value, range)
                    }
                })
                .collect(),
            s: vec![0.0; m],
            y: vec![0.0; m],
            zl: var_bounds
                .iter()
                .map(|r| if r.lower.is_finite() { 1.0 } else { 0.0 })
                .collect(),
            zu: var_bounds
                .iter()
                .map(|r| if r.upper.is_finite() { 1.0 } else { 0.0 })
                .collect(),
            wl: vec![0.0; m],
            wu: vec![0.0; m],
        };
        for i in 0..n {
            if pinned[i] {
                state.zl[i] = 0.0;
                state.zu[i] = 0.0;
            }
        }

        let mut av = vec![0.0; m];
        jacobian_vector_product(problem.jacobian, &state.v, &mut av);
        for j in 0..m {
            let range = &con_bounds[j];
            match range.status() {
                ConstraintStatus::Equality => {
                    state.s[j] = range.lower;
                }
                ConstraintStatus::Unbounded => {
                    state.s[j] = av[j];
                }
                _ => {
                    state.s[j] = push_to_interior(av[j], range);
                    state.wl[j] = if range.lower.is_finite() { 1.0 } else { 0.0 };
                    state.wu[j] = if range.upper.is_finite() { 1.0 } else { 0.0 };
                }
            }
        }

        let gradient_scale = 1.0 + norm_inf(problem.gradient);
        let mut iterations = 0;
        let mut converged = false;

        let mut hv = vec![0.0; n];
        let mut r_v = vec![0.0; n];
        let mut r_p = vec![0.0; m];
        let mut kkt_rhs = vec![0.0; n + m];
        let mut kkt_solution = vec![0.0; n + m];

        while iterations < self.max_iterations {
            // residuals of the perturbed KKT system
            if let Some(hessian) = problem.hessian {
                hessian.multiply(&state.v, &mut hv);
            } else {
                hv.fill(0.0);
            }
            for i in 0..n {
                r_v[i] = hv[i] + problem.gradient[i] - state.zl[i] + state.zu[i];
            }
            jacobian_transpose_product(problem.jacobian, &state.y, &mut r_v);
            r_p.fill(0.0);
            jacobian_vector_product(problem.jacobian, &state.v, &mut r_p);
            for j in 0..m {
                r_p[j] -= state.s[j];
            }
            let mut r_s_norm = 0.0_f64;
            for j in 0..m {
                if con_bounds[j].status() != ConstraintStatus::Equality {
                    r_s_norm =
                        r_s_norm.max((-state.y[j] - state.wl[j] + state.wu[j]).abs());
                }
            }

            let (mu, count) = duality_measure(&state, var_bounds, con_bounds, &pinned);

            let primal_scale = 1.0 + norm_inf(&state.v).max(norm_inf(&state.s));
            if norm_inf(&r_v) <= RESIDUAL_TOLERANCE * gradient_scale.max(primal_scale)
                && norm_inf(&r_p) <= RESIDUAL_TOLERANCE * primal_scale
                && r_s_norm <= RESIDUAL_TOLERANCE * (1.0 + norm_inf(&state.y))
                && mu <= COMPLEMENTARITY_TOLERANCE
            {
                converged = true;
                break;
            }
            if norm_inf(&state.v) > DIVERGENCE_THRESHOLD {
                return Ok(self.extract_solution(problem, &state, QpStatus::Unbounded, iterations));
            }

            // barrier curvature diagonals
            let mut primal_diagonal = vec![0.0; n];
            for i in 0..n {
                if pinned[i] {
                    primal_diagonal[i] = PIN_CURVATURE;
                    continue;
                }
                let range = &var_bounds[i];
                if range.lower.is_finite() {
                    primal_diagonal[i] += state.zl[i] / (state.v[i] - range.lower);
                }
                if range.upper.is_finite() {
                    primal_diagonal[i] += state.zu[i] / (range.upper - state.v[i]);
                }
            }
            let mut dual_diagonal = vec![0.0; m];
            for j in 0..m {
                let range = &con_bounds[j];
                match range.status() {
                    ConstraintStatus::Equality => dual_diagonal[j] = 0.0,
                    ConstraintStatus::Unbounded => dual_diagonal[j] = PIN_CURVATURE,
                    _ => {
                        let mut sigma = 0.0;
                        if range.lower.is_finite() {
                            sigma += state.wl[j] / (state.s[j] - range.lower);
                        }
                        if range.upper.is_finite() {
                            sigma += state.wu[j] / (range.upper - state.s[j]);
                        }
                        dual_diagonal[j] = 1.0 / sigma;
                    }
                }
            }

            let mut kkt = assemble_kkt(
                problem.hessian,
                problem.jacobian,
                &primal_diagonal,
                &dual_diagonal,
            );
            // regularize until the factorization is quasi-definite
            let mut delta = 1e-8;
            loop {
                kkt.set_regularization(|i| if i < n { delta } else { -delta });
                self.linear_solver.factorize(&kkt)?;
                if !self.linear_solver.is_singular()
                    && self.linear_solver.inertia().matches(n, m)
                {
                    break;
                }
                delta *= 100.0;
                if delta > 1e-2 {
                    return Err(SolverError::Numerical(
                        "QP barrier KKT matrix could not be regularized".to_string(),
                    ));
                }
            }

            // affine-scaling predictor fixes the centering parameter
            let sigma = if count == 0 {
                0.0
            } else {
                let affine = self.compute_step(
                    problem,
                    &state,
                    &pinned,
                    &dual_diagonal,
                    &r_v,
                    &r_p,
                    0.0,
                    &mut kkt_rhs,
                    &mut kkt_solution,
                );
                let alpha_affine = step_lengths(&state, &affine, var_bounds, con_bounds, &pinned, 1.0);
                let mu_affine = predicted_duality_measure(
                    &state,
                    &affine,
                    var_bounds,
                    con_bounds,
                    &pinned,
                    alpha_affine,
                );
                let ratio = (mu_affine / mu).clamp(0.0, 1.0);
                (ratio * ratio * ratio).clamp(1e-6, 0.9)
            };

            let step = self.compute_step(
                problem,
                &state,
                &pinned,
                &dual_diagonal,
                &r_v,
                &r_p,
                sigma * mu,
                &mut kkt_rhs,
                &mut kkt_solution,
            );

            let (alpha_primal, alpha_dual) =
                primal_dual_step_lengths(&state, &step, var_bounds, con_bounds, &pinned);

            // a huge accepted step means the model decreases without bound
            if alpha_primal * norm_inf(&step.dv) > 1e10 {
                return Ok(self.extract_solution(problem, &state, QpStatus::Unbounded, iterations));
            }
            // stalled primal infeasibility with vanishing complementarity:
            // stop early and let phase-1 classify
            if count > 0 && mu < 1e-12 && norm_inf(&r_p) > 1e-6 * primal_scale {
                break;
            }
            if !norm_inf(&step.dv).is_finite() {
                break;
            }

            for i in 0..n {
                state.v[i] += alpha_primal * step.dv[i];
                state.zl[i] += alpha_dual * step.dzl[i];
                state.zu[i] += alpha_dual * step.dzu[i];
            }
            for j in 0..m {
                state.s[j] += alpha_primal * step.ds[j];
                state.y[j] += alpha_dual * step.dy[j];
                state.wl[j] += alpha_dual * step.dwl[j];
                state.wu[j] += alpha_dual * step.dwu[j];
            }
            iterations += 1;
        }

        let status = if converged {
            QpStatus::Optimal
        } else {
            QpStatus::Suboptimal
        };
        Ok(self.extract_solution(problem, &state, status, iterations))
    }

    /// One Newton step of the condensed system at centering target
    /// `mu_target`, using the current factorization.
    #[allow(clippy::too_many_arguments)]
    fn compute_step(
        &self,
        problem: &QpProblem,
        state: &BarrierState,
        pinned: &[bool],
        dual_diagonal: &[f64],
        r_v: &[f64],
        r_p: &[f64],
        mu_target: f64,
        rhs: &mut [f64],
        solution: &mut [f64],
    ) -> Step {
        let n = problem.num_variables();
        let m = problem.num_constraints();
        let var_bounds = problem.variable_bounds;
        let con_bounds = problem.constraint_bounds;

        // rhs_v = -(H v + g + A^T y - mu/gl + mu/gu)
        for i in 0..n {
            let mut value = r_v[i] + state.zl[i] - state.zu[i];
            if !pinned[i] {
                let range = &var_bounds[i];
                if range.lower.is_finite() {
                    value -= mu_target / (state.v[i] - range.lower);
                }
                if range.upper.is_finite() {
                    value += mu_target / (range.upper - state.v[i]);
                }
            }
            rhs[i] = -value;
        }
        // rhs_y = -r_p + S_s^-1 (y + mu/hl - mu/hu)
        for j in 0..m {
            let range = &con_bounds[j];
            let mut value = -r_p[j];
            if range.status() != ConstraintStatus::Equality {
                let mut shifted = state.y[j];
                if range.lower.is_finite() {
                    shifted += mu_target / (state.s[j] - range.lower);
                }
                if range.upper.is_finite() {
                    shifted -= mu_target / (range.upper - state.s[j]);
                }
                value += dual_diagonal[j] * shifted;
            }
            rhs[n + j] = value;
        }

        self.linear_solver.solve(&rhs[..n + m], &mut solution[..n + m]);
        let dv = solution[..n].to_vec();
        let dy = solution[n..n + m].to_vec();

        // recover slack and dual steps
        let mut ds = vec![0.0; m];
        let mut dwl = vec![0.0; m];
        let mut dwu = vec![0.0; m];
        for j in 0..m {
            let range = &con_bounds[j];
            match range.status() {
                ConstraintStatus::Equality => {}
                ConstraintStatus::Unbounded => {
                    // free slack tracks the row value; the row dual stays 0
                }
                _ => {
                    let mut shifted = state.y[j] + dy[j];
                    if range.lower.is_finite() {
                        shifted += mu_target / (state.s[j] - range.lower);
                    }
                    if range.upper.is_finite() {
                        shifted -= mu_target / (range.upper - state.s[j]);
                    }
                    ds[j] = dual_diagonal[j] * shifted;
                    if range.lower.is_finite() {
                        let gap = state.s[j] - range.lower;
                        dwl[j] = mu_target / gap - state.wl[j] - state.wl[j] / gap * ds[j];
                    }
                    if range.upper.is_finite() {
                        let gap = range.upper - state.s[j];
                        dwu[j] = mu_target / gap - state.wu[j] + state.wu[j] / gap * ds[j];
                    }
                }
            }
        }
        for j in 0..m {
            if con_bounds[j].status() == ConstraintStatus::Unbounded {
                let mut adv = 0.0;
                if let Some(row_view) = problem.jacobian.outer_view(j) {
                    for (column, &value) in row_view.iter() {
                        adv += value * dv[column];
                    }
                }
                ds[j] = adv;
            }
        }

        let mut dzl = vec![0.0; n];
        let mut dzu = vec![0.0; n];
        for i in 0..n {
            if pinned[i] {
                continue;
            }
            let range = &var_bounds[i];
            if range.lower.is_finite() {
                let gap = state.v[i] - range.lower;
                dzl[i] = mu_target / gap - state.zl[i] - state.zl[i] / gap * dv[i];
            }
            if range.upper.is_finite() {
                let gap = range.upper - state.v[i];
                dzu[i] = mu_target / gap - state.zu[i] + state.zu[i] / gap * dv[i];
            }
        }

        Step {
            dv,
            ds,
            dy,
            dzl,
            dzu,
            dwl,
            dwu,
        }
    }

    fn extract_solution(
        &self,
        problem: &QpProblem,
        state: &BarrierState,
        status: QpStatus,
        iterations: usize,
    ) -> QpSolution {
        let n = problem.num_variables();
        let mut objective = 0.0;
        if let Some(hessian) = problem.hessian {
            objective += 0.5 * hessian.quadratic_form(&state.v);
        }
        for i in 0..n {
            objective += problem.gradient[i] * state.v[i];
        }

        let mut lower_bound_multipliers = state.zl.clone();
        let mut upper_bound_multipliers = state.zu.clone();
        // pinned variables absorb their stationarity residual into the
        // bound multipliers
        let mut residual = vec![0.0; n];
        if let Some(hessian) = problem.hessian {
            hessian.multiply(&state.v, &mut residual);
        }
        for i in 0..n {
            residual[i] += problem.gradient[i];
        }
        jacobian_transpose_product(problem.jacobian, &state.y, &mut residual);
        for i in 0..n {
            if is_pinned(&problem.variable_bounds[i]) {
                lower_bound_multipliers[i] = residual[i].max(0.0);
                upper_bound_multipliers[i] = (-residual[i]).max(0.0);
            }
        }

        QpSolution {
            primals: state.v.clone(),
            constraint_multipliers: state.y.iter().map(|&yj| -yj).collect(),
            lower_bound_multipliers,
            upper_bound_multipliers,
            status,
            objective,
            iterations,
        }
    }

    /// Phase-1 classification: minimize the elastic sum of
    /// `A v + e_plus - e_minus` within the constraint bounds. A positive
    /// optimum proves the linearization infeasible.
    fn linearization_is_infeasible(&mut self, problem: &QpProblem) -> Result<bool, SolverError> {
        let n = problem.num_variables();
        let m = problem.num_constraints();

        let mut jacobian = TriMat::new((m, n + 2 * m));
        for (row, row_view) in problem.jacobian.outer_iterator().enumerate() {
            for (column, &value) in row_view.iter() {
                jacobian.add_triplet(row, column, value);
            }
        }
        for j in 0..m {
            jacobian.add_triplet(j, n + j, 1.0);
            jacobian.add_triplet(j, n + m + j, -1.0);
        }
        let jacobian = jacobian.to_csr();

        let mut gradient = vec![0.0; n + 2 * m];
        for g in gradient[n..].iter_mut() {
            *g = 1.0;
        }
        let mut variable_bounds = problem.variable_bounds.to_vec();
        variable_bounds.extend(std::iter::repeat(Range::lower_bounded(0.0)).take(2 * m));

        let mut av = vec![0.0; m];
        jacobian_vector_product(problem.jacobian, problem.initial_point, &mut av);
        let mut initial_point = problem.initial_point.to_vec();
        let mut elastic_init = vec![0.0; 2 * m];
        for j in 0..m {
            let range = &problem.constraint_bounds[j];
            elastic_init[j] = (range.lower - av[j]).max(0.0) + 1.0;
            elastic_init[m + j] = (av[j] - range.upper).max(0.0) + 1.0;
        }
        initial_point.extend_from_slice(&elastic_init);

        let phase1 = QpProblem {
            hessian: None,
            gradient: &gradient,
            jacobian: &jacobian,
            variable_bounds: &variable_bounds,
            constraint_bounds: problem.constraint_bounds,
            initial_point: &initial_point,
        };
        let solution = self.solve_barrier(&phase1)?;

        let bound_scale = problem
            .constraint_bounds
            .iter()
            .fold(1.0_f64, |acc, range| {
                let lo = if range.lower.is_finite() {
                    range.lower.abs()
                } else {
                    0.0
                };
                let hi = if range.upper.is_finite() {
                    range.upper.abs()
                } else {
                    0.0
                };
                acc.max(lo).max(hi)
            });
        Ok(solution.status == QpStatus::Optimal
            && solution.objective > FEASIBILITY_TOLERANCE * bound_scale)
    }
}

fn duality_measure(
    state: &BarrierState,
    var_bounds: &[Range],
    con_bounds: &[Range],
    pinned: &[bool],
) -> (f64, usize) {
    let mut total = 0.0;
    let mut count = 0;
    for i in 0..state.v.len() {
        if pinned[i] {
            continue;
        }
        let range = &var_bounds[i];
        if range.lower.is_finite() {
            total += state.zl[i] * (state.v[i] - range.lower);
            count += 1;
        }
        if range.upper.is_finite() {
            total += state.zu[i] * (range.upper - state.v[i]);
            count += 1;
        }
    }
    for j in 0..state.s.len() {
        let range = &con_bounds[j];
        if range.status() == ConstraintStatus::Equality {
            continue;
        }
        if range.lower.is_finite() {
            total += state.wl[j] * (state.s[j] - range.lower);
            count += 1;
        }
        if range.upper.is_finite() {
            total += state.wu[j] * (range.upper - state.s[j]);
            count += 1;
        }
    }
    if count == 0 {
        (0.0, 0)
    } else {
        (total / count as f64, count)
    }
}

fn predicted_duality_measure(
    state: &BarrierState,
    step: &Step,
    var_bounds: &[Range],
    con_bounds: &[Range],
    pinned: &[bool],
    alpha: f64,
) -> f64 {
    let mut total = 0.0;
    let mut count = 0;
    for i in 0..state.v.len() {
        if pinned[i] {
            continue;
        }
        let range = &var_bounds[i];
        if range.lower.is_finite() {
            total += (state.zl[i] + alpha * step.dzl[i])
                * (state.v[i] + alpha * step.dv[i] - range.lower);
            count += 1;
        }
        if range.upper.is_finite() {
            total += (state.zu[i] + alpha * step.dzu[i])
                * (range.upper - state.v[i] - alpha * step.dv[i]);
            count += 1;
        }
    }
    for j in 0..state.s.len() {
        let range = &con_bounds[j];
        if range.status() == ConstraintStatus::Equality {
            continue;
        }
        if range.lower.is_finite() {
            total += (state.wl[j] + alpha * step.dwl[j])
                * (state.s[j] + alpha * step.ds[j] - range.lower);
            count += 1;
        }
        if range.upper.is_finite() {
            total += (state.wu[j] + alpha * step.dwu[j])
                * (range.upper - state.s[j] - alpha * step.ds[j]);
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        (total / count as f64).max(0.0)
    }
}

fn collect_gaps_and_steps(
    state: &BarrierState,
    step: &Step,
    var_bounds: &[Range],
    con_bounds: &[Range],
    pinned: &[bool],
) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut primal_gaps = Vec::new();
    let mut primal_steps = Vec::new();
    let mut duals = Vec::new();
    let mut dual_steps = Vec::new();
    for i in 0..state.v.len() {
        if pinned[i] {
            continue;
        }
        let range = &var_bounds[i];
        if range.lower.is_finite() {
            primal_gaps.push(state.v[i] - range.lower);
            primal_steps.push(step.dv[i]);
            duals.push(state.zl[i]);
            dual_steps.push(step.dzl[i]);
        }
        if range.upper.is_finite() {
            primal_gaps.push(range.upper - state.v[i]);
            primal_steps.push(-step.dv[i]);
            duals.push(state.zu[i]);
            dual_steps.push(step.dzu[i]);
        }
    }
    for j in 0..state.s.len() {
        let range = &con_bounds[j];
        if range.status() == ConstraintStatus::Equality {
            continue;
        }
        if range.lower.is_finite() {
            primal_gaps.push(state.s[j] - range.lower);
            primal_steps.push(step.ds[j]);
            duals.push(state.wl[j]);
            dual_steps.push(step.dwl[j]);
        }
        if range.upper.is_finite() {
            primal_gaps.push(range.upper - state.s[j]);
            primal_steps.push(-step.ds[j]);
            duals.push(state.wu[j]);
            dual_steps.push(step.dwu[j]);
        }
    }
    (primal_gaps, primal_steps, duals, dual_steps)
}

fn step_lengths(
    state: &BarrierState,
    step: &Step,
    var_bounds: &[Range],
    con_bounds: &[Range],
    pinned: &[bool],
    tau: f64,
) -> f64 {
    let (primal_gaps, primal_steps, duals, dual_steps) =
        collect_gaps_and_steps(state, step, var_bounds, con_bounds, pinned);
    let alpha_primal = fraction_to_boundary(&primal_gaps, &primal_steps, tau);
    let alpha_dual = fraction_to_boundary(&duals, &dual_steps, tau);
    alpha_primal.min(alpha_dual)
}

fn primal_dual_step_lengths(
    state: &BarrierState,
    step: &Step,
    var_bounds: &[Range],
    con_bounds: &[Range],
    pinned: &[bool],
) -> (f64, f64) {
    let (primal_gaps, primal_steps, duals, dual_steps) =
        collect_gaps_and_steps(state, step, var_bounds, con_bounds, pinned);
    (
        fraction_to_boundary(&primal_gaps, &primal_steps, BOUNDARY_FRACTION),
        fraction_to_boundary(&duals, &dual_steps, BOUNDARY_FRACTION),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::coo::SymmetricCoo;

    fn solve(
        hessian: Option<&SymmetricCoo>,
        gradient: &[f64],
        triplets: &[(usize, usize, f64)],
        num_constraints: usize,
        variable_bounds: Vec<Range>,
        constraint_bounds: Vec<Range>,
    ) -> QpSolution {
        let n = gradient.len();
        let mut jacobian = TriMat::new((num_constraints, n));
        for &(i, j, v) in triplets {
            jacobian.add_triplet(i, j, v);
        }
        let jacobian = jacobian.to_csr();
        let initial = vec![0.0; n];
        let problem = QpProblem {
            hessian,
            gradient,
            jacobian: &jacobian,
            variable_bounds: &variable_bounds,
            constraint_bounds: &constraint_bounds,
            initial_point: &initial,
        };
        let mut solver = InteriorPointQpSolver::new();
        solver.solve(&problem).unwrap()
    }

    #[test]
    fn test_unconstrained_newton() {
        // min (v1-1)^2 + (v2+2)^2
        let mut hessian = SymmetricCoo::new(2);
        hessian.insert(0, 0, 2.0);
        hessian.insert(1, 1, 2.0);
        let solution = solve(
            Some(&hessian),
            &[-2.0, 4.0],
            &[],
            0,
            vec![Range::UNBOUNDED; 2],
            vec![],
        );
        assert_eq!(solution.status, QpStatus::Optimal);
        assert!((solution.primals[0] - 1.0).abs() < 1e-7);
        assert!((solution.primals[1] + 2.0).abs() < 1e-7);
    }

    #[test]
    fn test_equality_constrained() {
        // min v1^2 + v2^2 s.t. v1 + v2 = 2 -> (1, 1)
        let mut hessian = SymmetricCoo::new(2);
        hessian.insert(0, 0, 2.0);
        hessian.insert(1, 1, 2.0);
        let solution = solve(
            Some(&hessian),
            &[0.0, 0.0],
            &[(0, 0, 1.0), (0, 1, 1.0)],
            1,
            vec![Range::UNBOUNDED; 2],
            vec![Range::equality(2.0)],
        );
        assert_eq!(solution.status, QpStatus::Optimal);
        assert!((solution.primals[0] - 1.0).abs() < 1e-7);
        assert!((solution.primals[1] - 1.0).abs() < 1e-7);
        // stationarity: 2 v - lambda * (1, 1) = 0 -> lambda = 2
        assert!((solution.constraint_multipliers[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_active_bound() {
        // min v s.t. v >= 1
        let solution = solve(
            None,
            &[1.0],
            &[],
            0,
            vec![Range::lower_bounded(1.0)],
            vec![],
        );
        assert_eq!(solution.status, QpStatus::Optimal);
        assert!((solution.primals[0] - 1.0).abs() < 1e-6);
        // z_L = 1 at the active lower bound
        assert!((solution.lower_bound_multipliers[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_inequality_row() {
        // min (v1+1)^2 + v2^2 s.t. v1 + v2 >= 1 -> active, v = (0, 1)...
        // minimize over row v1 + v2 >= 1: solution (-0 + t) ... check KKT:
        // grad (2(v1+1), 2 v2) = lambda (1, 1), v1 + v2 = 1
        // 2 v1 + 2 = 2 v2 -> v2 = v1 + 1; v1 + v1 + 1 = 1 -> v1 = 0, v2 = 1
        let mut hessian = SymmetricCoo::new(2);
        hessian.insert(0, 0, 2.0);
        hessian.insert(1, 1, 2.0);
        let solution = solve(
            Some(&hessian),
            &[2.0, 0.0],
            &[(0, 0, 1.0), (0, 1, 1.0)],
            1,
            vec![Range::UNBOUNDED; 2],
            vec![Range::lower_bounded(1.0)],
        );
        assert_eq!(solution.status, QpStatus::Optimal);
        assert!((solution.primals[0] - 0.0).abs() < 1e-6);
        assert!((solution.primals[1] - 1.0).abs() < 1e-6);
        // lower-side active row: lambda > 0
        assert!(solution.constraint_multipliers[0] > 0.5);
    }

    #[test]
    fn test_infeasible_rows_detected() {
        // v <= -1 and v >= 1 cannot both hold
        let solution = solve(
            None,
            &[0.0],
            &[(0, 0, 1.0), (1, 0, 1.0)],
            2,
            vec![Range::UNBOUNDED],
            vec![Range::upper_bounded(-1.0), Range::lower_bounded(1.0)],
        );
        assert_eq!(solution.status, QpStatus::Infeasible);
    }

    #[test]
    fn test_unbounded_lp() {
        // min v with no bounds diverges
        let solution = solve(None, &[1.0], &[], 0, vec![Range::UNBOUNDED], vec![]);
        assert_eq!(solution.status, QpStatus::Unbounded);
    }
}
