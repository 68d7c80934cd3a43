//! Progress measures, predicted reductions and primal-dual residuals.
//!
//! Everything the globalization strategies and the termination tests
//! consume is computed here, in the norms selected by the options.

use crate::direction::Direction;
use crate::iterate::{Iterate, Multipliers};
use crate::linalg::vector::{norm, norm_1, Norm};
use crate::linalg::{jacobian_transpose_product, jacobian_vector_product};
use crate::model::Model;

/// `||violation(c(x) + a * J(x) d)||` in the given norm: the linearized
/// constraint violation at step length `step_length`.
pub fn linearized_constraint_violation(
    model: &dyn Model,
    iterate: &Iterate,
    direction: &Direction,
    step_length: f64,
    which: Norm,
) -> f64 {
    let constraints = iterate.constraints();
    let mut linearized = vec![0.0; constraints.len()];
    jacobian_vector_product(iterate.jacobian(), &direction.primals, &mut linearized);
    let violations: Vec<f64> = model
        .constraint_bounds()
        .iter()
        .zip(constraints.iter())
        .zip(linearized.iter())
        .map(|((range, &value), &jd)| range.violation(value + step_length * jd))
        .collect();
    norm(&violations, which)
}

/// Gradient of the Lagrangian
/// `s * f'(x) - J^T lambda - z_L + z_U`.
pub fn lagrangian_gradient(
    iterate: &Iterate,
    objective_multiplier: f64,
    multipliers: &Multipliers,
) -> Vec<f64> {
    let n = iterate.x.len();
    let mut gradient = vec![0.0; n];
    for (gi, &value) in gradient.iter_mut().zip(iterate.objective_gradient().iter()) {
        *gi = objective_multiplier * value;
    }
    let negated: Vec<f64> = multipliers.constraints.iter().map(|&l| -l).collect();
    jacobian_transpose_product(iterate.jacobian(), &negated, &mut gradient);
    for i in 0..n {
        gradient[i] += -multipliers.lower_bounds[i] + multipliers.upper_bounds[i];
    }
    gradient
}

/// Complementarity products of bounds and constraints as a vector, for the
/// residual accounting.
fn complementarity_products(
    model: &dyn Model,
    iterate: &Iterate,
    multipliers: &Multipliers,
) -> Vec<f64> {
    let mut products = Vec::new();
    for (i, range) in model.variable_bounds().iter().enumerate() {
        if range.lower.is_finite() {
            products.push(multipliers.lower_bounds[i] * (iterate.x[i] - range.lower));
        }
        if range.upper.is_finite() {
            products.push(multipliers.upper_bounds[i] * (range.upper - iterate.x[i]));
        }
    }
    let constraints = iterate.constraints();
    for (j, range) in model.constraint_bounds().iter().enumerate() {
        let multiplier = multipliers.constraints[j];
        let value = constraints[j];
        // violated constraints are measured through their elastic duals
        // (+1 below, -1 above), satisfied ones through ordinary products
        if value < range.lower {
            products.push((1.0 - multiplier) * (value - range.lower));
        } else if value > range.upper {
            products.push((1.0 + multiplier) * (value - range.upper));
        } else if multiplier > 0.0 && range.lower.is_finite() {
            products.push(multiplier * (value - range.lower));
        } else if multiplier < 0.0 && range.upper.is_finite() {
            products.push(multiplier * (value - range.upper));
        }
    }
    products
}

/// Scaling factor `max(s_max, ||duals||_1 / count) / s_max` applied to the
/// dual residuals, so huge multipliers do not mask convergence.
pub fn residual_scaling(
    multipliers: &Multipliers,
    num_variables: usize,
    num_constraints: usize,
    s_max: f64,
) -> f64 {
    let count = (num_variables + num_constraints).max(1);
    s_max.max(multipliers.norm_1() / count as f64) / s_max
}

/// Scaled stationarity and complementarity residuals at an iterate, both
/// at the given objective multiplier.
pub fn dual_residuals(
    model: &dyn Model,
    iterate: &Iterate,
    objective_multiplier: f64,
    which: Norm,
    s_max: f64,
) -> (f64, f64) {
    let scaling = residual_scaling(
        &iterate.multipliers,
        model.num_variables(),
        model.num_constraints(),
        s_max,
    );
    let gradient = lagrangian_gradient(iterate, objective_multiplier, &iterate.multipliers);
    let stationarity = norm(&gradient, which) / scaling;
    let products = complementarity_products(model, iterate, &iterate.multipliers);
    let complementarity = norm(&products, which) / scaling;
    (stationarity, complementarity)
}

/// Combined KKT/complementarity error of the penalty strategy, at penalty
/// parameter `rho`:
/// the L1 norm of the Lagrangian gradient plus complementarity terms. A
/// constraint violated below contributes `|(1 - lambda)(c - c_L)|`,
/// violated above `|(1 + lambda)(c - c_U)|` (the elastic duals of the
/// relaxed subproblem are +1 and -1 there), and strictly satisfied
/// constraints and interior bounds contribute their ordinary products.
pub fn combined_error(
    model: &dyn Model,
    iterate: &Iterate,
    multipliers: &Multipliers,
    rho: f64,
) -> f64 {
    let mut error = norm_1(&lagrangian_gradient(iterate, rho, multipliers));

    for (i, range) in model.variable_bounds().iter().enumerate() {
        if range.lower < iterate.x[i] && iterate.x[i] < range.upper {
            let multiplier = multipliers.lower_bounds[i] - multipliers.upper_bounds[i];
            if multiplier > 0.0 {
                error += (multiplier * (iterate.x[i] - range.lower)).abs();
            } else if multiplier < 0.0 {
                error += (multiplier * (iterate.x[i] - range.upper)).abs();
            }
        }
    }
    let constraints = iterate.constraints();
    for (j, range) in model.constraint_bounds().iter().enumerate() {
        let multiplier = multipliers.constraints[j];
        let value = constraints[j];
        if value < range.lower {
            error += ((1.0 - multiplier) * (value - range.lower)).abs();
        } else if value > range.upper {
            error += ((1.0 + multiplier) * (value - range.upper)).abs();
        } else if multiplier > 0.0 && range.lower.is_finite() {
            error += (multiplier * (value - range.lower)).abs();
        } else if multiplier < 0.0 && range.upper.is_finite() {
            error += (multiplier * (value - range.upper)).abs();
        }
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::Direction;
    use crate::error::SolverError;
    use crate::iterate::Iterate;
    use crate::linalg::coo::SymmetricCoo;
    use crate::model::Range;
    use sprs::TriMat;

    struct LineModel {
        bounds: Vec<Range>,
        constraint_bounds: Vec<Range>,
    }

    impl Model for LineModel {
        fn num_variables(&self) -> usize {
            1
        }
        fn num_constraints(&self) -> usize {
            1
        }
        fn variable_bounds(&self) -> &[Range] {
            &self.bounds
        }
        fn constraint_bounds(&self) -> &[Range] {
            &self.constraint_bounds
        }
        fn initial_primals(&self) -> Vec<f64> {
            vec![0.0]
        }
        fn objective(&self, x: &[f64]) -> Result<f64, SolverError> {
            Ok(x[0])
        }
        fn objective_gradient(&self, _x: &[f64]) -> Result<Vec<f64>, SolverError> {
            Ok(vec![1.0])
        }
        fn constraints(&self, x: &[f64]) -> Result<Vec<f64>, SolverError> {
            Ok(vec![x[0]])
        }
        fn jacobian(&self, _x: &[f64]) -> Result<sprs::CsMat<f64>, SolverError> {
            let mut jacobian = TriMat::new((1, 1));
            jacobian.add_triplet(0, 0, 1.0);
            Ok(jacobian.to_csr())
        }
        fn lagrangian_hessian(
            &self,
            _x: &[f64],
            _objective_multiplier: f64,
            _multipliers: &[f64],
        ) -> Result<SymmetricCoo, SolverError> {
            Ok(SymmetricCoo::new(1))
        }
    }

    fn line_model() -> LineModel {
        LineModel {
            bounds: vec![Range::UNBOUNDED],
            constraint_bounds: vec![Range::lower_bounded(1.0)],
        }
    }

    #[test]
    fn test_linearized_violation() {
        // c(x) = x >= 1 at x = 0: violation 1; direction d = 1 closes it
        let model = line_model();
        let mut iterate = Iterate::new(vec![0.0], Multipliers::zero(1, 1));
        iterate.evaluate_constraints(&model).unwrap();
        iterate.evaluate_jacobian(&model).unwrap();
        let mut direction = Direction::error(1, 1);
        direction.primals = vec![1.0];

        let at_zero =
            linearized_constraint_violation(&model, &iterate, &direction, 0.0, Norm::L1);
        let at_one =
            linearized_constraint_violation(&model, &iterate, &direction, 1.0, Norm::L1);
        assert!((at_zero - 1.0).abs() < 1e-15);
        assert_eq!(at_one, 0.0);
    }

    #[test]
    fn test_combined_error_vanishes_at_kkt() {
        // min x s.t. x >= 1: KKT at x = 1 with lambda = 1 and rho = 1
        let model = line_model();
        let mut iterate = Iterate::new(vec![1.0], Multipliers::zero(1, 1));
        iterate.multipliers.constraints[0] = 1.0;
        iterate.evaluate_objective_gradient(&model).unwrap();
        iterate.evaluate_constraints(&model).unwrap();
        iterate.evaluate_jacobian(&model).unwrap();
        let multipliers = iterate.multipliers.clone();
        let error = combined_error(&model, &iterate, &multipliers, 1.0);
        assert!(error.abs() < 1e-15);
    }

    #[test]
    fn test_combined_error_fj_at_violated_stationary_point() {
        // constraint x >= 1 violated at x = 0 with elastic dual 1:
        // the (1 - lambda) factor kills the violated-side term and the
        // rho = 0 Lagrangian gradient is -lambda * 1 + z = -1 ... so a
        // unit multiplier leaves exactly the gradient norm
        let model = line_model();
        let mut iterate = Iterate::new(vec![0.0], Multipliers::zero(1, 1));
        iterate.multipliers.constraints[0] = 1.0;
        iterate.evaluate_objective_gradient(&model).unwrap();
        iterate.evaluate_constraints(&model).unwrap();
        iterate.evaluate_jacobian(&model).unwrap();
        let multipliers = iterate.multipliers.clone();
        let error = combined_error(&model, &iterate, &multipliers, 0.0);
        // gradient term: |0 - 1*1| = 1; complementarity term: 0
        assert!((error - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_residual_scaling_kicks_in_for_huge_duals() {
        let mut multipliers = Multipliers::zero(1, 1);
        assert_eq!(residual_scaling(&multipliers, 1, 1, 100.0), 1.0);
        multipliers.constraints[0] = 1e6;
        assert!(residual_scaling(&multipliers, 1, 1, 100.0) > 1.0);
    }
}
