//! Built-in analytic test problems.

use sequoia_core::linalg::coo::SymmetricCoo;
use sequoia_core::{Model, Range, SolverError};
use sprs::{CsMat, TriMat};

/// A small NLP with closed-form oracles.
pub struct AnalyticProblem {
    pub name: &'static str,
    pub description: &'static str,
    variable_bounds: Vec<Range>,
    constraint_bounds: Vec<Range>,
    initial: Vec<f64>,
    objective: fn(&[f64]) -> f64,
    gradient: fn(&[f64]) -> Vec<f64>,
    constraints: fn(&[f64]) -> Vec<f64>,
    jacobian: fn(&[f64]) -> Vec<(usize, usize, f64)>,
    hessian: fn(&[f64], f64, &[f64]) -> Vec<(usize, usize, f64)>,
}

impl Model for AnalyticProblem {
    fn num_variables(&self) -> usize {
        self.variable_bounds.len()
    }
    fn num_constraints(&self) -> usize {
        self.constraint_bounds.len()
    }
    fn variable_bounds(&self) -> &[Range] {
        &self.variable_bounds
    }
    fn constraint_bounds(&self) -> &[Range] {
        &self.constraint_bounds
    }
    fn initial_primals(&self) -> Vec<f64> {
        self.initial.clone()
    }
    fn objective(&self, x: &[f64]) -> Result<f64, SolverError> {
        Ok((self.objective)(x))
    }
    fn objective_gradient(&self, x: &[f64]) -> Result<Vec<f64>, SolverError> {
        Ok((self.gradient)(x))
    }
    fn constraints(&self, x: &[f64]) -> Result<Vec<f64>, SolverError> {
        Ok((self.constraints)(x))
    }
    fn jacobian(&self, x: &[f64]) -> Result<CsMat<f64>, SolverError> {
        let mut jacobian = TriMat::new((self.num_constraints(), self.num_variables()));
        for (row, column, value) in (self.jacobian)(x) {
            jacobian.add_triplet(row, column, value);
        }
        Ok(jacobian.to_csr())
    }
    fn lagrangian_hessian(
        &self,
        x: &[f64],
        objective_multiplier: f64,
        multipliers: &[f64],
    ) -> Result<SymmetricCoo, SolverError> {
        let mut hessian = SymmetricCoo::new(self.num_variables());
        for (row, column, value) in (self.hessian)(x, objective_multiplier, multipliers) {
            hessian.insert(row, column, value);
        }
        Ok(hessian)
    }
}

/// All built-in problems.
pub fn all_problems() -> Vec<AnalyticProblem> {
    vec![
        rosenbrock(),
        hs071(),
        infeasible_toy(),
        degenerate_equality(),
        conflicting_circle(),
    ]
}

pub fn find_problem(name: &str) -> Option<AnalyticProblem> {
    all_problems().into_iter().find(|p| p.name == name)
}

fn rosenbrock() -> AnalyticProblem {
    AnalyticProblem {
        name: "rosenbrock",
        description: "unconstrained Rosenbrock valley, x0 = (-1.2, 1)",
        variable_bounds: vec![Range::UNBOUNDED; 2],
        constraint_bounds: Vec::new(),
        initial: vec![-1.2, 1.0],
        objective: |x| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2),
        gradient: |x| {
            let c = x[1] - x[0] * x[0];
            vec![-2.0 * (1.0 - x[0]) - 400.0 * x[0] * c, 200.0 * c]
        },
        constraints: |_| Vec::new(),
        jacobian: |_| Vec::new(),
        hessian: |x, s, _| {
            vec![
                (0, 0, s * (2.0 - 400.0 * x[1] + 1200.0 * x[0] * x[0])),
                (1, 0, s * (-400.0 * x[0])),
                (1, 1, s * 200.0),
            ]
        },
    }
}

fn hs071() -> AnalyticProblem {
    AnalyticProblem {
        name: "hs071",
        description: "Hock-Schittkowski 71, f* ~ 17.014017",
        variable_bounds: vec![Range::new(1.0, 5.0); 4],
        constraint_bounds: vec![Range::lower_bounded(25.0), Range::equality(40.0)],
        initial: vec![1.0, 5.0, 5.0, 1.0],
        objective: |x| x[0] * x[3] * (x[0] + x[1] + x[2]) + x[2],
        gradient: |x| {
            vec![
                x[3] * (2.0 * x[0] + x[1] + x[2]),
                x[0] * x[3],
                x[0] * x[3] + 1.0,
                x[0] * (x[0] + x[1] + x[2]),
            ]
        },
        constraints: |x| {
            vec![
                x[0] * x[1] * x[2] * x[3],
                x[0] * x[0] + x[1] * x[1] + x[2] * x[2] + x[3] * x[3],
            ]
        },
        jacobian: |x| {
            vec![
                (0, 0, x[1] * x[2] * x[3]),
                (0, 1, x[0] * x[2] * x[3]),
                (0, 2, x[0] * x[1] * x[3]),
                (0, 3, x[0] * x[1] * x[2]),
                (1, 0, 2.0 * x[0]),
                (1, 1, 2.0 * x[1]),
                (1, 2, 2.0 * x[2]),
                (1, 3, 2.0 * x[3]),
            ]
        },
        hessian: |x, s, l| {
            vec![
                (0, 0, s * 2.0 * x[3] - l[1] * 2.0),
                (1, 0, s * x[3] - l[0] * x[2] * x[3]),
                (1, 1, -l[1] * 2.0),
                (2, 0, s * x[3] - l[0] * x[1] * x[3]),
                (2, 1, -l[0] * x[0] * x[3]),
                (2, 2, -l[1] * 2.0),
                (3, 0, s * (2.0 * x[0] + x[1] + x[2]) - l[0] * x[1] * x[2]),
                (3, 1, s * x[0] - l[0] * x[0] * x[2]),
                (3, 2, s * x[0] - l[0] * x[0] * x[1]),
                (3, 3, -l[1] * 2.0),
            ]
        },
    }
}

fn infeasible_toy() -> AnalyticProblem {
    AnalyticProblem {
        name: "infeasible",
        description: "min x subject to x <= -1 and x >= 1 (jointly infeasible)",
        variable_bounds: vec![Range::UNBOUNDED],
        constraint_bounds: vec![Range::upper_bounded(-1.0), Range::lower_bounded(1.0)],
        initial: vec![0.0],
        objective: |x| x[0],
        gradient: |_| vec![1.0],
        constraints: |x| vec![x[0], x[0]],
        jacobian: |_| vec![(0, 0, 1.0), (1, 0, 1.0)],
        hessian: |_, _, _| Vec::new(),
    }
}

fn degenerate_equality() -> AnalyticProblem {
    AnalyticProblem {
        name: "degenerate",
        description: "min x1^2 subject to x1 + x2 = 1 and x1 - x2 = 1",
        variable_bounds: vec![Range::UNBOUNDED; 2],
        constraint_bounds: vec![Range::equality(1.0), Range::equality(1.0)],
        initial: vec![0.0, 0.0],
        objective: |x| x[0] * x[0],
        gradient: |x| vec![2.0 * x[0], 0.0],
        constraints: |x| vec![x[0] + x[1], x[0] - x[1]],
        jacobian: |_| vec![(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, -1.0)],
        hessian: |_, s, _| vec![(0, 0, 2.0 * s)],
    }
}

fn conflicting_circle() -> AnalyticProblem {
    AnalyticProblem {
        name: "circle",
        description: "min x1 subject to x1^2 + x2^2 <= 1 and x1 >= 2 (phase switch)",
        variable_bounds: vec![Range::UNBOUNDED; 2],
        constraint_bounds: vec![Range::upper_bounded(1.0), Range::lower_bounded(2.0)],
        initial: vec![0.0, 0.0],
        objective: |x| x[0],
        gradient: |_| vec![1.0, 0.0],
        constraints: |x| vec![x[0] * x[0] + x[1] * x[1], x[0]],
        jacobian: |x| vec![(0, 0, 2.0 * x[0]), (0, 1, 2.0 * x[1]), (1, 0, 1.0)],
        hessian: |_, _, l| vec![(0, 0, -2.0 * l[0]), (1, 1, -2.0 * l[0])],
    }
}
