//! LP inequality-handling method: the QP model with a zero Hessian.
//!
//! First-order only, so it relies on the trust region to stay bounded;
//! the options layer rejects LP with a line-search mechanism.

use super::{build_local_model, SubproblemRequest};
use crate::direction::Direction;
use crate::error::SolverError;
use crate::iterate::Iterate;
use crate::linalg::coo::SymmetricCoo;
use crate::model::Model;
use crate::options::Settings;
use crate::solvers::{create_qp_solver, QpSolver};

pub struct LpSubproblem {
    qp_solver: Box<dyn QpSolver>,
    pub subproblems_solved: usize,
}

impl LpSubproblem {
    pub fn from_settings(settings: &Settings) -> Result<Self, SolverError> {
        Ok(Self {
            qp_solver: create_qp_solver(&settings.qp_solver)?,
            subproblems_solved: 0,
        })
    }

    pub fn solve(
        &mut self,
        model: &dyn Model,
        iterate: &mut Iterate,
        request: &SubproblemRequest,
    ) -> Result<Direction, SolverError> {
        let hessian = SymmetricCoo::new(model.num_variables());
        let local = build_local_model(model, iterate, hessian, request)?;
        let direction =
            super::qp::solve_local_qp(self.qp_solver.as_mut(), model, iterate, &local, request)?;
        self.subproblems_solved += 1;
        Ok(direction)
    }
}
