//! Sequoia: a sequential nonlinear-programming solver framework.
//!
//! Solves constrained nonlinear programs
//!
//! ```text
//! minimize    f(x)
//! subject to  c_L <= c(x) <= c_U
//!             x_L <= x <= x_U
//! ```
//!
//! with twice-differentiable f and c, by a sequential iterative loop: at
//! each step a convex local subproblem (QP, LP, or a primal-dual barrier
//! model) is solved for a search direction, and a globalization strategy
//! (an l1 merit function or a filter) accepts or rejects the trial point
//! under a line-search or trust-region mechanism. Infeasibility is
//! handled by a constraint-relaxation strategy: feasibility restoration
//! or an l1 exact-penalty reformulation with the Byrd-Nocedal-Waltz
//! penalty update.
//!
//! The solve returns a KKT point, a Fritz-John (infeasible stationary)
//! point, a small-step classification, or an iteration/time limit.
//!
//! # Example
//!
//! ```ignore
//! use sequoia_core::{minimize, Options};
//!
//! let mut options = Options::new();
//! options.set_str("constraint_relaxation", "l1_relaxation");
//! let result = minimize(&my_model, &options)?;
//! println!("{}: f = {}", result.status, result.objective);
//! ```

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod direction;
pub mod driver;
pub mod error;
pub mod globalization;
pub mod hessian;
pub mod iterate;
pub mod linalg;
pub mod model;
pub mod options;
pub mod progress;
pub mod relaxation;
pub mod solvers;
pub mod statistics;
pub mod subproblem;

pub use direction::{ConstraintPartition, Direction, Phase, SubproblemStatus};
pub use driver::{Optimizer, SolveInfo, SolveResult, SolveStatus};
pub use error::SolverError;
pub use iterate::{Iterate, Multipliers, TerminationStatus};
pub use model::{ConstraintStatus, Model, Range};
pub use options::{OptionValue, Options, Settings};

/// Solve a model with the given options.
pub fn minimize(
    model: &dyn Model,
    options: &Options,
) -> Result<SolveResult, SolverError> {
    Optimizer::new(options)?.solve(model)
}
