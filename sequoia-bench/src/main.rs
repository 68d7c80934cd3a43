//! CLI driver for the sequoia solver.
//!
//! Runs a named built-in problem with option overrides and maps the final
//! status to a process exit code:
//! 0 = KKT, 1 = Fritz-John / infeasible stationary, 2 = iteration limit,
//! 3 = time limit, 4 = numerical error.

mod problems;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use sequoia_core::{minimize, Options, SolveStatus};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "sequoia-bench")]
#[command(about = "CLI driver for the sequoia NLP solver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a built-in problem
    Run {
        /// Problem name (see `list`)
        problem: String,
        /// Globalization strategy
        #[arg(long, default_value = "merit_function")]
        strategy: String,
        /// Constraint-relaxation strategy
        #[arg(long, default_value = "feasibility_restoration")]
        constraint_relaxation: String,
        /// Subproblem: QP, LP or primal_dual_interior_point
        #[arg(long, default_value = "QP")]
        subproblem: String,
        /// Step-control mechanism
        #[arg(long, default_value = "line_search")]
        mechanism: String,
        /// Termination tolerance
        #[arg(long, default_value = "1e-8")]
        tolerance: f64,
        /// Maximum outer iterations
        #[arg(long, default_value = "500")]
        max_iterations: i64,
        /// Wall-clock limit in seconds
        #[arg(long)]
        time_limit: Option<f64>,
        /// Print the iteration table
        #[arg(long)]
        verbose: bool,
    },
    /// List the built-in problems
    List,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::from(4)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::List => {
            for problem in problems::all_problems() {
                println!("{:<12} {}", problem.name, problem.description);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            problem,
            strategy,
            constraint_relaxation,
            subproblem,
            mechanism,
            tolerance,
            max_iterations,
            time_limit,
            verbose,
        } => {
            let Some(model) = problems::find_problem(&problem) else {
                bail!("unknown problem {:?}; try `sequoia-bench list`", problem);
            };

            let mut options = Options::new();
            options.set_str("strategy", &strategy);
            options.set_str("constraint_relaxation", &constraint_relaxation);
            options.set_str("subproblem", &subproblem);
            options.set_str("globalization_mechanism", &mechanism);
            options.set_float("tolerance", tolerance);
            options.set_int("max_iterations", max_iterations);
            options.set_bool("verbose", verbose);
            if let Some(limit) = time_limit {
                options.set_float("time_limit", limit);
            }

            let result = minimize(&model, &options)?;

            println!("status:        {}", result.status);
            println!("objective:     {:.10e}", result.objective);
            println!("infeasibility: {:.4e}", result.infeasibility);
            println!("stationarity:  {:.4e}", result.info.stationarity);
            println!(
                "iterations:    {} ({} subproblems, {} Hessian evaluations)",
                result.info.iterations,
                result.info.subproblems_solved,
                result.info.hessian_evaluations
            );
            println!("time:          {} ms", result.info.solve_time_ms);
            if result.info.loose_tolerance_used {
                println!("note:          terminated at the loose tolerance");
            }

            Ok(ExitCode::from(exit_code(result.status)))
        }
    }
}

fn exit_code(status: SolveStatus) -> u8 {
    match status {
        SolveStatus::KktPoint | SolveStatus::FeasibleSmallStep => 0,
        SolveStatus::FjPoint | SolveStatus::InfeasibleSmallStep => 1,
        SolveStatus::MaxIterations => 2,
        SolveStatus::TimeLimit => 3,
        SolveStatus::Unbounded | SolveStatus::NumericalError => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(SolveStatus::KktPoint), 0);
        assert_eq!(exit_code(SolveStatus::FjPoint), 1);
        assert_eq!(exit_code(SolveStatus::MaxIterations), 2);
        assert_eq!(exit_code(SolveStatus::TimeLimit), 3);
        assert_eq!(exit_code(SolveStatus::NumericalError), 4);
    }

    #[test]
    fn test_all_problems_listed() {
        let names: Vec<&str> = problems::all_problems().iter().map(|p| p.name).collect();
        assert!(names.contains(&"rosenbrock"));
        assert!(names.contains(&"hs071"));
        assert!(names.contains(&"infeasible"));
    }
}
