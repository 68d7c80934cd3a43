//! Per-iteration statistics channel.
//!
//! Rows are always collected and queryable from the solve result; with
//! `verbose` they are also pretty-printed as a fixed-width table, with
//! the header repeated periodically.

use crate::direction::Phase;

const HEADER_PERIOD: usize = 20;

/// One row of the iteration table.
#[derive(Debug, Clone)]
pub struct StatisticsRow {
    pub iteration: usize,
    pub phase: Phase,
    pub penalty_parameter: f64,
    pub direction_norm: f64,
    /// Step length (line search) or trust-region radius.
    pub step: f64,
    pub objective: f64,
    pub infeasibility: f64,
    pub status: &'static str,
}

pub struct Statistics {
    rows: Vec<StatisticsRow>,
    verbose: bool,
}

impl Statistics {
    pub fn new(verbose: bool) -> Self {
        Self {
            rows: Vec::new(),
            verbose,
        }
    }

    pub fn add_row(&mut self, row: StatisticsRow) {
        if self.verbose {
            if self.rows.len() % HEADER_PERIOD == 0 {
                eprintln!(
                    "{:>5} {:>7} {:>10} {:>10} {:>10} {:>14} {:>10}  {}",
                    "iter", "phase", "rho", "|d|", "step", "f", "h", "status"
                );
            }
            let phase = match row.phase {
                Phase::Optimality => "OPT",
                Phase::FeasibilityRestoration => "REST",
            };
            eprintln!(
                "{:>5} {:>7} {:>10.2e} {:>10.2e} {:>10.2e} {:>14.6e} {:>10.2e}  {}",
                row.iteration,
                phase,
                row.penalty_parameter,
                row.direction_norm,
                row.step,
                row.objective,
                row.infeasibility,
                row.status
            );
        }
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[StatisticsRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<StatisticsRow> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_collected() {
        let mut statistics = Statistics::new(false);
        statistics.add_row(StatisticsRow {
            iteration: 1,
            phase: Phase::Optimality,
            penalty_parameter: 1.0,
            direction_norm: 0.5,
            step: 1.0,
            objective: 2.0,
            infeasibility: 0.0,
            status: "accepted",
        });
        assert_eq!(statistics.rows().len(), 1);
        assert_eq!(statistics.rows()[0].iteration, 1);
    }
}
