//! Option map and validated solver settings.
//!
//! Callers configure the solver through a keyed [`Options`] map; the driver
//! parses it into a [`Settings`] struct up front, so every invalid option
//! is surfaced before the first iteration.

use crate::error::SolverError;
use crate::linalg::vector::Norm;
use std::collections::BTreeMap;

/// A single option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// Keyed option map.
#[derive(Debug, Clone, Default)]
pub struct Options {
    values: BTreeMap<String, OptionValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_str(&mut self, key: &str, value: &str) -> &mut Self {
        self.values
            .insert(key.to_string(), OptionValue::Str(value.to_string()));
        self
    }

    pub fn set_int(&mut self, key: &str, value: i64) -> &mut Self {
        self.values.insert(key.to_string(), OptionValue::Int(value));
        self
    }

    pub fn set_float(&mut self, key: &str, value: f64) -> &mut Self {
        self.values.insert(key.to_string(), OptionValue::Float(value));
        self
    }

    pub fn set_bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.values.insert(key.to_string(), OptionValue::Bool(value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    fn take_str(&self, key: &str, default: &str) -> Result<String, SolverError> {
        match self.values.get(key) {
            None => Ok(default.to_string()),
            Some(OptionValue::Str(s)) => Ok(s.clone()),
            Some(other) => Err(SolverError::invalid_option(
                key,
                format!("expected a string, got {:?}", other),
            )),
        }
    }

    fn take_float(&self, key: &str, default: f64) -> Result<f64, SolverError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(OptionValue::Float(v)) => Ok(*v),
            Some(OptionValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(SolverError::invalid_option(
                key,
                format!("expected a number, got {:?}", other),
            )),
        }
    }

    fn take_usize(&self, key: &str, default: usize) -> Result<usize, SolverError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(OptionValue::Int(v)) if *v >= 0 => Ok(*v as usize),
            Some(other) => Err(SolverError::invalid_option(
                key,
                format!("expected a nonnegative integer, got {:?}", other),
            )),
        }
    }

    fn take_bool(&self, key: &str, default: bool) -> Result<bool, SolverError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(OptionValue::Bool(v)) => Ok(*v),
            Some(other) => Err(SolverError::invalid_option(
                key,
                format!("expected a bool, got {:?}", other),
            )),
        }
    }

    fn take_norm(&self, key: &str, default: Norm) -> Result<Norm, SolverError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(OptionValue::Str(s)) => s
                .parse::<Norm>()
                .map_err(|e| SolverError::invalid_option(key, e)),
            Some(other) => Err(SolverError::invalid_option(
                key,
                format!("expected a norm name, got {:?}", other),
            )),
        }
    }
}

/// Globalization strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyChoice {
    MeritFunction,
    FilterMethod,
    FletcherFilter,
}

/// Constraint-relaxation strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxationChoice {
    FeasibilityRestoration,
    L1Relaxation,
}

/// Inequality-handling method selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubproblemChoice {
    Qp,
    Lp,
    PrimalDualInteriorPoint,
}

/// Hessian model selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HessianChoice {
    Exact,
    Zero,
}

/// Step-control mechanism of the outer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanismChoice {
    LineSearch,
    TrustRegion,
}

/// Penalty-parameter update constants (Byrd-Nocedal-Waltz).
#[derive(Debug, Clone, Copy)]
pub struct PenaltySettings {
    pub rho_init: f64,
    pub tau: f64,
    pub eta: f64,
    pub epsilon1: f64,
    pub epsilon2: f64,
    pub rho_min: f64,
}

/// Barrier-parameter schedule of the interior-point subproblem.
#[derive(Debug, Clone, Copy)]
pub struct IpmSettings {
    pub mu_init: f64,
    pub mu_min: f64,
    pub kappa_mu: f64,
    pub theta_mu: f64,
    pub tau_min: f64,
    /// The mu-subproblem is converged when its error is below
    /// `kappa_epsilon * mu`.
    pub kappa_epsilon: f64,
}

/// Trust-region mechanism constants.
#[derive(Debug, Clone, Copy)]
pub struct TrustRegionSettings {
    pub radius_init: f64,
    pub radius_max: f64,
    pub radius_min: f64,
    pub decrease_factor: f64,
    pub increase_factor: f64,
    /// Grow the radius when the accepted step uses at least this fraction
    /// of it.
    pub activity_fraction: f64,
}

/// Inertia-correction schedule of the convexified Hessian model.
#[derive(Debug, Clone, Copy)]
pub struct RegularizationSettings {
    pub delta_init: f64,
    pub delta_min: f64,
    pub delta_max: f64,
    pub increase_factor: f64,
}

/// Filter globalization constants.
#[derive(Debug, Clone, Copy)]
pub struct FilterSettings {
    pub beta: f64,
    pub gamma: f64,
    /// Switching constant: an iteration is f-type when the predicted
    /// optimality reduction is at least `kappa * h^s_h`.
    pub kappa: f64,
    pub s_h: f64,
    /// Armijo fraction of the f-type sufficient-reduction test.
    pub armijo_fraction: f64,
    pub capacity: usize,
}

/// Validated solver settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub strategy: StrategyChoice,
    pub constraint_relaxation: RelaxationChoice,
    pub subproblem: SubproblemChoice,
    pub hessian_model: HessianChoice,
    pub convexify: bool,
    pub linear_solver: String,
    pub qp_solver: String,
    pub mechanism: MechanismChoice,

    pub tolerance: f64,
    pub loose_tolerance: f64,
    pub loose_tolerance_consecutive_iteration_threshold: usize,
    pub max_iterations: usize,
    /// Wall-clock limit in seconds.
    pub time_limit: Option<f64>,

    pub progress_norm: Norm,
    pub residual_norm: Norm,
    /// `s_max` of the residual scaling.
    pub residual_scaling_threshold: f64,

    pub penalty: PenaltySettings,
    pub ipm: IpmSettings,
    pub trust_region: TrustRegionSettings,
    pub regularization: RegularizationSettings,
    pub filter: FilterSettings,

    pub line_search_backtrack: f64,
    pub line_search_min_step: f64,

    pub restoration_switch_tolerance: f64,
    pub unbounded_objective_threshold: f64,
    pub divergence_threshold: f64,

    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strategy: StrategyChoice::MeritFunction,
            constraint_relaxation: RelaxationChoice::FeasibilityRestoration,
            subproblem: SubproblemChoice::Qp,
            hessian_model: HessianChoice::Exact,
            convexify: true,
            linear_solver: "ldl".to_string(),
            qp_solver: "ipqp".to_string(),
            mechanism: MechanismChoice::LineSearch,
            tolerance: 1e-8,
            loose_tolerance: 1e-6,
            loose_tolerance_consecutive_iteration_threshold: 15,
            max_iterations: 500,
            time_limit: None,
            progress_norm: Norm::L1,
            residual_norm: Norm::Inf,
            residual_scaling_threshold: 100.0,
            penalty: PenaltySettings {
                rho_init: 1.0,
                tau: 0.5,
                eta: 1e-8,
                epsilon1: 0.1,
                epsilon2: 0.1,
                rho_min: 1e-10,
            },
            ipm: IpmSettings {
                mu_init: 0.1,
                mu_min: 1e-9,
                kappa_mu: 0.2,
                theta_mu: 1.5,
                tau_min: 0.99,
                kappa_epsilon: 10.0,
            },
            trust_region: TrustRegionSettings {
                radius_init: 10.0,
                radius_max: 1e12,
                radius_min: 1e-16,
                decrease_factor: 0.5,
                increase_factor: 2.0,
                activity_fraction: 0.9,
            },
            regularization: RegularizationSettings {
                delta_init: 1e-4,
                delta_min: 1e-20,
                delta_max: 1e40,
                increase_factor: 8.0,
            },
            filter: FilterSettings {
                beta: 0.999,
                gamma: 1e-5,
                kappa: 1.0,
                s_h: 1.1,
                armijo_fraction: 1e-4,
                capacity: 50,
            },
            line_search_backtrack: 0.5,
            line_search_min_step: 1e-12,
            restoration_switch_tolerance: 1e-12,
            unbounded_objective_threshold: -1e20,
            divergence_threshold: 1e20,
            verbose: false,
        }
    }
}

impl Settings {
    /// Parse and validate an option map.
    pub fn from_options(options: &Options) -> Result<Self, SolverError> {
        let mut settings = Settings::default();

        settings.strategy = match options.take_str("strategy", "merit_function")?.as_str() {
            "merit_function" => StrategyChoice::MeritFunction,
            "filter_method" => StrategyChoice::FilterMethod,
            "fletcher_filter" => StrategyChoice::FletcherFilter,
            other => {
                return Err(SolverError::invalid_option(
                    "strategy",
                    format!(
                        "unknown strategy {:?}; available: merit_function, filter_method, fletcher_filter",
                        other
                    ),
                ))
            }
        };
        settings.constraint_relaxation = match options
            .take_str("constraint_relaxation", "feasibility_restoration")?
            .as_str()
        {
            "feasibility_restoration" => RelaxationChoice::FeasibilityRestoration,
            "l1_relaxation" => RelaxationChoice::L1Relaxation,
            other => {
                return Err(SolverError::invalid_option(
                    "constraint_relaxation",
                    format!(
                        "unknown relaxation {:?}; available: feasibility_restoration, l1_relaxation",
                        other
                    ),
                ))
            }
        };
        settings.subproblem = match options.take_str("subproblem", "QP")?.as_str() {
            "QP" => SubproblemChoice::Qp,
            "LP" => SubproblemChoice::Lp,
            "primal_dual_interior_point" => SubproblemChoice::PrimalDualInteriorPoint,
            other => {
                return Err(SolverError::invalid_option(
                    "subproblem",
                    format!(
                        "unknown subproblem {:?}; available: QP, LP, primal_dual_interior_point",
                        other
                    ),
                ))
            }
        };
        settings.hessian_model = match options.take_str("hessian_model", "exact")?.as_str() {
            "exact" => HessianChoice::Exact,
            "zero" => HessianChoice::Zero,
            other => {
                return Err(SolverError::invalid_option(
                    "hessian_model",
                    format!("unknown Hessian model {:?}; available: exact, zero", other),
                ))
            }
        };
        settings.mechanism = match options
            .take_str("globalization_mechanism", "line_search")?
            .as_str()
        {
            "line_search" => MechanismChoice::LineSearch,
            "trust_region" => MechanismChoice::TrustRegion,
            other => {
                return Err(SolverError::invalid_option(
                    "globalization_mechanism",
                    format!(
                        "unknown mechanism {:?}; available: line_search, trust_region",
                        other
                    ),
                ))
            }
        };

        settings.convexify = options.take_bool("convexify", true)?;
        settings.linear_solver = options.take_str("linear_solver", "ldl")?;
        settings.qp_solver = options.take_str("QP_solver", "ipqp")?;

        settings.tolerance = options.take_float("tolerance", settings.tolerance)?;
        settings.loose_tolerance =
            options.take_float("loose_tolerance", settings.loose_tolerance)?;
        settings.loose_tolerance_consecutive_iteration_threshold = options.take_usize(
            "loose_tolerance_consecutive_iteration_threshold",
            settings.loose_tolerance_consecutive_iteration_threshold,
        )?;
        settings.max_iterations =
            options.take_usize("max_iterations", settings.max_iterations)?;
        let time_limit = options.take_float("time_limit", f64::INFINITY)?;
        settings.time_limit = if time_limit.is_finite() {
            Some(time_limit)
        } else {
            None
        };

        settings.progress_norm = options.take_norm("progress_norm", settings.progress_norm)?;
        settings.residual_norm = options.take_norm("residual_norm", settings.residual_norm)?;

        settings.penalty.rho_init = options.take_float("rho_init", settings.penalty.rho_init)?;
        settings.penalty.tau = options.take_float("tau", settings.penalty.tau)?;
        settings.penalty.eta = options.take_float("eta", settings.penalty.eta)?;
        settings.penalty.epsilon1 = options.take_float("epsilon1", settings.penalty.epsilon1)?;
        settings.penalty.epsilon2 = options.take_float("epsilon2", settings.penalty.epsilon2)?;
        settings.penalty.rho_min = options.take_float("rho_min", settings.penalty.rho_min)?;

        settings.ipm.mu_init = options.take_float("mu_init", settings.ipm.mu_init)?;
        settings.ipm.mu_min = options.take_float("mu_min", settings.ipm.mu_min)?;
        settings.ipm.kappa_mu = options.take_float("kappa_mu", settings.ipm.kappa_mu)?;
        settings.ipm.theta_mu = options.take_float("theta_mu", settings.ipm.theta_mu)?;
        settings.ipm.tau_min = options.take_float("tau_min", settings.ipm.tau_min)?;

        settings.trust_region.radius_init =
            options.take_float("radius_init", settings.trust_region.radius_init)?;
        settings.trust_region.radius_max =
            options.take_float("radius_max", settings.trust_region.radius_max)?;
        settings.trust_region.decrease_factor =
            options.take_float("beta_tr", settings.trust_region.decrease_factor)?;

        settings.restoration_switch_tolerance = options.take_float(
            "restoration_switch_tolerance",
            settings.restoration_switch_tolerance,
        )?;
        settings.verbose = options.take_bool("verbose", false)?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SolverError> {
        if !(self.tolerance > 0.0) {
            return Err(SolverError::invalid_option(
                "tolerance",
                "must be positive",
            ));
        }
        if self.loose_tolerance < self.tolerance {
            return Err(SolverError::invalid_option(
                "loose_tolerance",
                "must be at least the tight tolerance",
            ));
        }
        if !(0.0 < self.penalty.tau && self.penalty.tau < 1.0) {
            return Err(SolverError::invalid_option("tau", "must lie in (0, 1)"));
        }
        if !(0.0 <= self.penalty.rho_init && self.penalty.rho_init <= 1.0) {
            return Err(SolverError::invalid_option(
                "rho_init",
                "must lie in [0, 1]",
            ));
        }
        if !(0.0 < self.line_search_backtrack && self.line_search_backtrack < 1.0) {
            return Err(SolverError::invalid_option(
                "line_search_backtrack",
                "must lie in (0, 1)",
            ));
        }
        if !(self.trust_region.radius_init > 0.0) {
            return Err(SolverError::invalid_option(
                "radius_init",
                "must be positive",
            ));
        }
        if !(0.0 < self.ipm.tau_min && self.ipm.tau_min < 1.0) {
            return Err(SolverError::invalid_option(
                "tau_min",
                "must lie in (0, 1)",
            ));
        }
        if self.subproblem == SubproblemChoice::Lp
            && self.mechanism != MechanismChoice::TrustRegion
        {
            return Err(SolverError::invalid_option(
                "subproblem",
                "the LP subproblem requires globalization_mechanism = trust_region",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::from_options(&Options::new()).unwrap();
        assert_eq!(settings.strategy, StrategyChoice::MeritFunction);
        assert_eq!(settings.penalty.rho_init, 1.0);
        assert_eq!(settings.tolerance, 1e-8);
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let mut options = Options::new();
        options.set_str("strategy", "steepest_descent");
        let error = Settings::from_options(&options).unwrap_err();
        assert!(matches!(error, SolverError::InvalidOption { .. }));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut options = Options::new();
        options.set_str("tolerance", "tiny");
        assert!(Settings::from_options(&options).is_err());
    }

    #[test]
    fn test_lp_requires_trust_region() {
        let mut options = Options::new();
        options.set_str("subproblem", "LP");
        assert!(Settings::from_options(&options).is_err());
        options.set_str("globalization_mechanism", "trust_region");
        assert!(Settings::from_options(&options).is_ok());
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let mut options = Options::new();
        options.set_float("tolerance", -1.0);
        assert!(Settings::from_options(&options).is_err());
    }
}
