use crate::{Error, Result};
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

static RAYON_INIT: OnceLock<()> = OnceLock::new();

/// Trading days per year, used both for series length and annualization.
pub const TRADING_DAYS: usize = 252;

/// Annual risk-free rate used in Sharpe calculations.
pub const RISK_FREE_RATE: f64 = 0.04;

/// Denominator substituted when annualized volatility is exactly zero.
pub const VOLATILITY_FLOOR: f64 = 0.001;

/// Lower bound of the per-asset synthetic noise amplitude.
pub const NOISE_AMPLITUDE_MIN: f64 = 0.02;
/// Upper bound (exclusive) of the per-asset synthetic noise amplitude.
pub const NOISE_AMPLITUDE_MAX: f64 = 0.05;

/// Random portfolios sampled by the max-Sharpe and min-volatility searches.
pub const OPTIMIZER_TRIALS: usize = 10_000;

/// Random portfolios sampled per efficient-frontier target.
pub const FRONTIER_TRIALS_PER_TARGET: usize = 2_000;

/// Default number of efficient-frontier points.
pub const DEFAULT_FRONTIER_POINTS: usize = 50;

/// Absolute tolerance around a frontier target return.
pub const FRONTIER_TOLERANCE: f64 = 0.01;

/// Frontier targets stay strictly below this annualized return.
pub const FRONTIER_MAX_RETURN: f64 = 0.30;

/// Trials per rayon batch when the parallel search is enabled.
pub const PARALLEL_BATCH_SIZE: usize = 500;

/// A single holding above this percentage triggers a diversification hint.
pub const CONCENTRATION_LIMIT_PERCENT: f64 = 30.0;
/// Mean absolute weight drift (percentage points) from the max-Sharpe mix
/// above which rebalancing is suggested.
pub const DRIFT_LIMIT_PERCENT: f64 = 5.0;
/// Annualized volatility bands for the risk and growth hints.
pub const HIGH_VOLATILITY: f64 = 0.25;
pub const LOW_VOLATILITY: f64 = 0.08;
/// Relative Sharpe gain (percent) worth reporting.
pub const SHARPE_IMPROVEMENT_PERCENT: f64 = 10.0;

pub const ENV_SEED: &str = "MPT_SEED";
pub const ENV_PARALLEL: &str = "MPT_PARALLEL";
pub const ENV_RISK_FREE_RATE: &str = "MPT_RISK_FREE_RATE";
pub const ENV_FRONTIER_FALLBACK: &str = "MPT_FRONTIER_FALLBACK";

/// What the frontier sweep emits for a target that no trial landed near.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum FrontierFallback {
    /// Emit the initial random sample for that slot, flagged as unmatched.
    #[default]
    RandomSample,
    /// Leave the target out of the frontier.
    Skip,
    /// Double the tolerance and retry until `max_tolerance` is exceeded,
    /// then fall back to [`FrontierFallback::RandomSample`]. `max_tolerance`
    /// must be at least the base frontier tolerance.
    Widen { max_tolerance: f64 },
}

impl FrontierFallback {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "random" | "random_sample" => Ok(Self::RandomSample),
            "skip" => Ok(Self::Skip),
            "widen" => Ok(Self::Widen {
                max_tolerance: FRONTIER_TOLERANCE * 8.0,
            }),
            other => Err(Error::InvalidConfig(format!(
                "unknown frontier fallback '{}', expected random | skip | widen",
                other
            ))),
        }
    }
}

/// Tunables for one optimizer instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Seed for the return synthesis and the weight sampler. `None` draws
    /// from OS entropy.
    pub seed: Option<u64>,
    pub risk_free_rate: f64,
    pub trials: usize,
    pub frontier_trials: usize,
    pub frontier_tolerance: f64,
    pub frontier_max_return: f64,
    pub frontier_fallback: FrontierFallback,
    pub parallel: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            risk_free_rate: RISK_FREE_RATE,
            trials: OPTIMIZER_TRIALS,
            frontier_trials: FRONTIER_TRIALS_PER_TARGET,
            frontier_tolerance: FRONTIER_TOLERANCE,
            frontier_max_return: FRONTIER_MAX_RETURN,
            frontier_fallback: FrontierFallback::default(),
            parallel: false,
        }
    }
}

impl OptimizerConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let cfg: Self = serde_json::from_reader(reader)?;
        cfg.validate()?;
        info!("Loaded optimizer config from {}", path.display());
        Ok(cfg)
    }

    /// Applies `MPT_*` environment overrides on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(raw) = get(ENV_SEED) {
            let seed = raw
                .parse::<u64>()
                .map_err(|_| Error::InvalidConfig(format!("{}={} is not a u64", ENV_SEED, raw)))?;
            self.seed = Some(seed);
        }
        if let Some(raw) = get(ENV_PARALLEL) {
            self.parallel = matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(raw) = get(ENV_RISK_FREE_RATE) {
            self.risk_free_rate = raw.parse::<f64>().map_err(|_| {
                Error::InvalidConfig(format!("{}={} is not a number", ENV_RISK_FREE_RATE, raw))
            })?;
        }
        if let Some(raw) = get(ENV_FRONTIER_FALLBACK) {
            self.frontier_fallback = FrontierFallback::parse(&raw)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 || self.frontier_trials == 0 {
            return Err(Error::InvalidConfig("trial counts must be > 0".to_string()));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(Error::InvalidConfig("risk_free_rate must be finite".to_string()));
        }
        if !(self.frontier_tolerance > 0.0) {
            return Err(Error::InvalidConfig("frontier_tolerance must be > 0".to_string()));
        }
        if !(self.frontier_max_return > self.risk_free_rate) {
            return Err(Error::InvalidConfig(format!(
                "frontier_max_return ({}) must exceed risk_free_rate ({})",
                self.frontier_max_return, self.risk_free_rate
            )));
        }
        if let FrontierFallback::Widen { max_tolerance } = self.frontier_fallback {
            if !(max_tolerance >= self.frontier_tolerance) {
                return Err(Error::InvalidConfig(format!(
                    "widen max_tolerance ({}) must be >= frontier_tolerance ({})",
                    max_tolerance, self.frontier_tolerance
                )));
            }
        }
        Ok(())
    }
}

pub fn init_cpu_parallelism() {
    RAYON_INIT.get_or_init(|| {
        let num_threads = num_cpus::get().max(1);
        match ThreadPoolBuilder::new().num_threads(num_threads).build_global() {
            Ok(_) => info!(
                "Initialized Rayon thread pool with {} threads (all logical CPU cores)",
                num_threads
            ),
            Err(e) => warn!(
                "Rayon thread pool already initialized or unavailable ({}). Using existing configuration.",
                e
            ),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_constants() {
        let cfg = OptimizerConfig::default();
        assert_eq!(cfg.trials, 10_000);
        assert_eq!(cfg.frontier_trials, 2_000);
        assert_eq!(cfg.risk_free_rate, 0.04);
        assert_eq!(cfg.frontier_fallback, FrontierFallback::RandomSample);
        assert!(cfg.seed.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_layer_on_top() {
        let cfg = OptimizerConfig::default()
            .with_overrides_from(lookup(&[
                (ENV_SEED, " 7 "),
                (ENV_PARALLEL, "true"),
                (ENV_RISK_FREE_RATE, "0.03"),
                (ENV_FRONTIER_FALLBACK, "skip"),
            ]))
            .unwrap();
        assert_eq!(cfg.seed, Some(7));
        assert!(cfg.parallel);
        assert_eq!(cfg.risk_free_rate, 0.03);
        assert_eq!(cfg.frontier_fallback, FrontierFallback::Skip);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let cfg = OptimizerConfig::with_seed(3)
            .with_overrides_from(lookup(&[(ENV_SEED, "  ")]))
            .unwrap();
        assert_eq!(cfg.seed, Some(3));
    }

    #[test]
    fn test_bad_env_seed_is_rejected() {
        let res = OptimizerConfig::default().with_overrides_from(lookup(&[(ENV_SEED, "abc")]));
        assert!(matches!(res, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_fallback_parse() {
        assert_eq!(FrontierFallback::parse("Random").unwrap(), FrontierFallback::RandomSample);
        assert!(matches!(
            FrontierFallback::parse("widen").unwrap(),
            FrontierFallback::Widen { .. }
        ));
        assert!(FrontierFallback::parse("nope").is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: OptimizerConfig =
            serde_json::from_str(r#"{"seed": 11, "frontier_fallback": {"policy": "skip"}}"#).unwrap();
        assert_eq!(cfg.seed, Some(11));
        assert_eq!(cfg.trials, OPTIMIZER_TRIALS);
        assert_eq!(cfg.frontier_fallback, FrontierFallback::Skip);
    }

    #[test]
    fn test_validate_rejects_zero_trials() {
        let cfg = OptimizerConfig {
            trials: 0,
            ..OptimizerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_widen_below_base_tolerance() {
        let narrow = OptimizerConfig {
            frontier_fallback: FrontierFallback::Widen {
                max_tolerance: FRONTIER_TOLERANCE / 2.0,
            },
            ..OptimizerConfig::default()
        };
        assert!(matches!(narrow.validate(), Err(Error::InvalidConfig(_))));

        let wide = OptimizerConfig {
            frontier_fallback: FrontierFallback::Widen {
                max_tolerance: FRONTIER_TOLERANCE,
            },
            ..OptimizerConfig::default()
        };
        assert!(wide.validate().is_ok());
    }
}
