use crate::config::{self, FrontierFallback, OptimizerConfig, PARALLEL_BATCH_SIZE};
use crate::data::{self, Asset};
use crate::portfolio::{self, PortfolioMetrics, generate_random_weights, to_percent};
use crate::stats::{ReturnSource, ReturnStatistics, SyntheticReturns};
use crate::Result;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::{debug, info, warn};

// ──────────────────────────────────────────────────────────────────────────────
// Results
// ──────────────────────────────────────────────────────────────────────────────

/// An allocation with its annualized figures. Weights are percentages
/// rounded to two decimals, keyed by symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub weights: BTreeMap<String, f64>,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

/// One slot of the efficient frontier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EfficientFrontierPoint {
    pub target_return: f64,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub weights: BTreeMap<String, f64>,
    /// False when no trial landed near the target and the slot holds the
    /// fallback random sample.
    pub matched: bool,
}

// ──────────────────────────────────────────────────────────────────────────────
// Search primitives
// ──────────────────────────────────────────────────────────────────────────────

/// What a search keeps the best of.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Objective {
    MaxSharpe,
    MinVolatility,
}

impl Objective {
    /// Higher is better.
    fn score(self, metrics: &PortfolioMetrics) -> f64 {
        match self {
            Objective::MaxSharpe => metrics.sharpe_ratio,
            Objective::MinVolatility => -metrics.volatility,
        }
    }
}

#[derive(Clone, Debug)]
struct Candidate {
    trial: usize,
    weights: Vec<f64>,
    metrics: PortfolioMetrics,
    score: f64,
}

impl Candidate {
    /// Strictly better score wins; equal scores go to the earlier trial.
    fn beats(&self, other: &Candidate) -> bool {
        if other.score.is_nan() {
            return !self.score.is_nan() || self.trial < other.trial;
        }
        self.score > other.score || (self.score == other.score && self.trial < other.trial)
    }
}

type Acceptance<'a> = &'a (dyn Fn(&PortfolioMetrics) -> bool + Sync);

/// Samples one weight vector per trial in `trials`, keeping the best accepted one.
fn search_range(
    stats: &ReturnStatistics,
    trials: Range<usize>,
    rng: &mut (impl Rng + ?Sized),
    objective: Objective,
    accept: Acceptance<'_>,
    risk_free_rate: f64,
) -> Option<Candidate> {
    let n = stats.asset_count();
    let mut best: Option<Candidate> = None;

    for trial in trials {
        let weights = generate_random_weights(n, rng);
        let metrics = portfolio::evaluate_annualized(&weights, stats, risk_free_rate);
        if !accept(&metrics) {
            continue;
        }

        let candidate = Candidate {
            trial,
            score: objective.score(&metrics),
            weights,
            metrics,
        };
        if best.as_ref().is_none_or(|b| candidate.beats(b)) {
            best = Some(candidate);
        }
    }

    best
}

// ──────────────────────────────────────────────────────────────────────────────
// Optimizer
// ──────────────────────────────────────────────────────────────────────────────

/// Holds the asset list, its return statistics and the random stream used
/// by every search on this instance.
pub struct PortfolioOptimizer {
    assets: Vec<Asset>,
    stats: ReturnStatistics,
    config: OptimizerConfig,
    rng: StdRng,
}

impl PortfolioOptimizer {
    pub fn new(assets: Vec<Asset>, config: OptimizerConfig) -> Result<Self> {
        Self::with_source(assets, config, &SyntheticReturns::default())
    }

    pub fn with_seed(assets: Vec<Asset>, seed: u64) -> Result<Self> {
        Self::new(assets, OptimizerConfig::with_seed(seed))
    }

    /// Builds an optimizer whose return series come from `source`.
    pub fn with_source(
        assets: Vec<Asset>,
        config: OptimizerConfig,
        source: &dyn ReturnSource,
    ) -> Result<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let stats = ReturnStatistics::estimate(&assets, source, &mut rng)?;

        if config.parallel {
            config::init_cpu_parallelism();
        }

        info!(
            "Optimizer ready: {} assets, seed={:?}, parallel={}",
            assets.len(),
            config.seed,
            config.parallel
        );
        for (asset, (mean, std)) in assets.iter().zip(stats.means.iter().zip(&stats.std_devs)) {
            debug!(
                "  {}: daily mean={:.6}, daily std={:.6}",
                asset.symbol, mean, std
            );
        }

        Ok(Self {
            assets,
            stats,
            config,
            rng,
        })
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn statistics(&self) -> &ReturnStatistics {
        &self.stats
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Annualized metrics of an arbitrary weight vector aligned with [`Self::assets`].
    pub fn evaluate(&self, weights: &[f64]) -> PortfolioMetrics {
        portfolio::evaluate_annualized(weights, &self.stats, self.config.risk_free_rate)
    }

    /// Fresh random weight vector from this optimizer's stream.
    pub fn sample_weights(&mut self) -> Vec<f64> {
        generate_random_weights(self.assets.len(), &mut self.rng)
    }

    /// Runs `trials` independent samples and returns the best accepted one.
    fn monte_carlo_search(
        &mut self,
        trials: usize,
        objective: Objective,
        accept: Acceptance<'_>,
    ) -> Option<Candidate> {
        let rf = self.config.risk_free_rate;
        if !self.config.parallel {
            return search_range(&self.stats, 0..trials, &mut self.rng, objective, accept, rf);
        }

        let num_batches = trials.div_ceil(PARALLEL_BATCH_SIZE);
        let seeds: Vec<u64> = (0..num_batches).map(|_| self.rng.next_u64()).collect();
        let stats = &self.stats;

        seeds
            .into_par_iter()
            .enumerate()
            .filter_map(|(batch, seed)| {
                let mut rng = StdRng::seed_from_u64(seed);
                let start = batch * PARALLEL_BATCH_SIZE;
                let end = (start + PARALLEL_BATCH_SIZE).min(trials);
                search_range(stats, start..end, &mut rng, objective, accept, rf)
            })
            .reduce_with(|a, b| if b.beats(&a) { b } else { a })
    }

    /// Like [`Self::monte_carlo_search`] with every trial accepted. The
    /// stand-in for an empty search is a single random sample.
    fn search_all(&mut self, trials: usize, objective: Objective) -> Candidate {
        match self.monte_carlo_search(trials, objective, &|_| true) {
            Some(best) => best,
            None => {
                let weights = self.sample_weights();
                let metrics = self.evaluate(&weights);
                Candidate {
                    trial: 0,
                    score: objective.score(&metrics),
                    weights,
                    metrics,
                }
            }
        }
    }

    fn weight_map(&self, weights: &[f64]) -> BTreeMap<String, f64> {
        self.assets
            .iter()
            .zip(weights)
            .map(|(asset, &w)| (asset.symbol.clone(), to_percent(w)))
            .collect()
    }

    fn to_result(&self, weights: &[f64], metrics: PortfolioMetrics) -> OptimizationResult {
        OptimizationResult {
            weights: self.weight_map(weights),
            expected_return: metrics.expected_return,
            volatility: metrics.volatility,
            sharpe_ratio: metrics.sharpe_ratio,
        }
    }

    /// Random search for the highest Sharpe ratio.
    pub fn optimize_for_max_sharpe(&mut self) -> OptimizationResult {
        let trials = self.config.trials;
        info!(
            "Optimizing for max Sharpe: {} assets, {} random samples...",
            self.assets.len(),
            trials
        );
        let best = self.search_all(trials, Objective::MaxSharpe);
        debug!("Best Sharpe {:.4} found at trial {}", best.metrics.sharpe_ratio, best.trial);
        self.to_result(&best.weights, best.metrics)
    }

    /// Random search for the lowest annualized volatility.
    pub fn optimize_for_min_volatility(&mut self) -> OptimizationResult {
        let trials = self.config.trials;
        info!(
            "Optimizing for min volatility: {} assets, {} random samples...",
            self.assets.len(),
            trials
        );
        let best = self.search_all(trials, Objective::MinVolatility);
        debug!("Lowest volatility {:.4} found at trial {}", best.metrics.volatility, best.trial);
        self.to_result(&best.weights, best.metrics)
    }

    /// Lowest-volatility allocation per target return, sorted by volatility.
    ///
    /// Targets start at the risk-free rate and are spaced evenly below
    /// `frontier_max_return`. Unmatched targets follow
    /// [`OptimizerConfig::frontier_fallback`].
    pub fn generate_efficient_frontier(&mut self, points: usize) -> Vec<EfficientFrontierPoint> {
        if points == 0 {
            return Vec::new();
        }

        let rf = self.config.risk_free_rate;
        let step = (self.config.frontier_max_return - rf) / points as f64;
        info!(
            "Generating efficient frontier: {} targets, {} samples each...",
            points, self.config.frontier_trials
        );

        let mut frontier = Vec::with_capacity(points);
        let mut unmatched = 0usize;

        for k in 0..points {
            let target = rf + k as f64 * step;
            let fallback = self.sample_weights();

            if let Some(best) = self.search_target(target) {
                frontier.push(self.frontier_point(target, &best.weights, best.metrics, true));
                continue;
            }

            unmatched += 1;
            match self.config.frontier_fallback {
                FrontierFallback::Skip => {
                    debug!("No trial within tolerance of {:.4}; skipping", target);
                }
                FrontierFallback::RandomSample | FrontierFallback::Widen { .. } => {
                    let metrics = self.evaluate(&fallback);
                    frontier.push(self.frontier_point(target, &fallback, metrics, false));
                }
            }
        }

        if unmatched > 0 {
            warn!(
                "{} of {} frontier targets had no trial within tolerance (policy: {:?})",
                unmatched, points, self.config.frontier_fallback
            );
        }

        frontier.sort_by(|a, b| a.volatility.total_cmp(&b.volatility));
        frontier
    }

    fn search_target(&mut self, target: f64) -> Option<Candidate> {
        let trials = self.config.frontier_trials;
        let mut tolerance = self.config.frontier_tolerance;

        loop {
            let accept = move |m: &PortfolioMetrics| (m.expected_return - target).abs() < tolerance;
            if let Some(best) = self.monte_carlo_search(trials, Objective::MinVolatility, &accept) {
                return Some(best);
            }

            match self.config.frontier_fallback {
                FrontierFallback::Widen { max_tolerance } if tolerance * 2.0 <= max_tolerance => {
                    tolerance *= 2.0;
                    debug!("Widening tolerance for target {:.4} to {:.4}", target, tolerance);
                }
                _ => return None,
            }
        }
    }

    fn frontier_point(
        &self,
        target: f64,
        weights: &[f64],
        metrics: PortfolioMetrics,
        matched: bool,
    ) -> EfficientFrontierPoint {
        EfficientFrontierPoint {
            target_return: target,
            expected_return: metrics.expected_return,
            volatility: metrics.volatility,
            sharpe_ratio: metrics.sharpe_ratio,
            weights: self.weight_map(weights),
            matched,
        }
    }

    /// Market-value weights of the holdings as percentages.
    pub fn current_weights(&self) -> Result<BTreeMap<String, f64>> {
        let weights = data::market_weights(&self.assets)?;
        Ok(self.weight_map(&weights))
    }

    /// Evaluates the portfolio as currently held; no sampling involved.
    pub fn analyze_current_portfolio(&self) -> Result<OptimizationResult> {
        let weights = data::market_weights(&self.assets)?;
        let metrics = self.evaluate(&weights);
        Ok(self.to_result(&weights, metrics))
    }
}
