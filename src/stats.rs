//! Per-asset return statistics: synthetic daily series, means, standard
//! deviations and the pairwise correlation matrix.

use crate::config::{NOISE_AMPLITUDE_MAX, NOISE_AMPLITUDE_MIN, TRADING_DAYS};
use crate::data::{self, Asset};
use crate::{Error, Result};
use rand::RngCore;
use rand_distr::{Distribution, Uniform};
use tracing::debug;

/// Produces a daily return series for one asset.
///
/// Every series produced for one estimator must have the same length.
pub trait ReturnSource {
    fn returns(&self, asset: &Asset, rng: &mut dyn RngCore) -> Vec<f64>;
}

/// Manufactures a year of daily returns from the purchase/current price pair.
///
/// Each period is the holding-period return spread evenly over `periods`
/// plus centered uniform noise whose amplitude is drawn once per asset.
#[derive(Clone, Copy, Debug)]
pub struct SyntheticReturns {
    pub periods: usize,
}

impl Default for SyntheticReturns {
    fn default() -> Self {
        Self {
            periods: TRADING_DAYS,
        }
    }
}

impl ReturnSource for SyntheticReturns {
    fn returns(&self, asset: &Asset, rng: &mut dyn RngCore) -> Vec<f64> {
        let drift = asset.total_return() / TRADING_DAYS as f64;
        let amplitude = Uniform::new(NOISE_AMPLITUDE_MIN, NOISE_AMPLITUDE_MAX).sample(rng);
        let unit = Uniform::new(0.0, 1.0);

        (0..self.periods)
            .map(|_| {
                let u: f64 = unit.sample(rng);
                drift + (u - 0.5) * amplitude
            })
            .collect()
    }
}

/// Everything the evaluator needs, index-aligned with the asset list.
#[derive(Clone, Debug)]
pub struct ReturnStatistics {
    pub returns: Vec<Vec<f64>>,
    pub means: Vec<f64>,
    pub std_devs: Vec<f64>,
    pub correlation: Vec<Vec<f64>>,
}

impl ReturnStatistics {
    /// Draws one series per asset from `source` and summarizes them.
    pub fn estimate(
        assets: &[Asset],
        source: &dyn ReturnSource,
        rng: &mut dyn RngCore,
    ) -> Result<Self> {
        data::validate_assets(assets)?;

        let returns: Vec<Vec<f64>> = assets.iter().map(|a| source.returns(a, rng)).collect();
        let expected = returns[0].len();
        for (asset, series) in assets.iter().zip(&returns) {
            if series.len() != expected || series.is_empty() {
                return Err(Error::SeriesLengthMismatch {
                    symbol: asset.symbol.clone(),
                    expected,
                    actual: series.len(),
                });
            }
        }

        Ok(Self::from_returns(returns))
    }

    /// Summarizes already-generated, equal-length, non-empty series.
    pub fn from_returns(returns: Vec<Vec<f64>>) -> Self {
        let means: Vec<f64> = returns.iter().map(|r| mean(r)).collect();
        let std_devs: Vec<f64> = returns
            .iter()
            .zip(&means)
            .map(|(r, &m)| population_std_dev(r, m))
            .collect();

        let n = returns.len();
        let mut correlation = vec![vec![0.0; n]; n];
        for i in 0..n {
            correlation[i][i] = 1.0;
            for j in (i + 1)..n {
                let denom = std_devs[i] * std_devs[j];
                let rho = if denom > 0.0 {
                    covariance(&returns[i], means[i], &returns[j], means[j]) / denom
                } else {
                    debug!("Zero-variance series at ({}, {}); correlation set to 0", i, j);
                    0.0
                };
                correlation[i][j] = rho;
                correlation[j][i] = rho;
            }
        }

        Self {
            returns,
            means,
            std_devs,
            correlation,
        }
    }

    pub fn asset_count(&self) -> usize {
        self.means.len()
    }

    /// Covariance of assets `i` and `j` implied by the correlation matrix.
    pub fn covariance(&self, i: usize, j: usize) -> f64 {
        self.correlation[i][j] * self.std_devs[i] * self.std_devs[j]
    }
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation dividing by the count, not count - 1.
pub fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn covariance(a: &[f64], mean_a: f64, b: &[f64], mean_b: f64) -> f64 {
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum();
    sum / a.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct FixedReturns(Vec<Vec<f64>>);

    impl ReturnSource for FixedReturns {
        fn returns(&self, asset: &Asset, _rng: &mut dyn RngCore) -> Vec<f64> {
            let idx = asset.symbol.parse::<usize>().unwrap();
            self.0[idx].clone()
        }
    }

    fn numbered_assets(n: usize) -> Vec<Asset> {
        (0..n)
            .map(|i| Asset::new(&i.to_string(), "Test", 1.0, 100.0, 110.0 + i as f64, "Test"))
            .collect()
    }

    #[test]
    fn test_synthetic_series_shape() {
        let mut rng = StdRng::seed_from_u64(5);
        let asset = Asset::new("A", "Alpha", 1.0, 90.0, 100.0, "Tech");
        let series = SyntheticReturns::default().returns(&asset, &mut rng);
        assert_eq!(series.len(), 252);

        // noise is bounded by half the largest amplitude around the drift
        let drift = (100.0 - 90.0) / 90.0 / 252.0;
        for r in &series {
            assert!((r - drift).abs() <= NOISE_AMPLITUDE_MAX / 2.0);
        }
    }

    #[test]
    fn test_population_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let m = mean(&values);
        assert_eq!(m, 5.0);
        assert!((population_std_dev(&values, m) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_matrix_symmetry_and_diagonal() {
        let mut rng = StdRng::seed_from_u64(11);
        let assets = numbered_assets(5);
        let stats = ReturnStatistics::estimate(&assets, &SyntheticReturns::default(), &mut rng)
            .unwrap();

        assert_eq!(stats.asset_count(), 5);
        assert_eq!(stats.correlation.len(), 5);
        for i in 0..5 {
            assert_eq!(stats.correlation[i].len(), 5);
            assert_eq!(stats.correlation[i][i], 1.0);
            for j in 0..5 {
                assert!((stats.correlation[i][j] - stats.correlation[j][i]).abs() < 1e-12);
                assert!(stats.correlation[i][j].abs() <= 1.0 + 1e-9);
            }
        }
    }

    #[test]
    fn test_perfectly_correlated_series() {
        let a = vec![0.01, -0.02, 0.03, 0.00];
        let b: Vec<f64> = a.iter().map(|x| 2.0 * x + 0.001).collect();
        let c: Vec<f64> = a.iter().map(|x| -x).collect();
        let stats = ReturnStatistics::from_returns(vec![a, b, c]);
        assert!((stats.correlation[0][1] - 1.0).abs() < 1e-9);
        assert!((stats.correlation[0][2] + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_variance_asset_is_clamped() {
        let source = FixedReturns(vec![vec![0.25; 4], vec![0.01, -0.02, 0.03, 0.0]]);
        let mut rng = StdRng::seed_from_u64(0);
        let stats = ReturnStatistics::estimate(&numbered_assets(2), &source, &mut rng).unwrap();
        assert_eq!(stats.std_devs[0], 0.0);
        assert_eq!(stats.correlation[0][0], 1.0);
        assert_eq!(stats.correlation[0][1], 0.0);
        assert_eq!(stats.correlation[1][0], 0.0);
    }

    #[test]
    fn test_mismatched_series_lengths_rejected() {
        let source = FixedReturns(vec![vec![0.01; 4], vec![0.02; 3]]);
        let mut rng = StdRng::seed_from_u64(0);
        let res = ReturnStatistics::estimate(&numbered_assets(2), &source, &mut rng);
        assert!(matches!(
            res,
            Err(Error::SeriesLengthMismatch { expected: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn test_empty_asset_list_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let res = ReturnStatistics::estimate(&[], &SyntheticReturns::default(), &mut rng);
        assert!(matches!(res, Err(Error::EmptyPortfolio)));
    }

    #[test]
    fn test_same_seed_same_statistics() {
        let assets = numbered_assets(3);
        let a = ReturnStatistics::estimate(
            &assets,
            &SyntheticReturns::default(),
            &mut StdRng::seed_from_u64(9),
        )
        .unwrap();
        let b = ReturnStatistics::estimate(
            &assets,
            &SyntheticReturns::default(),
            &mut StdRng::seed_from_u64(9),
        )
        .unwrap();
        assert_eq!(a.returns, b.returns);
        assert_eq!(a.correlation, b.correlation);
    }
}
