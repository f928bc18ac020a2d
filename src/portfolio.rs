use crate::config::{TRADING_DAYS, VOLATILITY_FLOOR};
use crate::stats::ReturnStatistics;
use rand::Rng;
use rand::distributions::Open01;

// ──────────────────────────────────────────────────────────────────────────────
// Metrics
// ──────────────────────────────────────────────────────────────────────────────

/// Annualized figures for one weight vector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PortfolioMetrics {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

impl PortfolioMetrics {
    /// Annualizes daily return and variance and derives the Sharpe ratio.
    pub fn annualize(daily_return: f64, daily_variance: f64, risk_free_rate: f64) -> Self {
        let expected_return = daily_return * TRADING_DAYS as f64;
        let volatility = daily_variance.sqrt() * (TRADING_DAYS as f64).sqrt();
        Self {
            expected_return,
            volatility,
            sharpe_ratio: sharpe_ratio(expected_return, volatility, risk_free_rate),
        }
    }
}

/// `(return - rf) / volatility`, with [`VOLATILITY_FLOOR`] standing in for an
/// exactly-zero volatility.
pub fn sharpe_ratio(annual_return: f64, annual_volatility: f64, risk_free_rate: f64) -> f64 {
    let denom = if annual_volatility == 0.0 {
        VOLATILITY_FLOOR
    } else {
        annual_volatility
    };
    (annual_return - risk_free_rate) / denom
}

pub fn portfolio_return(weights: &[f64], means: &[f64]) -> f64 {
    weights.iter().zip(means.iter()).map(|(w, r)| w * r).sum()
}

/// Full quadratic form `Σᵢ Σⱼ wᵢ wⱼ ρᵢⱼ σᵢ σⱼ`, diagonal included.
pub fn portfolio_variance(weights: &[f64], stats: &ReturnStatistics) -> f64 {
    let n = weights.len();
    let mut var = 0.0;
    for i in 0..n {
        for j in 0..n {
            var += weights[i] * weights[j] * stats.covariance(i, j);
        }
    }
    var
}

/// Daily `(expected_return, variance)` of a weight vector.
pub fn evaluate(weights: &[f64], stats: &ReturnStatistics) -> (f64, f64) {
    (
        portfolio_return(weights, &stats.means),
        portfolio_variance(weights, stats),
    )
}

pub fn evaluate_annualized(
    weights: &[f64],
    stats: &ReturnStatistics,
    risk_free_rate: f64,
) -> PortfolioMetrics {
    let (ret, var) = evaluate(weights, stats);
    PortfolioMetrics::annualize(ret, var, risk_free_rate)
}

// ──────────────────────────────────────────────────────────────────────────────
// Sampling
// ──────────────────────────────────────────────────────────────────────────────

/// Draws `n` uniform values from the open interval (0, 1) and normalizes them
/// to sum to 1.
pub fn generate_random_weights(n: usize, rng: &mut (impl Rng + ?Sized)) -> Vec<f64> {
    let raw: Vec<f64> = (0..n).map(|_| rng.sample(Open01)).collect();
    let sum: f64 = raw.iter().sum();
    raw.iter().map(|v| v / sum).collect()
}

/// Converts a fraction to a percentage rounded to two decimals.
pub fn to_percent(weight: f64) -> f64 {
    (weight * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn mock_statistics() -> ReturnStatistics {
        let mut rng = StdRng::seed_from_u64(21);
        let returns: Vec<Vec<f64>> = (0..3)
            .map(|i| {
                (0..252)
                    .map(|_| 0.0005 * i as f64 + rng.gen_range(-0.02..0.02))
                    .collect::<Vec<f64>>()
            })
            .collect();
        ReturnStatistics::from_returns(returns)
    }

    #[test]
    fn test_weights_sum_to_one() {
        let mut rng = StdRng::seed_from_u64(3);
        for n in 1..8 {
            for _ in 0..100 {
                let w = generate_random_weights(n, &mut rng);
                assert_eq!(w.len(), n);
                let sum: f64 = w.iter().sum();
                assert!((sum - 1.0).abs() < 1e-9, "Weights should sum to 1.0, got {}", sum);
                assert!(w.iter().all(|&v| v >= 0.0 && v.is_finite()));
            }
        }
    }

    #[test]
    fn test_single_asset_metrics() {
        let stats = ReturnStatistics::from_returns(vec![vec![0.01, -0.005, 0.02, 0.003]]);
        let (ret, var) = evaluate(&[1.0], &stats);
        assert_eq!(ret, stats.means[0]);
        assert!((var - stats.std_devs[0].powi(2)).abs() < 1e-15);
    }

    #[test]
    fn test_portfolio_variance_matches_covariance_form() {
        let stats = mock_statistics();
        let w = [0.2, 0.3, 0.5];
        let var = portfolio_variance(&w, &stats);
        assert!(var > 0.0);

        let mut expected = 0.0;
        for i in 0..3 {
            for j in 0..3 {
                expected += w[i]
                    * w[j]
                    * stats.correlation[i][j]
                    * stats.std_devs[i]
                    * stats.std_devs[j];
            }
        }
        assert!((var - expected).abs() < 1e-15);
    }

    #[test]
    fn test_annualization() {
        let m = PortfolioMetrics::annualize(0.001, 0.0001, 0.04);
        assert!((m.expected_return - 0.252).abs() < 1e-12);
        assert!((m.volatility - 0.01 * 252f64.sqrt()).abs() < 1e-12);
        assert!((m.sharpe_ratio - (0.252 - 0.04) / m.volatility).abs() < 1e-12);
    }

    #[test]
    fn test_sharpe_floor_on_zero_volatility() {
        assert!((sharpe_ratio(0.05, 0.0, 0.04) - 10.0).abs() < 1e-9);
        assert!((sharpe_ratio(0.14, 0.5, 0.04) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_to_percent_rounding() {
        assert_eq!(to_percent(0.123456), 12.35);
        assert_eq!(to_percent(1.0), 100.0);
        assert_eq!(to_percent(0.0), 0.0);
    }
}
