use crate::config::{
    CONCENTRATION_LIMIT_PERCENT, DRIFT_LIMIT_PERCENT, HIGH_VOLATILITY, LOW_VOLATILITY,
    SHARPE_IMPROVEMENT_PERCENT,
};
use crate::optimizer::OptimizationResult;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Diversification,
    Rebalance,
    Risk,
    Opportunity,
    Success,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }
}

/// One piece of advice derived from the current and max-Sharpe allocations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

impl Recommendation {
    fn new(kind: RecommendationKind, priority: Priority, title: &str, description: String) -> Self {
        Self {
            kind,
            title: title.to_string(),
            description,
            priority,
        }
    }
}

/// Rule-based advice for the portfolio as held.
///
/// Weights in both results are percentages. Without a max-Sharpe result only
/// the concentration and volatility rules run. When no rule fires a single
/// `Success` entry is returned.
pub fn recommend(
    current: &OptimizationResult,
    max_sharpe: Option<&OptimizationResult>,
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if let Some((symbol, weight)) = current
        .weights
        .iter()
        .reduce(|top, next| if next.1 > top.1 { next } else { top })
    {
        if *weight > CONCENTRATION_LIMIT_PERCENT {
            out.push(Recommendation::new(
                RecommendationKind::Diversification,
                Priority::High,
                "Increase Portfolio Diversification",
                format!(
                    "Your top holding ({}) represents {:.1}% of your portfolio. Consider diversifying further to reduce concentration risk.",
                    symbol, weight
                ),
            ));
        }
    }

    if let Some(best) = max_sharpe {
        let drift = mean_drift(current, best);
        if drift > DRIFT_LIMIT_PERCENT {
            out.push(Recommendation::new(
                RecommendationKind::Rebalance,
                Priority::Medium,
                "Portfolio Rebalancing Recommended",
                format!(
                    "Your portfolio has drifted {:.1}% from optimal weights. Consider rebalancing to realign with your target allocation.",
                    drift
                ),
            ));
        }
    }

    if current.volatility > HIGH_VOLATILITY {
        out.push(Recommendation::new(
            RecommendationKind::Risk,
            Priority::Medium,
            "High Portfolio Volatility",
            format!(
                "Your portfolio volatility ({:.2}%) is higher than typical moderate portfolios. Consider increasing stable assets.",
                current.volatility * 100.0
            ),
        ));
    } else if current.volatility > 0.0 && current.volatility < LOW_VOLATILITY {
        out.push(Recommendation::new(
            RecommendationKind::Opportunity,
            Priority::Low,
            "Conservative Portfolio - Growth Opportunity",
            "Your portfolio is very conservative. Consider increasing growth assets to potentially boost long-term returns."
                .to_string(),
        ));
    }

    if let Some(best) = max_sharpe {
        if let Some(gain) = sharpe_improvement(current.sharpe_ratio, best.sharpe_ratio) {
            if gain > SHARPE_IMPROVEMENT_PERCENT {
                out.push(Recommendation::new(
                    RecommendationKind::Opportunity,
                    Priority::Medium,
                    "Potential Sharpe Ratio Improvement",
                    format!(
                        "By adjusting to the max Sharpe portfolio, you could improve your risk-adjusted returns by {:.1}%.",
                        gain
                    ),
                ));
            }
        }
    }

    if out.is_empty() {
        out.push(Recommendation::new(
            RecommendationKind::Success,
            Priority::Low,
            "Well-Optimized Portfolio",
            "Your portfolio appears to be well-balanced. Continue monitoring performance and rebalance annually."
                .to_string(),
        ));
    }

    debug!("{} recommendation(s) generated", out.len());
    out
}

/// Mean absolute difference, in percentage points, between the current
/// weights and `target`. Symbols absent from `target` count as 0%.
fn mean_drift(current: &OptimizationResult, target: &OptimizationResult) -> f64 {
    if current.weights.is_empty() {
        return 0.0;
    }
    let total: f64 = current
        .weights
        .iter()
        .map(|(symbol, w)| (w - target.weights.get(symbol).copied().unwrap_or(0.0)).abs())
        .sum();
    total / current.weights.len() as f64
}

/// Relative Sharpe gain in percent, measured against the magnitude of the
/// current ratio. A current ratio of zero yields `None` unless the best is
/// positive, which counts as unbounded improvement.
fn sharpe_improvement(current: f64, best: f64) -> Option<f64> {
    if !current.is_finite() || !best.is_finite() {
        return None;
    }
    if current == 0.0 {
        return (best > 0.0).then_some(f64::INFINITY);
    }
    Some((best - current) / current.abs() * 100.0)
}
