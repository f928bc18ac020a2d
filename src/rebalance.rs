use crate::data::{self, Asset};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trade needed to move one holding to its target weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceAction {
    pub symbol: String,
    pub current_percent: f64,
    pub target_percent: f64,
    /// Positive = buy, negative = sell, in currency.
    pub value_delta: f64,
    /// Whole shares at the current price, truncated toward zero.
    pub share_delta: f64,
}

impl RebalanceAction {
    pub fn side(&self) -> &'static str {
        if self.share_delta > 0.0 {
            "BUY"
        } else if self.share_delta < 0.0 {
            "SELL"
        } else {
            "HOLD"
        }
    }
}

/// Compares current holdings with `target` percentages (as found in an
/// optimization result) for a portfolio worth `capital` after rebalancing.
/// `None` keeps the current market value. Symbols missing from `target`
/// are sold down to zero.
pub fn rebalance_plan(
    assets: &[Asset],
    target: &BTreeMap<String, f64>,
    capital: Option<f64>,
) -> Result<Vec<RebalanceAction>> {
    let current = data::market_weights(assets)?;
    let capital = capital.unwrap_or_else(|| data::portfolio_value(assets));

    let mut actions: Vec<RebalanceAction> = assets
        .iter()
        .zip(current)
        .map(|(asset, weight)| {
            let target_percent = target.get(&asset.symbol).copied().unwrap_or(0.0);
            let value_delta = capital * target_percent / 100.0 - asset.market_value();
            let share_delta = if asset.current_price > 0.0 {
                (value_delta / asset.current_price).trunc()
            } else {
                0.0
            };
            RebalanceAction {
                symbol: asset.symbol.clone(),
                current_percent: weight * 100.0,
                target_percent,
                value_delta,
                share_delta,
            }
        })
        .collect();

    // largest trades first
    actions.sort_by(|a, b| b.value_delta.abs().total_cmp(&a.value_delta.abs()));
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holdings() -> Vec<Asset> {
        vec![
            Asset::new("A", "Alpha", 10.0, 90.0, 100.0, "Technology"),
            Asset::new("B", "Beta", 20.0, 55.0, 50.0, "Energy"),
        ]
    }

    #[test]
    fn test_plan_moves_value_between_assets() {
        let target = BTreeMap::from([("A".to_string(), 75.0), ("B".to_string(), 25.0)]);
        let plan = rebalance_plan(&holdings(), &target, None).unwrap();

        assert_eq!(plan.len(), 2);
        let a = plan.iter().find(|p| p.symbol == "A").unwrap();
        let b = plan.iter().find(|p| p.symbol == "B").unwrap();
        assert!((a.current_percent - 50.0).abs() < 1e-9);
        assert!((a.value_delta - 500.0).abs() < 1e-9);
        assert_eq!(a.share_delta, 5.0);
        assert_eq!(a.side(), "BUY");
        assert!((b.value_delta + 500.0).abs() < 1e-9);
        assert_eq!(b.share_delta, -10.0);
        assert_eq!(b.side(), "SELL");

        let net: f64 = plan.iter().map(|p| p.value_delta).sum();
        assert!(net.abs() < 1e-9);
    }

    #[test]
    fn test_plan_with_new_capital() {
        let target = BTreeMap::from([("A".to_string(), 50.0), ("B".to_string(), 50.0)]);
        let plan = rebalance_plan(&holdings(), &target, Some(4_000.0)).unwrap();
        let net: f64 = plan.iter().map(|p| p.value_delta).sum();
        assert!((net - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_symbols_missing_from_target_are_sold() {
        let target = BTreeMap::from([("A".to_string(), 100.0)]);
        let plan = rebalance_plan(&holdings(), &target, None).unwrap();
        let b = plan.iter().find(|p| p.symbol == "B").unwrap();
        assert_eq!(b.target_percent, 0.0);
        assert!((b.value_delta + 1_000.0).abs() < 1e-9);
    }
}
