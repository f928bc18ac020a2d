use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

/// A holding supplied by the caller. Field names follow the camelCase wire
/// format used by the portfolio service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    pub quantity: f64,
    pub purchase_price: f64,
    pub current_price: f64,
    pub sector: String,
}

impl Asset {
    pub fn new(
        symbol: &str,
        name: &str,
        quantity: f64,
        purchase_price: f64,
        current_price: f64,
        sector: &str,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            quantity,
            purchase_price,
            current_price,
            sector: sector.to_string(),
        }
    }

    pub fn market_value(&self) -> f64 {
        self.quantity * self.current_price
    }

    /// Holding-period return implied by the two price points.
    pub fn total_return(&self) -> f64 {
        (self.current_price - self.purchase_price) / self.purchase_price
    }
}

/// Checks the invariants the estimator relies on: at least one asset,
/// unique symbols, positive finite purchase prices, non-negative finite
/// current prices and non-negative finite quantities.
pub fn validate_assets(assets: &[Asset]) -> Result<()> {
    if assets.is_empty() {
        return Err(Error::EmptyPortfolio);
    }

    let mut seen = HashSet::with_capacity(assets.len());
    for asset in assets {
        if !seen.insert(asset.symbol.as_str()) {
            return Err(Error::DuplicateSymbol(asset.symbol.clone()));
        }
        let purchase_ok = asset.purchase_price.is_finite() && asset.purchase_price > 0.0;
        let current_ok = asset.current_price.is_finite() && asset.current_price >= 0.0;
        if !purchase_ok || !current_ok {
            return Err(Error::InvalidPrice {
                symbol: asset.symbol.clone(),
                purchase_price: asset.purchase_price,
                current_price: asset.current_price,
            });
        }
        if !(asset.quantity.is_finite() && asset.quantity >= 0.0) {
            return Err(Error::InvalidQuantity {
                symbol: asset.symbol.clone(),
                quantity: asset.quantity,
            });
        }
    }
    Ok(())
}

pub fn portfolio_value(assets: &[Asset]) -> f64 {
    assets.iter().map(Asset::market_value).sum()
}

/// Market-value weights as fractions of the total, index-aligned with `assets`.
pub fn market_weights(assets: &[Asset]) -> Result<Vec<f64>> {
    let total = portfolio_value(assets);
    if !(total > 0.0) || !total.is_finite() {
        return Err(Error::ZeroPortfolioValue(total));
    }
    Ok(assets.iter().map(|a| a.market_value() / total).collect())
}

/// Percentage of portfolio value held in each sector.
pub fn sector_allocation(assets: &[Asset]) -> Result<BTreeMap<String, f64>> {
    let weights = market_weights(assets)?;
    let mut allocation = BTreeMap::new();
    for (asset, w) in assets.iter().zip(weights) {
        *allocation.entry(asset.sector.clone()).or_insert(0.0) += w * 100.0;
    }
    Ok(allocation)
}

/// Reads a JSON array of assets.
pub fn load_assets(path: &Path) -> Result<Vec<Asset>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let assets: Vec<Asset> = serde_json::from_reader(reader)?;
    validate_assets(&assets)?;
    info!("Loaded {} assets from {}", assets.len(), path.display());
    Ok(assets)
}

// ──────────────────────────────────────────────────────────────────────────────
// Mock market
// ──────────────────────────────────────────────────────────────────────────────

/// A quote from the built-in mock stock list.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockStock {
    pub symbol: String,
    pub name: String,
    pub sector: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
}

const MOCK_STOCKS: &[(&str, &str, &str, f64, f64, f64)] = &[
    ("AAPL", "Apple Inc.", "Technology", 189.95, 2.45, 1.31),
    ("MSFT", "Microsoft Corporation", "Technology", 378.91, 5.23, 1.40),
    ("GOOGL", "Alphabet Inc.", "Technology", 139.67, 1.45, 1.05),
    ("AMZN", "Amazon.com Inc.", "Consumer Discretionary", 179.23, 3.12, 1.77),
    ("NVDA", "NVIDIA Corporation", "Technology", 875.29, 12.34, 1.43),
    ("JNJ", "Johnson & Johnson", "Healthcare", 158.74, 0.89, 0.56),
    ("V", "Visa Inc.", "Financials", 258.96, 2.13, 0.83),
    ("WMT", "Walmart Inc.", "Consumer Staples", 92.34, 1.23, 1.35),
    ("DIS", "The Walt Disney Company", "Communication Services", 92.50, 1.89, 2.08),
    ("XOM", "Exxon Mobil Corporation", "Energy", 116.34, -0.45, -0.39),
    ("TSLA", "Tesla Inc.", "Automotive", 242.84, 5.67, 2.39),
    ("META", "Meta Platforms Inc.", "Technology", 468.92, 8.45, 1.83),
    ("BA", "The Boeing Company", "Industrials", 178.59, 2.34, 1.32),
    ("IBM", "International Business Machines", "Technology", 183.45, 1.12, 0.62),
    ("INTC", "Intel Corporation", "Technology", 45.89, 0.67, 1.48),
];

/// Number of catalogue entries placed in the mock portfolio.
pub const MOCK_PORTFOLIO_SIZE: usize = 8;

pub fn mock_stocks() -> Vec<MockStock> {
    MOCK_STOCKS
        .iter()
        .map(|&(symbol, name, sector, price, change, change_percent)| MockStock {
            symbol: symbol.to_string(),
            name: name.to_string(),
            sector: sector.to_string(),
            price,
            change,
            change_percent,
        })
        .collect()
}

/// Builds a holding for each of the first [`MOCK_PORTFOLIO_SIZE`] catalogue
/// stocks: 10..=109 shares bought at 80%..120% of today's price.
pub fn mock_portfolio_assets(rng: &mut impl Rng) -> Vec<Asset> {
    mock_stocks()
        .into_iter()
        .take(MOCK_PORTFOLIO_SIZE)
        .map(|stock| {
            let quantity = rng.gen_range(10..110) as f64;
            let purchase_price = stock.price * rng.gen_range(0.8..1.2);
            Asset {
                symbol: stock.symbol,
                name: stock.name,
                quantity,
                purchase_price,
                current_price: stock.price,
                sector: stock.sector,
            }
        })
        .collect()
}
