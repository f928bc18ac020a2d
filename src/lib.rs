//! Monte Carlo mean-variance portfolio optimizer.
//!
//! Given an ordered list of [`Asset`]s, the engine synthesizes a year of daily
//! returns per asset, estimates means, standard deviations and a correlation
//! matrix, and then samples random long-only weight vectors to find:
//!
//! - the maximum Sharpe ratio allocation
//! - the minimum volatility allocation
//! - an efficient frontier sweep over target returns
//!
//! It can also evaluate the portfolio as currently held and turn that
//! evaluation into rule-based recommendations.
//!
//! ```rust,no_run
//! use portfolio_optimizer::{data, PortfolioOptimizer};
//!
//! let assets = data::mock_portfolio_assets(&mut rand::thread_rng());
//! let mut optimizer = PortfolioOptimizer::with_seed(assets, 42)?;
//! let best = optimizer.optimize_for_max_sharpe();
//! println!("Sharpe {:.2}", best.sharpe_ratio);
//! # Ok::<(), portfolio_optimizer::Error>(())
//! ```

pub mod config;
pub mod data;
pub mod optimizer;
pub mod portfolio;
pub mod rebalance;
pub mod recommend;
pub mod report;
pub mod stats;

pub use config::{FrontierFallback, OptimizerConfig};
pub use data::Asset;
pub use optimizer::{EfficientFrontierPoint, OptimizationResult, PortfolioOptimizer};
pub use portfolio::PortfolioMetrics;
pub use rebalance::RebalanceAction;
pub use recommend::{Priority, Recommendation, RecommendationKind};
pub use stats::{ReturnSource, ReturnStatistics, SyntheticReturns};

/// Errors raised by the optimizer library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("portfolio has no assets")]
    EmptyPortfolio,

    #[error("duplicate asset symbol: {0}")]
    DuplicateSymbol(String),

    #[error("invalid price for {symbol}: purchase={purchase_price}, current={current_price}")]
    InvalidPrice {
        symbol: String,
        purchase_price: f64,
        current_price: f64,
    },

    #[error("invalid quantity for {symbol}: {quantity}")]
    InvalidQuantity { symbol: String, quantity: f64 },

    #[error("return series for {symbol} has {actual} periods, expected {expected}")]
    SeriesLengthMismatch {
        symbol: String,
        expected: usize,
        actual: usize,
    },

    #[error("total portfolio value is not positive ({0})")]
    ZeroPortfolioValue(f64),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for optimizer operations.
pub type Result<T> = std::result::Result<T, Error>;
