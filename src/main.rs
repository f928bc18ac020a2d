use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use portfolio_optimizer::config::{self, DEFAULT_FRONTIER_POINTS};
use portfolio_optimizer::report::{self, RunReport};
use portfolio_optimizer::{OptimizerConfig, PortfolioOptimizer, data, rebalance, recommend};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    MaxSharpe,
    MinVolatility,
    Frontier,
    Analyze,
    All,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Monte Carlo mean-variance portfolio optimizer",
    after_help = "EXAMPLES:
    # Optimize the built-in mock portfolio with a fixed seed
    cargo run --release -- --seed 42

    # Max-Sharpe allocation for your own holdings, as JSON
    cargo run --release -- --assets holdings.json --mode max-sharpe --json

    # 30-point efficient frontier using all CPU cores
    cargo run --release -- --mode frontier --points 30 --parallel"
)]
struct Args {
    /// JSON array of assets (symbol, name, quantity, purchasePrice, currentPrice, sector).
    /// Defaults to a generated mock portfolio.
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Which computation to run
    #[arg(long, value_enum, default_value_t = Mode::All)]
    mode: Mode,

    /// Number of efficient-frontier points
    #[arg(long, default_value_t = DEFAULT_FRONTIER_POINTS)]
    points: usize,

    /// Seed for reproducible runs (overrides MPT_SEED and the config file)
    #[arg(long)]
    seed: Option<u64>,

    /// Spread trials across all CPU cores
    #[arg(long)]
    parallel: bool,

    /// JSON optimizer config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print JSON instead of the framed report
    #[arg(long)]
    json: bool,

    /// Capital base for rebalancing actions (default: current portfolio value)
    #[arg(long)]
    capital: Option<f64>,

    /// Print the mock stock list and exit
    #[arg(long)]
    list_stocks: bool,
}

fn build_config(args: &Args) -> Result<OptimizerConfig> {
    let base = match &args.config {
        Some(path) => OptimizerConfig::load(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => OptimizerConfig::default(),
    };
    let mut cfg = base.with_env_overrides().context("applying MPT_* overrides")?;
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }
    if args.parallel {
        cfg.parallel = true;
    }
    Ok(cfg)
}

fn run(args: Args) -> Result<()> {
    if args.list_stocks {
        print!("{}", report::format_stocks(&data::mock_stocks()));
        return Ok(());
    }

    let cfg = build_config(&args)?;
    if cfg.parallel {
        config::init_cpu_parallelism();
    }

    let assets = match &args.assets {
        Some(path) => data::load_assets(path)
            .with_context(|| format!("loading assets from {}", path.display()))?,
        None => {
            let mut rng = match cfg.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let assets = data::mock_portfolio_assets(&mut rng);
            info!("Using mock portfolio with {} assets", assets.len());
            assets
        }
    };

    let portfolio_value = data::portfolio_value(&assets);
    let capital = args.capital.unwrap_or(portfolio_value);
    let mut optimizer = PortfolioOptimizer::new(assets, cfg)?;

    let mut out = RunReport {
        portfolio_value,
        sector_allocation: data::sector_allocation(optimizer.assets())?,
        ..RunReport::default()
    };

    let mode = args.mode;
    if matches!(mode, Mode::Analyze | Mode::All) {
        out.current = Some(optimizer.analyze_current_portfolio()?);
    }
    if matches!(mode, Mode::MaxSharpe | Mode::All) {
        out.max_sharpe = Some(optimizer.optimize_for_max_sharpe());
    }
    if matches!(mode, Mode::MinVolatility | Mode::All) {
        out.min_volatility = Some(optimizer.optimize_for_min_volatility());
    }
    if matches!(mode, Mode::Frontier | Mode::All) {
        out.efficient_frontier = optimizer.generate_efficient_frontier(args.points);
    }
    if let Some(best) = &out.max_sharpe {
        out.rebalance = rebalance::rebalance_plan(optimizer.assets(), &best.weights, Some(capital))?;
    }
    if let Some(current) = &out.current {
        out.recommendations = recommend::recommend(current, out.max_sharpe.as_ref());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let assets = optimizer.assets();
    print!("{}", report::format_sectors(&out.sector_allocation));
    if let Some(r) = &out.current {
        print!("{}", report::format_result("Current Portfolio", r, assets));
    }
    if let Some(r) = &out.max_sharpe {
        print!("{}", report::format_result("Maximum Sharpe Ratio", r, assets));
    }
    if let Some(r) = &out.min_volatility {
        print!("{}", report::format_result("Minimum Volatility", r, assets));
    }
    if !out.efficient_frontier.is_empty() {
        print!("{}", report::format_frontier(&out.efficient_frontier));
    }
    if !out.rebalance.is_empty() {
        print!("{}", report::format_rebalance(&out.rebalance, capital));
    }
    if !out.recommendations.is_empty() {
        print!("{}", report::format_recommendations(&out.recommendations));
    }
    println!();
    println!("⚠  Returns are synthesized from purchase and current prices. Not financial advice.");
    Ok(())
}

fn main() {
    let _ = dotenvy::dotenv();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("portfolio_optimizer=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
