use crate::data::{Asset, MockStock};
use crate::optimizer::{EfficientFrontierPoint, OptimizationResult};
use crate::rebalance::RebalanceAction;
use crate::recommend::Recommendation;
use serde::Serialize;
use std::collections::BTreeMap;

const RULE: &str = "╠════════════════════════════════════════════════════════════╣";
const TOP: &str = "╔════════════════════════════════════════════════════════════╗";
const BOTTOM: &str = "╚════════════════════════════════════════════════════════════╝";
const INNER_WIDTH: usize = 58;

/// Everything one CLI run produced, for JSON output.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub portfolio_value: f64,
    pub sector_allocation: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<OptimizationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sharpe: Option<OptimizationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_volatility: Option<OptimizationResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub efficient_frontier: Vec<EfficientFrontierPoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rebalance: Vec<RebalanceAction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<Recommendation>,
}

fn frame(out: &mut String, border: &str) {
    out.push_str(border);
    out.push('\n');
}

fn line(out: &mut String, text: &str) {
    out.push_str(&format!("║  {:<width$}║\n", text, width = INNER_WIDTH));
}

/// Greedy word wrap to the frame's inner width.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Framed summary of one allocation, largest weights first.
pub fn format_result(title: &str, result: &OptimizationResult, assets: &[Asset]) -> String {
    let mut out = String::new();
    frame(&mut out, TOP);
    line(&mut out, title);
    frame(&mut out, RULE);
    line(
        &mut out,
        &format!("Expected Annual Return : {:>+7.2}%", result.expected_return * 100.0),
    );
    line(
        &mut out,
        &format!("Annual Volatility      : {:>7.2}%", result.volatility * 100.0),
    );
    line(
        &mut out,
        &format!("Sharpe Ratio           : {:>7.2}", result.sharpe_ratio),
    );
    frame(&mut out, RULE);
    line(&mut out, "Symbol   Weight    Sector");

    let mut sorted: Vec<(&String, &f64)> = result.weights.iter().collect();
    sorted.sort_by(|a, b| b.1.total_cmp(a.1));
    for (symbol, weight) in sorted {
        let sector = assets
            .iter()
            .find(|a| &a.symbol == symbol)
            .map(|a| a.sector.as_str())
            .unwrap_or("-");
        line(
            &mut out,
            &format!("{:<6} {:>7.2}%   {}", symbol, weight, sector),
        );
    }
    frame(&mut out, BOTTOM);
    out
}

/// Volatility/return table of the frontier, one row per point.
pub fn format_frontier(points: &[EfficientFrontierPoint]) -> String {
    let mut out = String::new();
    frame(&mut out, TOP);
    line(&mut out, "Efficient Frontier");
    frame(&mut out, RULE);
    line(&mut out, "Target    Return    Volatility  Sharpe");
    for p in points {
        let flag = if p.matched { "" } else { "  (unmatched)" };
        line(
            &mut out,
            &format!(
                "{:>6.2}%  {:>+7.2}%  {:>7.2}%   {:>6.2}{}",
                p.target_return * 100.0,
                p.expected_return * 100.0,
                p.volatility * 100.0,
                p.sharpe_ratio,
                flag
            ),
        );
    }
    frame(&mut out, BOTTOM);
    out
}

pub fn format_rebalance(actions: &[RebalanceAction], capital: f64) -> String {
    let mut out = String::new();
    frame(&mut out, TOP);
    line(&mut out, &format!("Rebalancing Actions (capital ${:.2})", capital));
    frame(&mut out, RULE);
    for a in actions {
        line(
            &mut out,
            &format!(
                "{:<4} {:<6} {:>6.2}% -> {:>6.2}%  ${:>+10.2} ~{:>+5.0}",
                a.side(),
                a.symbol,
                a.current_percent,
                a.target_percent,
                a.value_delta,
                a.share_delta
            ),
        );
    }
    frame(&mut out, BOTTOM);
    out
}

pub fn format_recommendations(recommendations: &[Recommendation]) -> String {
    let mut out = String::new();
    frame(&mut out, TOP);
    line(&mut out, "Portfolio Recommendations");
    for rec in recommendations {
        frame(&mut out, RULE);
        line(&mut out, &format!("[{}] {}", rec.priority.label(), rec.title));
        for text in wrap(&rec.description, INNER_WIDTH) {
            line(&mut out, &text);
        }
    }
    frame(&mut out, BOTTOM);
    out
}

pub fn format_sectors(allocation: &BTreeMap<String, f64>) -> String {
    let mut out = String::new();
    frame(&mut out, TOP);
    line(&mut out, "Sector Allocation");
    frame(&mut out, RULE);
    for (sector, pct) in allocation {
        line(&mut out, &format!("{:<28} {:>6.2}%", sector, pct));
    }
    frame(&mut out, BOTTOM);
    out
}

pub fn format_stocks(stocks: &[MockStock]) -> String {
    let mut out = String::new();
    for s in stocks {
        out.push_str(&format!(
            "{:<6} {:<34} {:<24} {:>8.2} {:>+6.2} ({:>+5.2}%)\n",
            s.symbol, s.name, s.sector, s.price, s.change, s.change_percent
        ));
    }
    out
}
