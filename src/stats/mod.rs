use chrono::{DateTime, Utc};

use crate::config::ValidationConfig;
use crate::models::{StrategyAggregate, ValidationTrade, Verdict};

/// Reference notional used to normalize per-trade P&L for the Sharpe-like ratio
const SHARPE_REFERENCE_SIZE: f64 = 1000.0;

// Verdict thresholds
const VALIDATED_MIN_WIN_RATE: f64 = 0.55;
const VALIDATED_MIN_SHARPE: f64 = 0.5;
const REJECTED_MAX_WIN_RATE: f64 = 0.4;

/// Recompute the rolling aggregate for one strategy type
///
/// Deterministic over the closed-trade history passed in; the aggregate is
/// never edited incrementally. Returns `None` when fewer than
/// `min_trades_for_stats` trades have closed for the strategy (aggregation
/// skipped, not an error).
pub fn compute_aggregate(
    strategy_type: &str,
    completed: &[ValidationTrade],
    config: &ValidationConfig,
    now: DateTime<Utc>,
) -> Option<StrategyAggregate> {
    // Chronological: the completed set is appended to in close order
    let pnls: Vec<f64> = completed
        .iter()
        .filter(|t| t.is_closed() && t.signal.strategy_type == strategy_type)
        .map(|t| t.realized_pnl)
        .collect();

    let total_trades = pnls.len();
    if total_trades < config.min_trades_for_stats {
        tracing::debug!(
            strategy = strategy_type,
            closed = total_trades,
            required = config.min_trades_for_stats,
            "Skipping aggregation, insufficient sample"
        );
        return None;
    }

    let profitable_trades = pnls.iter().filter(|&&p| p > 0.0).count();
    let losing_trades = pnls.iter().filter(|&&p| p < 0.0).count();
    let win_rate = profitable_trades as f64 / total_trades as f64;

    let total_return: f64 = pnls.iter().sum();
    let avg_return = total_return / total_trades as f64;

    let sharpe_ratio = sharpe_like_ratio(&pnls);
    let max_drawdown = max_drawdown(&pnls);

    let verdict = classify(
        total_trades,
        win_rate,
        avg_return,
        sharpe_ratio,
        config.min_trades_for_verdict,
    );

    Some(StrategyAggregate {
        strategy_type: strategy_type.to_string(),
        total_trades,
        profitable_trades,
        losing_trades,
        win_rate,
        avg_return,
        total_return,
        sharpe_ratio,
        max_drawdown,
        verdict,
        sample_size: total_trades,
        last_updated: now,
    })
}

/// Sharpe-like ratio over $1000-normalized trade returns
///
/// Sample standard deviation; 0 with fewer than 2 trades or zero variance.
fn sharpe_like_ratio(pnls: &[f64]) -> f64 {
    if pnls.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = pnls.iter().map(|p| p / SHARPE_REFERENCE_SIZE).collect();
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;

    let variance = returns
        .iter()
        .map(|r| {
            let diff = r - mean;
            diff * diff
        })
        .sum::<f64>()
        / (returns.len() - 1) as f64;
    let std_dev = variance.sqrt();

    if std_dev > 0.0 {
        mean / std_dev
    } else {
        0.0
    }
}

/// Maximum drawdown over the chronological cumulative P&L
///
/// Drawdown at each point is the drop from the running peak as a fraction of
/// that peak; 0 while the peak has never been positive.
fn max_drawdown(pnls: &[f64]) -> f64 {
    let mut cumulative = 0.0;
    let mut peak = 0.0;
    let mut max_dd = 0.0;

    for pnl in pnls {
        cumulative += pnl;
        if cumulative > peak {
            peak = cumulative;
        }
        if peak > 0.0 {
            let drawdown = (peak - cumulative) / peak;
            if drawdown > max_dd {
                max_dd = drawdown;
            }
        }
    }

    max_dd
}

fn classify(
    total_trades: usize,
    win_rate: f64,
    avg_return: f64,
    sharpe_ratio: f64,
    min_trades_for_verdict: usize,
) -> Verdict {
    if total_trades < min_trades_for_verdict {
        return Verdict::InsufficientData;
    }

    if win_rate >= VALIDATED_MIN_WIN_RATE
        && avg_return > 0.0
        && sharpe_ratio > VALIDATED_MIN_SHARPE
    {
        Verdict::Validated
    } else if win_rate < REJECTED_MAX_WIN_RATE || avg_return < 0.0 {
        Verdict::Rejected
    } else {
        Verdict::Pending
    }
}
