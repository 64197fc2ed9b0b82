use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Direction, StrategyAggregate};
use crate::validation::TradeTracker;

/// One row in the recent-trades section of the report
#[derive(Debug, Clone, Serialize)]
pub struct RecentTrade {
    pub strategy_type: String,
    pub instrument: String,
    pub direction: Direction,
    pub realized_pnl: f64,
    pub exit_reason: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
}

/// Brief view of a still-open validation
#[derive(Debug, Clone, Serialize)]
pub struct ActiveValidation {
    pub instrument: String,
    pub direction: Direction,
    pub unrealized_pnl: f64,
    pub duration_minutes: i64,
}

/// Point-in-time snapshot for dashboards and CLIs
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub total_signals_received: u64,
    pub total_trades_executed: u64,
    pub active_validations: usize,
    pub completed_trades: usize,
    pub total_pnl: f64,
    pub overall_win_rate: f64,
    pub strategy_aggregates: Vec<StrategyAggregate>,
    pub recent_trades: Vec<RecentTrade>,
    pub active_trades: Vec<ActiveValidation>,
}

impl ValidationReport {
    /// Assemble a snapshot from the tracker's current state
    pub fn from_tracker(tracker: &TradeTracker) -> Self {
        let recent_limit = tracker.config().recent_trades_limit;

        let mut strategy_aggregates: Vec<StrategyAggregate> =
            tracker.aggregates().values().cloned().collect();
        strategy_aggregates.sort_by(|a, b| b.total_trades.cmp(&a.total_trades));

        // Most recent close first
        let recent_trades: Vec<RecentTrade> = tracker
            .completed_trades()
            .iter()
            .rev()
            .take(recent_limit)
            .map(|t| RecentTrade {
                strategy_type: t.signal.strategy_type.clone(),
                instrument: t.signal.instrument.clone(),
                direction: t.signal.direction,
                realized_pnl: t.realized_pnl,
                exit_reason: t
                    .exit_reason
                    .map(|r| r.as_str().to_string())
                    .unwrap_or_default(),
                entry_time: t.signal.entry_time,
                exit_time: t.exit_time,
            })
            .collect();

        let active_trades: Vec<ActiveValidation> = tracker
            .active_trades()
            .map(|t| ActiveValidation {
                instrument: t.signal.instrument.clone(),
                direction: t.signal.direction,
                unrealized_pnl: t.unrealized_pnl,
                duration_minutes: t.duration_minutes,
            })
            .collect();

        Self {
            total_signals_received: tracker.total_signals_received(),
            total_trades_executed: tracker.total_trades_executed(),
            active_validations: tracker.active_count(),
            completed_trades: tracker.completed_trades().len(),
            total_pnl: tracker.total_pnl(),
            overall_win_rate: tracker.overall_win_rate(),
            strategy_aggregates,
            recent_trades,
            active_trades,
        }
    }

    /// Print the dashboard to stdout
    pub fn print_dashboard(&self) {
        println!("\nLIVE VALIDATION DASHBOARD");
        println!("{}", "=".repeat(60));

        println!("Signals Received:   {}", self.total_signals_received);
        println!("Trades Executed:    {}", self.total_trades_executed);
        println!("Active Validations: {}", self.active_validations);
        println!("Completed Trades:   {}", self.completed_trades);

        if self.completed_trades > 0 {
            println!(
                "Total P&L:          ${:.2} ({})",
                self.total_pnl,
                if self.total_pnl > 0.0 { "up" } else { "down" }
            );
            println!("Win Rate:           {:.1}%", self.overall_win_rate * 100.0);
        }

        println!("\nSTRATEGY VALIDATION STATUS");
        println!("{}", "-".repeat(40));
        for agg in &self.strategy_aggregates {
            println!("{}:", agg.strategy_type);
            println!(
                "  Trades: {} | Win Rate: {:.1}%",
                agg.total_trades,
                agg.win_rate * 100.0
            );
            println!(
                "  Avg Return: ${:.2} | Sharpe: {:.2} | Max DD: {:.2}",
                agg.avg_return, agg.sharpe_ratio, agg.max_drawdown
            );
            println!("  Status: {}", agg.verdict.as_str());
        }

        if !self.active_trades.is_empty() {
            println!("\nACTIVE VALIDATIONS");
            println!("{}", "-".repeat(40));
            for active in self.active_trades.iter().take(5) {
                println!(
                    "{} {}: ${:.2} ({} min)",
                    active.instrument,
                    active.direction,
                    active.unrealized_pnl,
                    active.duration_minutes
                );
            }
        }

        if !self.recent_trades.is_empty() {
            println!("\nRECENT TRADES");
            println!("{}", "-".repeat(40));
            for trade in &self.recent_trades {
                println!(
                    "{} {} {}: ${:.2} | {}",
                    trade.strategy_type,
                    trade.instrument,
                    trade.direction,
                    trade.realized_pnl,
                    trade.exit_reason
                );
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationConfig;
    use crate::models::{Direction, SignalSubmission};
    use std::collections::HashMap;

    fn sol_long(confidence: f64) -> SignalSubmission {
        SignalSubmission {
            strategy_type: "liquidity_hunting".to_string(),
            instrument: "SOL".to_string(),
            direction: Direction::Long,
            confidence,
            entry_price: 65.0,
            position_size: 800.0,
            stop_loss: Some(62.0),
            take_profit: Some(70.0),
            max_duration_hours: None,
        }
    }

    fn prices(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_report_counters_and_sections() {
        let mut tracker = TradeTracker::new(ValidationConfig::default());

        // One rejected, one closed profitable, one left active
        let _ = tracker.receive_signal(sol_long(40.0));
        tracker.receive_signal(sol_long(80.0)).unwrap();
        tracker.apply_price_tick(&prices(&[("SOL", 71.0)]));
        tracker.receive_signal(sol_long(80.0)).unwrap();

        let report = ValidationReport::from_tracker(&tracker);

        assert_eq!(report.total_signals_received, 3);
        assert_eq!(report.total_trades_executed, 2);
        assert_eq!(report.active_validations, 1);
        assert_eq!(report.completed_trades, 1);
        assert!((report.overall_win_rate - 1.0).abs() < 1e-9);
        assert!(report.total_pnl > 0.0);
        assert_eq!(report.recent_trades.len(), 1);
        assert_eq!(report.recent_trades[0].exit_reason, "Take Profit Hit");
        assert_eq!(report.active_trades.len(), 1);
    }

    #[test]
    fn test_recent_trades_most_recent_first_and_capped() {
        let config = ValidationConfig {
            recent_trades_limit: 3,
            ..Default::default()
        };
        let mut tracker = TradeTracker::new(config);

        for i in 0..5 {
            tracker.receive_signal(sol_long(80.0)).unwrap();
            // Increasingly higher exits so realized P&L orders the closes
            tracker.apply_price_tick(&prices(&[("SOL", 70.0 + i as f64)]));
        }

        let report = ValidationReport::from_tracker(&tracker);

        assert_eq!(report.recent_trades.len(), 3);
        // Last close (exit at 74) comes first
        assert!(report.recent_trades[0].realized_pnl > report.recent_trades[1].realized_pnl);
        assert!(report.recent_trades[1].realized_pnl > report.recent_trades[2].realized_pnl);
    }

    #[test]
    fn test_report_serializes_expected_fields() {
        let tracker = TradeTracker::new(ValidationConfig::default());
        let report = ValidationReport::from_tracker(&tracker);

        let json = serde_json::to_value(&report).unwrap();
        for key in [
            "total_signals_received",
            "total_trades_executed",
            "active_validations",
            "completed_trades",
            "total_pnl",
            "overall_win_rate",
            "strategy_aggregates",
            "recent_trades",
        ] {
            assert!(json.get(key).is_some(), "missing report field {key}");
        }
    }
}
