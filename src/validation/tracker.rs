use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::ValidationConfig;
use crate::error::SignalRejection;
use crate::models::{
    ExitReason, SignalSubmission, StrategyAggregate, TradeSignal, TradeStatus, ValidationTrade,
};
use crate::persistence::StoreHandle;
use crate::stats;
use crate::validation::exit_rules;

/// Owns every live validation trade and its full lifecycle
///
/// Single writer: admission, price ticks, and closures all go through one
/// `&mut self` surface, so the binary shares it behind an `Arc<Mutex<_>>`
/// and the lifecycle invariants hold under concurrent callers. A trade
/// lives in `active` until it closes, then moves to `completed` exactly
/// once; closed trades are never mutated again.
pub struct TradeTracker {
    config: ValidationConfig,
    active: HashMap<Uuid, ValidationTrade>,
    completed: Vec<ValidationTrade>,
    aggregates: HashMap<String, StrategyAggregate>,
    store: Option<StoreHandle>,
    total_signals_received: u64,
    total_trades_executed: u64,
}

impl TradeTracker {
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            active: HashMap::new(),
            completed: Vec::new(),
            aggregates: HashMap::new(),
            store: None,
            total_signals_received: 0,
            total_trades_executed: 0,
        }
    }

    /// Create a tracker seeded with closed trades loaded from the store
    ///
    /// Recomputes every strategy aggregate from the restored history.
    pub fn with_completed(config: ValidationConfig, completed: Vec<ValidationTrade>) -> Self {
        let total_trades_executed = completed.len() as u64;

        tracing::info!(
            "Restored {} closed trades from persistence (total P&L: ${:.2})",
            completed.len(),
            completed.iter().map(|t| t.realized_pnl).sum::<f64>()
        );

        let mut tracker = Self {
            config,
            active: HashMap::new(),
            completed,
            aggregates: HashMap::new(),
            store: None,
            total_signals_received: total_trades_executed,
            total_trades_executed,
        };

        let strategies: Vec<String> = tracker
            .completed
            .iter()
            .map(|t| t.signal.strategy_type.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        let now = Utc::now();
        for strategy in strategies {
            tracker.recompute_aggregate(&strategy, now);
        }

        tracker
    }

    /// Attach the durable store; closures and aggregates are dispatched to it
    pub fn attach_store(&mut self, store: StoreHandle) {
        self.store = Some(store);
    }

    /// Admit a signal for live validation
    ///
    /// Returns the signal id on admission. Rejections are surfaced to the
    /// submitter; low confidence and capacity are recoverable, malformed
    /// submissions never enter the lifecycle.
    pub fn receive_signal(&mut self, submission: SignalSubmission) -> Result<Uuid, SignalRejection> {
        self.receive_signal_at(submission, Utc::now())
    }

    /// Admit a signal with an explicit entry time (deterministic tests)
    pub fn receive_signal_at(
        &mut self,
        submission: SignalSubmission,
        now: DateTime<Utc>,
    ) -> Result<Uuid, SignalRejection> {
        let signal = TradeSignal::from_submission(submission, now).map_err(|rejection| {
            tracing::warn!("Rejected signal: {}", rejection);
            rejection
        })?;

        // Well-formed submissions count as received even when rejected below,
        // so the report keeps its received-vs-executed gap
        self.total_signals_received += 1;

        if signal.confidence < self.config.confidence_threshold {
            let rejection = SignalRejection::LowConfidence {
                confidence: signal.confidence,
                threshold: self.config.confidence_threshold,
            };
            tracing::warn!(instrument = %signal.instrument, "Rejected signal: {}", rejection);
            return Err(rejection);
        }

        if self.active.len() >= self.config.max_concurrent_validations {
            let rejection = SignalRejection::CapacityExceeded {
                limit: self.config.max_concurrent_validations,
            };
            tracing::warn!(instrument = %signal.instrument, "Rejected signal: {}", rejection);
            return Err(rejection);
        }

        let signal_id = signal.id;
        let trade = ValidationTrade::open(signal);

        tracing::info!(
            instrument = %trade.signal.instrument,
            direction = %trade.signal.direction,
            strategy = %trade.signal.strategy_type,
            trade_id = %trade.id,
            "Started validation"
        );

        self.active.insert(trade.id, trade);
        self.total_trades_executed += 1;

        Ok(signal_id)
    }

    /// Apply a batch of current prices to every active trade
    ///
    /// Instruments absent from the map are left unchanged for this cycle.
    /// Returns the ids of trades closed by this tick.
    pub fn apply_price_tick(&mut self, prices: &HashMap<String, f64>) -> Vec<Uuid> {
        self.apply_price_tick_at(prices, None)
    }

    /// Apply a price tick with an explicit timestamp (deterministic tests)
    pub fn apply_price_tick_at(
        &mut self,
        prices: &HashMap<String, f64>,
        now: Option<DateTime<Utc>>,
    ) -> Vec<Uuid> {
        let now = now.unwrap_or_else(Utc::now);
        let max_validation_minutes = self.config.max_validation_minutes();

        // Update state and collect exit decisions first, close after; exit
        // evaluation is pure so no trade sees a partially applied tick
        let mut to_close: Vec<(Uuid, ExitReason)> = Vec::new();
        for trade in self.active.values_mut() {
            let Some(&new_price) = prices.get(&trade.signal.instrument) else {
                continue;
            };

            trade.current_price = new_price;
            trade.unrealized_pnl = trade.signal.unrealized_pnl(new_price);
            trade.max_unrealized_pnl = trade.max_unrealized_pnl.max(trade.unrealized_pnl);
            trade.min_unrealized_pnl = trade.min_unrealized_pnl.min(trade.unrealized_pnl);
            trade.duration_minutes = (now - trade.signal.entry_time).num_minutes();

            if let Some(reason) = exit_rules::evaluate(trade, new_price, max_validation_minutes) {
                to_close.push((trade.id, reason));
            }
        }

        let mut closed = Vec::new();
        for (trade_id, reason) in to_close {
            match self.close_trade_at(trade_id, reason, Some(now)) {
                Ok(()) => closed.push(trade_id),
                Err(e) => tracing::error!(%trade_id, "Failed to close trade: {e}"),
            }
        }

        closed
    }

    /// Close an active trade at its last known price
    ///
    /// Moves the trade from the active to the completed set exactly once;
    /// a second close of the same id is an error, never double-counted.
    pub fn close_trade(&mut self, trade_id: Uuid, reason: ExitReason) -> anyhow::Result<()> {
        self.close_trade_at(trade_id, reason, None)
    }

    /// Close a trade with an explicit exit time (deterministic tests)
    pub fn close_trade_at(
        &mut self,
        trade_id: Uuid,
        reason: ExitReason,
        now: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        let mut trade = self
            .active
            .remove(&trade_id)
            .ok_or_else(|| anyhow::anyhow!("No active trade {trade_id} (already closed?)"))?;

        let now = now.unwrap_or_else(Utc::now);
        trade.exit_price = Some(trade.current_price);
        trade.exit_time = Some(now);
        trade.realized_pnl = trade.unrealized_pnl;
        trade.duration_minutes = (now - trade.signal.entry_time).num_minutes();
        trade.exit_reason = Some(reason);
        trade.status = TradeStatus::from_realized_pnl(trade.realized_pnl);

        tracing::info!(
            instrument = %trade.signal.instrument,
            direction = %trade.signal.direction,
            "Trade closed: P&L ${:.2} | {}",
            trade.realized_pnl,
            reason
        );

        if let Some(store) = &self.store {
            store.append_closed_trade(trade.clone());
        }

        let strategy_type = trade.signal.strategy_type.clone();
        self.completed.push(trade);
        self.recompute_aggregate(&strategy_type, now);

        Ok(())
    }

    /// Operator-forced closure, routed through the normal close path
    pub fn force_close(&mut self, trade_id: Uuid) -> anyhow::Result<()> {
        self.close_trade(trade_id, ExitReason::Manual)
    }

    /// Recompute and publish the aggregate for one strategy type
    fn recompute_aggregate(&mut self, strategy_type: &str, now: DateTime<Utc>) {
        let Some(aggregate) =
            stats::compute_aggregate(strategy_type, &self.completed, &self.config, now)
        else {
            return;
        };

        tracing::debug!(
            strategy = strategy_type,
            trades = aggregate.total_trades,
            verdict = aggregate.verdict.as_str(),
            "Updated strategy aggregate (win rate {:.2})",
            aggregate.win_rate
        );

        if let Some(store) = &self.store {
            store.upsert_aggregate(aggregate.clone());
        }
        self.aggregates
            .insert(strategy_type.to_string(), aggregate);
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_trades(&self) -> impl Iterator<Item = &ValidationTrade> {
        self.active.values()
    }

    pub fn completed_trades(&self) -> &[ValidationTrade] {
        &self.completed
    }

    pub fn aggregates(&self) -> &HashMap<String, StrategyAggregate> {
        &self.aggregates
    }

    pub fn total_signals_received(&self) -> u64 {
        self.total_signals_received
    }

    pub fn total_trades_executed(&self) -> u64 {
        self.total_trades_executed
    }

    /// Total realized P&L across all completed trades
    pub fn total_pnl(&self) -> f64 {
        self.completed.iter().map(|t| t.realized_pnl).sum()
    }

    /// Fraction of completed trades that closed profitable
    pub fn overall_win_rate(&self) -> f64 {
        if self.completed.is_empty() {
            return 0.0;
        }
        let wins = self
            .completed
            .iter()
            .filter(|t| t.realized_pnl > 0.0)
            .count();
        wins as f64 / self.completed.len() as f64
    }
}
