use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::models::{StrategyAggregate, ValidationTrade};

/// A write dispatched to the durable store
///
/// Closed trades are append-only; aggregates are overwritten per strategy.
#[derive(Debug, Clone)]
pub enum StoreRequest {
    AppendClosedTrade(Box<ValidationTrade>),
    UpsertAggregate(StrategyAggregate),
}

/// Fire-and-forget handle to the store writer
///
/// Sends never block tick processing; a dead or slow store is logged and
/// the in-memory state stays authoritative.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    tx: mpsc::UnboundedSender<StoreRequest>,
}

impl StoreHandle {
    /// Create a handle and the receiver a store writer task consumes
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StoreRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn append_closed_trade(&self, trade: ValidationTrade) {
        let trade_id = trade.id;
        if self
            .tx
            .send(StoreRequest::AppendClosedTrade(Box::new(trade)))
            .is_err()
        {
            tracing::warn!(%trade_id, "Store writer gone, dropping closed-trade record");
        }
    }

    pub fn upsert_aggregate(&self, aggregate: StrategyAggregate) {
        let strategy = aggregate.strategy_type.clone();
        if self.tx.send(StoreRequest::UpsertAggregate(aggregate)).is_err() {
            tracing::warn!(strategy, "Store writer gone, dropping aggregate update");
        }
    }
}

/// In-memory store for tests and database-less runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    closed_trades: Vec<ValidationTrade>,
    aggregates: HashMap<String, StrategyAggregate>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, request: StoreRequest) {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        match request {
            StoreRequest::AppendClosedTrade(trade) => inner.closed_trades.push(*trade),
            StoreRequest::UpsertAggregate(aggregate) => {
                inner
                    .aggregates
                    .insert(aggregate.strategy_type.clone(), aggregate);
            }
        }
    }

    pub fn closed_trades(&self) -> Vec<ValidationTrade> {
        self.inner
            .lock()
            .expect("memory store lock poisoned")
            .closed_trades
            .clone()
    }

    pub fn aggregates(&self) -> HashMap<String, StrategyAggregate> {
        self.inner
            .lock()
            .expect("memory store lock poisoned")
            .aggregates
            .clone()
    }

    /// Consume store requests until all handles are dropped
    pub fn spawn_writer(
        self,
        mut rx: mpsc::UnboundedReceiver<StoreRequest>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                self.apply(request);
            }
            tracing::debug!("Memory store writer shutting down");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, SignalSubmission, TradeSignal};
    use chrono::Utc;

    fn sample_trade() -> ValidationTrade {
        let signal = TradeSignal::from_submission(
            SignalSubmission {
                strategy_type: "momentum".to_string(),
                instrument: "SOL".to_string(),
                direction: Direction::Long,
                confidence: 70.0,
                entry_price: 65.0,
                position_size: 800.0,
                stop_loss: None,
                take_profit: None,
                max_duration_hours: None,
            },
            Utc::now(),
        )
        .unwrap();
        ValidationTrade::open(signal)
    }

    #[test]
    fn test_memory_store_applies_requests() {
        let store = MemoryStore::new();
        let trade = sample_trade();

        store.apply(StoreRequest::AppendClosedTrade(Box::new(trade.clone())));
        store.apply(StoreRequest::AppendClosedTrade(Box::new(trade)));

        assert_eq!(store.closed_trades().len(), 2);
        assert!(store.aggregates().is_empty());
    }

    #[test]
    fn test_send_after_writer_drop_does_not_panic() {
        let (handle, rx) = StoreHandle::channel();
        drop(rx);

        // Logged and dropped, never an error to the caller
        handle.append_closed_trade(sample_trade());
    }

    #[tokio::test]
    async fn test_writer_task_drains_channel() {
        let (handle, rx) = StoreHandle::channel();
        let store = MemoryStore::new();
        let writer = store.clone().spawn_writer(rx);

        handle.append_closed_trade(sample_trade());
        drop(handle);
        writer.await.unwrap();

        assert_eq!(store.closed_trades().len(), 1);
    }
}
