use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{
    Direction, ExitReason, StrategyAggregate, TradeSignal, TradeStatus, ValidationTrade,
};
use crate::persistence::StoreRequest;
use crate::Result;

/// Postgres persistence for closed trades and strategy aggregates
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to Postgres and run migrations
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Connected to Postgres");

        Ok(Self { pool })
    }

    /// Append one closed trade
    ///
    /// Rows are immutable; replaying the same trade id is a no-op.
    pub async fn append_closed_trade(&self, trade: &ValidationTrade) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO closed_trades (
                trade_id, signal_id, strategy_type, instrument, direction,
                confidence, entry_price, exit_price, position_size,
                stop_loss, take_profit, realized_pnl,
                max_unrealized_pnl, min_unrealized_pnl,
                entry_time, exit_time, duration_minutes, max_duration_hours,
                status, exit_reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            ON CONFLICT (trade_id) DO NOTHING
            "#,
        )
        .bind(trade.id)
        .bind(trade.signal.id)
        .bind(&trade.signal.strategy_type)
        .bind(&trade.signal.instrument)
        .bind(trade.signal.direction.as_str())
        .bind(trade.signal.confidence)
        .bind(trade.signal.entry_price)
        .bind(trade.exit_price)
        .bind(trade.signal.position_size)
        .bind(trade.signal.stop_loss)
        .bind(trade.signal.take_profit)
        .bind(trade.realized_pnl)
        .bind(trade.max_unrealized_pnl)
        .bind(trade.min_unrealized_pnl)
        .bind(trade.signal.entry_time)
        .bind(trade.exit_time)
        .bind(trade.duration_minutes)
        .bind(trade.signal.max_duration_hours)
        .bind(trade.status.as_str())
        .bind(trade.exit_reason.map(|r| r.as_str()))
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            "Saved closed trade {} ({}) to Postgres",
            trade.id,
            trade.signal.instrument
        );

        Ok(())
    }

    /// Overwrite the aggregate row for a strategy type
    pub async fn upsert_aggregate(&self, aggregate: &StrategyAggregate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO strategy_aggregates (
                strategy_type, total_trades, profitable_trades, losing_trades,
                win_rate, avg_return, total_return, sharpe_ratio, max_drawdown,
                verdict, sample_size, last_updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (strategy_type) DO UPDATE SET
                total_trades = EXCLUDED.total_trades,
                profitable_trades = EXCLUDED.profitable_trades,
                losing_trades = EXCLUDED.losing_trades,
                win_rate = EXCLUDED.win_rate,
                avg_return = EXCLUDED.avg_return,
                total_return = EXCLUDED.total_return,
                sharpe_ratio = EXCLUDED.sharpe_ratio,
                max_drawdown = EXCLUDED.max_drawdown,
                verdict = EXCLUDED.verdict,
                sample_size = EXCLUDED.sample_size,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(&aggregate.strategy_type)
        .bind(aggregate.total_trades as i64)
        .bind(aggregate.profitable_trades as i64)
        .bind(aggregate.losing_trades as i64)
        .bind(aggregate.win_rate)
        .bind(aggregate.avg_return)
        .bind(aggregate.total_return)
        .bind(aggregate.sharpe_ratio)
        .bind(aggregate.max_drawdown)
        .bind(aggregate.verdict.as_str())
        .bind(aggregate.sample_size as i64)
        .bind(aggregate.last_updated)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Saved aggregate for {} to Postgres", aggregate.strategy_type);

        Ok(())
    }

    /// Load the full closed-trade history, oldest close first
    ///
    /// Used to seed the tracker's completed set on startup.
    pub async fn load_closed_trades(&self) -> Result<Vec<ValidationTrade>> {
        let rows = sqlx::query(
            r#"
            SELECT trade_id, signal_id, strategy_type, instrument, direction,
                   confidence, entry_price, exit_price, position_size,
                   stop_loss, take_profit, realized_pnl,
                   max_unrealized_pnl, min_unrealized_pnl,
                   entry_time, exit_time, duration_minutes, max_duration_hours,
                   status, exit_reason
            FROM closed_trades
            ORDER BY exit_time ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut trades = Vec::with_capacity(rows.len());

        for row in rows {
            let direction_str: String = row.get("direction");
            let direction = Direction::parse(&direction_str)
                .ok_or_else(|| format!("Invalid direction '{direction_str}'"))?;

            let status_str: String = row.get("status");
            let status = TradeStatus::parse(&status_str)
                .ok_or_else(|| format!("Invalid trade status '{status_str}'"))?;

            let exit_reason_str: Option<String> = row.get("exit_reason");
            let exit_reason = match exit_reason_str.as_deref() {
                Some(s) => Some(
                    ExitReason::parse(s).ok_or_else(|| format!("Invalid exit reason '{s}'"))?,
                ),
                None => None,
            };

            let entry_price: f64 = row.get("entry_price");
            let exit_price: Option<f64> = row.get("exit_price");
            let realized_pnl: f64 = row.get("realized_pnl");
            let entry_time: DateTime<Utc> = row.get("entry_time");
            let exit_time: Option<DateTime<Utc>> = row.get("exit_time");

            let signal = TradeSignal {
                id: row.get("signal_id"),
                strategy_type: row.get("strategy_type"),
                instrument: row.get("instrument"),
                direction,
                confidence: row.get("confidence"),
                entry_price,
                position_size: row.get("position_size"),
                stop_loss: row.get("stop_loss"),
                take_profit: row.get("take_profit"),
                entry_time,
                max_duration_hours: row.get("max_duration_hours"),
            };

            trades.push(ValidationTrade {
                id: row.get("trade_id"),
                signal,
                current_price: exit_price.unwrap_or(entry_price),
                unrealized_pnl: realized_pnl,
                realized_pnl,
                exit_price,
                exit_time,
                status,
                max_unrealized_pnl: row.get("max_unrealized_pnl"),
                min_unrealized_pnl: row.get("min_unrealized_pnl"),
                duration_minutes: row.get("duration_minutes"),
                exit_reason,
            });
        }

        tracing::info!("Loaded {} closed trades from Postgres", trades.len());

        Ok(trades)
    }

    /// Consume store requests until all handles are dropped
    ///
    /// Write failures are logged and skipped; in-memory state stays
    /// authoritative and a backfill can replay from it later.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<StoreRequest>) {
        while let Some(request) = rx.recv().await {
            let result = match &request {
                StoreRequest::AppendClosedTrade(trade) => self.append_closed_trade(trade).await,
                StoreRequest::UpsertAggregate(aggregate) => {
                    self.upsert_aggregate(aggregate).await
                }
            };

            if let Err(e) = result {
                tracing::error!("Persistence write failed: {e}");
            }
        }

        tracing::debug!("Postgres store writer shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SignalSubmission, Verdict};

    fn closed_trade(pnl: f64) -> ValidationTrade {
        let signal = TradeSignal::from_submission(
            SignalSubmission {
                strategy_type: "carry_trade".to_string(),
                instrument: "BTC".to_string(),
                direction: Direction::Short,
                confidence: 75.0,
                entry_price: 45000.0,
                position_size: 1000.0,
                stop_loss: Some(46000.0),
                take_profit: Some(44000.0),
                max_duration_hours: None,
            },
            Utc::now(),
        )
        .unwrap();

        let mut trade = ValidationTrade::open(signal);
        trade.realized_pnl = pnl;
        trade.unrealized_pnl = pnl;
        trade.status = TradeStatus::from_realized_pnl(pnl);
        trade.exit_price = Some(trade.current_price);
        trade.exit_time = Some(Utc::now());
        trade.exit_reason = Some(ExitReason::StopLoss);
        trade
    }

    #[tokio::test]
    #[ignore] // Requires Postgres (DATABASE_URL)
    async fn test_round_trip_closed_trade() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
        let store = PostgresStore::new(&url).await.expect("connect failed");

        let trade = closed_trade(-33.33);
        store.append_closed_trade(&trade).await.unwrap();
        // Replay is a no-op
        store.append_closed_trade(&trade).await.unwrap();

        let loaded = store.load_closed_trades().await.unwrap();
        let found = loaded.iter().find(|t| t.id == trade.id).expect("not found");

        assert_eq!(found.signal.instrument, "BTC");
        assert_eq!(found.status, TradeStatus::Losing);
        assert_eq!(found.exit_reason, Some(ExitReason::StopLoss));
        assert!((found.realized_pnl - (-33.33)).abs() < 1e-9);
    }

    #[tokio::test]
    #[ignore] // Requires Postgres (DATABASE_URL)
    async fn test_aggregate_upsert_overwrites() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
        let store = PostgresStore::new(&url).await.expect("connect failed");

        let mut aggregate = StrategyAggregate {
            strategy_type: "upsert_test".to_string(),
            total_trades: 5,
            profitable_trades: 3,
            losing_trades: 2,
            win_rate: 0.6,
            avg_return: 1.5,
            total_return: 7.5,
            sharpe_ratio: 0.2,
            max_drawdown: 0.1,
            verdict: Verdict::InsufficientData,
            sample_size: 5,
            last_updated: Utc::now(),
        };

        store.upsert_aggregate(&aggregate).await.unwrap();
        aggregate.total_trades = 6;
        aggregate.sample_size = 6;
        store.upsert_aggregate(&aggregate).await.unwrap();
    }
}
