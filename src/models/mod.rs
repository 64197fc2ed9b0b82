use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SignalRejection;

/// Default auto-close window for a signal that does not specify one
pub const DEFAULT_MAX_DURATION_HOURS: i64 = 24;

/// Trade direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    #[serde(rename = "LONG")]
    Long,
    #[serde(rename = "SHORT")]
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LONG" => Some(Direction::Long),
            "SHORT" => Some(Direction::Short),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw signal submission as received from a strategy
///
/// Validated into a [`TradeSignal`] before it enters the lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSubmission {
    pub strategy_type: String,
    pub instrument: String,
    pub direction: Direction,
    pub confidence: f64,
    pub entry_price: f64,
    pub position_size: f64,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub max_duration_hours: Option<i64>,
}

/// Immutable trading signal admitted for validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub id: Uuid,
    pub strategy_type: String,
    pub instrument: String,
    pub direction: Direction,
    pub confidence: f64,
    pub entry_price: f64,
    pub position_size: f64, // Notional currency units
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub entry_time: DateTime<Utc>,
    pub max_duration_hours: i64,
}

impl TradeSignal {
    /// Validate a raw submission into a signal
    ///
    /// Malformed fields never enter the lifecycle.
    pub fn from_submission(
        submission: SignalSubmission,
        entry_time: DateTime<Utc>,
    ) -> Result<Self, SignalRejection> {
        let malformed = |msg: &str| SignalRejection::MalformedSignal(msg.to_string());

        if submission.strategy_type.trim().is_empty() {
            return Err(malformed("strategy_type is empty"));
        }
        if submission.instrument.trim().is_empty() {
            return Err(malformed("instrument is empty"));
        }
        if !(0.0..=100.0).contains(&submission.confidence) {
            return Err(malformed("confidence must be within 0-100"));
        }
        if !(submission.entry_price > 0.0) {
            return Err(malformed("entry_price must be positive"));
        }
        if !(submission.position_size > 0.0) {
            return Err(malformed("position_size must be positive"));
        }
        let max_duration_hours = submission
            .max_duration_hours
            .unwrap_or(DEFAULT_MAX_DURATION_HOURS);
        if max_duration_hours <= 0 {
            return Err(malformed("max_duration_hours must be positive"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            strategy_type: submission.strategy_type,
            instrument: submission.instrument,
            direction: submission.direction,
            confidence: submission.confidence,
            entry_price: submission.entry_price,
            position_size: submission.position_size,
            stop_loss: submission.stop_loss,
            take_profit: submission.take_profit,
            entry_time,
            max_duration_hours,
        })
    }

    /// Unrealized P&L at the given price, in notional currency units
    ///
    /// Percentage move from entry scaled by position size, signed by direction.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.direction {
            Direction::Long => (price - self.entry_price) / self.entry_price * self.position_size,
            Direction::Short => (self.entry_price - price) / self.entry_price * self.position_size,
        }
    }
}

/// Lifecycle state of a single validation trade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    Active,
    Profitable,
    Losing,
    Terminated, // Closed at exactly zero P&L
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Active => "ACTIVE",
            TradeStatus::Profitable => "PROFITABLE",
            TradeStatus::Losing => "LOSING",
            TradeStatus::Terminated => "TERMINATED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(TradeStatus::Active),
            "PROFITABLE" => Some(TradeStatus::Profitable),
            "LOSING" => Some(TradeStatus::Losing),
            "TERMINATED" => Some(TradeStatus::Terminated),
            _ => None,
        }
    }

    /// Terminal status for a trade closing with the given realized P&L
    pub fn from_realized_pnl(pnl: f64) -> Self {
        if pnl > 0.0 {
            TradeStatus::Profitable
        } else if pnl < 0.0 {
            TradeStatus::Losing
        } else {
            TradeStatus::Terminated
        }
    }
}

/// Strategy-level validation verdict
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Validated,
    Rejected,
    Pending,
    InsufficientData,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Validated => "VALIDATED",
            Verdict::Rejected => "REJECTED",
            Verdict::Pending => "PENDING",
            Verdict::InsufficientData => "INSUFFICIENT_DATA",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "VALIDATED" => Some(Verdict::Validated),
            "REJECTED" => Some(Verdict::Rejected),
            "PENDING" => Some(Verdict::Pending),
            "INSUFFICIENT_DATA" => Some(Verdict::InsufficientData),
            _ => None,
        }
    }
}

/// Why a trade was closed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TimeExit,
    MaxValidationTime,
    Manual,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "Stop Loss Hit",
            ExitReason::TakeProfit => "Take Profit Hit",
            ExitReason::TimeExit => "Time Exit",
            ExitReason::MaxValidationTime => "Max Validation Time",
            ExitReason::Manual => "Manual Exit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Stop Loss Hit" => Some(ExitReason::StopLoss),
            "Take Profit Hit" => Some(ExitReason::TakeProfit),
            "Time Exit" => Some(ExitReason::TimeExit),
            "Max Validation Time" => Some(ExitReason::MaxValidationTime),
            "Manual Exit" => Some(ExitReason::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Simulated (paper) position tracking a signal against live prices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationTrade {
    pub id: Uuid,
    pub signal: TradeSignal,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64, // Set only at close
    pub exit_price: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
    pub status: TradeStatus,
    pub max_unrealized_pnl: f64,
    pub min_unrealized_pnl: f64,
    pub duration_minutes: i64,
    pub exit_reason: Option<ExitReason>,
}

impl ValidationTrade {
    /// Open a fresh trade for an admitted signal
    pub fn open(signal: TradeSignal) -> Self {
        let entry_price = signal.entry_price;
        Self {
            id: Uuid::new_v4(),
            signal,
            current_price: entry_price,
            unrealized_pnl: 0.0,
            realized_pnl: 0.0,
            exit_price: None,
            exit_time: None,
            status: TradeStatus::Active,
            max_unrealized_pnl: 0.0,
            min_unrealized_pnl: 0.0,
            duration_minutes: 0,
            exit_reason: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status != TradeStatus::Active
    }
}

/// Rolling per-strategy performance, recomputed from closed-trade history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyAggregate {
    pub strategy_type: String,
    pub total_trades: usize,
    pub profitable_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_return: f64,
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub verdict: Verdict,
    pub sample_size: usize,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> SignalSubmission {
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
        }
    }

    #[test]
    fn test_submission_validates_into_signal() {
        let signal = TradeSignal::from_submission(submission(), Utc::now()).unwrap();

        assert_eq!(signal.instrument, "BTC");
        assert_eq!(signal.direction, Direction::Short);
        assert_eq!(signal.max_duration_hours, DEFAULT_MAX_DURATION_HOURS);
        assert_eq!(signal.stop_loss, Some(46000.0));
    }

    #[test]
    fn test_malformed_submissions_rejected() {
        let mut bad_price = submission();
        bad_price.entry_price = 0.0;
        assert!(TradeSignal::from_submission(bad_price, Utc::now()).is_err());

        let mut bad_confidence = submission();
        bad_confidence.confidence = 120.0;
        assert!(TradeSignal::from_submission(bad_confidence, Utc::now()).is_err());

        let mut bad_instrument = submission();
        bad_instrument.instrument = " ".to_string();
        assert!(TradeSignal::from_submission(bad_instrument, Utc::now()).is_err());

        let mut bad_duration = submission();
        bad_duration.max_duration_hours = Some(0);
        assert!(TradeSignal::from_submission(bad_duration, Utc::now()).is_err());
    }

    #[test]
    fn test_unrealized_pnl_by_direction() {
        let mut long = submission();
        long.direction = Direction::Long;
        long.entry_price = 100.0;
        long.position_size = 500.0;
        let long = TradeSignal::from_submission(long, Utc::now()).unwrap();

        // +10% move on a 500 notional
        assert!((long.unrealized_pnl(110.0) - 50.0).abs() < 1e-9);
        assert!((long.unrealized_pnl(90.0) + 50.0).abs() < 1e-9);

        let short = TradeSignal::from_submission(submission(), Utc::now()).unwrap();
        // Short loses when price rises: (45000 - 46500) / 45000 * 1000
        assert!((short.unrealized_pnl(46500.0) + 33.333333).abs() < 1e-4);
    }

    #[test]
    fn test_trade_opens_at_entry_price() {
        let signal = TradeSignal::from_submission(submission(), Utc::now()).unwrap();
        let trade = ValidationTrade::open(signal);

        assert_eq!(trade.status, TradeStatus::Active);
        assert_eq!(trade.current_price, 45000.0);
        assert_eq!(trade.unrealized_pnl, 0.0);
        assert!(trade.exit_price.is_none());
        assert!(trade.exit_reason.is_none());
        assert!(!trade.is_closed());
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(TradeStatus::from_realized_pnl(12.5), TradeStatus::Profitable);
        assert_eq!(TradeStatus::from_realized_pnl(-0.01), TradeStatus::Losing);
        assert_eq!(TradeStatus::from_realized_pnl(0.0), TradeStatus::Terminated);
    }

    #[test]
    fn test_enum_string_round_trips() {
        for status in [
            TradeStatus::Active,
            TradeStatus::Profitable,
            TradeStatus::Losing,
            TradeStatus::Terminated,
        ] {
            assert_eq!(TradeStatus::parse(status.as_str()), Some(status));
        }
        for reason in [
            ExitReason::StopLoss,
            ExitReason::TakeProfit,
            ExitReason::TimeExit,
            ExitReason::MaxValidationTime,
            ExitReason::Manual,
        ] {
            assert_eq!(ExitReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(Verdict::InsufficientData.as_str(), "INSUFFICIENT_DATA");
        assert_eq!(ExitReason::StopLoss.to_string(), "Stop Loss Hit");
    }
}
