use crate::models::{Direction, ExitReason, ValidationTrade};

/// Decide whether a trade should close at the given price
///
/// Pure function over the trade's current state. Rules are evaluated in
/// strict priority order and the first match wins: stop loss, take profit,
/// the signal's own time window, then the protocol-wide validation ceiling.
/// Returns `None` while the trade remains within all bounds.
///
/// Expects `trade.duration_minutes` to be current; the tracker refreshes it
/// before every evaluation.
pub fn evaluate(
    trade: &ValidationTrade,
    new_price: f64,
    max_validation_minutes: i64,
) -> Option<ExitReason> {
    let signal = &trade.signal;

    if let Some(stop_loss) = signal.stop_loss {
        let breached = match signal.direction {
            Direction::Long => new_price <= stop_loss,
            Direction::Short => new_price >= stop_loss,
        };
        if breached {
            return Some(ExitReason::StopLoss);
        }
    }

    if let Some(take_profit) = signal.take_profit {
        let reached = match signal.direction {
            Direction::Long => new_price >= take_profit,
            Direction::Short => new_price <= take_profit,
        };
        if reached {
            return Some(ExitReason::TakeProfit);
        }
    }

    if trade.duration_minutes >= signal.max_duration_hours * 60 {
        return Some(ExitReason::TimeExit);
    }

    // Hard ceiling, applies even when the signal asked for a longer window
    if trade.duration_minutes >= max_validation_minutes {
        return Some(ExitReason::MaxValidationTime);
    }

    None
}
