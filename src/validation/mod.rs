// Signal intake and trade lifecycle
pub mod exit_rules;
pub mod tracker;

pub use tracker::TradeTracker;
