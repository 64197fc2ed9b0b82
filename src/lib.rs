// Core modules
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod persistence;
pub mod report;
pub mod stats;
pub mod validation;

// Re-export commonly used types
pub use config::ValidationConfig;
pub use error::SignalRejection;
pub use models::*;
pub use report::ValidationReport;
pub use validation::TradeTracker;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
