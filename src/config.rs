/// Validation protocol parameters
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub confidence_threshold: f64,      // Minimum confidence to admit a signal
    pub max_concurrent_validations: usize,
    pub min_trades_for_stats: usize,    // Below this, aggregation is skipped
    pub min_trades_for_verdict: usize,  // Below this, verdict is INSUFFICIENT_DATA
    pub max_validation_duration_hours: i64, // Hard ceiling, overrides the signal's window
    pub recent_trades_limit: usize,     // Closed trades shown in the report
    pub initial_portfolio_value: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 60.0,
            max_concurrent_validations: 10,
            min_trades_for_stats: 5,
            min_trades_for_verdict: 20,
            max_validation_duration_hours: 48,
            recent_trades_limit: 10,
            initial_portfolio_value: 10_000.0,
        }
    }
}

impl ValidationConfig {
    /// Defaults with `VALIDBOT_*` environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = parse_env("VALIDBOT_CONFIDENCE_THRESHOLD") {
            config.confidence_threshold = v;
        }
        if let Some(v) = parse_env("VALIDBOT_MAX_CONCURRENT") {
            config.max_concurrent_validations = v;
        }
        if let Some(v) = parse_env("VALIDBOT_MAX_DURATION_HOURS") {
            config.max_validation_duration_hours = v;
        }
        if let Some(v) = parse_env("VALIDBOT_PORTFOLIO_VALUE") {
            config.initial_portfolio_value = v;
        }

        config
    }

    /// Protocol-wide validation ceiling in minutes
    pub fn max_validation_minutes(&self) -> i64 {
        self.max_validation_duration_hours * 60
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidationConfig::default();

        assert_eq!(config.confidence_threshold, 60.0);
        assert_eq!(config.max_concurrent_validations, 10);
        assert_eq!(config.min_trades_for_stats, 5);
        assert_eq!(config.min_trades_for_verdict, 20);
        assert_eq!(config.max_validation_minutes(), 48 * 60);
    }
}
