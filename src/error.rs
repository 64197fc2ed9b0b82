use thiserror::Error;

/// Admission-time rejection of a submitted signal
///
/// Returned synchronously to the submitter. `LowConfidence` and
/// `CapacityExceeded` are recoverable; the caller may resubmit later.
/// `MalformedSignal` never enters the lifecycle.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SignalRejection {
    #[error("signal confidence {confidence:.1}% below threshold {threshold:.1}%")]
    LowConfidence { confidence: f64, threshold: f64 },

    #[error("max concurrent validations reached ({limit})")]
    CapacityExceeded { limit: usize },

    #[error("malformed signal: {0}")]
    MalformedSignal(String),
}
