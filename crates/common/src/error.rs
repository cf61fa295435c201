use thiserror::Error;

/// Failure taxonomy for one scheduler cycle. None of these are fatal to the
/// process: the loop logs, skips the affected symbol, and continues.
#[derive(Debug, Error)]
pub enum Error {
    /// Candle or price fetch failed, or fewer bars than requested came back.
    /// The symbol is skipped this cycle and retried on the next one.
    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    /// Pattern matched but the computed stop distance was not positive.
    #[error("invalid setup: non-positive stop distance")]
    InvalidSetup,

    /// Opening order failed. No position is created and the daily-limit
    /// watermark is left untouched.
    #[error("order execution failed: {0}")]
    Execution(String),

    /// Reduce-only close failed. The outcome is still recorded; the
    /// venue-side position may need manual reconciliation.
    #[error("close execution failed: {0}")]
    CloseExecution(String),

    #[error("notification failed: {0}")]
    Notification(String),

    #[error("HTTP error: {0}")]
    Http(String),

    /// An external call exceeded its timeout; treated as that call's
    /// generic failure.
    #[error("external call timed out: {0}")]
    Timeout(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
