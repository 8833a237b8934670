//! Core error types for the Quantfolio optimizer.
//!
//! Only unrecoverable conditions live here. Recoverable degradations
//! (solver fallback, default beta, dropped constraints) are carried in the
//! result metadata instead of failing the request.

use std::time::Duration;

use thiserror::Error;

pub use quantfolio_market_data::MarketDataError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for an optimization request.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Price history unavailable for: {}", .0.join(", "))]
    DataUnavailable(Vec<String>),

    #[error("Market data operation failed: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Optimization did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Optimization was cancelled")]
    Cancelled,

    #[error("Calculation failed: {0}")]
    Calculation(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Validation errors for user input.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Value {value} for '{field}' is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Unexpected(format!("Solver task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_unavailable_lists_symbols() {
        let err = Error::DataUnavailable(vec!["AAPL".to_string(), "ZZZZ".to_string()]);
        assert_eq!(err.to_string(), "Price history unavailable for: AAPL, ZZZZ");
    }

    #[test]
    fn test_validation_error_wraps() {
        let err: Error = ValidationError::MissingField("symbols".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Input validation failed: Required field 'symbols' is missing"
        );
    }
}
