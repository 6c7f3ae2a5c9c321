use common::ValidationError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{field} must be a positive number (got {value})")]
    NonPositiveSetting { field: &'static str, value: f64 },
}

/// Reject zero, negative and non-finite settings
pub(crate) fn ensure_positive(field: &'static str, value: f64) -> Result<(), AnalyticsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnalyticsError::NonPositiveSetting { field, value })
    }
}
