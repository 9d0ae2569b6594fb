use chrono::NaiveDate;
use thiserror::Error;

use crate::ml::ModelStoreError;

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Invalid date '{input}': {reason}")]
    InvalidDate { input: String, reason: String },

    #[error("Invalid date range: {from} is after {to}")]
    InvalidDateRange { from: NaiveDate, to: NaiveDate },

    #[error(transparent)]
    Model(#[from] ModelStoreError),

    /// Anything past validation and loading: calendar walk, evaluation, join errors
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PredictionError {
    /// Caller-side mistakes, as opposed to server faults
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PredictionError::InvalidDate { .. } | PredictionError::InvalidDateRange { .. }
        )
    }
}
