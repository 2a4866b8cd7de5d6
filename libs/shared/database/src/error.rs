use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A delete hit a row that other rows still point at.
    #[error("Row still referenced: {0}")]
    StillReferenced(String),

    #[error("Row not found: {0}")]
    RowNotFound(String),

    /// Serialization failure, deadlock or pool exhaustion. The caller may resubmit.
    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Store failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Transient(msg) => AppError::Unavailable(msg),
            StoreError::UniqueViolation(msg) | StoreError::StillReferenced(msg) => AppError::Conflict(msg),
            StoreError::RowNotFound(msg) => AppError::NotFound(msg),
            StoreError::Backend(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn transient_failures_surface_as_unavailable() {
        let error = StoreError::Transient("deadlock detected".to_string());
        assert!(error.is_transient());
        assert_matches!(AppError::from(error), AppError::Unavailable(_));
        assert_matches!(AppError::from(StoreError::Backend("boom".into())), AppError::Database(_));
    }
}
