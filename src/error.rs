//! Error types for engine operations
//!
//! Errors are classified for the request layer:
//! - ConstraintViolation: the storage engine rejected a write
//! - InvalidState: a domain rule was broken before reaching storage
//! - Storage: anything else from SQLite or the store

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Lead {lead_id} has {count} follow-up processes, expected at most one")]
    DuplicateProcess { lead_id: i64, count: usize },

    #[error("Invalid timestamp {value:?}: expected YYYY-MM-DD HH:MM:SS")]
    InvalidTimestamp { value: String },

    #[error("Row {id} in {collection} missing right after insert")]
    MissingRow { collection: &'static str, id: i64 },

    #[error(transparent)]
    Db(#[from] DbError),
}

impl CrmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrmError::InvalidState(_)
            | CrmError::DuplicateProcess { .. }
            | CrmError::InvalidTimestamp { .. } => ErrorKind::InvalidState,
            CrmError::Db(DbError::ConstraintViolation { .. }) => ErrorKind::ConstraintViolation,
            CrmError::MissingRow { .. } | CrmError::Db(_) => ErrorKind::Storage,
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        self.kind() == ErrorKind::ConstraintViolation
    }

    pub fn is_invalid_state(&self) -> bool {
        self.kind() == ErrorKind::InvalidState
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConstraintViolation,
    InvalidState,
    Storage,
}

/// Serializable error representation for the request layer
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    pub error_type: ErrorKind,
}

impl From<&CrmError> for ErrorPayload {
    fn from(err: &CrmError) -> Self {
        ErrorPayload {
            message: err.to_string(),
            error_type: err.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            CrmError::InvalidState("x".into()).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            CrmError::DuplicateProcess { lead_id: 1, count: 2 }.kind(),
            ErrorKind::InvalidState
        );
        let constraint = CrmError::from(DbError::ConstraintViolation {
            collection: "leads".into(),
            message: "NOT NULL constraint failed: leads.status".into(),
        });
        assert!(constraint.is_constraint_violation());
        assert_eq!(
            CrmError::from(DbError::InvalidIdentifier("x y".into())).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn test_payload_serialization() {
        let err = CrmError::InvalidState("Lead status cannot be null".into());
        let payload = ErrorPayload::from(&err);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["errorType"], "invalid_state");
        assert_eq!(json["message"], "Invalid state: Lead status cannot be null");
    }
}
