use sea_orm::DbErr;
use thiserror::Error;

use crate::context::Capability;

/// Error taxonomy for the review core.
///
/// `Validation` and `Policy` are recoverable user-facing outcomes.
/// `ConcurrentModification` and `StaleSubmission` tell the client to reload
/// and retry. `MultipleGroups` / `NoGroup` block team submissions until
/// enrollment is fixed. `PermissionDenied` is always fatal.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("operation forbidden by subject configuration: {0}")]
    Policy(String),

    #[error("the submission statement must be accepted")]
    StatementRequired,

    #[error("record was modified since it was loaded; reload and retry")]
    ConcurrentModification,

    #[error("submission was modified since the form was loaded; reload and retry")]
    StaleSubmission,

    #[error("user {user_id} belongs to more than one submission group")]
    MultipleGroups { user_id: i64 },

    #[error("user {user_id} does not belong to a submission group")]
    NoGroup { user_id: i64 },

    #[error("permission denied: {0:?}")]
    PermissionDenied(Capability),

    #[error("{0} not found")]
    NotFound(String),

    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

/// One failed item of a batch operation. Batches accumulate warnings and
/// keep processing the remainder.
#[derive(Debug)]
pub struct BatchWarning {
    pub user_id: i64,
    pub message: String,
}
