use sea_orm::DbErr;
use thiserror::Error;

use services::error::ReviewError;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("format conversion failed: {0}")]
    ConversionFailed(String),

    #[error("the combined document is not ready: {0}")]
    NotReady(&'static str),

    #[error("page image generation exceeded the {0}s budget")]
    BudgetExceeded(u64),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error("database error: {0}")]
    Db(#[from] DbErr),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
