//! Poll-based format conversion boundary.
//!
//! Conversion runs outside the request: `start_conversion` either returns
//! the finished blob (already converted, or cached from an earlier request)
//! or `Pending`, in which case the caller must come back later. `Pending`
//! is never a failure.

use crate::error::DocumentError;
use crate::storage::StoredFile;

#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    Ready(Vec<u8>),
    Pending,
    Failed(String),
}

pub trait FormatConverter: Send + Sync {
    fn start_conversion(
        &self,
        file: &StoredFile,
        target_format: &str,
    ) -> Result<ConversionOutcome, DocumentError>;
}

/// Converter for deployments without a conversion service: every non-native
/// file fails with a clear message instead of hanging in `Pending` forever.
pub struct UnsupportedConverter;

impl FormatConverter for UnsupportedConverter {
    fn start_conversion(
        &self,
        file: &StoredFile,
        target_format: &str,
    ) -> Result<ConversionOutcome, DocumentError> {
        Ok(ConversionOutcome::Failed(format!(
            "no converter available for {} -> {}",
            file.key.filename, target_format
        )))
    }
}
