//! Unified error type for the fwseal public API
//!
//! Internal modules keep their own error types (`FormatError`,
//! `PaddingError`, `KeyError`); this type folds them into one enum whose
//! variants line up with the failure kinds a bootloader tool reports.
//!
//! # Example
//!
//! ```no_run
//! use fwseal::FwSealError;
//!
//! fn check(image: &[u8]) -> Result<(), FwSealError> {
//!     let _ = fwseal::SealedImage::parse(image)?;
//!     Ok(())
//! }
//! ```

use crate::crypto::PaddingError;
use crate::image::FormatError;
use crate::types::KeyError;
use thiserror::Error;

/// Unified error type for all fwseal operations
///
/// # Error Categories
///
/// - **Format**: malformed or truncated image or metadata, always fatal
/// - **Padding**: the payload did not decrypt to validly padded data
/// - **IntegrityMismatch**: recomputed digest differs from the stored one
/// - **SignatureInvalid**: the stored signature does not verify
/// - **KeyFormat**: key material has the wrong length or structure
#[derive(Debug, Error)]
pub enum FwSealError {
    /// Malformed image or metadata
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Payload decryption failed
    #[error(transparent)]
    Padding(#[from] PaddingError),

    /// Digest of the recovered firmware differs from the stored digest
    #[error("Digest mismatch: stored {expected}, computed {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    /// Signature does not verify under the supplied public key
    #[error("Signature verification failed")]
    SignatureInvalid,

    /// Key material could not be used
    #[error(transparent)]
    KeyFormat(#[from] KeyError),

    /// A builder was finalized without a required input
    #[error("Missing required field: {field}")]
    MissingRequiredField { field: &'static str },

    /// A cryptographic primitive failed unexpectedly
    #[error("Cryptographic error: {operation} failed - {reason}")]
    Crypto {
        operation: &'static str,
        reason: String,
    },

    /// Reading or writing an image failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FwSealError {
    /// Returns an error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Format(_) => "FWSEAL_E_FORMAT",
            Self::Padding(_) => "FWSEAL_E_PADDING",
            Self::IntegrityMismatch { .. } => "FWSEAL_E_INTEGRITY",
            Self::SignatureInvalid => "FWSEAL_E_SIGNATURE",
            Self::KeyFormat(_) => "FWSEAL_E_KEY_FORMAT",
            Self::MissingRequiredField { .. } => "FWSEAL_E_FIELD_REQUIRED",
            Self::Crypto { .. } => "FWSEAL_E_CRYPTO",
            Self::Io(_) => "FWSEAL_E_IO",
        }
    }

    /// Returns a suggestion for resolving this error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Format(_) => Some("Check that the file is a complete packaged image"),
            Self::Padding(_) => Some("Check that the symmetric key matches the one used to package"),
            Self::IntegrityMismatch { .. } => {
                Some("The image was modified after packaging; repackage from the original firmware")
            }
            Self::SignatureInvalid => {
                Some("Check that the public key belongs to the key that signed the image")
            }
            Self::KeyFormat(_) => {
                Some("Provide a P-256 key in PEM/DER form and a 16-byte symmetric key")
            }
            _ => None,
        }
    }

    /// Returns true if the error means the image is not authentic
    ///
    /// Such failures are reported rather than fatal: retrying cannot change
    /// the outcome.
    pub fn is_authenticity_failure(&self) -> bool {
        matches!(
            self,
            Self::Padding(_) | Self::IntegrityMismatch { .. } | Self::SignatureInvalid
        )
    }
}
