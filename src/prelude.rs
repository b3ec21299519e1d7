//! fwseal Prelude
//!
//! The prelude module provides a convenient way to import commonly used types and traits.
//!
//! # Example
//!
//! ```rust
//! use fwseal::prelude::*;
//!
//! # fn example() -> Result<(), MetadataError> {
//! let metadata = ImageMetadata::new(16, 10, &[0u8; 16], &[0u8; 32], &[0u8; 64])?;
//! assert_eq!(metadata.pad_size, 6);
//! # Ok(())
//! # }
//! ```

// Core image types
pub use crate::image::{FormatError, SealedImage};
pub use crate::metadata::{ImageMetadata, MetadataError};

// Keys
pub use crate::types::{FirmwareSigningKey, FirmwareVerifyingKey, KeyError, SymmetricKey};

// Packaging and verification
pub use crate::firmware::FirmwareImage;
pub use crate::package::{PackageSummary, Packager};
pub use crate::verify::{VerificationReport, Verifier};

pub use crate::crypto::PaddingError;
pub use crate::error::FwSealError;

// Codec traits
pub use crate::binary::{BinaryRead, BinaryWrite};
