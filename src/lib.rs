//! Encrypted, signed firmware images for secure bootloaders
//!
//! A packaged image is the AES-128-CBC encrypted firmware followed by a
//! 256-byte metadata block carrying the sizes, the IV, the SHA-256 digest of
//! the plaintext and an ECDSA P-256 signature over that digest.
//!
//! ```no_run
//! use fwseal::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let signing_key = FirmwareSigningKey::from_pem(&std::fs::read_to_string("private_key.pem")?)?;
//! let verifying_key = signing_key.verifying_key();
//! let symmetric_key = SymmetricKey::from_slice(&std::fs::read("aes_key.bin")?)?;
//!
//! let image = FirmwareImage::package(std::fs::read("app.bin")?)
//!     .signing_key(&signing_key)
//!     .symmetric_key(&symmetric_key)
//!     .to_bytes()?;
//!
//! let report = FirmwareImage::verify(image)
//!     .verifying_key(&verifying_key)
//!     .symmetric_key(&symmetric_key)
//!     .report()?;
//! assert!(report.is_authentic());
//! # Ok(())
//! # }
//! ```

mod binary;
pub mod crypto;
mod error;
mod firmware;
mod image;
pub mod metadata;
mod package;
pub mod prelude;
pub mod signature;
mod types;
mod verify;

pub use binary::{BinaryRead, BinaryWrite};
pub use crypto::{decrypt, encrypt, PaddingError};
pub use error::FwSealError;
pub use firmware::{
    FirmwareImage, PackageBuilder, PackageFileBuilder, VerifyBuilder, VerifyFileBuilder,
};
pub use image::{FormatError, SealedImage};
pub use metadata::{ImageMetadata, MetadataError, METADATA_SIZE};
pub use package::{PackageSummary, Packager};
pub use signature::{digest, sign, verify, Digest, RawSignature};
pub use types::{FirmwareSigningKey, FirmwareVerifyingKey, KeyError, SymmetricKey};
pub use verify::{VerificationReport, Verifier};
