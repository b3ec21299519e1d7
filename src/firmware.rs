//! High-level API for packaging and verifying firmware images
//!
//! This module provides a fluent front end over [`Packager`] and
//! [`Verifier`] for the common in-memory and file based cases.

use crate::error::FwSealError;
use crate::image::SealedImage;
use crate::package::{PackageSummary, Packager};
use crate::types::{FirmwareSigningKey, FirmwareVerifyingKey, SymmetricKey};
use crate::verify::{VerificationReport, Verifier};
use std::path::{Path, PathBuf};

/// High-level firmware image operations
///
/// # Examples
///
/// ```no_run
/// use fwseal::{FirmwareImage, FirmwareSigningKey, SymmetricKey};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let signing_key = FirmwareSigningKey::from_scalar(&[7u8; 32])?;
/// # let symmetric_key = SymmetricKey::from([0u8; 16]);
///
/// FirmwareImage::package_file("app.bin", "app_withMetadata.bin")
///     .signing_key(&signing_key)
///     .symmetric_key(&symmetric_key)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct FirmwareImage;

impl FirmwareImage {
    /// Package in-memory firmware
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use fwseal::{FirmwareImage, FirmwareSigningKey, SymmetricKey};
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let signing_key = FirmwareSigningKey::from_scalar(&[7u8; 32])?;
    /// # let symmetric_key = SymmetricKey::from([0u8; 16]);
    /// let image = FirmwareImage::package(std::fs::read("app.bin")?)
    ///     .signing_key(&signing_key)
    ///     .symmetric_key(&symmetric_key)
    ///     .to_bytes()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn package<'k>(firmware: impl Into<Vec<u8>>) -> PackageBuilder<'k> {
        PackageBuilder::new(firmware.into())
    }

    /// Package a firmware file into an image file
    pub fn package_file<'k>(
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> PackageFileBuilder<'k> {
        PackageFileBuilder::new(input.as_ref().to_path_buf(), output.as_ref().to_path_buf())
    }

    /// Verify in-memory image bytes
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use fwseal::{FirmwareImage, FirmwareVerifyingKey, SymmetricKey};
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let verifying_key = FirmwareVerifyingKey::from_pem(&std::fs::read_to_string("public_key.pem")?)?;
    /// # let symmetric_key = SymmetricKey::from([0u8; 16]);
    /// let report = FirmwareImage::verify(std::fs::read("app_withMetadata.bin")?)
    ///     .verifying_key(&verifying_key)
    ///     .symmetric_key(&symmetric_key)
    ///     .report()?;
    /// println!("authentic: {}", report.is_authentic());
    /// # Ok(())
    /// # }
    /// ```
    pub fn verify<'k>(image: impl Into<Vec<u8>>) -> VerifyBuilder<'k> {
        VerifyBuilder::new(image.into())
    }

    /// Verify an image file
    pub fn verify_file<'k>(path: impl AsRef<Path>) -> VerifyFileBuilder<'k> {
        VerifyFileBuilder::new(path.as_ref().to_path_buf())
    }
}

/// Builder for packaging firmware held in memory
pub struct PackageBuilder<'k> {
    firmware: Vec<u8>,
    signing_key: Option<&'k FirmwareSigningKey>,
    symmetric_key: Option<&'k SymmetricKey>,
}

impl<'k> PackageBuilder<'k> {
    pub(crate) fn new(firmware: Vec<u8>) -> Self {
        Self {
            firmware,
            signing_key: None,
            symmetric_key: None,
        }
    }

    /// Set the ECDSA P-256 key that signs the firmware digest
    #[must_use]
    pub fn signing_key(mut self, key: &'k FirmwareSigningKey) -> Self {
        self.signing_key = Some(key);
        self
    }

    /// Set the AES-128 key that encrypts the payload
    #[must_use]
    pub fn symmetric_key(mut self, key: &'k SymmetricKey) -> Self {
        self.symmetric_key = Some(key);
        self
    }

    /// Build the sealed image
    pub fn seal(self) -> Result<SealedImage, FwSealError> {
        let signing_key = self
            .signing_key
            .ok_or(FwSealError::MissingRequiredField {
                field: "signing_key",
            })?;
        let symmetric_key = self
            .symmetric_key
            .ok_or(FwSealError::MissingRequiredField {
                field: "symmetric_key",
            })?;

        Packager::new(signing_key, symmetric_key).package(self.firmware)
    }

    /// Build and return the image bytes
    pub fn to_bytes(self) -> Result<Vec<u8>, FwSealError> {
        Ok(self.seal()?.to_bytes())
    }

    /// Build and write the image to `path`
    pub fn to_file(self, path: impl AsRef<Path>) -> Result<PackageSummary, FwSealError> {
        let image = self.seal()?;
        image.write_atomic(path)?;
        Ok(PackageSummary::from(image.metadata()))
    }
}

/// Builder for packaging a firmware file
pub struct PackageFileBuilder<'k> {
    input_path: PathBuf,
    output_path: PathBuf,
    signing_key: Option<&'k FirmwareSigningKey>,
    symmetric_key: Option<&'k SymmetricKey>,
}

impl<'k> PackageFileBuilder<'k> {
    pub(crate) fn new(input_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            input_path,
            output_path,
            signing_key: None,
            symmetric_key: None,
        }
    }

    /// Set the ECDSA P-256 key that signs the firmware digest
    #[must_use]
    pub fn signing_key(mut self, key: &'k FirmwareSigningKey) -> Self {
        self.signing_key = Some(key);
        self
    }

    /// Set the AES-128 key that encrypts the payload
    #[must_use]
    pub fn symmetric_key(mut self, key: &'k SymmetricKey) -> Self {
        self.symmetric_key = Some(key);
        self
    }

    /// Read the input, package it and write the output
    ///
    /// Missing keys are reported before the input is read.
    pub fn build(self) -> Result<PackageSummary, FwSealError> {
        let signing_key = self
            .signing_key
            .ok_or(FwSealError::MissingRequiredField {
                field: "signing_key",
            })?;
        let symmetric_key = self
            .symmetric_key
            .ok_or(FwSealError::MissingRequiredField {
                field: "symmetric_key",
            })?;

        let firmware = std::fs::read(&self.input_path)?;
        Packager::new(signing_key, symmetric_key).package_to_file(firmware, &self.output_path)
    }
}

/// Builder for verifying image bytes
pub struct VerifyBuilder<'k> {
    image: Vec<u8>,
    verifying_key: Option<&'k FirmwareVerifyingKey>,
    symmetric_key: Option<&'k SymmetricKey>,
}

impl<'k> VerifyBuilder<'k> {
    pub(crate) fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            verifying_key: None,
            symmetric_key: None,
        }
    }

    /// Set the public key the signature is checked against
    #[must_use]
    pub fn verifying_key(mut self, key: &'k FirmwareVerifyingKey) -> Self {
        self.verifying_key = Some(key);
        self
    }

    /// Set the AES-128 key that decrypts the payload
    #[must_use]
    pub fn symmetric_key(mut self, key: &'k SymmetricKey) -> Self {
        self.symmetric_key = Some(key);
        self
    }

    /// Run every check and return the full report
    pub fn report(self) -> Result<VerificationReport, FwSealError> {
        let verifying_key = self
            .verifying_key
            .ok_or(FwSealError::MissingRequiredField {
                field: "verifying_key",
            })?;
        let symmetric_key = self
            .symmetric_key
            .ok_or(FwSealError::MissingRequiredField {
                field: "symmetric_key",
            })?;

        Verifier::new(verifying_key, symmetric_key).verify(&self.image)
    }

    /// Return the firmware if and only if the image is authentic
    pub fn to_bytes(self) -> Result<Vec<u8>, FwSealError> {
        self.report()?.into_result()
    }

    /// Write the firmware to `path` if and only if the image is authentic
    pub fn to_file(self, path: impl AsRef<Path>) -> Result<(), FwSealError> {
        self.report()?.write_firmware(path)?;
        Ok(())
    }
}

/// Builder for verifying an image file
pub struct VerifyFileBuilder<'k> {
    input_path: PathBuf,
    verifying_key: Option<&'k FirmwareVerifyingKey>,
    symmetric_key: Option<&'k SymmetricKey>,
}

impl<'k> VerifyFileBuilder<'k> {
    pub(crate) fn new(input_path: PathBuf) -> Self {
        Self {
            input_path,
            verifying_key: None,
            symmetric_key: None,
        }
    }

    /// Set the public key the signature is checked against
    #[must_use]
    pub fn verifying_key(mut self, key: &'k FirmwareVerifyingKey) -> Self {
        self.verifying_key = Some(key);
        self
    }

    /// Set the AES-128 key that decrypts the payload
    #[must_use]
    pub fn symmetric_key(mut self, key: &'k SymmetricKey) -> Self {
        self.symmetric_key = Some(key);
        self
    }

    fn into_builder(self) -> Result<VerifyBuilder<'k>, FwSealError> {
        let mut builder = VerifyBuilder::new(std::fs::read(&self.input_path)?);
        builder.verifying_key = self.verifying_key;
        builder.symmetric_key = self.symmetric_key;
        Ok(builder)
    }

    /// Run every check and return the full report
    pub fn report(self) -> Result<VerificationReport, FwSealError> {
        self.into_builder()?.report()
    }

    /// Return the firmware if and only if the image is authentic
    pub fn to_bytes(self) -> Result<Vec<u8>, FwSealError> {
        self.into_builder()?.to_bytes()
    }

    /// Write the firmware to `path` if and only if the image is authentic
    pub fn to_file(self, path: impl AsRef<Path>) -> Result<(), FwSealError> {
        self.into_builder()?.to_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::SigningKey;
    use rand::rngs::OsRng;
    use tempfile::TempDir;

    fn signing_key() -> FirmwareSigningKey {
        FirmwareSigningKey::from(SigningKey::random(&mut OsRng))
    }

    #[test]
    fn test_package_and_verify_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let signing_key = signing_key();
        let verifying_key = signing_key.verifying_key();
        let symmetric_key = SymmetricKey::from([9u8; 16]);

        let image = FirmwareImage::package(b"Hello, bootloader!".to_vec())
            .signing_key(&signing_key)
            .symmetric_key(&symmetric_key)
            .to_bytes()?;

        let firmware = FirmwareImage::verify(image)
            .verifying_key(&verifying_key)
            .symmetric_key(&symmetric_key)
            .to_bytes()?;
        assert_eq!(firmware, b"Hello, bootloader!");
        Ok(())
    }

    #[test]
    fn test_missing_signing_key() {
        let symmetric_key = SymmetricKey::from([0u8; 16]);
        let result = FirmwareImage::package(vec![1, 2, 3])
            .symmetric_key(&symmetric_key)
            .to_bytes();

        match result {
            Err(FwSealError::MissingRequiredField { field }) => assert_eq!(field, "signing_key"),
            other => panic!("expected MissingRequiredField, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_verifying_key() {
        let symmetric_key = SymmetricKey::from([0u8; 16]);
        let result = FirmwareImage::verify(vec![0u8; 300])
            .symmetric_key(&symmetric_key)
            .report();
        assert!(matches!(
            result,
            Err(FwSealError::MissingRequiredField {
                field: "verifying_key"
            })
        ));
    }

    #[test]
    fn test_file_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let input = dir.path().join("app.bin");
        let image = dir.path().join("app_withMetadata.bin");
        let recovered = dir.path().join("recovered.bin");
        std::fs::write(&input, vec![0xEEu8; 100])?;

        let signing_key = signing_key();
        let verifying_key = signing_key.verifying_key();
        let symmetric_key = SymmetricKey::from([3u8; 16]);

        let summary = FirmwareImage::package_file(&input, &image)
            .signing_key(&signing_key)
            .symmetric_key(&symmetric_key)
            .build()?;
        assert_eq!(summary.raw_size, 100);
        assert_eq!(summary.enc_size, 112);
        assert_eq!(std::fs::metadata(&image)?.len(), 112 + 256);

        FirmwareImage::verify_file(&image)
            .verifying_key(&verifying_key)
            .symmetric_key(&symmetric_key)
            .to_file(&recovered)?;
        assert_eq!(std::fs::read(&recovered)?, vec![0xEEu8; 100]);
        Ok(())
    }

    #[test]
    fn test_package_file_missing_key_creates_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let input = dir.path().join("app.bin");
        let output = dir.path().join("out.bin");
        std::fs::write(&input, b"firmware")?;

        let signing_key = signing_key();
        let result = FirmwareImage::package_file(&input, &output)
            .signing_key(&signing_key)
            .build();

        assert!(matches!(
            result,
            Err(FwSealError::MissingRequiredField {
                field: "symmetric_key"
            })
        ));
        assert!(!output.exists());
        Ok(())
    }

    #[test]
    fn test_unauthentic_image_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let recovered = dir.path().join("recovered.bin");

        let other = signing_key().verifying_key();
        let signing_key = signing_key();
        let symmetric_key = SymmetricKey::from([3u8; 16]);

        let image = FirmwareImage::package(b"firmware".to_vec())
            .signing_key(&signing_key)
            .symmetric_key(&symmetric_key)
            .to_bytes()?;

        let result = FirmwareImage::verify(image)
            .verifying_key(&other)
            .symmetric_key(&symmetric_key)
            .to_file(&recovered);
        assert!(matches!(result, Err(FwSealError::SignatureInvalid)));
        assert!(!recovered.exists());
        Ok(())
    }
}
