//! Packaging pipeline
//!
//! Packaging runs `Loaded -> Hashed -> Signed -> Encrypted -> SealedImage`.
//! Each stage is its own type and is consumed by the transition to the next,
//! so the digest is always taken (and signed) over the plaintext before the
//! payload is encrypted.

use crate::crypto::{self, Iv};
use crate::error::FwSealError;
use crate::image::{FormatError, SealedImage};
use crate::metadata::{ImageMetadata, METADATA_SIZE, VALID_METADATA_SIZE};
use crate::signature::{self, Digest, RawSignature};
use crate::types::{FirmwareSigningKey, SymmetricKey};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Firmware read into memory, nothing computed yet
pub(crate) struct Loaded {
    firmware: Vec<u8>,
}

/// Plaintext digest computed
pub(crate) struct Hashed {
    firmware: Vec<u8>,
    digest: Digest,
}

/// Digest signed
pub(crate) struct Signed {
    firmware: Vec<u8>,
    digest: Digest,
    signature: RawSignature,
}

/// Payload encrypted; the plaintext is no longer held
pub(crate) struct Encrypted {
    raw_size: usize,
    digest: Digest,
    signature: RawSignature,
    iv: Iv,
    payload: Vec<u8>,
}

impl Loaded {
    pub(crate) fn new(firmware: Vec<u8>) -> Self {
        debug!(raw_size = firmware.len(), "firmware loaded");
        Self { firmware }
    }

    pub(crate) fn hash(self) -> Hashed {
        let digest = signature::digest(&self.firmware);
        debug!(digest = %hex::encode(digest), "firmware hashed");
        Hashed {
            firmware: self.firmware,
            digest,
        }
    }
}

impl Hashed {
    pub(crate) fn sign(self, key: &FirmwareSigningKey) -> Result<Signed, FwSealError> {
        let signature = signature::sign(&self.digest, key)?;
        debug!("digest signed");
        Ok(Signed {
            firmware: self.firmware,
            digest: self.digest,
            signature,
        })
    }
}

impl Signed {
    pub(crate) fn encrypt(self, key: &SymmetricKey) -> Encrypted {
        let (iv, payload) = crypto::encrypt(&self.firmware, key);
        debug!(enc_size = payload.len(), "payload encrypted");
        Encrypted {
            raw_size: self.firmware.len(),
            digest: self.digest,
            signature: self.signature,
            iv,
            payload,
        }
    }
}

impl Encrypted {
    pub(crate) fn serialize(self) -> Result<SealedImage, FwSealError> {
        let enc_size = u32::try_from(self.payload.len()).map_err(|_| FormatError::TooLarge {
            len: self.raw_size,
        })?;
        // raw_size < enc_size always holds, so this cannot fail once enc_size fits
        let raw_size = u32::try_from(self.raw_size).map_err(|_| FormatError::TooLarge {
            len: self.raw_size,
        })?;

        let metadata = ImageMetadata::new(
            enc_size,
            raw_size,
            &self.iv,
            &self.digest,
            &self.signature,
        )
        .map_err(FormatError::from)?;

        debug!("metadata serialized");
        Ok(SealedImage::new(self.payload, metadata))
    }
}

/// What the packager produced, for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    pub raw_size: u32,
    pub enc_size: u32,
    pub pad_size: u32,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub iv: Iv,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub digest: Digest,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub signature: RawSignature,
}

impl PackageSummary {
    /// Serialize the summary as JSON, byte fields hex-encoded
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl From<&ImageMetadata> for PackageSummary {
    fn from(metadata: &ImageMetadata) -> Self {
        Self {
            raw_size: metadata.raw_size,
            enc_size: metadata.enc_size,
            pad_size: metadata.pad_size,
            iv: metadata.iv,
            digest: metadata.digest,
            signature: metadata.signature,
        }
    }
}

impl fmt::Display for PackageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Firmware Encryption Summary:")?;
        writeln!(f, "  Raw firmware size       : {} bytes", self.raw_size)?;
        writeln!(f, "  Encrypted firmware size : {} bytes", self.enc_size)?;
        writeln!(f, "  Padding added           : {} bytes", self.pad_size)?;
        writeln!(f, "  AES IV                  : {}", hex::encode(self.iv))?;
        writeln!(f, "  SHA-256                 : {}", hex::encode(self.digest))?;
        writeln!(f, "  ECDSA signature         : {}", hex::encode(self.signature))?;
        writeln!(f, "  Reserved                : 16 bytes")?;
        write!(
            f,
            "  Metadata filler         : {} bytes",
            METADATA_SIZE - VALID_METADATA_SIZE
        )
    }
}

/// Turns raw firmware into a sealed image
///
/// # Examples
///
/// ```no_run
/// use fwseal::{FirmwareSigningKey, Packager, SymmetricKey};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let signing_key = FirmwareSigningKey::from_pem(&std::fs::read_to_string("private_key.pem")?)?;
/// let symmetric_key = SymmetricKey::from_slice(&std::fs::read("aes_key.bin")?)?;
///
/// let image = Packager::new(&signing_key, &symmetric_key).package(std::fs::read("app.bin")?)?;
/// image.write_atomic("app_withMetadata.bin")?;
/// # Ok(())
/// # }
/// ```
pub struct Packager<'k> {
    signing_key: &'k FirmwareSigningKey,
    symmetric_key: &'k SymmetricKey,
}

impl<'k> Packager<'k> {
    pub fn new(signing_key: &'k FirmwareSigningKey, symmetric_key: &'k SymmetricKey) -> Self {
        Self {
            signing_key,
            symmetric_key,
        }
    }

    /// Hash, sign, encrypt and serialize `firmware`
    pub fn package(&self, firmware: impl Into<Vec<u8>>) -> Result<SealedImage, FwSealError> {
        let image = Loaded::new(firmware.into())
            .hash()
            .sign(self.signing_key)?
            .encrypt(self.symmetric_key)
            .serialize()?;

        info!(
            raw_size = image.metadata().raw_size,
            enc_size = image.metadata().enc_size,
            "firmware image sealed"
        );
        Ok(image)
    }

    /// Package `firmware` and write the image to `output`
    ///
    /// Nothing is created at `output` unless every stage succeeds.
    pub fn package_to_file(
        &self,
        firmware: impl Into<Vec<u8>>,
        output: impl AsRef<Path>,
    ) -> Result<PackageSummary, FwSealError> {
        let image = self.package(firmware)?;
        let written = image.write_atomic(output.as_ref())?;
        info!(path = %output.as_ref().display(), bytes = written, "image written");
        Ok(PackageSummary::from(image.metadata()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    fn keys() -> (FirmwareSigningKey, SymmetricKey) {
        (
            FirmwareSigningKey::from(SigningKey::random(&mut OsRng)),
            SymmetricKey::from([0u8; 16]),
        )
    }

    #[test]
    fn test_stage_pipeline() -> Result<(), FwSealError> {
        let (signing_key, symmetric_key) = keys();
        let firmware: Vec<u8> = (0u8..10).collect();

        let hashed = Loaded::new(firmware.clone()).hash();
        assert_eq!(hashed.digest, signature::digest(&firmware));

        let signed = hashed.sign(&signing_key)?;
        assert!(signature::verify(
            &signed.digest,
            &signed.signature,
            &signing_key.verifying_key()
        ));

        let encrypted = signed.encrypt(&symmetric_key);
        assert_eq!(encrypted.raw_size, 10);
        assert_eq!(encrypted.payload.len(), 16);

        let image = encrypted.serialize()?;
        assert_eq!(image.metadata().pad_size, 6);
        Ok(())
    }

    #[test]
    fn test_package_sizes() -> Result<(), FwSealError> {
        let (signing_key, symmetric_key) = keys();
        let packager = Packager::new(&signing_key, &symmetric_key);

        for len in [0usize, 1, 15, 16, 17, 1000] {
            let image = packager.package(vec![0x5Au8; len])?;
            let metadata = image.metadata();
            assert_eq!(metadata.raw_size as usize, len);
            assert_eq!(metadata.enc_size as usize, image.payload().len());
            assert_eq!(metadata.enc_size % 16, 0);
            assert!((1..=16).contains(&metadata.pad_size));
            assert_eq!(metadata.pad_size, metadata.enc_size - metadata.raw_size);
        }
        Ok(())
    }

    #[test]
    fn test_repackaging_produces_new_iv() -> Result<(), FwSealError> {
        let (signing_key, symmetric_key) = keys();
        let packager = Packager::new(&signing_key, &symmetric_key);

        let first = packager.package(b"same firmware".to_vec())?;
        let second = packager.package(b"same firmware".to_vec())?;
        assert_ne!(first.metadata().iv, second.metadata().iv);
        assert_eq!(first.metadata().digest, second.metadata().digest);
        Ok(())
    }

    #[test]
    fn test_summary_json() -> Result<(), Box<dyn std::error::Error>> {
        let (signing_key, symmetric_key) = keys();
        let image = Packager::new(&signing_key, &symmetric_key).package(vec![1u8; 20])?;
        let summary = PackageSummary::from(image.metadata());

        let value: serde_json::Value = serde_json::from_str(&summary.to_json()?)?;
        assert_eq!(value["raw_size"], 20);
        assert_eq!(value["enc_size"], 32);
        assert_eq!(value["pad_size"], 12);
        assert_eq!(value["iv"].as_str().map(str::len), Some(32));
        assert_eq!(value["signature"].as_str().map(str::len), Some(128));
        assert_eq!(
            value["digest"].as_str(),
            Some(hex::encode(signature::digest(&[1u8; 20])).as_str())
        );
        Ok(())
    }

    #[test]
    fn test_summary_display() -> Result<(), FwSealError> {
        let (signing_key, symmetric_key) = keys();
        let image = Packager::new(&signing_key, &symmetric_key).package(vec![0u8; 4])?;
        let text = PackageSummary::from(image.metadata()).to_string();

        assert!(text.contains("Raw firmware size       : 4 bytes"));
        assert!(text.contains("Padding added           : 12 bytes"));
        assert!(text.contains("Metadata filler         : 116 bytes"));
        Ok(())
    }
}
