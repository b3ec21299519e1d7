//! Verification pipeline
//!
//! `parse -> decrypt -> rehash -> check signature -> report`. Only a
//! malformed image is an error; every authenticity outcome ends up in the
//! [`VerificationReport`].

use crate::crypto::{self, PaddingError};
use crate::error::FwSealError;
use crate::image::{write_atomic, SealedImage};
use crate::metadata::ImageMetadata;
use crate::signature::{self, Digest};
use crate::types::{FirmwareVerifyingKey, SymmetricKey};
use serde::{Serialize, Serializer};
use std::fmt;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of checking one image
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    /// Payload decrypted to validly padded plaintext
    pub decrypted: bool,
    /// Recomputed digest equals the stored one
    pub hash_match: bool,
    /// Stored signature verifies over the recomputed digest
    pub signature_valid: bool,
    #[serde(serialize_with = "serialize_optional_hex")]
    pub computed_hash: Option<Digest>,
    #[serde(skip)]
    recovered_plaintext: Option<Vec<u8>>,
    pub metadata: ImageMetadata,
}

impl VerificationReport {
    /// Decrypted, digest matches and signature is valid
    pub fn is_authentic(&self) -> bool {
        self.decrypted && self.hash_match && self.signature_valid
    }

    /// The recovered firmware, if decryption succeeded
    ///
    /// Present even when the image is not authentic; check
    /// [`is_authentic`](Self::is_authentic) before trusting it.
    pub fn recovered_plaintext(&self) -> Option<&[u8]> {
        self.recovered_plaintext.as_deref()
    }

    /// The firmware if every check passed, otherwise the first failed check
    pub fn authentic_firmware(&self) -> Result<&[u8], FwSealError> {
        let plaintext = match &self.recovered_plaintext {
            Some(plaintext) if self.decrypted => plaintext.as_slice(),
            _ => return Err(PaddingError.into()),
        };

        if !self.hash_match {
            return Err(FwSealError::IntegrityMismatch {
                expected: hex::encode(self.metadata.digest),
                actual: self.computed_hash.map(hex::encode).unwrap_or_default(),
            });
        }
        if !self.signature_valid {
            return Err(FwSealError::SignatureInvalid);
        }

        Ok(plaintext)
    }

    /// Collapse the report into the firmware or the first failed check
    pub fn into_result(self) -> Result<Vec<u8>, FwSealError> {
        self.authentic_firmware().map(<[u8]>::to_vec)
    }

    /// Atomically write the firmware to `path`, only for an authentic image
    pub fn write_firmware(&self, path: impl AsRef<Path>) -> Result<u64, FwSealError> {
        let firmware = self.authentic_firmware()?;
        write_atomic(path.as_ref(), |file| file.write_all(firmware))?;
        info!(path = %path.as_ref().display(), bytes = firmware.len(), "firmware written");
        Ok(firmware.len() as u64)
    }

    /// Serialize the report as JSON; the recovered firmware is omitted
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn serialize_optional_hex<S: Serializer>(
    value: &Option<Digest>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(digest) => serializer.serialize_some(&hex::encode(digest)),
        None => serializer.serialize_none(),
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "OK"
    } else {
        "FAILED"
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Extracted Metadata:")?;
        writeln!(f, "{}", self.metadata)?;

        if !self.decrypted {
            return write!(f, "Decryption        : FAILED (invalid padding or key)");
        }
        writeln!(f, "Decryption        : OK")?;

        let computed = self.computed_hash.map(hex::encode).unwrap_or_default();
        writeln!(f, "Computed SHA-256  : {computed}")?;
        writeln!(f, "Hash check        : {}", status(self.hash_match))?;
        write!(f, "Signature check   : {}", status(self.signature_valid))
    }
}

/// Checks sealed images against a verifying key and symmetric key
pub struct Verifier<'k> {
    verifying_key: &'k FirmwareVerifyingKey,
    symmetric_key: &'k SymmetricKey,
}

impl<'k> Verifier<'k> {
    pub fn new(verifying_key: &'k FirmwareVerifyingKey, symmetric_key: &'k SymmetricKey) -> Self {
        Self {
            verifying_key,
            symmetric_key,
        }
    }

    /// Parse and check raw image bytes
    ///
    /// Returns `Err` only when the image cannot be parsed.
    pub fn verify(&self, image: &[u8]) -> Result<VerificationReport, FwSealError> {
        let image = SealedImage::parse(image)?;
        debug!(enc_size = image.metadata().enc_size, "image parsed");
        Ok(self.verify_image(&image))
    }

    /// Check an already parsed image
    pub fn verify_image(&self, image: &SealedImage) -> VerificationReport {
        let metadata = image.metadata().clone();

        let plaintext = match crypto::decrypt(image.payload(), self.symmetric_key, &metadata.iv) {
            Ok(plaintext) => plaintext,
            Err(PaddingError) => {
                warn!("payload decryption failed");
                return VerificationReport {
                    decrypted: false,
                    hash_match: false,
                    signature_valid: false,
                    computed_hash: None,
                    recovered_plaintext: None,
                    metadata,
                };
            }
        };
        debug!(recovered = plaintext.len(), "payload decrypted");

        if plaintext.len() != metadata.raw_size as usize {
            warn!(
                recovered = plaintext.len(),
                declared = metadata.raw_size,
                "recovered length differs from raw_size"
            );
        }

        let computed = signature::digest(&plaintext);
        let hash_match = computed == metadata.digest;
        if !hash_match {
            warn!(
                stored = %hex::encode(metadata.digest),
                computed = %hex::encode(computed),
                "digest mismatch"
            );
        }

        let signature_valid = signature::verify(&computed, &metadata.signature, self.verifying_key);
        if !signature_valid {
            warn!("signature verification failed");
        }

        let report = VerificationReport {
            decrypted: true,
            hash_match,
            signature_valid,
            computed_hash: Some(computed),
            recovered_plaintext: Some(plaintext),
            metadata,
        };
        if report.is_authentic() {
            info!(raw_size = report.metadata.raw_size, "image verified");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Packager;
    use crate::types::FirmwareSigningKey;
    use p256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    struct Keys {
        signing: FirmwareSigningKey,
        verifying: FirmwareVerifyingKey,
        symmetric: SymmetricKey,
    }

    fn keys() -> Keys {
        let signing = FirmwareSigningKey::from(SigningKey::random(&mut OsRng));
        let verifying = signing.verifying_key();
        Keys {
            signing,
            verifying,
            symmetric: SymmetricKey::from([0x24; 16]),
        }
    }

    fn seal(keys: &Keys, firmware: &[u8]) -> Vec<u8> {
        Packager::new(&keys.signing, &keys.symmetric)
            .package(firmware.to_vec())
            .unwrap()
            .to_bytes()
    }

    #[test]
    fn test_authentic_image() {
        let keys = keys();
        let firmware = b"bootloader payload".to_vec();
        let image = seal(&keys, &firmware);

        let report = Verifier::new(&keys.verifying, &keys.symmetric)
            .verify(&image)
            .unwrap();
        assert!(report.is_authentic());
        assert_eq!(report.recovered_plaintext(), Some(firmware.as_slice()));
        assert_eq!(report.computed_hash, Some(signature::digest(&firmware)));
        assert_eq!(report.into_result().unwrap(), firmware);
    }

    #[test]
    fn test_wrong_symmetric_key_is_reported() {
        let keys = keys();
        let image = seal(&keys, &[0u8; 40]);
        let other = SymmetricKey::from([0x25; 16]);

        let report = Verifier::new(&keys.verifying, &other).verify(&image).unwrap();
        assert!(!report.is_authentic());
        // A wrong key almost always breaks the padding; if it happens not
        // to, the digest check catches it.
        if report.decrypted {
            assert!(!report.hash_match);
        } else {
            assert!(report.computed_hash.is_none());
            assert!(matches!(report.into_result(), Err(FwSealError::Padding(_))));
        }
    }

    #[test]
    fn test_wrong_verifying_key_is_reported() {
        let keys = keys();
        let image = seal(&keys, b"firmware");
        let other = FirmwareSigningKey::from(SigningKey::random(&mut OsRng)).verifying_key();

        let report = Verifier::new(&other, &keys.symmetric).verify(&image).unwrap();
        assert!(report.decrypted);
        assert!(report.hash_match);
        assert!(!report.signature_valid);
        assert!(matches!(
            report.into_result(),
            Err(FwSealError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_tampered_digest() {
        let keys = keys();
        let mut image = seal(&keys, b"firmware");
        let digest_at = image.len() - 256 + 28;
        image[digest_at] ^= 0x01;

        let report = Verifier::new(&keys.verifying, &keys.symmetric)
            .verify(&image)
            .unwrap();
        assert!(report.decrypted);
        assert!(!report.hash_match);
        // The signature is checked over the recomputed digest, so it still holds
        assert!(report.signature_valid);
        assert!(matches!(
            report.into_result(),
            Err(FwSealError::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_image_is_fatal() {
        let keys = keys();
        let result = Verifier::new(&keys.verifying, &keys.symmetric).verify(&[0u8; 255]);
        assert!(matches!(result, Err(FwSealError::Format(_))));
    }

    #[test]
    fn test_report_json_and_display() {
        let keys = keys();
        let image = seal(&keys, b"firmware");
        let report = Verifier::new(&keys.verifying, &keys.symmetric)
            .verify(&image)
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["decrypted"], true);
        assert_eq!(value["metadata"]["raw_size"], 8);
        assert_eq!(value["computed_hash"].as_str().map(str::len), Some(64));
        assert!(value.get("recovered_plaintext").is_none());

        let text = report.to_string();
        assert!(text.contains("Hash check        : OK"));
        assert!(text.contains("Signature check   : OK"));
    }
}
