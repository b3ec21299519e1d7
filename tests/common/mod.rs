//! Common test utilities for fwseal integration tests
//!
//! This module provides shared helper functions to reduce code duplication
//! across integration test files.

#![allow(dead_code, unused_imports)]

use p256::ecdsa::SigningKey;
use p256::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rand::rngs::OsRng;

// Re-export commonly used types
pub use fwseal::{
    FirmwareImage, FirmwareSigningKey, FirmwareVerifyingKey, FwSealError, Packager, SealedImage,
    SymmetricKey, VerificationReport, Verifier,
};

/// Size of the trailing metadata block
pub const METADATA_SIZE: usize = 256;

/// Byte offsets of metadata fields, relative to the start of the block
pub const DIGEST_OFFSET: usize = 28;
pub const SIGNATURE_OFFSET: usize = 60;

/// Test firmware used across tests
pub const TEST_FIRMWARE: &[u8] = b"\x7fELF fwseal test firmware: reset vector, vector table, .text";

/// Keys for one packaging/verification session
pub struct TestKeys {
    pub signing: FirmwareSigningKey,
    pub verifying: FirmwareVerifyingKey,
    pub symmetric: SymmetricKey,
    raw_signing: SigningKey,
}

impl TestKeys {
    /// Fresh P-256 keypair and a patterned symmetric key
    pub fn generate() -> Self {
        let raw_signing = SigningKey::random(&mut OsRng);
        let signing = FirmwareSigningKey::from(raw_signing.clone());
        let verifying = signing.verifying_key();
        let mut symmetric = [0u8; 16];
        for (i, byte) in symmetric.iter_mut().enumerate() {
            *byte = i as u8 * 17;
        }
        Self {
            signing,
            verifying,
            symmetric: SymmetricKey::from(symmetric),
            raw_signing,
        }
    }

    /// PKCS#8 PEM encoding of the private key
    pub fn signing_key_pem(&self) -> String {
        self.raw_signing
            .to_pkcs8_pem(LineEnding::LF)
            .expect("encode private key")
            .to_string()
    }

    /// SubjectPublicKeyInfo PEM encoding of the public key
    pub fn verifying_key_pem(&self) -> String {
        self.raw_signing
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .expect("encode public key")
    }

    pub fn packager(&self) -> Packager<'_> {
        Packager::new(&self.signing, &self.symmetric)
    }

    pub fn verifier(&self) -> Verifier<'_> {
        Verifier::new(&self.verifying, &self.symmetric)
    }

    /// Package `firmware` and return the image bytes
    pub fn seal(&self, firmware: &[u8]) -> Vec<u8> {
        self.packager()
            .package(firmware.to_vec())
            .expect("packaging")
            .to_bytes()
    }

    /// Verify image bytes, panicking on a format error
    pub fn check(&self, image: &[u8]) -> VerificationReport {
        self.verifier().verify(image).expect("image parses")
    }
}

/// Offset of the metadata block within an image
pub fn metadata_start(image: &[u8]) -> usize {
    image.len() - METADATA_SIZE
}
