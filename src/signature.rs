//! Digest and signature engine
//!
//! The firmware is hashed once with SHA-256 and the resulting digest is
//! signed as a pre-hashed message. The signature primitive must not hash
//! it again, otherwise a bootloader checking `ECDSA(digest)` rejects it.

use crate::error::FwSealError;
use crate::metadata::{DIGEST_SIZE, SIGNATURE_SIZE};
use crate::types::{FirmwareSigningKey, FirmwareVerifyingKey};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::Signature;
use sha2::{Digest as _, Sha256};

/// SHA-256 digest of a firmware image
pub type Digest = [u8; DIGEST_SIZE];

/// Fixed-width `r || s` signature, each half a 32-byte big-endian integer
pub type RawSignature = [u8; SIGNATURE_SIZE];

/// Compute the SHA-256 digest of `data`
pub fn digest(data: &[u8]) -> Digest {
    Sha256::digest(data).into()
}

/// Sign a pre-computed digest
pub fn sign(digest: &Digest, key: &FirmwareSigningKey) -> Result<RawSignature, FwSealError> {
    let signature: Signature =
        key.inner()
            .sign_prehash(digest)
            .map_err(|e| FwSealError::Crypto {
                operation: "ECDSA P-256 signing",
                reason: e.to_string(),
            })?;

    let mut raw = [0u8; SIGNATURE_SIZE];
    raw.copy_from_slice(&signature.to_bytes());
    Ok(raw)
}

/// Check a fixed-width signature over a digest
///
/// Returns `false` for a mismatched signature and for one whose `r` or `s`
/// is out of range; neither is an error.
pub fn verify(digest: &Digest, signature: &RawSignature, key: &FirmwareVerifyingKey) -> bool {
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.inner().verify_prehash(digest, &signature).is_ok()
}
