//! Key material wrappers
//!
//! The symmetric key zeroizes on drop. The ECDSA keys wrap the `p256`
//! types and accept the encodings produced by common tooling (OpenSSL
//! traditional PEM, PKCS#8, SubjectPublicKeyInfo, raw SEC1).

use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey};
use p256::SecretKey;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-128 key length in bytes
pub const SYMMETRIC_KEY_SIZE: usize = 16;

/// Length of a raw P-256 private scalar
pub const EC_SCALAR_SIZE: usize = 32;

/// Key-related errors
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid {kind} length: expected {expected}, got {got}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid {kind} encoding: {reason}")]
    InvalidEncoding { kind: &'static str, reason: String },
}

/// AES-128 key (16 bytes) that zeroizes on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_SIZE]);

impl SymmetricKey {
    /// Create a symmetric key from a 16-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != SYMMETRIC_KEY_SIZE {
            return Err(KeyError::InvalidLength {
                kind: "symmetric key",
                expected: SYMMETRIC_KEY_SIZE,
                got: bytes.len(),
            });
        }
        let mut key = [0u8; SYMMETRIC_KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(SymmetricKey(key))
    }

    /// Get a reference to the key bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; SYMMETRIC_KEY_SIZE]> for SymmetricKey {
    fn from(bytes: [u8; SYMMETRIC_KEY_SIZE]) -> Self {
        SymmetricKey(bytes)
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// ECDSA P-256 key used by the packager to sign image digests
#[derive(Clone)]
pub struct FirmwareSigningKey(SigningKey);

impl FirmwareSigningKey {
    /// Parse a PEM private key
    ///
    /// Both `PRIVATE KEY` (PKCS#8) and `EC PRIVATE KEY` (SEC1, OpenSSL's
    /// traditional format) documents are accepted.
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        if let Ok(key) = SigningKey::from_pkcs8_pem(pem) {
            return Ok(Self(key));
        }
        SecretKey::from_sec1_pem(pem)
            .map(|secret| Self(SigningKey::from(secret)))
            .map_err(|e| KeyError::InvalidEncoding {
                kind: "signing key",
                reason: format!("not a P-256 PKCS#8 or SEC1 PEM document ({e})"),
            })
    }

    /// Parse a DER private key (PKCS#8 or SEC1)
    pub fn from_der(der: &[u8]) -> Result<Self, KeyError> {
        if let Ok(key) = SigningKey::from_pkcs8_der(der) {
            return Ok(Self(key));
        }
        SecretKey::from_sec1_der(der)
            .map(|secret| Self(SigningKey::from(secret)))
            .map_err(|e| KeyError::InvalidEncoding {
                kind: "signing key",
                reason: format!("not a P-256 PKCS#8 or SEC1 DER document ({e})"),
            })
    }

    /// Build from a raw 32-byte big-endian scalar
    pub fn from_scalar(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != EC_SCALAR_SIZE {
            return Err(KeyError::InvalidLength {
                kind: "signing key",
                expected: EC_SCALAR_SIZE,
                got: bytes.len(),
            });
        }
        SigningKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidEncoding {
                kind: "signing key",
                reason: "scalar is zero or not below the curve order".to_string(),
            })
    }

    /// Parse key file contents, detecting PEM, DER or a raw scalar
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        match pem_text(bytes) {
            Some(pem) => Self::from_pem(pem),
            None if bytes.len() == EC_SCALAR_SIZE => Self::from_scalar(bytes),
            None => Self::from_der(bytes),
        }
    }

    /// The matching verification key
    pub fn verifying_key(&self) -> FirmwareVerifyingKey {
        FirmwareVerifyingKey(self.0.verifying_key().clone())
    }

    pub(crate) fn inner(&self) -> &SigningKey {
        &self.0
    }
}

impl From<SigningKey> for FirmwareSigningKey {
    fn from(key: SigningKey) -> Self {
        Self(key)
    }
}

impl fmt::Debug for FirmwareSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FirmwareSigningKey(..)")
    }
}

/// ECDSA P-256 public key used by the verifier
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirmwareVerifyingKey(VerifyingKey);

impl FirmwareVerifyingKey {
    /// Parse a `PUBLIC KEY` (SubjectPublicKeyInfo) PEM document
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        VerifyingKey::from_public_key_pem(pem)
            .map(Self)
            .map_err(|e| KeyError::InvalidEncoding {
                kind: "verifying key",
                reason: format!("not a P-256 SubjectPublicKeyInfo PEM document ({e})"),
            })
    }

    /// Parse a SubjectPublicKeyInfo DER document
    pub fn from_der(der: &[u8]) -> Result<Self, KeyError> {
        VerifyingKey::from_public_key_der(der)
            .map(Self)
            .map_err(|e| KeyError::InvalidEncoding {
                kind: "verifying key",
                reason: format!("not a P-256 SubjectPublicKeyInfo DER document ({e})"),
            })
    }

    /// Parse a SEC1 encoded point (33-byte compressed or 65-byte uncompressed)
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidEncoding {
                kind: "verifying key",
                reason: format!("{} bytes are not a valid SEC1 P-256 point", bytes.len()),
            })
    }

    /// Parse key file contents, detecting PEM, a SEC1 point or DER
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        match pem_text(bytes) {
            Some(pem) => Self::from_pem(pem),
            None if matches!(bytes.first(), Some(0x02..=0x04)) => Self::from_sec1_bytes(bytes),
            None => Self::from_der(bytes),
        }
    }

    /// Uncompressed SEC1 encoding of the point
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(false).as_bytes().to_vec()
    }

    pub(crate) fn inner(&self) -> &VerifyingKey {
        &self.0
    }
}

impl From<VerifyingKey> for FirmwareVerifyingKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key)
    }
}

fn pem_text(bytes: &[u8]) -> Option<&str> {
    std::str::from_utf8(bytes)
        .ok()
        .filter(|text| text.trim_start().starts_with("-----BEGIN"))
}
