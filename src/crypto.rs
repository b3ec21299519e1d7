//! AES-128-CBC payload encryption with PKCS#7 padding
//!
//! Every call to [`encrypt`] draws a fresh IV from the OS random source.
//! Padding always adds between 1 and 16 bytes, so an aligned plaintext
//! gains a whole block of `0x10`.

use crate::metadata::IV_SIZE;
use crate::types::SymmetricKey;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, Iv as CipherIv, Key, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Initialization vector of one image
pub type Iv = [u8; IV_SIZE];

/// Decryption produced a buffer without valid PKCS#7 padding
///
/// Deliberately carries no detail about which check failed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Decryption failed: invalid padding or key")]
pub struct PaddingError;

/// Number of pad bytes added to a plaintext of `raw_len` bytes (1..=16)
pub fn pad_len(raw_len: usize) -> usize {
    BLOCK_SIZE - raw_len % BLOCK_SIZE
}

/// Length of the ciphertext produced for a plaintext of `raw_len` bytes
pub fn padded_len(raw_len: usize) -> usize {
    raw_len + pad_len(raw_len)
}

/// Generate a random IV for CBC mode
pub fn generate_iv() -> Iv {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypt `plaintext` under a freshly generated IV
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> (Iv, Vec<u8>) {
    let iv = generate_iv();
    let ciphertext = encrypt_with_iv(plaintext, key, &iv);
    (iv, ciphertext)
}

/// Encrypt `plaintext` under a caller-chosen IV
///
/// Reusing an IV across images leaks plaintext structure; outside of known
/// answer tests use [`encrypt`].
pub fn encrypt_with_iv(plaintext: &[u8], key: &SymmetricKey, iv: &Iv) -> Vec<u8> {
    Aes128CbcEnc::new(
        Key::<Aes128CbcEnc>::from_slice(key.as_slice()),
        CipherIv::<Aes128CbcEnc>::from_slice(iv),
    )
    .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt `ciphertext` and strip its padding
pub fn decrypt(ciphertext: &[u8], key: &SymmetricKey, iv: &Iv) -> Result<Vec<u8>, PaddingError> {
    Aes128CbcDec::new(
        Key::<Aes128CbcDec>::from_slice(key.as_slice()),
        CipherIv::<Aes128CbcDec>::from_slice(iv),
    )
    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
    .map_err(|_| PaddingError)
}
