// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: AGPL-3.0-or-later

//! AES-256-GCM unwrap for the optional encryption stage.
//!
//! Grounded on the teacher's `crypto.rs::CryptoEngine::decrypt`, but
//! generalized to the manifest's tag convention: the tag is either
//! supplied separately in the manifest (`encryption.tag`) or assumed to
//! be the trailing 16 bytes of the post-RS ciphertext, per the "open
//! question -- tag handling" resolution in the specification.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use thiserror::Error;

/// Length in bytes of an AES-GCM authentication tag.
pub const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum AeadError {
    #[error("encryption key must be exactly 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("unsupported cipher: {0}")]
    UnsupportedCipher(String),

    #[error("invalid nonce/IV: {0}")]
    InvalidIv(String),

    #[error("ciphertext shorter than the 16-byte GCM tag and no tag was supplied separately")]
    CiphertextTooShort,

    #[error("AEAD open failed: authentication tag did not verify")]
    DecryptionFailed,
}

/// Open an AES-256-GCM ciphertext with empty associated data.
///
/// `tag` is the authentication tag when the manifest supplies it
/// separately; when `None`, the trailing 16 bytes of `ciphertext` are
/// treated as the tag.
pub fn open(
    ciphertext: &[u8],
    key: &[u8],
    iv: &[u8],
    tag: Option<&[u8]>,
) -> Result<Vec<u8>, AeadError> {
    if key.len() != 32 {
        return Err(AeadError::InvalidKeyLength(key.len()));
    }
    if iv.is_empty() {
        return Err(AeadError::InvalidIv("IV must not be empty".to_string()));
    }

    let (body, full_tag): (&[u8], &[u8]) = match tag {
        Some(t) => (ciphertext, t),
        None => {
            if ciphertext.len() < TAG_LEN {
                return Err(AeadError::CiphertextTooShort);
            }
            ciphertext.split_at(ciphertext.len() - TAG_LEN)
        }
    };

    let mut sealed = Vec::with_capacity(body.len() + TAG_LEN);
    sealed.extend_from_slice(body);
    sealed.extend_from_slice(full_tag);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(iv);

    cipher
        .decrypt(nonce, sealed.as_slice())
        .map_err(|_| AeadError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::aead::OsRng;
    use aes_gcm::aead::rand_core::RngCore;
    use aes_gcm::{AeadCore, aead::Aead as _};

    fn seal(key: &[u8; 32], plaintext: &[u8]) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher.encrypt(&nonce, plaintext).unwrap();
        let (body, tag) = sealed.split_at(sealed.len() - TAG_LEN);
        (body.to_vec(), tag.to_vec(), nonce.to_vec())
    }

    fn random_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        key
    }

    #[test]
    fn open_with_separated_tag() {
        let key = random_key();
        let plaintext = b"break glass recovery payload";
        let (body, tag, iv) = seal(&key, plaintext);

        let out = open(&body, &key, &iv, Some(&tag)).unwrap();
        assert_eq!(out, plaintext);
    }

    #[test]
    fn open_with_trailing_tag() {
        let key = random_key();
        let plaintext = b"tag appended to ciphertext";
        let (body, tag, iv) = seal(&key, plaintext);
        let mut combined = body;
        combined.extend_from_slice(&tag);

        let out = open(&combined, &key, &iv, None).unwrap();
        assert_eq!(out, plaintext);
    }

    #[test]
    fn wrong_key_fails() {
        let key = random_key();
        let wrong_key = random_key();
        let (body, tag, iv) = seal(&key, b"secret");

        let result = open(&body, &wrong_key, &iv, Some(&tag));
        assert!(matches!(result, Err(AeadError::DecryptionFailed)));
    }

    #[test]
    fn short_ciphertext_without_tag_rejected() {
        let key = random_key();
        let result = open(&[1, 2, 3], &key, &[0u8; 12], None);
        assert!(matches!(result, Err(AeadError::CiphertextTooShort)));
    }
}
