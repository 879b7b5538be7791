// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Field Cipher
//!
//! AES-GCM authenticated encryption for the private section of an envelope.
//!
//! ## Wire Format
//!
//! ```text
//! nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! A fresh random nonce is drawn from the OS RNG for every call to
//! [`encrypt`]. The AES variant is selected by key length: 16, 24 and 32 byte
//! keys map to AES-128, AES-192 and AES-256 respectively.

use std::fmt;

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::generic_array::typenum::Unsigned;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};

/// AES-192 in GCM mode with the standard 96-bit nonce.
type Aes192Gcm = AesGcm<Aes192, U12>;

/// Nonce length prepended to every ciphertext.
pub const NONCE_LEN: usize = 12;

/// Key lengths (in bytes) accepted by [`encrypt`] and [`decrypt`].
pub const ACCEPTED_KEY_LENGTHS: [usize; 3] = [16, 24, 32];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    #[error("invalid key length: {0} bytes (expected 16, 24 or 32)")]
    InvalidKeyLength(usize),

    #[error("authentication failure: ciphertext truncated, tampered with, or wrong key")]
    AuthenticationFailure,

    #[error("plaintext too long to encrypt")]
    PlaintextTooLong,
}

/// A symmetric key whose length has been checked against
/// [`ACCEPTED_KEY_LENGTHS`].
///
/// Built once from configuration; the raw bytes never appear in `Debug`
/// output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherKey(Vec<u8>);

impl CipherKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, CipherError> {
        let bytes = bytes.into();
        if ACCEPTED_KEY_LENGTHS.contains(&bytes.len()) {
            Ok(Self(bytes))
        } else {
            Err(CipherError::InvalidKeyLength(bytes.len()))
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CipherKey(<{} bytes redacted>)", self.0.len())
    }
}

/// Encrypt `plaintext` under `key`, returning `nonce || ciphertext || tag`.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
    match key.len() {
        16 => seal::<Aes128Gcm>(key, plaintext),
        24 => seal::<Aes192Gcm>(key, plaintext),
        32 => seal::<Aes256Gcm>(key, plaintext),
        other => Err(CipherError::InvalidKeyLength(other)),
    }
}

/// Decrypt the output of [`encrypt`].
///
/// Fails closed: no plaintext is returned unless the tag verifies.
pub fn decrypt(sealed: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
    match key.len() {
        16 => open::<Aes128Gcm>(key, sealed),
        24 => open::<Aes192Gcm>(key, sealed),
        32 => open::<Aes256Gcm>(key, sealed),
        other => Err(CipherError::InvalidKeyLength(other)),
    }
}

fn seal<C: Aead + KeyInit>(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = C::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength(key.len()))?;
    let nonce = C::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CipherError::PlaintextTooLong)?;

    let mut sealed = Vec::with_capacity(nonce.len() + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

fn open<C: Aead + KeyInit>(key: &[u8], sealed: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = C::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength(key.len()))?;

    let nonce_len = <C as AeadCore>::NonceSize::USIZE;
    if sealed.len() < nonce_len {
        return Err(CipherError::AuthenticationFailure);
    }

    let (nonce, ciphertext) = sealed.split_at(nonce_len);
    cipher
        .decrypt(aes_gcm::aead::Nonce::<C>::from_slice(nonce), ciphertext)
        .map_err(|_| CipherError::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_128: &[u8] = b"0123456789abcdef";
    const KEY_192: &[u8] = b"0123456789abcdef01234567";
    const KEY_256: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn roundtrip_for_every_accepted_key_length() {
        let message = br#"{"secretMessage":"note","videoUrl":"u"}"#;
        for key in [KEY_128, KEY_192, KEY_256] {
            let sealed = encrypt(message, key).unwrap();
            assert_eq!(decrypt(&sealed, key).unwrap(), message);
        }
    }

    #[test]
    fn roundtrip_empty_plaintext() {
        let sealed = encrypt(b"", KEY_256).unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + 16);
        assert!(decrypt(&sealed, KEY_256).unwrap().is_empty());
    }

    #[test]
    fn fresh_nonce_per_encryption() {
        let a = encrypt(b"same", KEY_256).unwrap();
        let b = encrypt(b"same", KEY_256).unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn flipped_bytes_fail_authentication() {
        let sealed = encrypt(b"video position 42 of 100", KEY_256).unwrap();

        // Nonce, body and tag positions.
        let positions = [0, NONCE_LEN - 1, NONCE_LEN, NONCE_LEN + 5, sealed.len() - 1];
        for pos in positions {
            let mut tampered = sealed.clone();
            tampered[pos] ^= 0x01;
            assert_eq!(
                decrypt(&tampered, KEY_256),
                Err(CipherError::AuthenticationFailure),
                "flip at byte {pos} was not detected"
            );
        }
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let sealed = encrypt(b"secret", KEY_256).unwrap();
        let other = b"fedcba9876543210fedcba9876543210";
        assert_eq!(
            decrypt(&sealed, other),
            Err(CipherError::AuthenticationFailure)
        );
    }

    #[test]
    fn truncated_input_fails_authentication() {
        assert_eq!(
            decrypt(&[0u8; NONCE_LEN - 1], KEY_128),
            Err(CipherError::AuthenticationFailure)
        );
        assert_eq!(decrypt(&[], KEY_128), Err(CipherError::AuthenticationFailure));
        // Nonce present but no tag.
        assert_eq!(
            decrypt(&[0u8; NONCE_LEN], KEY_128),
            Err(CipherError::AuthenticationFailure)
        );
    }

    #[test]
    fn rejects_unsupported_key_lengths() {
        for len in [0, 1, 15, 17, 23, 25, 31, 33, 64] {
            let key = vec![7u8; len];
            assert_eq!(encrypt(b"x", &key), Err(CipherError::InvalidKeyLength(len)));
            assert_eq!(
                decrypt(&[0u8; 40], &key),
                Err(CipherError::InvalidKeyLength(len))
            );
            assert!(CipherKey::new(key).is_err());
        }
    }

    #[test]
    fn cipher_key_debug_is_redacted() {
        let key = CipherKey::new(KEY_256.to_vec()).unwrap();
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("0123"));
        assert!(rendered.contains("32 bytes"));
    }
}
