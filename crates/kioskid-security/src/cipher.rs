// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session encryption: AES-256-GCM via `ring`.
//
// Wire format of a sealed capture:
//
//   base64( IV (12 bytes) || ciphertext || GCM tag (16 bytes) )
//
// A fresh random IV is drawn for every seal. The key lives in a `Zeroizing`
// buffer and is scrubbed when the cipher is dropped.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use kioskid_core::error::{KioskError, Result};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// GCM initialization vector length in bytes.
pub const IV_LEN: usize = NONCE_LEN;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// IV plus ciphertext, as produced by [`SessionCipher::seal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub iv: [u8; IV_LEN],
    /// Ciphertext with the GCM tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// `IV || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IV_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Split `IV || ciphertext`. Rejects buffers too short to hold an IV and a tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IV_LEN + TAG_LEN {
            return Err(KioskError::InvalidPayload(format!(
                "{} bytes is shorter than IV + tag ({})",
                bytes.len(),
                IV_LEN + TAG_LEN
            )));
        }
        let (iv, ciphertext) = bytes.split_at(IV_LEN);
        let mut iv_arr = [0u8; IV_LEN];
        iv_arr.copy_from_slice(iv);
        Ok(Self {
            iv: iv_arr,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Standard base64 of `IV || ciphertext`, ready for transport.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| KioskError::InvalidPayload(format!("invalid base64: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

/// A symmetric AES-256-GCM key bound to one scanner session.
pub struct SessionCipher {
    key: Zeroizing<[u8; KEY_LEN]>,
    rng: SystemRandom,
}

impl SessionCipher {
    /// Generate a fresh random 256-bit key from the OS CSPRNG.
    #[instrument]
    pub fn generate() -> Result<Self> {
        let rng = SystemRandom::new();
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        rng.fill(&mut key[..])
            .map_err(|e| KioskError::Encryption(format!("key generation failed: {e}")))?;
        debug!("session key generated");
        Ok(Self { key, rng })
    }

    /// Rebuild a cipher from raw key material (e.g. on the receiving side).
    pub fn from_key_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(bytes),
            rng: SystemRandom::new(),
        }
    }

    /// Raw key material, for wrapping by whoever transports the payload.
    pub fn key_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    fn aead_key(&self) -> Result<LessSafeKey> {
        UnboundKey::new(&AES_256_GCM, &self.key[..])
            .map(LessSafeKey::new)
            .map_err(|e| KioskError::Encryption(format!("key rejected: {e}")))
    }

    /// Encrypt `plaintext` under a freshly drawn IV.
    #[instrument(skip_all, fields(plaintext_len = plaintext.len()))]
    pub fn seal(&self, plaintext: &[u8]) -> Result<EncryptedPayload> {
        let key = self.aead_key()?;

        let mut iv = [0u8; IV_LEN];
        self.rng
            .fill(&mut iv)
            .map_err(|e| KioskError::Encryption(format!("IV generation failed: {e}")))?;

        let mut in_out = plaintext.to_vec();
        key.seal_in_place_append_tag(Nonce::assume_unique_for_key(iv), Aad::empty(), &mut in_out)
            .map_err(|e| KioskError::Encryption(e.to_string()))?;

        debug!(ciphertext_len = in_out.len(), "capture sealed");
        Ok(EncryptedPayload {
            iv,
            ciphertext: in_out,
        })
    }

    /// Decrypt and authenticate `payload`.
    #[instrument(skip_all, fields(ciphertext_len = payload.ciphertext.len()))]
    pub fn open(&self, payload: &EncryptedPayload) -> Result<Vec<u8>> {
        let key = self.aead_key()?;
        let mut in_out = payload.ciphertext.clone();
        let plaintext = key
            .open_in_place(
                Nonce::assume_unique_for_key(payload.iv),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|e| KioskError::Decryption(e.to_string()))?;
        Ok(plaintext.to_vec())
    }

    /// Decode a base64 payload and decrypt it.
    pub fn open_base64(&self, encoded: &str) -> Result<Vec<u8>> {
        self.open(&EncryptedPayload::from_base64(encoded)?)
    }
}

impl std::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCipher").finish_non_exhaustive()
    }
}
