//! Per-user exchange credentials, stored encrypted at rest.
//!
//! Blob layout is `base64(iv[12] || tag[16] || ciphertext)` under AES-256-GCM.
//! The master key comes from `CREDENTIALS_MASTER_KEY`, given either as 64 hex
//! characters or as base64 of exactly 32 bytes.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("master key must be 32 bytes (64 hex chars or base64)")]
    InvalidMasterKey,

    #[error("invalid base64 credential blob: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("credential blob too short: {0} bytes")]
    Truncated(usize),

    #[error("credential blob failed authentication")]
    Decrypt,

    #[error("credential encryption failed")]
    Encrypt,

    #[error("credential payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// 256-bit master key for credential encryption.
#[derive(Clone)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let raw = raw.trim();

        let bytes = if raw.len() == 64 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode(raw).map_err(|_| CredentialError::InvalidMasterKey)?
        } else {
            BASE64
                .decode(raw)
                .map_err(|_| CredentialError::InvalidMasterKey)?
        };

        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CredentialError::InvalidMasterKey)?;
        Ok(Self(key))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Polymarket L2 API credentials for a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmCredentials {
    pub key: String,
    pub secret: String,
    pub passphrase: String,
    /// Only the live backend needs it, to sign orders.
    #[serde(default, alias = "privateKey", skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

/// Decrypt a stored blob and decode the JSON payload.
pub fn decrypt_json<T: DeserializeOwned>(key: &MasterKey, blob: &str) -> Result<T, CredentialError> {
    let raw = BASE64.decode(blob.trim())?;
    if raw.len() < IV_LEN + TAG_LEN {
        return Err(CredentialError::Truncated(raw.len()));
    }

    let (iv, rest) = raw.split_at(IV_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    // The AEAD API expects the tag appended to the ciphertext.
    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(iv), sealed.as_slice())
        .map_err(|_| CredentialError::Decrypt)?;

    Ok(serde_json::from_slice(&plaintext)?)
}

/// Encrypt a value into the stored blob format. Each call uses a fresh IV.
pub fn encrypt_json<T: Serialize>(key: &MasterKey, value: &T) -> Result<String, CredentialError> {
    let plaintext = serde_json::to_vec(value)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let sealed = key
        .cipher()
        .encrypt(&nonce, plaintext.as_slice())
        .map_err(|_| CredentialError::Encrypt)?;
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    let mut out = Vec::with_capacity(IV_LEN + TAG_LEN + ciphertext.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(tag);
    out.extend_from_slice(ciphertext);

    Ok(BASE64.encode(out))
}
