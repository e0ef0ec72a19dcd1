//! Reversible encryption for stored credentials.
//!
//! Values are sealed with AES-256-GCM under a key derived (SHA-256) from a
//! secret pair kept in the [`ConfigStore`]. The pair is generated when the
//! first credential is saved and persisted, so anything encrypted earlier
//! stays decryptable. Sending only ever reads it.
//! Ciphertext is stored as `base64(nonce || ciphertext || tag)`.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config_store::ConfigStore;
use crate::error::MailError;

const NONCE_LEN: usize = 12;

/// The two persisted secrets the encryption key is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPair {
    pub key: String,
    pub iv: String,
}

impl SecretPair {
    /// Generate a fresh pair of 32-character random secrets.
    pub fn generate() -> Self {
        Self {
            key: uuid::Uuid::new_v4().simple().to_string(),
            iv: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    /// Both secrets are present.
    pub fn is_complete(&self) -> bool {
        !self.key.is_empty() && !self.iv.is_empty()
    }
}

/// Encrypts and decrypts credential strings.
pub struct Crypto {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for Crypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crypto").finish_non_exhaustive()
    }
}

impl Crypto {
    /// Build from an explicit secret pair.
    pub fn new(pair: &SecretPair) -> Result<Self, MailError> {
        let mut hasher = Sha256::new();
        hasher.update(pair.key.as_bytes());
        hasher.update(pair.iv.as_bytes());
        let key = hasher.finalize();

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| MailError::Crypto(format!("invalid AES key: {e}")))?;
        Ok(Self { cipher })
    }

    /// Build from the secret pair already in the store.
    ///
    /// Fails when no pair has been generated yet. Nothing is written.
    pub fn from_store(store: &dyn ConfigStore) -> Result<Self, MailError> {
        match store.secret_pair()? {
            Some(pair) if pair.is_complete() => Self::new(&pair),
            _ => Err(MailError::Crypto(
                "no credential secret pair has been generated".into(),
            )),
        }
    }

    /// Build from the store's secret pair, generating and saving one first
    /// if needed.
    pub fn initialize(store: &dyn ConfigStore) -> Result<Self, MailError> {
        Self::new(&store.secret_pair_or_init()?)
    }

    /// Encrypt `plaintext`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, MailError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| MailError::Crypto(format!("encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(B64.encode(sealed))
    }

    /// Decrypt a value produced by [`Crypto::encrypt`].
    pub fn decrypt(&self, encoded: &str) -> Result<String, MailError> {
        let sealed = B64
            .decode(encoded.trim())
            .map_err(|e| MailError::Crypto(format!("invalid base64: {e}")))?;
        if sealed.len() <= NONCE_LEN {
            return Err(MailError::Crypto("ciphertext too short".into()));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| MailError::Crypto("decryption failed (wrong key or corrupted data)".into()))?;

        String::from_utf8(plaintext)
            .map_err(|e| MailError::Crypto(format!("decrypted value is not UTF-8: {e}")))
    }
}
