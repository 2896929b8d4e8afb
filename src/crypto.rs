// src/crypto.rs
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use base64::Engine;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Decryption error: {0}")]
    DecryptionError(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Key size error: {0}")]
    KeySizeError(String),

    #[error("Hashing error: {0}")]
    HashingError(String),

    #[error("UTF-8 encoding error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

const NONCE_LEN: usize = 12;

/// Derive a 32-byte AES key from a configured master secret and a usage
/// context. The context keeps keys for different fields distinct.
pub fn derive_field_key(master_secret: &str, context: &str) -> Result<Vec<u8>> {
    let salt_data = format!("RESETVAULT_{}", context);
    let salt_b64 = base64::engine::general_purpose::STANDARD_NO_PAD.encode(salt_data.as_bytes());
    let salt =
        SaltString::from_b64(&salt_b64).map_err(|e| CryptoError::HashingError(e.to_string()))?;

    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(master_secret.as_bytes(), &salt)
        .map_err(|e| CryptoError::HashingError(e.to_string()))?;

    let hash_bytes = password_hash
        .hash
        .ok_or_else(|| CryptoError::HashingError("empty hash output".into()))?
        .as_bytes()
        .to_vec();

    if hash_bytes.len() < 32 {
        return Err(CryptoError::KeySizeError("Derived key too short".to_string()));
    }

    Ok(hash_bytes[0..32].to_vec())
}

/// An encrypted-at-rest secret, stored as base64(nonce || ciphertext).
///
/// Used for the admin-issued temporary password on the user record: the
/// document store only ever sees the sealed form, and the cleartext is
/// recoverable solely through [`SecretField::reveal`] with the field key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretField(String);

impl SecretField {
    /// Encrypt `plaintext` under `key` (32 bytes) with AES-256-GCM and a
    /// random nonce.
    pub fn seal(key: &[u8], plaintext: &str) -> Result<Self> {
        if key.len() != 32 {
            return Err(CryptoError::KeySizeError(format!(
                "expected 32-byte key, got {}",
                key.len()
            )));
        }

        let aes_key = Key::<Aes256Gcm>::from_slice(key);
        let cipher = Aes256Gcm::new(aes_key);

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);

        Ok(Self(base64::engine::general_purpose::STANDARD.encode(sealed)))
    }

    /// Decrypt back to the cleartext. Fails if the key is wrong or the
    /// stored value was tampered with.
    pub fn reveal(&self, key: &[u8]) -> Result<String> {
        if key.len() != 32 {
            return Err(CryptoError::KeySizeError(format!(
                "expected 32-byte key, got {}",
                key.len()
            )));
        }

        let sealed = base64::engine::general_purpose::STANDARD
            .decode(&self.0)
            .map_err(|e| CryptoError::InvalidFormat(format!("invalid base64: {}", e)))?;

        if sealed.len() <= NONCE_LEN {
            return Err(CryptoError::InvalidFormat("Ciphertext too short".into()));
        }

        let (nonce_bytes, encrypted_data) = sealed.split_at(NONCE_LEN);

        let aes_key = Key::<Aes256Gcm>::from_slice(key);
        let cipher = Aes256Gcm::new(aes_key);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, encrypted_data)
            .map_err(|e| CryptoError::DecryptionError(e.to_string()))?;

        Ok(String::from_utf8(plaintext)?)
    }

    /// The opaque stored form, for callers that persist the field verbatim.
    pub fn as_opaque(&self) -> &str {
        &self.0
    }
}

// The cleartext never appears in logs or debug output.
impl std::fmt::Debug for SecretField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretField(<sealed>)")
    }
}
