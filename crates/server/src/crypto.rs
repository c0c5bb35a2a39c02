//! Encryption of tenant secrets stored in the `settings` table.
//!
//! WhatsApp access tokens are long-lived bearer credentials, so they are never
//! stored in plain text. Ciphertexts are `base64(nonce || aes-256-gcm output)`
//! with a fresh 96-bit nonce per write.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const NONCE_LEN: usize = 12;

/// Errors from [`SettingsCipher`].
#[derive(Debug, Error)]
pub enum CipherError {
    /// The configured key is not base64 for 32 bytes.
    #[error("invalid settings key: {0}")]
    InvalidKey(String),

    /// Stored value is not valid base64 or is too short to hold a nonce.
    #[error("malformed ciphertext")]
    Malformed,

    /// Authentication tag did not verify (wrong key or tampered data).
    #[error("decryption failed")]
    Decrypt,

    /// Encryption failed.
    #[error("encryption failed")]
    Encrypt,
}

impl From<aes_gcm::Error> for CipherError {
    fn from(_: aes_gcm::Error) -> Self {
        Self::Decrypt
    }
}

/// AES-256-GCM cipher for secrets at rest.
#[derive(Clone)]
pub struct SettingsCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SettingsCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsCipher").finish_non_exhaustive()
    }
}

impl SettingsCipher {
    /// Build a cipher from a base64-encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::InvalidKey` if the key does not decode to 32 bytes.
    pub fn from_base64_key(key: &SecretString) -> Result<Self, CipherError> {
        let bytes = BASE64
            .decode(key.expose_secret().trim())
            .map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(&bytes)
            .map_err(|_| CipherError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Self { cipher })
    }

    /// Generate a fresh random key, base64-encoded.
    #[must_use]
    pub fn generate_key() -> String {
        BASE64.encode(Aes256Gcm::generate_key(&mut OsRng))
    }

    /// Encrypt a secret for storage.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::Encrypt` if the AEAD operation fails.
    pub fn encrypt(&self, plaintext: &SecretString) -> Result<String, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.expose_secret().as_bytes())
            .map_err(|_| CipherError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    /// Decrypt a stored secret.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::Malformed` for undecodable input and
    /// `CipherError::Decrypt` when authentication fails.
    pub fn decrypt(&self, stored: &str) -> Result<SecretString, CipherError> {
        let raw = BASE64
            .decode(stored.trim())
            .map_err(|_| CipherError::Malformed)?;
        let (nonce, ciphertext) = raw
            .split_at_checked(NONCE_LEN)
            .ok_or(CipherError::Malformed)?;
        if ciphertext.is_empty() {
            return Err(CipherError::Malformed);
        }

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)?;
        let text = String::from_utf8(plaintext).map_err(|_| CipherError::Malformed)?;
        Ok(SecretString::from(text))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cipher() -> SettingsCipher {
        SettingsCipher::from_base64_key(&SecretString::from(SettingsCipher::generate_key())).unwrap()
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let c = cipher();
        let stored = c.encrypt(&SecretString::from("EAAG-token-123")).unwrap();
        assert!(!stored.contains("EAAG"));
        assert_eq!(c.decrypt(&stored).unwrap().expose_secret(), "EAAG-token-123");
    }

    #[test]
    fn test_nonce_is_fresh_per_encryption() {
        let c = cipher();
        let token = SecretString::from("same-token");
        assert_ne!(c.encrypt(&token).unwrap(), c.encrypt(&token).unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let stored = cipher().encrypt(&SecretString::from("abc")).unwrap();
        assert!(matches!(cipher().decrypt(&stored), Err(CipherError::Decrypt)));
    }

    #[test]
    fn test_malformed_input() {
        let c = cipher();
        assert!(matches!(c.decrypt("%%%"), Err(CipherError::Malformed)));
        assert!(matches!(c.decrypt(&BASE64.encode([0u8; 8])), Err(CipherError::Malformed)));
    }

    #[test]
    fn test_invalid_key_length() {
        let key = SecretString::from(BASE64.encode([0u8; 16]));
        assert!(matches!(
            SettingsCipher::from_base64_key(&key),
            Err(CipherError::InvalidKey(_))
        ));
    }
}
