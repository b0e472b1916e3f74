//! Reversible credential encryption.
//!
//! Passwords are stored as `base64(nonce || AES-256-GCM ciphertext)`. The key is
//! loaded once at startup and injected wherever credentials are sealed or opened.
//! Losing the key makes every stored credential unrecoverable.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64ct::{Base64, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

pub const KEY_LENGTH: usize = 32;
pub const NONCE_LENGTH: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("credential key must be {KEY_LENGTH} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("failed to read from the system random source")]
    RandomSource,
    #[error("failed to seal credential")]
    Seal,
    #[error("ciphertext is not valid base64")]
    Decode,
    #[error("ciphertext too short|{len} < {nonce}")]
    TooShort { len: usize, nonce: usize },
    #[error("ciphertext failed authentication")]
    AuthTagMismatch,
}

/// AES-256-GCM cipher for stored credentials.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher")
            .field("key", &"***")
            .finish()
    }
}

impl CredentialCipher {
    /// Build a cipher from the raw secret bytes.
    ///
    /// # Errors
    /// Returns [`CipherError::InvalidKeyLength`] unless the secret is exactly 32 bytes.
    pub fn new(secret: &SecretString) -> Result<Self, CipherError> {
        let key = secret.expose_secret().as_bytes();
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength(key.len()))?;
        Ok(Self { cipher })
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    ///
    /// # Errors
    /// Returns an error if the random source fails or the AEAD refuses to seal.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|_| CipherError::RandomSource)?;

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| CipherError::Seal)?;

        let mut sealed = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(Base64::encode_string(&sealed))
    }

    /// Decrypt a value produced by [`CredentialCipher::encrypt`].
    ///
    /// # Errors
    /// Returns an error if the input is not base64, is shorter than the nonce, or fails
    /// authentication.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CipherError> {
        let data = Base64::decode_vec(encoded).map_err(|_| CipherError::Decode)?;

        if data.len() < NONCE_LENGTH {
            return Err(CipherError::TooShort {
                len: data.len(),
                nonce: NONCE_LENGTH,
            });
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LENGTH);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CipherError::AuthTagMismatch)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::Decode)
    }

    /// Decrypt `stored` and compare it with the submitted password.
    ///
    /// # Errors
    /// Propagates any decryption failure.
    pub fn matches(&self, stored: &str, submitted: &str) -> Result<bool, CipherError> {
        let plaintext = self.decrypt(stored)?;
        Ok(plaintext.as_bytes() == submitted.as_bytes())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cipher() -> CredentialCipher {
        CredentialCipher::new(&SecretString::from("0123456789abcdef0123456789abcdef")).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = cipher();
        let sealed = cipher.encrypt("secret").unwrap();
        assert_ne!(sealed, "secret");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "secret");
    }

    #[test]
    fn test_encrypt_uses_fresh_nonce() {
        let cipher = cipher();
        let first = cipher.encrypt("secret").unwrap();
        let second = cipher.encrypt("secret").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_decrypt_short_input() {
        let cipher = cipher();
        // 6 bytes once decoded
        let result = cipher.decrypt("c2hvcnQh");
        assert_eq!(result, Err(CipherError::TooShort { len: 6, nonce: 12 }));
        assert_eq!(
            result.unwrap_err().to_string(),
            "ciphertext too short|6 < 12"
        );
    }

    #[test]
    fn test_decrypt_empty_input() {
        assert_eq!(
            cipher().decrypt(""),
            Err(CipherError::TooShort { len: 0, nonce: 12 })
        );
    }

    #[test]
    fn test_decrypt_invalid_base64() {
        assert_eq!(cipher().decrypt("not base64!"), Err(CipherError::Decode));
    }

    #[test]
    fn test_decrypt_tampered_ciphertext() {
        let cipher = cipher();
        let sealed = cipher.encrypt("secret").unwrap();
        let mut raw = Base64::decode_vec(&sealed).unwrap();
        if let Some(byte) = raw.last_mut() {
            *byte ^= 0xFF;
        }
        let tampered = Base64::encode_string(&raw);
        assert_eq!(cipher.decrypt(&tampered), Err(CipherError::AuthTagMismatch));
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let sealed = cipher().encrypt("secret").unwrap();
        let other =
            CredentialCipher::new(&SecretString::from("fedcba9876543210fedcba9876543210")).unwrap();
        assert_eq!(other.decrypt(&sealed), Err(CipherError::AuthTagMismatch));
    }

    #[test]
    fn test_invalid_key_length() {
        let result = CredentialCipher::new(&SecretString::from("too-short"));
        assert!(matches!(result, Err(CipherError::InvalidKeyLength(9))));
    }

    #[test]
    fn test_matches() {
        let cipher = cipher();
        let sealed = cipher.encrypt("Sup3r-secret!").unwrap();
        assert!(cipher.matches(&sealed, "Sup3r-secret!").unwrap());
        assert!(!cipher.matches(&sealed, "sup3r-secret!").unwrap());
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", cipher());
        assert!(rendered.contains("***"));
        assert!(!rendered.contains("0123456789"));
    }
}
