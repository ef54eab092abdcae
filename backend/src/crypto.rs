use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_SIZE: usize = 12;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Secret key must not be empty")]
    EmptySecret,

    #[error("Encryption failed")]
    Encryption,

    #[error("Malformed ciphertext: {0}")]
    Malformed(String),

    #[error("Decryption failed: invalid key or corrupted data")]
    Decryption,

    #[error("Decrypted data is not valid UTF-8")]
    InvalidUtf8,
}

/// Encrypts the `name` column with AES-256-GCM.
///
/// Ciphertexts are stored as `base64(nonce || ciphertext)` so they fit a TEXT column.
#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
}

impl FieldCipher {
    pub fn new(secret: &str) -> Result<Self, CryptoError> {
        if secret.is_empty() {
            return Err(CryptoError::EmptySecret);
        }

        let key = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::Encryption)?;

        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encryption)?;

        let mut packed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        packed.extend_from_slice(&nonce_bytes);
        packed.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(packed))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let packed = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::Malformed(format!("invalid base64: {}", e)))?;

        if packed.len() < NONCE_SIZE {
            return Err(CryptoError::Malformed(format!(
                "expected at least {} bytes, got {}",
                NONCE_SIZE,
                packed.len()
            )));
        }

        let (nonce_bytes, ciphertext) = packed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }
}
