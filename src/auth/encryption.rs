//! AES-256-GCM sealing for the stored credential bundle.
//!
//! The master key is 32 bytes, provided base64-encoded from configuration.
//! Every seal uses a fresh random nonce.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

/// Size of the encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CipherError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("Encryption failed")]
    Seal,

    #[error("Decryption failed (wrong key or corrupted data)")]
    Open,
}

/// Decode and check a base64 master key
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>, CipherError> {
    let key_bytes = BASE64
        .decode(key_base64.trim())
        .map_err(|e| CipherError::InvalidKey(e.to_string()))?;

    if key_bytes.len() != KEY_SIZE {
        return Err(CipherError::InvalidKey(format!(
            "expected {} bytes, got {}",
            KEY_SIZE,
            key_bytes.len()
        )));
    }

    Ok(key_bytes)
}

/// Encrypt `plaintext`, returning base64 `(ciphertext, nonce)`
pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<(String, String), CipherError> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CipherError::InvalidKey(e.to_string()))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CipherError::Seal)?;

    Ok((BASE64.encode(ciphertext), BASE64.encode(nonce)))
}

/// Decrypt base64 `ciphertext` sealed with `nonce`
pub fn open(ciphertext: &str, nonce: &str, key: &[u8]) -> Result<Vec<u8>, CipherError> {
    let ciphertext = BASE64
        .decode(ciphertext)
        .map_err(|e| CipherError::InvalidEncoding(e.to_string()))?;
    let nonce_bytes = BASE64
        .decode(nonce)
        .map_err(|e| CipherError::InvalidEncoding(e.to_string()))?;

    if nonce_bytes.len() != NONCE_SIZE {
        return Err(CipherError::InvalidEncoding(format!(
            "nonce must be {} bytes, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        )));
    }

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CipherError::InvalidKey(e.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| CipherError::Open)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        assert!(validate_key(&BASE64.encode([7u8; 32])).is_ok());
        assert!(validate_key(&BASE64.encode([7u8; 16])).is_err());
        assert!(validate_key("not-valid-base64!@#$").is_err());
    }

    #[test]
    fn test_nonces_are_fresh() {
        let key = [0u8; 32];
        let (c1, n1) = seal(b"same", &key).unwrap();
        let (c2, n2) = seal(b"same", &key).unwrap();

        assert_ne!(n1, n2);
        assert_ne!(c1, c2);
        assert_eq!(open(&c1, &n1, &key).unwrap(), b"same");
    }

    #[test]
    fn test_wrong_key_fails() {
        let (ciphertext, nonce) = seal(b"secret", &[0u8; 32]).unwrap();
        assert_eq!(open(&ciphertext, &nonce, &[1u8; 32]), Err(CipherError::Open));
    }

    #[test]
    fn test_truncated_nonce_rejected() {
        let (ciphertext, _) = seal(b"secret", &[0u8; 32]).unwrap();
        let short = BASE64.encode([0u8; 4]);
        assert!(matches!(
            open(&ciphertext, &short, &[0u8; 32]),
            Err(CipherError::InvalidEncoding(_))
        ));
    }
}
