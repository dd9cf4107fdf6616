//! Data key generation and master-key wrapping.
//!
//! Every encrypted field gets its own 256-bit data key and 96-bit IV from a
//! CSPRNG. Stored key material is AES-256-GCM encrypted under the master
//! key, so a database dump alone never reveals plaintext keys.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::error::AppError;

/// GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Process-wide master key wrapping all per-field data keys.
///
/// Loaded once at startup from the `MASTER_KEY` environment variable and
/// shared read-only across handlers and jobs.
#[derive(Clone)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Parse the master key from its 64-hex-character representation.
    pub fn from_hex(hex_key: &str) -> Result<Self, AppError> {
        let bytes = hex::decode(hex_key)
            .map_err(|_| AppError::Crypto("master key is not valid hex".to_string()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AppError::Crypto("master key must be 32 bytes".to_string()))?;
        Ok(Self(key))
    }
}

// Never print key material, even in debug logs.
impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// One symmetric key + IV pair dedicated to a single field instance.
pub struct DataKey {
    pub key: [u8; 32],
    pub iv: [u8; NONCE_LEN],
}

/// Wrapped form of a [`DataKey`], safe to persist.
///
/// `wrapped_key` is base64 of `wrap_nonce || AES-GCM(master, raw key)`;
/// `iv` is the field IV in plain base64 (it is not secret, only the key is).
pub struct WrappedKey {
    pub wrapped_key: String,
    pub iv: String,
}

/// Generate a fresh (key, IV) pair from a cryptographically secure source.
///
/// Pure generation, no side effects. Callers must use each pair for exactly
/// one field instance.
pub fn generate_data_key() -> DataKey {
    DataKey {
        key: rand::random(),
        iv: rand::random(),
    }
}

/// Encrypt a data key under the master key.
///
/// A fresh wrap nonce is drawn per call and prepended to the ciphertext, so
/// wrapping the same key twice yields different blobs.
pub fn wrap_key(data_key: &DataKey, master: &MasterKey) -> Result<WrappedKey, AppError> {
    let cipher = Aes256Gcm::new_from_slice(&master.0)
        .map_err(|_| AppError::Crypto("invalid master key length".to_string()))?;

    let wrap_nonce: [u8; NONCE_LEN] = rand::random();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&wrap_nonce), data_key.key.as_slice())
        .map_err(|_| AppError::Crypto("failed to wrap data key".to_string()))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&wrap_nonce);
    blob.extend_from_slice(&ciphertext);

    Ok(WrappedKey {
        wrapped_key: BASE64.encode(blob),
        iv: BASE64.encode(data_key.iv),
    })
}

/// Decrypt a wrapped data key with the master key.
///
/// Fails if the blob was not produced under the same master key (GCM tag
/// mismatch) or is malformed.
pub fn unwrap_key(wrapped: &WrappedKey, master: &MasterKey) -> Result<DataKey, AppError> {
    let blob = BASE64
        .decode(&wrapped.wrapped_key)
        .map_err(|_| AppError::Crypto("wrapped key is not valid base64".to_string()))?;
    if blob.len() <= NONCE_LEN {
        return Err(AppError::Crypto("wrapped key is truncated".to_string()));
    }
    let (wrap_nonce, ciphertext) = blob.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(&master.0)
        .map_err(|_| AppError::Crypto("invalid master key length".to_string()))?;
    let raw_key = cipher
        .decrypt(Nonce::from_slice(wrap_nonce), ciphertext)
        .map_err(|_| AppError::Crypto("failed to unwrap data key".to_string()))?;

    let key: [u8; 32] = raw_key
        .try_into()
        .map_err(|_| AppError::Crypto("unwrapped key has wrong length".to_string()))?;

    let iv_bytes = BASE64
        .decode(&wrapped.iv)
        .map_err(|_| AppError::Crypto("field IV is not valid base64".to_string()))?;
    let iv: [u8; NONCE_LEN] = iv_bytes
        .try_into()
        .map_err(|_| AppError::Crypto("field IV has wrong length".to_string()))?;

    Ok(DataKey { key, iv })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_master() -> MasterKey {
        MasterKey::from_hex(&"ab".repeat(32)).unwrap()
    }

    #[test]
    fn wrap_then_unwrap_recovers_key_and_iv() {
        let master = test_master();
        let data_key = generate_data_key();

        let wrapped = wrap_key(&data_key, &master).unwrap();
        let recovered = unwrap_key(&wrapped, &master).unwrap();

        assert_eq!(recovered.key, data_key.key);
        assert_eq!(recovered.iv, data_key.iv);
    }

    #[test]
    fn unwrap_with_wrong_master_key_fails() {
        let data_key = generate_data_key();
        let wrapped = wrap_key(&data_key, &test_master()).unwrap();

        let other = MasterKey::from_hex(&"cd".repeat(32)).unwrap();
        assert!(matches!(
            unwrap_key(&wrapped, &other),
            Err(AppError::Crypto(_))
        ));
    }

    #[test]
    fn unwrap_rejects_malformed_blob() {
        let wrapped = WrappedKey {
            wrapped_key: BASE64.encode(b"short"),
            iv: BASE64.encode([0u8; 12]),
        };
        assert!(unwrap_key(&wrapped, &test_master()).is_err());
    }

    #[test]
    fn generated_keys_are_never_identical() {
        // Key-per-field invariant: two field instances never share material.
        let a = generate_data_key();
        let b = generate_data_key();
        assert_ne!(a.key, b.key);
        assert_ne!(a.iv, b.iv);
    }

    #[test]
    fn master_key_parsing_validates_length_and_encoding() {
        assert!(MasterKey::from_hex("not hex").is_err());
        assert!(MasterKey::from_hex("abcd").is_err());
        assert!(MasterKey::from_hex(&"00".repeat(32)).is_ok());
    }
}
