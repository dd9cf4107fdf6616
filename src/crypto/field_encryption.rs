//! Symmetric encryption of single field values.
//!
//! One plaintext string in, one base64 ciphertext out, under a caller-
//! supplied [`DataKey`]. The IV travels with the key: it is fixed per field
//! instance and never shared across distinct fields, which keeps IV reuse
//! impossible by construction (one `encryption_keys` row per field).

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::crypto::key_management::DataKey;
use crate::error::AppError;

/// Encrypt one plaintext string under a data key.
///
/// Returns base64 ciphertext (GCM tag included).
pub fn encrypt_field(plaintext: &str, data_key: &DataKey) -> Result<String, AppError> {
    let cipher = Aes256Gcm::new_from_slice(&data_key.key)
        .map_err(|_| AppError::Crypto("invalid data key length".to_string()))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&data_key.iv), plaintext.as_bytes())
        .map_err(|_| AppError::Crypto("field encryption failed".to_string()))?;

    Ok(BASE64.encode(ciphertext))
}

/// Decrypt one ciphertext string with the data key that produced it.
///
/// Fails if key, IV and ciphertext are inconsistent, which means data
/// corruption or a key mix-up, never a recoverable business condition.
pub fn decrypt_field(ciphertext: &str, data_key: &DataKey) -> Result<String, AppError> {
    let raw = BASE64
        .decode(ciphertext)
        .map_err(|_| AppError::Crypto("ciphertext is not valid base64".to_string()))?;

    let cipher = Aes256Gcm::new_from_slice(&data_key.key)
        .map_err(|_| AppError::Crypto("invalid data key length".to_string()))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&data_key.iv), raw.as_slice())
        .map_err(|_| AppError::Crypto("field decryption failed".to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|_| AppError::Crypto("decrypted field is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key_management::generate_data_key;

    #[test]
    fn round_trip_recovers_plaintext() {
        let key = generate_data_key();
        for s in ["0987654321", "", "29A-123.45", "läßt sich fahren"] {
            let ciphertext = encrypt_field(s, &key).unwrap();
            assert_ne!(ciphertext, s);
            assert_eq!(decrypt_field(&ciphertext, &key).unwrap(), s);
        }
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let key = generate_data_key();
        let ciphertext = encrypt_field("0987654321", &key).unwrap();

        let other = generate_data_key();
        assert!(matches!(
            decrypt_field(&ciphertext, &other),
            Err(AppError::Crypto(_))
        ));
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let key = generate_data_key();
        let ciphertext = encrypt_field("0987654321", &key).unwrap();

        let mut raw = BASE64.decode(&ciphertext).unwrap();
        raw[0] ^= 0xff;
        let tampered = BASE64.encode(raw);

        assert!(decrypt_field(&tampered, &key).is_err());
        assert!(decrypt_field("%%% not base64 %%%", &key).is_err());
    }
}
