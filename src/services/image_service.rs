//! Image uploads to an HTTP object store.
//!
//! License photos, report evidence and avatars all go through
//! [`ImageStore::upload`], which PUTs the bytes under a random path signed
//! with an HMAC so the store can verify the upload came from this backend.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Object store client for user-submitted images.
#[derive(Clone)]
pub struct ImageStore {
    client: reqwest::Client,
    config: Option<StoreConfig>,
}

#[derive(Clone)]
struct StoreConfig {
    base_url: String,
    secret: String,
}

impl ImageStore {
    /// Build the store client from optional settings.
    pub fn from_config(
        base_url: Option<String>,
        secret: Option<String>,
    ) -> Result<Self, AppError> {
        let config = match (base_url, secret) {
            (Some(base_url), Some(secret)) => {
                url::Url::parse(&base_url)
                    .map_err(|_| AppError::InvalidRequest("Invalid image store URL".to_string()))?;
                Some(StoreConfig {
                    base_url: base_url.trim_end_matches('/').to_string(),
                    secret,
                })
            }
            (None, None) => None,
            _ => {
                return Err(AppError::InvalidRequest(
                    "IMAGE_STORE_URL and IMAGE_STORE_SECRET must be set together".to_string(),
                ));
            }
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::ExternalService(format!("HTTP client error: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Upload one image and return its public URL.
    ///
    /// `label` prefixes the object path (e.g. "license", "report"). Unlike
    /// email, upload failures DO fail the caller: an operation that needs
    /// an image URL cannot proceed without one.
    pub async fn upload(&self, label: &str, bytes: Vec<u8>) -> Result<String, AppError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| AppError::ExternalService("image store not configured".to_string()))?;

        let path = format!("{}/{}", label, Uuid::new_v4());
        let signature = sign_path(&config.secret, &path);
        let target = format!("{}/{}", config.base_url, path);

        let response = self
            .client
            .put(&target)
            .header("X-Upload-Signature", signature)
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("image upload failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "image store returned {}",
                response.status()
            )));
        }

        Ok(target)
    }
}

/// Decode a base64 image payload from a request body.
pub fn decode_image(encoded: &str) -> Result<Vec<u8>, AppError> {
    BASE64
        .decode(encoded)
        .map_err(|_| AppError::InvalidRequest("image is not valid base64".to_string()))
}

/// HMAC-SHA256 over the object path, hex encoded.
fn sign_path(secret: &str, path: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(path.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_stable_and_secret_dependent() {
        let a = sign_path("secret", "license/abc");
        assert_eq!(a, sign_path("secret", "license/abc"));
        assert_ne!(a, sign_path("other", "license/abc"));
        assert_ne!(a, sign_path("secret", "license/def"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn image_decoding_rejects_garbage() {
        assert!(decode_image("aGVsbG8=").is_ok());
        assert!(decode_image("!!!").is_err());
    }

    #[test]
    fn store_settings_must_come_in_pairs() {
        assert!(ImageStore::from_config(None, None).is_ok());
        assert!(
            ImageStore::from_config(Some("https://img.example.com".into()), Some("s".into()))
                .is_ok()
        );
        assert!(ImageStore::from_config(Some("https://img.example.com".into()), None).is_err());
    }
}
