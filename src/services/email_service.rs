//! Outbound email through an HTTP mail provider.
//!
//! Email is fire-and-forget from every caller's perspective: a rejected or
//! timed-out provider call is logged and swallowed, it never fails the
//! booking/report operation that triggered it.

use serde_json::json;

use crate::error::AppError;

/// Transactional mail client.
///
/// Built once at startup and cloned into handlers and jobs. When the
/// provider is not configured (local development), sends are logged and
/// dropped.
#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    provider: Option<Provider>,
}

#[derive(Clone)]
struct Provider {
    url: String,
    api_key: String,
}

impl Mailer {
    /// Build the mailer from optional provider settings.
    ///
    /// # Errors
    ///
    /// Fails if a provider URL is given but malformed, or if the API key is
    /// missing while the URL is set.
    pub fn from_config(url: Option<String>, api_key: Option<String>) -> Result<Self, AppError> {
        let provider = match (url, api_key) {
            (Some(url), Some(api_key)) => {
                validate_provider_url(&url)?;
                Some(Provider { url, api_key })
            }
            (None, None) => None,
            _ => {
                return Err(AppError::InvalidRequest(
                    "MAIL_PROVIDER_URL and MAIL_PROVIDER_API_KEY must be set together".to_string(),
                ));
            }
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| AppError::ExternalService(format!("HTTP client error: {}", e)))?;

        Ok(Self { client, provider })
    }

    /// Send one email. Never returns an error; failures are logged.
    pub async fn send(&self, to: &str, subject: &str, html_body: &str) {
        let Some(provider) = &self.provider else {
            tracing::info!(to, subject, "mail provider not configured, dropping email");
            return;
        };

        let payload = json!({
            "to": to,
            "subject": subject,
            "html": html_body,
        });

        let result = self
            .client
            .post(&provider.url)
            .bearer_auth(&provider.api_key)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(to, subject, "email accepted by provider");
            }
            Ok(resp) => {
                tracing::error!(to, subject, status = %resp.status(), "mail provider rejected email");
            }
            Err(e) => {
                tracing::error!(to, subject, error = %e, "failed to reach mail provider");
            }
        }
    }
}

/// Validate the mail provider URL.
///
/// HTTPS required; plain HTTP is allowed for localhost only (development).
fn validate_provider_url(provider_url: &str) -> Result<(), AppError> {
    let parsed = url::Url::parse(provider_url)
        .map_err(|_| AppError::InvalidRequest("Invalid mail provider URL".to_string()))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            if matches!(parsed.host_str(), Some("localhost" | "127.0.0.1")) {
                Ok(())
            } else {
                Err(AppError::InvalidRequest(
                    "HTTP is only allowed for localhost mail providers".to_string(),
                ))
            }
        }
        _ => Err(AppError::InvalidRequest(
            "Mail provider URL must use HTTP or HTTPS".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_url_rules() {
        assert!(validate_provider_url("https://mail.example.com/v1/send").is_ok());
        assert!(validate_provider_url("http://localhost:8025/send").is_ok());
        assert!(validate_provider_url("http://mail.example.com/send").is_err());
        assert!(validate_provider_url("ftp://mail.example.com").is_err());
        assert!(validate_provider_url("not a url").is_err());
    }

    #[test]
    fn provider_settings_must_come_in_pairs() {
        assert!(Mailer::from_config(None, None).is_ok());
        assert!(
            Mailer::from_config(Some("https://mail.example.com".into()), Some("key".into())).is_ok()
        );
        assert!(Mailer::from_config(Some("https://mail.example.com".into()), None).is_err());
        assert!(Mailer::from_config(None, Some("key".into())).is_err());
    }
}
