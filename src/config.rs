//! Application configuration management.
//!
//! Configuration is loaded once at startup from environment variables via
//! the `envy` crate. The master key lives only here and in the derived
//! [`MasterKey`](crate::crypto::key_management::MasterKey); it is never
//! persisted alongside encrypted data.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `MASTER_KEY` (required): 64 hex characters (32 bytes) wrapping all per-field data keys
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `MAIL_PROVIDER_URL` (optional): HTTP endpoint of the transactional mail provider
/// - `MAIL_PROVIDER_API_KEY` (optional): bearer key for the mail provider
/// - `IMAGE_STORE_URL` (optional): base URL of the image store
/// - `IMAGE_STORE_SECRET` (optional): HMAC secret signing upload paths
/// - `JOB_INTERVAL_SECS` (optional): cadence of the booking lifecycle jobs, defaults to 3600
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    /// Process-wide master key, hex encoded.
    pub master_key: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    pub mail_provider_url: Option<String>,

    pub mail_provider_api_key: Option<String>,

    pub image_store_url: Option<String>,

    pub image_store_secret: Option<String>,

    #[serde(default = "default_job_interval")]
    pub job_interval_secs: u64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

/// Default cadence for the booking lifecycle jobs (hourly).
fn default_job_interval() -> u64 {
    3600
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Attempts to load a `.env` file first (optional), then deserializes
    /// the environment into a `Config`. Field names map to upper-case
    /// variables: `database_url` -> `DATABASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or cannot be
    /// parsed into the expected types.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }
}
