use std::env;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Default lifetime of a download token, in hours.
const DEFAULT_TOKEN_TTL_HOURS: i64 = 48;

/// The application's configuration.
///
/// Built once at startup and handed to each component; nothing reads the
/// environment after this point.
#[derive(Clone)]
pub struct Config {
    /// Redis connection string for the record store.
    pub redis_url: String,
    /// Port the HTTP listener binds on localhost.
    pub port: u16,
    /// Payment-processor REST credential.
    pub mp_access_token: String,
    /// Payment-processor REST root, overridable for tests.
    pub mp_api_base: String,
    /// Browser-facing site, target of the checkout redirect pages.
    pub frontend_base_url: String,
    /// Public base URL of this service, target of processor notifications.
    pub api_base_url: String,
    /// The single origin allowed to call the API from a browser.
    pub frontend_origin: String,
    /// Static bearer credential for the admin surface.
    pub admin_token: String,
    /// Service-account identity at the file host.
    pub drive_client_email: String,
    /// Service-account RSA private key (PKCS#8 PEM).
    pub drive_private_key: Zeroizing<String>,
    /// Drive id of the file this store sells.
    pub drive_file_id: String,
    /// OAuth2 token endpoint for the service-account exchange.
    pub google_token_url: String,
    /// File-host API root, overridable for tests.
    pub drive_api_base: String,
    /// Download-token lifetime in hours.
    pub token_ttl_hours: i64,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        // Keys pasted through .env files usually carry escaped newlines.
        let drive_private_key = env::var("GDRIVE_PRIVATE_KEY")
            .context("GDRIVE_PRIVATE_KEY must be set")?
            .replace("\\n", "\n");

        Ok(Self {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("Invalid PORT")?,
            mp_access_token: env::var("MP_ACCESS_TOKEN")
                .context("MP_ACCESS_TOKEN must be set")?,
            mp_api_base: env::var("MP_API_BASE")
                .unwrap_or_else(|_| "https://api.mercadopago.com".to_string()),
            frontend_base_url: env::var("FRONTEND_BASE_URL")
                .context("FRONTEND_BASE_URL must be set")?,
            api_base_url: env::var("API_BASE_URL")
                .context("API_BASE_URL must be set")?,
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .context("FRONTEND_ORIGIN must be set")?,
            admin_token: env::var("ADMIN_TOKEN")
                .context("ADMIN_TOKEN must be set")?,
            drive_client_email: env::var("GDRIVE_CLIENT_EMAIL")
                .context("GDRIVE_CLIENT_EMAIL must be set")?,
            drive_private_key: Zeroizing::new(drive_private_key),
            drive_file_id: env::var("GDRIVE_FILE_ID")
                .context("GDRIVE_FILE_ID must be set")?,
            google_token_url: env::var("GOOGLE_TOKEN_URL")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string()),
            drive_api_base: env::var("DRIVE_API_BASE")
                .unwrap_or_else(|_| "https://www.googleapis.com".to_string()),
            token_ttl_hours: env::var("TOKEN_TTL_HOURS")
                .unwrap_or_else(|_| DEFAULT_TOKEN_TTL_HOURS.to_string())
                .parse()
                .context("Invalid TOKEN_TTL_HOURS")?,
        })
    }
}
