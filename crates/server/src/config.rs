//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PARLEY_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `PARLEY_BASE_URL` - Public URL of the API (decides cookie `Secure` flag)
//! - `PARLEY_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `PARLEY_SETTINGS_KEY` - Base64 32-byte key encrypting tenant access tokens
//!
//! ## Optional
//! - `PARLEY_HOST` - Bind address (default: 127.0.0.1)
//! - `PARLEY_PORT` - Listen port (default: 3000)
//! - `PARLEY_LOG_JSON` - Emit JSON logs when set
//! - `REMINDER_SWEEP_SECS` - Reminder sweep interval (default: 60, 0 disables)
//! - `RELAY_SECRET` - Shared secret for `POST /api/relay/emit`
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (WhatsApp Cloud API)
//! - `WHATSAPP_GRAPH_URL` - Graph API origin (default: <https://graph.facebook.com>)
//! - `WHATSAPP_API_VERSION` - Graph API version (default: v21.0)
//! - `WHATSAPP_APP_SECRET` - Enables `X-Hub-Signature-256` webhook verification
//! - `WHATSAPP_VERIFY_TOKEN` - Global webhook handshake token
//! - `WHATSAPP_MAX_RETRIES` - Extra attempts on 5xx/network errors (default: 3)
//! - `WHATSAPP_RETRY_BASE_MS` - First retry delay, doubled per attempt (default: 500)
//!
//! ## Optional (image host, both together)
//! - `IMAGE_HOST_API_KEY`
//! - `IMAGE_HOST_URL` (default: <https://api.imgbb.com/1/upload>)
//!
//! ## Optional (payment gateway, all three together)
//! - `PAYMENT_KEY_ID`, `PAYMENT_KEY_SECRET`, `PAYMENT_WEBHOOK_SECRET`
//! - `PAYMENT_API_URL` (default: <https://api.razorpay.com/v1>)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const SETTINGS_KEY_LENGTH: usize = 32;

pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_GRAPH_API_VERSION: &str = "v21.0";
pub const DEFAULT_IMAGE_HOST_URL: &str = "https://api.imgbb.com/1/upload";
pub const DEFAULT_PAYMENT_API_URL: &str = "https://api.razorpay.com/v1";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// AES-256 key (base64) for tenant secrets stored in `settings`
    pub settings_key: SecretString,
    /// WhatsApp Cloud API settings shared by all tenants
    pub whatsapp: WhatsAppConfig,
    /// Image host for re-hosting inbound media (optional)
    pub image_host: Option<ImageHostConfig>,
    /// Payment gateway credentials (optional)
    pub payments: Option<PaymentGatewayConfig>,
    /// Shared secret for the server-to-server relay endpoint
    pub relay_secret: Option<SecretString>,
    /// Interval of the reminder sweeper, `None` when disabled
    pub reminder_sweep: Option<Duration>,
    /// JSON log output
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// WhatsApp Cloud API configuration.
///
/// Per-tenant credentials (phone number id, access token) live in the
/// `settings` table; this holds what is common to every tenant.
#[derive(Clone)]
pub struct WhatsAppConfig {
    /// Graph API origin, overridable for tests
    pub graph_url: String,
    /// Graph API version path segment
    pub api_version: String,
    /// Meta app secret used to sign webhook payloads
    pub app_secret: Option<SecretString>,
    /// Handshake token used when no tenant is named in the callback URL
    pub verify_token: Option<SecretString>,
    /// Additional attempts after the first on 5xx or network failure
    pub max_retries: u32,
    /// Delay before the first retry
    pub retry_base_delay: Duration,
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("graph_url", &self.graph_url)
            .field("api_version", &self.api_version)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .field(
                "verify_token",
                &self.verify_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .finish()
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            graph_url: DEFAULT_GRAPH_URL.to_string(),
            api_version: DEFAULT_GRAPH_API_VERSION.to_string(),
            app_secret: None,
            verify_token: None,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// Image host configuration (imgbb-compatible upload API).
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct ImageHostConfig {
    /// Upload API key
    pub api_key: SecretString,
    /// Upload endpoint
    pub upload_url: String,
}

impl std::fmt::Debug for ImageHostConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHostConfig")
            .field("api_key", &"[REDACTED]")
            .field("upload_url", &self.upload_url)
            .finish()
    }
}

/// Payment gateway configuration (Razorpay-compatible API).
///
/// Implements `Debug` manually to redact secrets.
#[derive(Clone)]
pub struct PaymentGatewayConfig {
    /// API key id (basic-auth username)
    pub key_id: String,
    /// API key secret (basic-auth password)
    pub key_secret: SecretString,
    /// Secret used to sign webhook payloads
    pub webhook_secret: SecretString,
    /// API base URL
    pub api_url: String,
}

impl std::fmt::Debug for PaymentGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGatewayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("PARLEY_DATABASE_URL")?;
        let host = get_env_or_default("PARLEY_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("PARLEY_HOST".to_string(), e.to_string()))?;
        let port = parse_env("PARLEY_PORT", "3000")?;
        let base_url = get_required_env("PARLEY_BASE_URL")?;
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("PARLEY_BASE_URL".to_string(), e.to_string()))?;
        let session_secret = get_validated_secret("PARLEY_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "PARLEY_SESSION_SECRET")?;
        let settings_key = get_required_secret("PARLEY_SETTINGS_KEY")?;
        validate_settings_key(&settings_key, "PARLEY_SETTINGS_KEY")?;

        let whatsapp = WhatsAppConfig::from_env()?;
        let image_host = ImageHostConfig::from_env()?;
        let payments = PaymentGatewayConfig::from_env()?;
        let relay_secret = get_optional_env("RELAY_SECRET")
            .map(|value| {
                validate_secret_strength(&value, "RELAY_SECRET")?;
                Ok::<_, ConfigError>(SecretString::from(value))
            })
            .transpose()?;
        let sweep_secs: u64 = parse_env("REMINDER_SWEEP_SECS", "60")?;
        let reminder_sweep = (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs));
        let log_json = get_optional_env("PARLEY_LOG_JSON").is_some();

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            settings_key,
            whatsapp,
            image_host,
            payments,
            relay_secret,
            reminder_sweep,
            log_json,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl WhatsAppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let app_secret = get_optional_env("WHATSAPP_APP_SECRET").map(SecretString::from);
        let verify_token = get_optional_env("WHATSAPP_VERIFY_TOKEN").map(SecretString::from);
        let retry_ms: u64 = parse_env("WHATSAPP_RETRY_BASE_MS", "500")?;

        Ok(Self {
            graph_url: get_env_or_default("WHATSAPP_GRAPH_URL", DEFAULT_GRAPH_URL)
                .trim_end_matches('/')
                .to_string(),
            api_version: get_env_or_default("WHATSAPP_API_VERSION", DEFAULT_GRAPH_API_VERSION),
            app_secret,
            verify_token,
            max_retries: parse_env("WHATSAPP_MAX_RETRIES", "3")?,
            retry_base_delay: Duration::from_millis(retry_ms),
        })
    }
}

impl ImageHostConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = get_optional_env("IMAGE_HOST_API_KEY") else {
            return Ok(None);
        };
        validate_secret_strength(&api_key, "IMAGE_HOST_API_KEY")?;

        Ok(Some(Self {
            api_key: SecretString::from(api_key),
            upload_url: get_env_or_default("IMAGE_HOST_URL", DEFAULT_IMAGE_HOST_URL),
        }))
    }
}

impl PaymentGatewayConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let key_id = get_optional_env("PAYMENT_KEY_ID");
        let key_secret = get_optional_env("PAYMENT_KEY_SECRET");
        let webhook_secret = get_optional_env("PAYMENT_WEBHOOK_SECRET");

        match (key_id, key_secret, webhook_secret) {
            (Some(key_id), Some(key_secret), Some(webhook_secret)) => {
                validate_secret_strength(&key_secret, "PAYMENT_KEY_SECRET")?;
                validate_secret_strength(&webhook_secret, "PAYMENT_WEBHOOK_SECRET")?;
                Ok(Some(Self {
                    key_id,
                    key_secret: SecretString::from(key_secret),
                    webhook_secret: SecretString::from(webhook_secret),
                    api_url: get_env_or_default("PAYMENT_API_URL", DEFAULT_PAYMENT_API_URL)
                        .trim_end_matches('/')
                        .to_string(),
                }))
            }
            (None, None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "PAYMENT_*".to_string(),
                "PAYMENT_KEY_ID, PAYMENT_KEY_SECRET and PAYMENT_WEBHOOK_SECRET must be set together"
                    .to_string(),
            )),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Validate that the settings key is base64 for exactly 32 bytes.
fn validate_settings_key(key: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let bytes = BASE64
        .decode(key.expose_secret().trim())
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if bytes.len() != SETTINGS_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must decode to {SETTINGS_KEY_LENGTH} bytes (got {}). Generate one with `parley keygen`.",
                bytes.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_config() -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/parley"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            settings_key: SecretString::from(BASE64.encode([7u8; 32])),
            whatsapp: WhatsAppConfig::default(),
            image_host: None,
            payments: None,
            relay_secret: None,
            reminder_sweep: None,
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-relay-token-here", "RELAY_SECRET").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let err = validate_secret_strength("abababababababababab", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "S").is_err());
        assert!(validate_session_secret(&SecretString::from("a".repeat(32)), "S").is_ok());
    }

    #[test]
    fn test_validate_settings_key() {
        let good = SecretString::from(BASE64.encode([1u8; 32]));
        assert!(validate_settings_key(&good, "K").is_ok());

        let short = SecretString::from(BASE64.encode([1u8; 16]));
        assert!(matches!(
            validate_settings_key(&short, "K"),
            Err(ConfigError::InsecureSecret(_, _))
        ));

        let garbage = SecretString::from("not base64 at all!");
        assert!(matches!(
            validate_settings_key(&garbage, "K"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_socket_addr_and_cookie_security() {
        let mut config = sample_config();
        let addr = config.socket_addr();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
        assert!(!config.secure_cookies());

        config.base_url = "https://crm.example.com".to_string();
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_whatsapp_defaults() {
        let whatsapp = WhatsAppConfig::default();
        assert_eq!(whatsapp.graph_url, DEFAULT_GRAPH_URL);
        assert_eq!(whatsapp.api_version, "v21.0");
        assert_eq!(whatsapp.max_retries, 3);
        assert_eq!(whatsapp.retry_base_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_payment_config_debug_redacts_secrets() {
        let config = PaymentGatewayConfig {
            key_id: "rzp_test_abc".to_string(),
            key_secret: SecretString::from("gateway_key_material_9f8e7d"),
            webhook_secret: SecretString::from("hook_material_1a2b3c"),
            api_url: DEFAULT_PAYMENT_API_URL.to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("rzp_test_abc"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("gateway_key_material_9f8e7d"));
        assert!(!debug_output.contains("hook_material_1a2b3c"));
    }

    #[test]
    fn test_whatsapp_config_debug_redacts_secrets() {
        let config = WhatsAppConfig {
            app_secret: Some(SecretString::from("meta_app_material_42")),
            ..WhatsAppConfig::default()
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("graph.facebook.com"));
        assert!(!debug_output.contains("meta_app_material_42"));
    }
}
