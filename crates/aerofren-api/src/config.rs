//! AEROFREN API configuration.
//!
//! Configuration is loaded from environment variables. The database URL is
//! held as a `SecretString` and never appears in Debug output.

use crate::admission::{EndpointClass, RateLimitPolicy};
use crate::rate_limit::RateLimitConfig;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::{HashMap, HashSet};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default interval between rate-limit sweeps (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 300;

/// Default graceful shutdown drain period.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Default per-class rate limits as `(max_requests, window_ms)`.
pub const DEFAULT_ADMIN_LIMIT: (u32, u64) = (60, 60_000);
pub const DEFAULT_CHAT_LIMIT: (u32, u64) = (20, 60_000);
pub const DEFAULT_CONTACT_LIMIT: (u32, u64) = (5, 900_000);

/// AEROFREN API configuration.
///
/// The store and the identity authority are both optional: when either is
/// missing the service still starts, and routes that need it answer 503.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// PostgreSQL connection URL. `None` leaves the document store unconfigured.
    pub database_url: Option<SecretString>,

    /// JWKS endpoint of the identity authority. `None` leaves token
    /// verification unconfigured.
    pub auth_jwks_url: Option<String>,

    /// Expected `iss` claim, if any.
    pub auth_issuer: Option<String>,

    /// Expected `aud` claim, if any.
    pub auth_audience: Option<String>,

    /// JWT clock skew tolerance in seconds.
    pub jwt_clock_skew_seconds: i64,

    /// Admin allow-list (trimmed, lowercased emails).
    pub admin_emails: HashSet<String>,

    /// Per-class rate-limit windows.
    pub rate_limits: RateLimitPolicy,

    /// Interval between rate-limit sweeps.
    pub sweep_interval: Duration,

    /// Use the first `X-Forwarded-For` hop as the client identifier.
    pub trust_forwarded_for: bool,

    /// Time to wait for in-flight work after a shutdown signal.
    pub drain_period: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("auth_jwks_url", &self.auth_jwks_url)
            .field("auth_issuer", &self.auth_issuer)
            .field("auth_audience", &self.auth_audience)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("admin_emails", &self.admin_emails.len())
            .field("rate_limits", &self.rate_limits)
            .field("sweep_interval", &self.sweep_interval)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .field("drain_period", &self.drain_period)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid rate limit configuration: {0}")]
    InvalidRateLimit(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let database_url = non_empty(vars, "DATABASE_URL").map(SecretString::from);
        let auth_jwks_url = non_empty(vars, "AUTH_JWKS_URL");
        let auth_issuer = non_empty(vars, "AUTH_ISSUER");
        let auth_audience = non_empty(vars, "AUTH_AUDIENCE");

        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let admin_emails = vars
            .get("ADMIN_EMAILS")
            .map(|raw| parse_email_list(raw))
            .unwrap_or_default();

        let rate_limits = RateLimitPolicy {
            admin: class_limit(vars, EndpointClass::Admin, DEFAULT_ADMIN_LIMIT)?,
            chat: class_limit(vars, EndpointClass::Chat, DEFAULT_CHAT_LIMIT)?,
            contact: class_limit(vars, EndpointClass::Contact, DEFAULT_CONTACT_LIMIT)?,
        };

        let sweep_interval = Duration::from_secs(positive(
            vars,
            "RATE_LIMIT_SWEEP_INTERVAL_SECONDS",
            DEFAULT_SWEEP_INTERVAL_SECONDS,
        )?);

        let trust_forwarded_for = match vars.get("TRUST_FORWARDED_FOR").map(String::as_str) {
            None => false,
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" || v.is_empty() => false,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "TRUST_FORWARDED_FOR".to_string(),
                    reason: format!("expected true or false, got '{}'", other),
                })
            }
        };

        let drain_period = match vars.get("API_DRAIN_SECONDS") {
            Some(value_str) => {
                Duration::from_secs(value_str.parse().map_err(|e| ConfigError::InvalidValue {
                    name: "API_DRAIN_SECONDS".to_string(),
                    reason: format!("must be a non-negative integer, got '{}': {}", value_str, e),
                })?)
            }
            None => Duration::from_secs(DEFAULT_DRAIN_SECONDS),
        };

        Ok(Config {
            bind_address,
            database_url,
            auth_jwks_url,
            auth_issuer,
            auth_audience,
            jwt_clock_skew_seconds,
            admin_emails,
            rate_limits,
            sweep_interval,
            trust_forwarded_for,
            drain_period,
        })
    }
}

/// Split a comma-separated email list into a normalized set.
pub fn parse_email_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
        .collect()
}

fn non_empty(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn class_limit(
    vars: &HashMap<String, String>,
    class: EndpointClass,
    (default_max, default_window_ms): (u32, u64),
) -> Result<RateLimitConfig, ConfigError> {
    let prefix = format!("RATE_LIMIT_{}", class.as_str().to_uppercase());
    let max_requests = positive(vars, &format!("{prefix}_MAX"), default_max)
        .map_err(|e| ConfigError::InvalidRateLimit(e.to_string()))?;
    let window_ms = positive(vars, &format!("{prefix}_WINDOW_MS"), default_window_ms)
        .map_err(|e| ConfigError::InvalidRateLimit(e.to_string()))?;

    Ok(RateLimitConfig {
        window_ms,
        max_requests,
    })
}

fn positive<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: fmt::Display,
{
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: T = value_str.parse().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("must be a valid positive integer, got '{}': {}", value_str, e),
    })?;

    if value == T::default() {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("defaults should load");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert!(config.database_url.is_none());
        assert!(config.auth_jwks_url.is_none());
        assert_eq!(config.jwt_clock_skew_seconds, 300);
        assert!(config.admin_emails.is_empty());
        assert_eq!(config.rate_limits.admin.max_requests, 60);
        assert_eq!(config.rate_limits.chat.max_requests, 20);
        assert_eq!(config.rate_limits.contact.max_requests, 5);
        assert_eq!(config.rate_limits.contact.window_ms, 900_000);
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert!(!config.trust_forwarded_for);
        assert_eq!(config.drain_period, Duration::from_secs(30));
    }

    #[test]
    fn test_from_vars_custom_values() {
        let config = Config::from_vars(&vars(&[
            ("BIND_ADDRESS", "127.0.0.1:9000"),
            ("DATABASE_URL", "postgresql://aerofren:pw@db/aerofren"),
            ("AUTH_JWKS_URL", "https://auth.example.com/jwks.json"),
            ("AUTH_ISSUER", "https://auth.example.com"),
            ("ADMIN_EMAILS", " Ops@Aerofren.com ,sales@aerofren.com,,"),
            ("RATE_LIMIT_CHAT_MAX", "7"),
            ("RATE_LIMIT_CHAT_WINDOW_MS", "1000"),
            ("RATE_LIMIT_SWEEP_INTERVAL_SECONDS", "10"),
            ("TRUST_FORWARDED_FOR", "true"),
            ("API_DRAIN_SECONDS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(
            config.database_url.as_ref().unwrap().expose_secret(),
            "postgresql://aerofren:pw@db/aerofren"
        );
        assert_eq!(
            config.auth_jwks_url.as_deref(),
            Some("https://auth.example.com/jwks.json")
        );
        assert_eq!(config.auth_issuer.as_deref(), Some("https://auth.example.com"));
        assert!(config.auth_audience.is_none());
        assert_eq!(config.admin_emails.len(), 2);
        assert!(config.admin_emails.contains("ops@aerofren.com"));
        assert_eq!(config.rate_limits.chat.max_requests, 7);
        assert_eq!(config.rate_limits.chat.window_ms, 1000);
        assert_eq!(config.sweep_interval, Duration::from_secs(10));
        assert!(config.trust_forwarded_for);
        assert_eq!(config.drain_period, Duration::ZERO);
    }

    #[test]
    fn test_empty_database_url_is_unconfigured() {
        let config = Config::from_vars(&vars(&[("DATABASE_URL", "  ")])).unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let config =
            Config::from_vars(&vars(&[("DATABASE_URL", "postgresql://user:hunter2@db/app")]))
                .unwrap();
        let debug = format!("{:?}", config);

        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_clock_skew_validation() {
        let zero = Config::from_vars(&vars(&[("JWT_CLOCK_SKEW_SECONDS", "0")]));
        assert!(matches!(zero, Err(ConfigError::InvalidJwtClockSkew(_))));

        let too_large = Config::from_vars(&vars(&[("JWT_CLOCK_SKEW_SECONDS", "601")]));
        assert!(matches!(too_large, Err(ConfigError::InvalidJwtClockSkew(_))));

        let garbage = Config::from_vars(&vars(&[("JWT_CLOCK_SKEW_SECONDS", "soon")]));
        assert!(matches!(garbage, Err(ConfigError::InvalidJwtClockSkew(_))));

        let max = Config::from_vars(&vars(&[("JWT_CLOCK_SKEW_SECONDS", "600")])).unwrap();
        assert_eq!(max.jwt_clock_skew_seconds, 600);
    }

    #[test]
    fn test_rate_limit_validation() {
        let zero = Config::from_vars(&vars(&[("RATE_LIMIT_ADMIN_MAX", "0")]));
        assert!(matches!(zero, Err(ConfigError::InvalidRateLimit(_))));

        let negative = Config::from_vars(&vars(&[("RATE_LIMIT_CONTACT_WINDOW_MS", "-5")]));
        assert!(matches!(negative, Err(ConfigError::InvalidRateLimit(_))));
    }

    #[test]
    fn test_invalid_sweep_interval() {
        let result = Config::from_vars(&vars(&[("RATE_LIMIT_SWEEP_INTERVAL_SECONDS", "0")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_invalid_trust_forwarded_for() {
        let result = Config::from_vars(&vars(&[("TRUST_FORWARDED_FOR", "maybe")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_parse_email_list() {
        let emails = parse_email_list("A@x.com, b@Y.com ,,  ");
        assert_eq!(emails.len(), 2);
        assert!(emails.contains("a@x.com"));
        assert!(emails.contains("b@y.com"));
    }
}
