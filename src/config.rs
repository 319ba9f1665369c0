/*
 * Responsibility
 * - 環境変数や設定の読み込み (PORT, DATABASE_URL, OIDC, telemetry)
 * - 設定値のバリデーション (不足なら起動失敗)
 * - dev bypass が production で構成されないことを保証する
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::telemetry::TelemetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()))
    }

    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Trust configuration for the Authenticator.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub dev_mode: bool,
    pub issuer_url: Option<String>,
    pub client_id: String,
    /// Static RSA public key; when set, OIDC discovery is skipped.
    pub public_key: Option<String>,
    pub verify_timeout: Duration,
    pub leeway_seconds: u64,
    pub jwks_cache_ttl: Duration,
    pub jwks_min_refresh_interval: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            issuer_url: None,
            client_id: String::new(),
            public_key: None,
            verify_timeout: Duration::from_secs(5),
            leeway_seconds: 60,
            jwks_cache_ttl: Duration::from_secs(300),
            jwks_min_refresh_interval: Duration::from_secs(30),
        }
    }
}

pub struct Config {
    pub addr: SocketAddr,
    pub database_url: Option<String>,

    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    pub sqids_min_length: usize,
    pub sqids_alphabet: String,

    pub auth: AuthConfig,
    pub telemetry: TelemetryConfig,
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// First non-empty value among `keys`.
fn var_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| var(k))
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn flag(key: &str) -> bool {
    var(key).is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = parse_var("PORT", 8080);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let database_url = var("DATABASE_URL");

        let app_env = AppEnv::from_env();

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let sqids_min_length = parse_var("SQIDS_MIN_LENGTH", 10);

        let sqids_alphabet = std::env::var("SQIDS_ALPHABET").unwrap_or_else(|_| {
            "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".to_string()
        });

        let defaults = AuthConfig::default();
        let auth = AuthConfig {
            dev_mode: flag("DEV_MODE"),
            issuer_url: var_any(&["OIDC_ISSUER_URL", "KEYCLOAK_URL"]),
            client_id: var_any(&["OIDC_CLIENT_ID", "KEYCLOAK_CLIENT_ID"]).unwrap_or_default(),
            public_key: var_any(&["OIDC_PUBLIC_KEY", "KEYCLOAK_PUBLIC_KEY"])
                .map(|k| k.replace("\\n", "\n")),
            verify_timeout: Duration::from_secs(parse_var(
                "AUTH_VERIFY_TIMEOUT_SECONDS",
                defaults.verify_timeout.as_secs(),
            )),
            leeway_seconds: parse_var("ACCESS_TOKEN_LEEWAY_SECONDS", defaults.leeway_seconds),
            jwks_cache_ttl: Duration::from_secs(parse_var(
                "JWKS_CACHE_TTL_SECONDS",
                defaults.jwks_cache_ttl.as_secs(),
            )),
            jwks_min_refresh_interval: Duration::from_secs(parse_var(
                "JWKS_MIN_REFRESH_SECONDS",
                defaults.jwks_min_refresh_interval.as_secs(),
            )),
        };

        let telemetry = TelemetryConfig {
            service_name: var("SERVICE_NAME").unwrap_or_else(|| "product-api".to_string()),
            app_insights_connection_string: var("APPINSIGHTS_CONNECTION_STRING"),
        };

        let config = Self {
            addr,
            database_url,
            app_env,
            cors_allowed_origins,
            sqids_min_length,
            sqids_alphabet,
            auth,
            telemetry,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.dev_mode {
            if self.app_env.is_production() {
                return Err(ConfigError::Invalid("DEV_MODE"));
            }
        } else {
            if self.auth.issuer_url.is_none() && self.auth.public_key.is_none() {
                return Err(ConfigError::Missing("OIDC_ISSUER_URL"));
            }
            if self.auth.client_id.is_empty() {
                return Err(ConfigError::Missing("OIDC_CLIENT_ID"));
            }
        }

        if self.auth.verify_timeout.is_zero() {
            return Err(ConfigError::Invalid("AUTH_VERIFY_TIMEOUT_SECONDS"));
        }

        if self.app_env.is_production() && self.database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(())
    }
}
