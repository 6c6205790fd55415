use std::{env, fmt::Display, fs::read_to_string, io::ErrorKind, str::FromStr, time::Duration};

use axum::http::HeaderValue;
use rand::RngCore;
use tracing::{info, warn};

use crate::error::ConfigError;

pub const TOKEN_SECRET: &str = "POLL_TOKEN_SECRET";

pub struct Config {
    pub port: u16,
    pub frontend_url: HeaderValue,
    pub token_secret: Vec<u8>,
    pub token_ttl: Duration,
    pub results_require_auth: bool,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let port = match var("RUST_PORT") {
            Some(_) => try_load("RUST_PORT", "5000")?,
            None => try_load("PORT", "5000")?,
        };

        Ok(Self {
            port,
            frontend_url: try_load("FRONTEND_URL", "http://localhost:5173")?,
            token_secret: load_token_secret()?,
            token_ttl: Duration::from_secs(try_load("POLL_TOKEN_TTL_SECS", "86400")?),
            results_require_auth: try_load("POLL_RESULTS_REQUIRE_AUTH", "false")?,
        })
    }

    /// Fixed configuration for tests and embedding, no environment access.
    pub fn with_secret(token_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            port: 0,
            frontend_url: HeaderValue::from_static("http://localhost:5173"),
            token_secret: token_secret.into(),
            token_ttl: Duration::from_secs(24 * 60 * 60),
            results_require_auth: false,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    parse_value(key, var(key), default)
}

fn parse_value<T: FromStr>(key: &str, value: Option<String>, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .trim()
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })
}

fn load_token_secret() -> Result<Vec<u8>, ConfigError> {
    if let Some(secret) = read_secret(TOKEN_SECRET)? {
        return Ok(secret.into_bytes());
    }

    if let Some(secret) = var(TOKEN_SECRET).filter(|s| !s.trim().is_empty()) {
        return Ok(secret.trim().as_bytes().to_vec());
    }

    warn!("{TOKEN_SECRET} not found, credentials will not survive a restart");

    let mut secret = vec![0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);

    Ok(secret)
}

fn read_secret(secret_name: &str) -> Result<Option<String>, ConfigError> {
    let path = format!("/run/secrets/{secret_name}");

    match read_to_string(&path) {
        Ok(s) if !s.trim().is_empty() => Ok(Some(s.trim().to_string())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => {
            warn!("Failed to read {secret_name} from file: {source}");
            Err(ConfigError::Secret {
                name: secret_name.to_string(),
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_used_when_missing() {
        let port: u16 = parse_value("PORT", None, "5000").unwrap();
        assert_eq!(port, 5000);
    }

    #[test]
    fn test_value_is_trimmed() {
        let flag: bool = parse_value("FLAG", Some(" true ".to_string()), "false").unwrap();
        assert!(flag);
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        let result: Result<u16, _> = parse_value("PORT", Some("not-a-port".to_string()), "5000");

        match result {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "PORT"),
            _ => panic!("expected InvalidValue"),
        }
    }
}
