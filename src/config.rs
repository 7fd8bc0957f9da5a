use std::{collections::HashMap, env, fmt::Display, str::FromStr};

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::pricing::ServingOptionPolicy;

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_PAGE_SIZE: u64 = 15;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    pub serving_option_policy: ServingOptionPolicy,
    pub admin_page_size: u64,
    /// Bearer tokens accepted by the in-memory verifier.
    pub dev_tokens: HashMap<String, Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            database_max_connections: 10,
            nats_url: None,
            serving_option_policy: ServingOptionPolicy::default(),
            admin_page_size: DEFAULT_PAGE_SIZE,
            dev_tokens: HashMap::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let page_size: u64 = try_load(&lookup, "ADMIN_PAGE_SIZE", defaults.admin_page_size)?;
        if page_size == 0 {
            return Err(ConfigError::Invalid { key: "ADMIN_PAGE_SIZE", reason: "must be at least 1".into() });
        }
        Ok(Self {
            port: try_load(&lookup, "PORT", defaults.port)?,
            database_url: optional(&lookup, "DATABASE_URL"),
            database_max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", defaults.database_max_connections)?,
            nats_url: optional(&lookup, "NATS_URL"),
            serving_option_policy: try_load(&lookup, "SERVING_OPTION_POLICY", defaults.serving_option_policy)?,
            admin_page_size: page_size,
            dev_tokens: match optional(&lookup, "DEV_TOKENS") {
                Some(raw) => parse_tokens(&raw)?,
                None => HashMap::new(),
            },
        })
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    let value = lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    if value.is_none() {
        info!("{key} not set");
    }
    value
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid { key, reason: e.to_string() }
        }),
    }
}

/// `DEV_TOKENS=alice-token=<uuid>,bob-token=<uuid>`
fn parse_tokens(raw: &str) -> Result<HashMap<String, Uuid>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid { key: "DEV_TOKENS", reason };
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (token, id) = pair.split_once('=').ok_or_else(|| invalid(format!("'{pair}' is not token=account-id")))?;
            let id = id.trim().parse::<Uuid>().map_err(|e| invalid(format!("'{id}': {e}")))?;
            Ok((token.trim().to_string(), id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 5001);
        assert_eq!(config.admin_page_size, 15);
        assert_eq!(config.serving_option_policy, ServingOptionPolicy::Optional);
        assert!(config.database_url.is_none());
        assert!(config.dev_tokens.is_empty());
    }

    #[test]
    fn test_reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("SERVING_OPTION_POLICY", "Required"),
            ("DEV_TOKENS", "admin=00000000-0000-0000-0000-000000000001, dana=00000000-0000-0000-0000-000000000002"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.serving_option_policy, ServingOptionPolicy::Required);
        assert_eq!(config.dev_tokens.len(), 2);
        assert_eq!(config.dev_tokens["dana"], Uuid::from_u128(2));
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = Config::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().starts_with("invalid PORT"));
        let err = Config::from_lookup(lookup(&[("DEV_TOKENS", "nope")])).unwrap_err();
        assert!(err.to_string().starts_with("invalid DEV_TOKENS"));
        assert!(Config::from_lookup(lookup(&[("ADMIN_PAGE_SIZE", "0")])).is_err());
    }
}
