use std::env;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_CHAT_IDLE_MINUTES: u64 = 30;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_api_base: String,
    pub jwt_secret: String,
    pub mongo_uri: Option<String>,
    pub database_name: String,
    pub frontend_origin: String,
    pub chat_idle_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // blank values count as unset, the way an empty line in .env reads
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let chat_idle_minutes = match var("CHAT_IDLE_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|m| *m > 0)
                .ok_or(ConfigError::Invalid {
                    key: "CHAT_IDLE_MINUTES",
                    value: raw,
                })?,
            None => DEFAULT_CHAT_IDLE_MINUTES,
        };

        Ok(Self {
            port,
            openai_api_key: var("OPENAI_API_KEY"),
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_api_base: var("OPENAI_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            jwt_secret: var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            mongo_uri: var("MONGO_URI"),
            database_name: var("DATABASE_NAME").unwrap_or_else(|| "assistant_db".to_string()),
            frontend_origin: var("FRONTEND_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            chat_idle_ttl: Duration::from_secs(chat_idle_minutes * 60),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.openai_model, "gpt-3.5-turbo");
        assert_eq!(config.openai_api_base, "https://api.openai.com/v1");
        assert!(config.openai_api_key.is_none());
        assert!(config.mongo_uri.is_none());
        assert_eq!(config.frontend_origin, "http://localhost:3000");
        assert_eq!(config.chat_idle_ttl, Duration::from_secs(30 * 60));
    }

    #[test]
    fn reads_port_and_credential() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("PORT", "8088"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8088);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn rejects_bad_port() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "x"), ("PORT", "http")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn secret_is_required() {
        let err = Config::from_lookup(lookup(&[("PORT", "80"), ("JWT_SECRET", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn chat_idle_minutes_must_be_positive() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", "x"), ("CHAT_IDLE_MINUTES", "5")]))
            .unwrap();
        assert_eq!(config.chat_idle_ttl, Duration::from_secs(300));

        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "x"), ("CHAT_IDLE_MINUTES", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CHAT_IDLE_MINUTES", .. }));
    }
}
