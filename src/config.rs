use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::warn;

use crate::connection::{ReconnectPolicy, StoreConfig};

const DEV_JWT_SECRET: &str = "shopfront-dev-secret-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn from_env(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "development" | "dev" | "test" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(anyhow!("APP_ENV must be one of: development, production")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: AppEnv,
    pub jwt_secret: String,
    pub jwt_ttl_days: i64,
    pub bcrypt_cost: u32,
    pub store: StoreConfig,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let host = var("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_var(&var, "APP_PORT", 3000u16)?;
        let env = AppEnv::from_env(&var("APP_ENV").unwrap_or_else(|| "development".to_string()))?;

        let jwt_secret = match (var("JWT_SECRET"), env) {
            (Some(secret), _) => secret,
            (None, AppEnv::Production) => {
                return Err(anyhow!("JWT_SECRET must be set when APP_ENV=production"));
            }
            (None, AppEnv::Development) => {
                warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };
        let jwt_ttl_days = parse_var(&var, "JWT_TTL_DAYS", 7i64)?;
        let bcrypt_cost = parse_var(&var, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(anyhow!("BCRYPT_COST must be between 4 and 31"));
        }

        let reconnect = ReconnectPolicy::default()
            .with_max_attempts(parse_var(&var, "STORE_CONNECT_ATTEMPTS", 5u32)?)
            .with_backoff(
                parse_var(&var, "STORE_BACKOFF_BASE_MS", 100u64)?,
                parse_var(&var, "STORE_BACKOFF_MAX_MS", 5_000u64)?,
            )
            .with_breaker(
                parse_var(&var, "STORE_BREAKER_THRESHOLD", 3u32)?,
                parse_var(&var, "STORE_BREAKER_COOLDOWN_MS", 30_000u64)?,
            );

        let database_url =
            var("DATABASE_URL").unwrap_or_else(|| "sqlite://shopfront.db".to_string());
        let document_database =
            var("DOCUMENT_STORE_DATABASE").unwrap_or_else(|| "shopfront".to_string());
        let store = StoreConfig::select(
            var("DOCUMENT_STORE_URL").as_deref(),
            &document_database,
            &database_url,
        )
        .max_connections(parse_var(&var, "DB_MAX_CONNECTIONS", 5u32)?)
        .server_selection_timeout(Duration::from_millis(parse_var(
            &var,
            "STORE_SERVER_SELECTION_TIMEOUT_MS",
            5_000u64,
        )?))
        .reconnect(reconnect);

        Ok(Self {
            host,
            port,
            env,
            jwt_secret,
            jwt_ttl_days,
            bcrypt_cost,
            store,
            admin_email: var("ADMIN_EMAIL"),
            admin_password: var("ADMIN_PASSWORD"),
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.env == AppEnv::Production
    }
}

fn parse_var<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::StoreTarget;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_select_sqlite() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.jwt_ttl_days, 7);
        assert_eq!(config.env, AppEnv::Development);
        assert_eq!(
            config.store.target,
            StoreTarget::Relational {
                url: "sqlite://shopfront.db".into()
            }
        );
    }

    #[test]
    fn document_url_selects_document_store() {
        let config = config(&[
            ("DOCUMENT_STORE_URL", "mongodb://localhost:27017"),
            ("DOCUMENT_STORE_DATABASE", "shop"),
            ("STORE_CONNECT_ATTEMPTS", "9"),
        ])
        .unwrap();
        assert_eq!(
            config.store.target,
            StoreTarget::Document {
                url: "mongodb://localhost:27017".into(),
                database: "shop".into()
            }
        );
        assert_eq!(config.store.reconnect.max_attempts, 9);
    }

    #[test]
    fn production_requires_jwt_secret() {
        assert!(config(&[("APP_ENV", "production")]).is_err());
        let config = config(&[("APP_ENV", "production"), ("JWT_SECRET", "s")]).unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let err = config(&[("APP_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("APP_PORT"));
        assert!(config(&[("BCRYPT_COST", "2")]).is_err());
    }
}
