use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub shutdown_grace_secs: u64,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is required")?;

        let secret = lookup("JWT_SECRET").context("JWT_SECRET is required")?;
        if secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let jwt = JwtConfig {
            secret,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "auth-service".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "auth-service-users".into()),
            ttl_minutes: parsed(&lookup, "JWT_TTL_MINUTES").unwrap_or(60),
        };

        // SERVER_PORT is the older name, still honoured when APP_PORT is unset.
        let port = parsed(&lookup, "APP_PORT")
            .or_else(|| parsed(&lookup, "SERVER_PORT"))
            .unwrap_or(3000);

        Ok(Self {
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database_url,
            db_max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS").unwrap_or(10),
            shutdown_grace_secs: parsed(&lookup, "SHUTDOWN_GRACE_SECS").unwrap_or(10),
            jwt,
        })
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn parsed<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key).and_then(|v| v.trim().parse::<T>().ok())
}
