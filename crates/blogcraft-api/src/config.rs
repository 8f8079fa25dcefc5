use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use argon2::{Params, ParamsBuilder};
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tracing::warn;

/// Name of the cookie carrying the session token.
pub const COOKIE_NAME: &str = "blogcraft_auth";

pub const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

/// Secrets that must never sign tokens in production.
const PLACEHOLDER_SECRETS: &[&str] = &[DEFAULT_JWT_SECRET, "change-me-to-a-random-string"];

// Argon2 defaults (19 MiB, 2 passes)
const DEFAULT_HASH_MEMORY_KIB: u32 = 19 * 1024;
const DEFAULT_HASH_ITERATIONS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Process-wide settings, built once at startup and shared through
/// [`crate::AppState`].
#[derive(Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub cookie_name: String,
    /// Origin allowed to make credentialed cross-origin requests.
    pub frontend_origin: HeaderValue,
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub environment: Environment,
    /// Argon2 work factor.
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source. Unset keys fall back to
    /// development defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match get("BLOGCRAFT_ENV").as_deref() {
            Some("production") => Environment::Production,
            Some("development") | None => Environment::Development,
            Some(other) => bail!("BLOGCRAFT_ENV must be 'development' or 'production', got '{}'", other),
        };

        let jwt_secret = match get("BLOGCRAFT_JWT_SECRET") {
            Some(secret) if !PLACEHOLDER_SECRETS.contains(&secret.as_str()) => secret,
            _ if environment == Environment::Production => {
                bail!("BLOGCRAFT_JWT_SECRET is unset or still a placeholder; refusing to start in production")
            }
            maybe_placeholder => {
                warn!("BLOGCRAFT_JWT_SECRET unset or a placeholder; tokens are forgeable");
                maybe_placeholder.unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string())
            }
        };

        let frontend_url =
            get("BLOGCRAFT_FRONTEND_URL").unwrap_or_else(|| "http://localhost:5173".into());
        let frontend_origin = HeaderValue::from_str(frontend_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid BLOGCRAFT_FRONTEND_URL '{}'", frontend_url))?;

        let port: u16 = get("BLOGCRAFT_PORT")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .context("Invalid BLOGCRAFT_PORT")?;

        let hash_memory_kib: u32 = match get("BLOGCRAFT_HASH_MEMORY_KIB") {
            Some(v) => v.parse().context("Invalid BLOGCRAFT_HASH_MEMORY_KIB")?,
            None => DEFAULT_HASH_MEMORY_KIB,
        };
        let hash_iterations: u32 = match get("BLOGCRAFT_HASH_ITERATIONS") {
            Some(v) => v.parse().context("Invalid BLOGCRAFT_HASH_ITERATIONS")?,
            None => DEFAULT_HASH_ITERATIONS,
        };

        argon2_params(hash_memory_kib, hash_iterations).map_err(|e| {
            anyhow!(
                "Invalid Argon2 cost (BLOGCRAFT_HASH_MEMORY_KIB={}, BLOGCRAFT_HASH_ITERATIONS={}): {}",
                hash_memory_kib,
                hash_iterations,
                e
            )
        })?;

        Ok(Self {
            jwt_secret,
            cookie_name: COOKIE_NAME.to_string(),
            frontend_origin,
            host: get("BLOGCRAFT_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: get("BLOGCRAFT_DB_PATH")
                .unwrap_or_else(|| "blogcraft.db".into())
                .into(),
            environment,
            hash_memory_kib,
            hash_iterations,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Argon2id parameters for new hashes. Checked in `from_lookup`, so this
    /// only fails for a config mutated after loading.
    pub fn hash_params(&self) -> Result<Params, argon2::Error> {
        argon2_params(self.hash_memory_kib, self.hash_iterations)
    }

    /// Binds the listener. `host` may be a name such as `localhost`.
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("Failed to bind {}:{}", self.host, self.port))
    }
}

fn argon2_params(memory_kib: u32, iterations: u32) -> Result<Params, argon2::Error> {
    ParamsBuilder::new()
        .m_cost(memory_kib)
        .t_cost(iterations)
        .p_cost(1)
        .build()
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("jwt_secret", &"<redacted>")
            .field("cookie_name", &self.cookie_name)
            .field("frontend_origin", &self.frontend_origin)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_path", &self.db_path)
            .field("environment", &self.environment)
            .field("hash_memory_kib", &self.hash_memory_kib)
            .field("hash_iterations", &self.hash_iterations)
            .finish()
    }
}
