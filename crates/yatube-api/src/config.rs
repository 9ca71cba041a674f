use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Posts per page on every feed.
pub const POSTS_PER_PAGE: usize = 10;

/// How long an anonymous home feed page is served from cache.
pub const DEFAULT_INDEX_CACHE_TTL: Duration = Duration::from_secs(20);

/// Upper bound on cached home feed pages.
pub const DEFAULT_INDEX_CACHE_MAX_ENTRIES: usize = 1_000;

const DEV_SECRET: &str = "dev-secret-change-me";

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", DEV_SECRET];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub index_cache_ttl: Duration,
    pub index_cache_max_entries: usize,
    /// Admin routes reject every request while this is unset.
    pub admin_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            db_path: "yatube.db".into(),
            jwt_secret: DEV_SECRET.into(),
            index_cache_ttl: DEFAULT_INDEX_CACHE_TTL,
            index_cache_max_entries: DEFAULT_INDEX_CACHE_MAX_ENTRIES,
            admin_token: None,
        }
    }
}

impl Config {
    /// Reads `YATUBE_*` variables, falling back to the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let jwt_secret = std::env::var("YATUBE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("YATUBE_JWT_SECRET is unset or still a placeholder");
        }

        let port = match std::env::var("YATUBE_PORT") {
            Ok(v) => v.parse().context("YATUBE_PORT must be a port number")?,
            Err(_) => defaults.port,
        };

        let index_cache_ttl = match std::env::var("YATUBE_INDEX_CACHE_TTL_SECS") {
            Ok(v) => Duration::from_secs(
                v.parse()
                    .context("YATUBE_INDEX_CACHE_TTL_SECS must be a number of seconds")?,
            ),
            Err(_) => defaults.index_cache_ttl,
        };

        let index_cache_max_entries = match std::env::var("YATUBE_INDEX_CACHE_MAX_ENTRIES") {
            Ok(v) => v
                .parse()
                .context("YATUBE_INDEX_CACHE_MAX_ENTRIES must be a whole number")?,
            Err(_) => defaults.index_cache_max_entries,
        };

        Ok(Self {
            host: std::env::var("YATUBE_HOST").unwrap_or(defaults.host),
            port,
            db_path: std::env::var("YATUBE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            jwt_secret,
            index_cache_ttl,
            index_cache_max_entries,
            admin_token: std::env::var("YATUBE_ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
        })
    }
}
