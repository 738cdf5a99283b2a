/// Configuration management for Blog Service
///
/// Everything is read from environment variables (after `.env` is loaded by
/// `main`). `Config::from_source` takes the lookup as a closure so the same
/// parsing can be driven from a map in tests.
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Page cache configuration
    pub cache: CacheConfig,
    /// Session configuration
    pub session: SessionConfig,
    /// Uploaded media configuration
    pub media: MediaConfig,
    /// Log output configuration
    pub log: LogConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
    /// Actix worker threads (0 = one per core)
    pub workers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    /// Database URL
    #[serde(skip_serializing)]
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds a request may wait for a pooled connection
    pub acquire_timeout_secs: u64,
    /// Apply bundled migrations at startup
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

/// Page cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Redis URL
    pub url: String,
    /// Lifetime of a cached index page
    pub page_ttl_secs: u64,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// HS256 signing secret shared with the identity service
    #[serde(skip_serializing)]
    pub secret: String,
    pub cookie_name: String,
    pub login_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaBackend {
    Local,
    S3,
}

/// Uploaded media configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub backend: MediaBackend,
    /// Directory local uploads are written to
    pub root: String,
    /// URL prefix local uploads are served under
    pub url: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    /// Public URL prefix of the bucket (or its CDN)
    pub s3_public_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Emit JSON log lines instead of the human-readable format
    pub json: bool,
}

const DEV_SESSION_SECRET: &str = "dev-session-secret-change-me";

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_source<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let app_env = var("APP_ENV", "development");
        let production = app_env.eq_ignore_ascii_case("production");

        let store_backend = match var("STORE_BACKEND", "postgres").to_lowercase().as_str() {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => return Err(format!("Unknown STORE_BACKEND '{}'", other)),
        };
        if production && store_backend == StoreBackend::Memory {
            return Err("STORE_BACKEND=memory is not allowed in production".to_string());
        }

        let cache_backend = match var("CACHE_BACKEND", "redis").to_lowercase().as_str() {
            "redis" => CacheBackend::Redis,
            "memory" => CacheBackend::Memory,
            other => return Err(format!("Unknown CACHE_BACKEND '{}'", other)),
        };

        let media_backend = match var("MEDIA_BACKEND", "local").to_lowercase().as_str() {
            "local" => MediaBackend::Local,
            "s3" => MediaBackend::S3,
            other => return Err(format!("Unknown MEDIA_BACKEND '{}'", other)),
        };

        let secret = match lookup("SESSION_SECRET") {
            Some(value) if !value.trim().is_empty() => value,
            _ if production => return Err("SESSION_SECRET must be set in production".to_string()),
            _ => DEV_SESSION_SECRET.to_string(),
        };

        let s3_bucket = var("S3_BUCKET", "");
        if media_backend == MediaBackend::S3 && s3_bucket.trim().is_empty() {
            return Err("S3_BUCKET must be set when MEDIA_BACKEND=s3".to_string());
        }

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: var("BLOG_SERVICE_HOST", "0.0.0.0"),
                port: parse_or_default(&lookup, "BLOG_SERVICE_PORT", 8000)?,
                workers: parse_or_default(&lookup, "BLOG_SERVICE_WORKERS", 0)?,
            },
            database: DatabaseConfig {
                backend: store_backend,
                url: var("DATABASE_URL", "postgresql://localhost/blog"),
                max_connections: parse_or_default(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parse_or_default(&lookup, "DATABASE_MIN_CONNECTIONS", 2)?,
                acquire_timeout_secs: parse_or_default(
                    &lookup,
                    "DATABASE_ACQUIRE_TIMEOUT_SECS",
                    10,
                )?,
                run_migrations: parse_or_default(&lookup, "RUN_MIGRATIONS", true)?,
            },
            cache: CacheConfig {
                backend: cache_backend,
                url: var("REDIS_URL", "redis://localhost:6379"),
                page_ttl_secs: parse_or_default(
                    &lookup,
                    "PAGE_CACHE_TTL_SECS",
                    page_cache::ttl::INDEX_PAGE,
                )?,
            },
            session: SessionConfig {
                secret,
                cookie_name: var("SESSION_COOKIE_NAME", "sessionid"),
                login_url: var("LOGIN_URL", "/auth/login/"),
            },
            media: MediaConfig {
                backend: media_backend,
                root: var("MEDIA_ROOT", "media"),
                url: var("MEDIA_URL", "/media/"),
                s3_public_url: var(
                    "S3_PUBLIC_URL",
                    &format!("https://{}.s3.amazonaws.com", s3_bucket),
                ),
                s3_bucket,
                s3_region: var("S3_REGION", "us-east-1"),
                s3_endpoint: lookup("S3_ENDPOINT").filter(|v| !v.trim().is_empty()),
            },
            log: LogConfig {
                json: var("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.app.env.eq_ignore_ascii_case("production")
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        None => Ok(default),
    }
}
