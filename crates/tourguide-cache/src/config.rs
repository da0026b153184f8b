use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest serialized value accepted by `set` (1 MiB).
pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

/// How long a backend health probe result is trusted.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Keys deleted per DEL during pattern invalidation.
pub const SCAN_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Deployment environment; gates destructive operations
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// Cache behaviour
    #[serde(default)]
    pub cache: CacheSettings,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.redis.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        if self.redis.connect_timeout_ms == 0 || self.redis.command_timeout_ms == 0 {
            return Err("redis timeouts must be > 0".into());
        }
        if self.redis.max_connect_retries == 0 {
            return Err("redis.max_connect_retries must be > 0".into());
        }
        if let Some(url) = self.redis.url.as_deref() {
            if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
                return Err("redis.url must use the redis:// or rediss:// scheme".into());
            }
        }
        if self.cache.default_ttl_secs == 0 {
            return Err("cache.default_ttl_secs must be > 0".into());
        }
        Ok(())
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Redis connection settings.
///
/// Leaving `url` unset runs the cache in memory-only mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default)]
    pub url: Option<String>,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Time allowed to establish a connection, in milliseconds
    #[serde(default = "default_redis_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Time allowed for a single command, in milliseconds
    #[serde(default = "default_redis_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Connection attempts per operation before giving up
    #[serde(default = "default_redis_max_connect_retries")]
    pub max_connect_retries: u32,
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_connect_timeout_ms() -> u64 {
    2000
}

fn default_redis_command_timeout_ms() -> u64 {
    2000
}

fn default_redis_max_connect_retries() -> u32 {
    3
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: default_redis_pool_size(),
            connect_timeout_ms: default_redis_connect_timeout_ms(),
            command_timeout_ms: default_redis_command_timeout_ms(),
            max_connect_retries: default_redis_max_connect_retries(),
        }
    }
}

impl RedisConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// TTL applied when a call does not specify one
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    300
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Load configuration from an optional TOML file and the environment.
    ///
    /// Sources, lowest precedence first: the file (`tourguide.toml` when no
    /// path is given), `TOURGUIDE__SECTION__FIELD` variables, then `REDIS_URL`.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("tourguide.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., TOURGUIDE__REDIS__POOL_SIZE=20
        builder = builder.add_source(
            Environment::with_prefix("TOURGUIDE")
                .try_parsing(true)
                .separator("__"),
        );
        builder = builder
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())
            .map_err(|e| format!("config override error: {e}"))?;
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
