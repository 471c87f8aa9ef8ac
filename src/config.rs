//! Configuration Module
//!
//! Explicit configuration structs for the cache and the demo server, with one
//! loader per source: environment variables and TOML files.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};

use crate::cache::{EvictionPolicy, RESERVED_KEY_PREFIX};
use crate::error::{CacheError, Result};

// == Provider Kind ==
/// The closed set of storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// In-process table
    #[default]
    Memory,
    /// One file per key under a directory
    File,
    /// Redis
    #[serde(alias = "redis")]
    Remote,
}

impl ProviderKind {
    /// Returns the configuration name of the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Memory => "memory",
            ProviderKind::File => "file",
            ProviderKind::Remote => "remote",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(ProviderKind::Memory),
            "file" => Ok(ProviderKind::File),
            "remote" | "redis" => Ok(ProviderKind::Remote),
            other => Err(CacheError::Config(format!("unknown cache provider: {other}"))),
        }
    }
}

// == Cache Config ==
/// Top-level cache configuration.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Which backend to build
    pub provider: ProviderKind,
    /// TTL applied when the caller passes none; `None` or zero means never expire
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub default_ttl: Option<Duration>,
    /// Key prefix isolating this cache's keys
    pub namespace: String,
    /// In-process backend settings
    pub memory: MemoryConfig,
    /// File backend settings
    pub file: FileConfig,
    /// Redis backend settings
    pub remote: RemoteConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Memory,
            default_ttl: Some(Duration::from_secs(3600)),
            namespace: "default".to_string(),
            memory: MemoryConfig::default(),
            file: FileConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

/// In-process backend settings.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum number of items, 0 for unbounded
    pub max_size: usize,
    /// Victim selection rule when full
    pub eviction_policy: EvictionPolicy,
    /// Interval of the active expiry sweep
    #[serde_as(as = "DurationSeconds<u64>")]
    pub cleanup_interval: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            eviction_policy: EvictionPolicy::Lru,
            cleanup_interval: Duration::from_secs(600),
        }
    }
}

/// File backend settings.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Directory holding one file per key
    pub dir_path: PathBuf,
    /// Suffix appended to every cache file name
    pub file_suffix: String,
    /// Unix permission bits of cache files
    pub file_mode: u32,
    /// Interval of the directory sweep
    #[serde_as(as = "DurationSeconds<u64>")]
    pub gc_interval: Duration,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            dir_path: env::temp_dir().join("omnicache"),
            file_suffix: ".cache".to_string(),
            file_mode: 0o644,
            gc_interval: Duration::from_secs(900),
        }
    }
}

/// Redis backend settings.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// `host:port` pairs tried in order at connect time
    pub addresses: Vec<String>,
    pub password: Option<String>,
    pub database: i64,
    /// Number of multiplexed connections
    pub pool_size: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "conn_timeout_ms")]
    pub conn_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "read_timeout_ms")]
    pub read_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "write_timeout_ms")]
    pub write_timeout: Duration,
    pub max_retries: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            addresses: vec!["127.0.0.1:6379".to_string()],
            password: None,
            database: 0,
            pool_size: 10,
            conn_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(3),
            write_timeout: Duration::from_secs(3),
            max_retries: 3,
        }
    }
}

impl CacheConfig {
    // == Environment Loader ==
    /// Loads the configuration from `CACHE_*` environment variables.
    ///
    /// Unset variables keep their defaults; unparsable values are errors.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("CACHE_PROVIDER") {
            config.provider = v.parse()?;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "CACHE_DEFAULT_TTL")? {
            config.default_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(v) = lookup("CACHE_NAMESPACE") {
            config.namespace = v;
        }

        if let Some(v) = parse_var(&lookup, "CACHE_MEMORY_MAX_SIZE")? {
            config.memory.max_size = v;
        }
        if let Some(v) = lookup("CACHE_MEMORY_EVICTION_POLICY") {
            config.memory.eviction_policy = v.parse()?;
        }
        if let Some(secs) = parse_var(&lookup, "CACHE_MEMORY_CLEANUP_INTERVAL")? {
            config.memory.cleanup_interval = Duration::from_secs(secs);
        }

        if let Some(v) = lookup("CACHE_FILE_DIR_PATH") {
            config.file.dir_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("CACHE_FILE_SUFFIX") {
            config.file.file_suffix = v;
        }
        if let Some(v) = lookup("CACHE_FILE_MODE") {
            let digits = v.trim().trim_start_matches("0o");
            config.file.file_mode = u32::from_str_radix(digits, 8).map_err(|e| {
                CacheError::Config(format!("CACHE_FILE_MODE must be octal, got {v:?}: {e}"))
            })?;
        }
        if let Some(secs) = parse_var(&lookup, "CACHE_FILE_GC_INTERVAL")? {
            config.file.gc_interval = Duration::from_secs(secs);
        }

        if let Some(v) = lookup("CACHE_REMOTE_ADDRESSES") {
            config.remote.addresses = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("CACHE_REMOTE_PASSWORD") {
            config.remote.password = Some(v).filter(|p| !p.is_empty());
        }
        if let Some(v) = parse_var(&lookup, "CACHE_REMOTE_DATABASE")? {
            config.remote.database = v;
        }
        if let Some(v) = parse_var(&lookup, "CACHE_REMOTE_POOL_SIZE")? {
            config.remote.pool_size = v;
        }
        if let Some(ms) = parse_var(&lookup, "CACHE_REMOTE_CONN_TIMEOUT_MS")? {
            config.remote.conn_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "CACHE_REMOTE_READ_TIMEOUT_MS")? {
            config.remote.read_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "CACHE_REMOTE_WRITE_TIMEOUT_MS")? {
            config.remote.write_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = parse_var(&lookup, "CACHE_REMOTE_MAX_RETRIES")? {
            config.remote.max_retries = v;
        }

        Ok(config)
    }

    // == File Loaders ==
    /// Parses a TOML document; missing fields keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            CacheError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    // == Validation ==
    /// Checks the settings the selected provider depends on.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.contains(':') {
            return Err(CacheError::Config(format!(
                "namespace must not contain ':': {:?}",
                self.namespace
            )));
        }
        if self.namespace.starts_with(RESERVED_KEY_PREFIX) {
            return Err(CacheError::Config(format!(
                "namespace must not start with '{RESERVED_KEY_PREFIX}': {:?}",
                self.namespace
            )));
        }

        match self.provider {
            ProviderKind::Memory => {
                if self.memory.cleanup_interval.is_zero() {
                    return Err(CacheError::Config(
                        "memory.cleanup_interval must be positive".to_string(),
                    ));
                }
            }
            ProviderKind::File => {
                if self.file.dir_path.as_os_str().is_empty() {
                    return Err(CacheError::Config("file.dir_path is required".to_string()));
                }
                if self.file.file_suffix.contains(['/', '\\']) {
                    return Err(CacheError::Config(format!(
                        "file.file_suffix must not contain path separators: {:?}",
                        self.file.file_suffix
                    )));
                }
                if self.file.gc_interval.is_zero() {
                    return Err(CacheError::Config(
                        "file.gc_interval must be positive".to_string(),
                    ));
                }
            }
            ProviderKind::Remote => {
                if self.remote.addresses.iter().all(|a| a.trim().is_empty()) {
                    return Err(CacheError::Config(
                        "remote.addresses must list at least one server".to_string(),
                    ));
                }
                if self.remote.pool_size == 0 {
                    return Err(CacheError::Config(
                        "remote.pool_size must be positive".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CacheError::Config(format!("{name}={raw:?} is invalid: {e}"))),
    }
}

// == Server Config ==
/// Settings of the demo HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server port
    pub port: u16,
}

impl ServerConfig {
    /// Reads `SERVER_PORT` (default: 3000).
    pub fn from_env() -> Self {
        Self {
            port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}
