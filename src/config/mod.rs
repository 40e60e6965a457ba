/// Configuration management for the registry
///
/// Raw per-name settings are defaulted first and validated second, so a
/// record that omits `port` or `max_idle` is still checked against the same
/// rules as a fully specified one. A `ConnectionConfig` that fails any rule
/// never enters a `ConfigSet`.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Default Redis port
pub const DEFAULT_PORT: &str = "6379";

/// Default maximum number of idle connections kept in a pool
pub const DEFAULT_MAX_IDLE: usize = 3;

/// Default idle timeout after which a pooled connection is discarded
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(240);

/// Validated configuration for one named connection
///
/// Immutable once produced. Numeric fields use unsigned types, so the
/// negative values rejected during validation are unrepresentable here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Backend host name or address
    pub host: String,
    /// Backend port, kept as a string and joined with the host at dial time
    pub port: String,
    /// Database index selected after connecting
    pub db: i64,
    /// Optional AUTH password
    pub password: Option<String>,
    /// Maximum number of idle connections retained by the pool
    pub max_idle: usize,
    /// Maximum number of connections in the pool, 0 means unbounded
    pub max_active: usize,
    /// Idle connections older than this are discarded
    pub idle_timeout: Duration,
}

impl ConnectionConfig {
    /// Dial address in `host:port` form
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT.to_string(),
            db: 0,
            password: None,
            max_idle: DEFAULT_MAX_IDLE,
            max_active: 0,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Raw per-name settings as read from a settings file
///
/// All fields are optional and numerics are signed so that out-of-range
/// values are seen by validation instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConnectionConfig {
    pub host: Option<String>,
    pub port: Option<String>,
    pub db: Option<i64>,
    pub password: Option<String>,
    pub max_idle: Option<i64>,
    pub max_active: Option<i64>,
    /// Idle timeout in seconds
    pub idle_timeout: Option<i64>,
}

impl RawConnectionConfig {
    /// Apply defaults, then validate, producing the immutable record
    ///
    /// Every rejection names both the connection and the offending field.
    pub fn validate(&self, name: &str) -> Result<ConnectionConfig, ConfigError> {
        let host = self.host.clone().unwrap_or_default();
        let port = self
            .port
            .clone()
            .unwrap_or_else(|| DEFAULT_PORT.to_string());
        let db = self.db.unwrap_or(0);
        let max_idle = self.max_idle.unwrap_or(DEFAULT_MAX_IDLE as i64);
        let max_active = self.max_active.unwrap_or(0);
        let idle_timeout = self
            .idle_timeout
            .unwrap_or(DEFAULT_IDLE_TIMEOUT.as_secs() as i64);

        if host.is_empty() {
            return Err(ConfigError::HostRequired {
                name: name.to_string(),
            });
        }
        if db < 0 {
            return Err(negative(name, "db"));
        }
        if max_idle < 0 {
            return Err(negative(name, "max_idle"));
        }
        if max_active < 0 {
            return Err(negative(name, "max_active"));
        }
        if idle_timeout < 0 {
            return Err(negative(name, "idle_timeout"));
        }

        Ok(ConnectionConfig {
            host,
            port,
            db,
            password: self.password.clone().filter(|p| !p.is_empty()),
            max_idle: max_idle as usize,
            max_active: max_active as usize,
            idle_timeout: Duration::from_secs(idle_timeout as u64),
        })
    }
}

fn negative(name: &str, field: &'static str) -> ConfigError {
    ConfigError::NegativeField {
        name: name.to_string(),
        field,
    }
}

/// Settings file layout: connection names nested under a `redis` table
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    redis: HashMap<String, RawConnectionConfig>,
}

/// Read-only mapping from connection name to validated configuration
///
/// Built once at startup and handed to the registry. A name missing here can
/// never produce a pool.
#[derive(Debug, Clone, Default)]
pub struct ConfigSet {
    connections: HashMap<String, ConnectionConfig>,
}

impl ConfigSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an already validated configuration under a name
    ///
    /// The unsigned field types rule out negative values, so the only check
    /// left is the required host.
    pub fn insert<S: Into<String>>(
        &mut self,
        name: S,
        config: ConnectionConfig,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        if config.host.is_empty() {
            return Err(ConfigError::HostRequired { name });
        }
        self.connections.insert(name, config);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ConnectionConfig> {
        self.connections.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Validate a raw name-to-settings map into a config set
    pub fn from_raw(
        raw: HashMap<String, RawConnectionConfig>,
    ) -> Result<Self, ConfigError> {
        let mut connections = HashMap::with_capacity(raw.len());
        for (name, settings) in &raw {
            connections.insert(name.clone(), settings.validate(name)?);
        }
        Ok(Self { connections })
    }

    /// Parse a TOML document with connections under `[redis.<name>]` tables
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: SettingsFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_raw(settings.redis)
    }

    /// Load a config set from a TOML settings file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }
}
