/// Redistry - named Redis connection pool registry
///
/// One process talking to several logical Redis backends (distinct servers,
/// databases or credential sets) addresses them through a single lookup
/// surface: a [`Registry`] validated from per-name configuration. Pools are
/// built lazily on first lookup, probed with PING before being trusted,
/// built at most once per name under concurrent access, and torn down
/// together on shutdown.
///
/// ```no_run
/// use redistry::{ConfigSet, Registry};
///
/// # async fn example() -> Result<(), redistry::RegistryError> {
/// let conf = ConfigSet::load_from_file("redis.toml")?;
/// let registry = Registry::new(conf);
///
/// let pool = registry.connection().await?;
/// let sessions = registry.connection_with_name("sessions").await?;
///
/// registry.close().await?;
/// # Ok(())
/// # }
/// ```
pub mod config;
pub mod error;
pub mod pool;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ConfigSet, ConnectionConfig, RawConnectionConfig};
pub use error::{BuildError, CloseError, ConfigError, RegistryError, RegistryResult};
pub use pool::redis::{RedisPool, RedisPoolBuilder};
pub use pool::{ConnectionPool, PoolBuilder};
pub use registry::{Registry, DEFAULT_CONNECTION};
