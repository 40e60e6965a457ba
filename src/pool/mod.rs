/// Pool construction seam between the registry and the pooling collaborator
pub mod redis;

use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::error::BuildError;

/// Opaque handle to a managed group of live connections to one backend
///
/// Once published by the registry a pool must be safe for concurrent
/// checkout and check-in; that guarantee is delegated to the implementation.
#[async_trait]
pub trait ConnectionPool: Send + Sync + 'static {
    /// Close every connection held by the pool
    ///
    /// Called once, from `Registry::close`. After this returns the pool must
    /// not hand out connections.
    async fn close(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Builds a connection pool from a validated configuration
///
/// Implementations must probe the backend with a lightweight round-trip
/// before returning, so that misconfiguration (wrong host, bad password,
/// unreachable network) surfaces as a build error at first use instead of
/// later inside unrelated command execution. On probe failure the pool is
/// discarded and never handed back.
#[async_trait]
pub trait PoolBuilder: Send + Sync {
    type Pool: ConnectionPool;

    /// Dial, probe and return a ready pool, or the underlying error
    async fn build(
        &self,
        name: &str,
        config: &ConnectionConfig,
    ) -> Result<Self::Pool, BuildError>;
}
