/// Redis pool construction backed by deadpool-redis
///
/// The builder translates a `ConnectionConfig` into a bounded deadpool pool,
/// probes the backend with PING before handing the pool out, and spawns a
/// reaper task that enforces the idle sizing policy (`max_idle`,
/// `idle_timeout`) the pooling library does not expose directly.
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Manager, Pool, Runtime};
use redis::{cmd, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{ConnectionPool, PoolBuilder};
use crate::config::ConnectionConfig;
use crate::error::BuildError;

/// How often the reaper prunes idle connections
const REAP_INTERVAL: Duration = Duration::from_secs(30);

/// A live, probed Redis connection pool
pub struct RedisPool {
    pool: Pool,
    reaper: JoinHandle<()>,
}

impl RedisPool {
    /// Underlying deadpool handle for issuing commands
    pub fn inner(&self) -> &Pool {
        &self.pool
    }
}

impl fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisPool")
            .field("status", &self.pool.status())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConnectionPool for RedisPool {
    async fn close(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.reaper.abort();
        self.pool.close();
        Ok(())
    }
}

/// Production pool builder
#[derive(Debug, Default)]
pub struct RedisPoolBuilder;

impl RedisPoolBuilder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PoolBuilder for RedisPoolBuilder {
    type Pool = RedisPool;

    async fn build(
        &self,
        name: &str,
        config: &ConnectionConfig,
    ) -> Result<RedisPool, BuildError> {
        let port: u16 = config.port.parse().map_err(|e| BuildError::InvalidAddress {
            address: config.address(),
            message: format!("invalid port: {e}"),
        })?;

        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(config.host.clone(), port),
            redis: RedisConnectionInfo {
                db: config.db,
                password: config.password.clone(),
                ..Default::default()
            },
        };

        let manager = Manager::new(info).map_err(|e| BuildError::Create(e.to_string()))?;

        let mut builder = Pool::builder(manager).runtime(Runtime::Tokio1);
        if config.max_active > 0 {
            // 0 means unbounded; deadpool pools are always bounded, so only
            // an explicit limit overrides its default max_size.
            builder = builder.max_size(config.max_active);
        }
        let pool = builder
            .build()
            .map_err(|e| BuildError::Create(e.to_string()))?;

        debug!("Probing connection {} at {}", name, config.address());
        if let Err(e) = probe(&pool).await {
            warn!("Liveness probe failed for connection {}: {}", name, e);
            pool.close();
            return Err(e);
        }
        debug!("Connection {} passed liveness probe", name);

        let reaper = spawn_reaper(pool.clone(), config.max_idle, config.idle_timeout);
        Ok(RedisPool { pool, reaper })
    }
}

/// Acquire one connection and round-trip a PING before the pool is trusted
async fn probe(pool: &Pool) -> Result<(), BuildError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| BuildError::Acquire(e.to_string()))?;

    let reply: String = cmd("PING")
        .query_async(&mut conn)
        .await
        .map_err(|e| BuildError::Probe(e.to_string()))?;

    if reply != "PONG" {
        return Err(BuildError::Probe(format!("unexpected PING reply: {reply}")));
    }
    Ok(())
}

/// Periodically drop connections idle past `idle_timeout` and cap the number
/// of idle connections at `max_idle`
fn spawn_reaper(pool: Pool, max_idle: usize, idle_timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REAP_INTERVAL);
        interval.tick().await;

        loop {
            interval.tick().await;

            if !idle_timeout.is_zero() {
                pool.retain(|_, metrics| metrics.last_used() < idle_timeout);
            }

            let mut kept = 0usize;
            pool.retain(|_, _| {
                kept += 1;
                kept <= max_idle
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_fake_backend;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    fn config_for(addr: SocketAddr) -> ConnectionConfig {
        ConnectionConfig {
            host: addr.ip().to_string(),
            port: addr.port().to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_build_succeeds_against_responding_backend() {
        let addr = spawn_fake_backend("+PONG\r\n").await;
        let builder = RedisPoolBuilder::new();

        let pool = builder.build("default", &config_for(addr)).await.unwrap();
        assert!(format!("{pool:?}").starts_with("RedisPool"));
        pool.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_build_fails_when_dial_refused() {
        // Bind then drop to get a port nothing is listening on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let builder = RedisPoolBuilder::new();
        let err = builder.build("default", &config_for(addr)).await.unwrap_err();
        assert!(matches!(err, BuildError::Acquire(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_build_fails_on_unexpected_probe_reply() {
        let addr = spawn_fake_backend("+OK\r\n").await;
        let builder = RedisPoolBuilder::new();

        let err = builder.build("default", &config_for(addr)).await.unwrap_err();
        match err {
            BuildError::Probe(message) => assert!(message.contains("OK")),
            other => panic!("expected probe failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_build_rejects_unparseable_port() {
        let config = ConnectionConfig {
            host: "localhost".to_string(),
            port: "not-a-port".to_string(),
            ..Default::default()
        };

        let builder = RedisPoolBuilder::new();
        let err = builder.build("default", &config).await.unwrap_err();
        assert!(matches!(err, BuildError::InvalidAddress { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_max_active_bounds_pool_size() {
        let addr = spawn_fake_backend("+PONG\r\n").await;
        let config = ConnectionConfig {
            max_active: 2,
            ..config_for(addr)
        };

        let builder = RedisPoolBuilder::new();
        let pool = builder.build("default", &config).await.unwrap();
        assert_eq!(pool.inner().status().max_size, 2);
        pool.close().await.unwrap();
    }
}
