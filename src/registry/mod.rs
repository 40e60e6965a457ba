/// Named connection pool registry
///
/// One registry maps connection names to lazily built pools. A pool is
/// constructed on the first successful lookup of its name, guarded so that
/// concurrent first lookups produce exactly one build, and lives until
/// `close` tears the registry down.
///
/// Coordination is per name: the map mutex is held only to fetch or claim a
/// name's build-once cell, never across a dial, so a slow or unreachable
/// backend for one name does not block lookups of other names.
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::config::ConfigSet;
use crate::error::{BuildError, CloseError, RegistryError, RegistryResult};
use crate::pool::redis::RedisPoolBuilder;
use crate::pool::{ConnectionPool, PoolBuilder};

/// Default connection name
pub const DEFAULT_CONNECTION: &str = "default";

type PoolCell<P> = Arc<OnceCell<Arc<P>>>;

/// Registry of named connection pools
///
/// Generic over the pool builder so tests can substitute a fake; production
/// code uses the deadpool-backed `RedisPoolBuilder`.
pub struct Registry<B: PoolBuilder = RedisPoolBuilder> {
    builder: B,
    conf: ConfigSet,
    pools: Mutex<HashMap<String, PoolCell<B::Pool>>>,
}

impl Registry<RedisPoolBuilder> {
    /// Registry over the production Redis pool builder
    pub fn new(conf: ConfigSet) -> Self {
        Self::with_builder(conf, RedisPoolBuilder::new())
    }
}

impl<B: PoolBuilder> Registry<B> {
    pub fn with_builder(conf: ConfigSet, builder: B) -> Self {
        Self {
            builder,
            conf,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// The config set this registry was built with
    pub fn config(&self) -> &ConfigSet {
        &self.conf
    }

    /// Pool for the default connection
    pub async fn connection(&self) -> RegistryResult<Arc<B::Pool>> {
        self.connection_with_name(DEFAULT_CONNECTION).await
    }

    /// Pool for a named connection, building it on first use
    ///
    /// A build failure is returned to the caller and leaves nothing cached;
    /// the next lookup of the same name dials again from scratch.
    pub async fn connection_with_name(&self, name: &str) -> RegistryResult<Arc<B::Pool>> {
        let config = self
            .conf
            .get(name)
            .ok_or_else(|| RegistryError::unknown_connection(name))?;

        // Lock held only for the map access; the dial below runs outside it.
        let cell = {
            let mut pools = self.pools.lock().await;
            pools.entry(name.to_string()).or_default().clone()
        };

        if let Some(pool) = cell.get() {
            debug!("Serving cached pool for connection {}", name);
            return Ok(pool.clone());
        }

        let pool = cell
            .get_or_try_init(|| async {
                debug!(
                    "Building pool for connection {} at {}",
                    name,
                    config.address()
                );
                match self.builder.build(name, config).await {
                    Ok(pool) => {
                        info!("Connection {} pool built", name);
                        Ok(Arc::new(pool))
                    }
                    Err(e) => Err(RegistryError::build(name, e)),
                }
            })
            .await?
            .clone();

        // close() may have drained the map while this build was in flight; a
        // pool published into an orphaned cell would escape every later
        // close(), so settle it here instead of handing it out.
        let registered = {
            let pools = self.pools.lock().await;
            pools
                .get(name)
                .map_or(false, |current| Arc::ptr_eq(current, &cell))
        };
        if !registered {
            warn!("Connection {} was closed while its pool was building", name);
            if let Err(e) = pool.close().await {
                warn!(
                    "Failed to close orphaned pool for connection {}: {}",
                    name, e
                );
            }
            return Err(RegistryError::build(
                name,
                BuildError::Create("registry closed while the pool was building".to_string()),
            ));
        }

        Ok(pool)
    }

    /// Number of built pools currently cached
    pub async fn pool_count(&self) -> usize {
        self.pools
            .lock()
            .await
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    /// Close every cached pool and empty the map
    ///
    /// Every pool gets a close attempt; all failures are collected into one
    /// aggregate error. Entries are removed whether their close succeeded or
    /// not, since a pool whose close failed is not safe to hand out again.
    pub async fn close(&self) -> RegistryResult<()> {
        let mut pools = self.pools.lock().await;
        let mut failures = Vec::new();

        for (name, cell) in pools.drain() {
            // A claimed but never built entry has nothing to close
            let Some(pool) = cell.get() else { continue };

            match pool.close().await {
                Ok(()) => debug!("Closed pool for connection {}", name),
                Err(e) => {
                    warn!("Failed to close pool for connection {}: {}", name, e);
                    failures.push((name, e.to_string()));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CloseError { failures }.into())
        }
    }
}
