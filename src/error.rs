/// Unified error handling for the registry
///
/// Every failure the registry can produce is represented here: configuration
/// rejection, lookup of a name that was never configured, pool construction
/// failure, and teardown failure. All errors are returned synchronously to
/// the caller; nothing is swallowed or retried internally.
use thiserror::Error;

/// Main error type for registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Requested connection name is not present in the config set
    #[error("Unknown connection: {name}")]
    UnknownConnection { name: String },

    /// Pool construction errors (dial, auth or probe failure)
    #[error("Failed to build pool for connection {name}: {source}")]
    Build {
        name: String,
        #[source]
        source: BuildError,
    },

    /// Pool teardown errors
    #[error("Close error: {0}")]
    Close(#[from] CloseError),
}

/// Configuration-specific errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Connection {name}: host is required")]
    HostRequired { name: String },

    #[error("Connection {name}: {field} must be greater or equal to 0")]
    NegativeField { name: String, field: &'static str },
}

/// Pool construction errors
///
/// A build failure is never cached by the registry; the next lookup of the
/// same name attempts a fresh build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid address {address}: {message}")]
    InvalidAddress { address: String, message: String },

    #[error("Failed to create pool: {0}")]
    Create(String),

    #[error("Failed to acquire connection: {0}")]
    Acquire(String),

    #[error("Liveness probe failed: {0}")]
    Probe(String),
}

/// Aggregate teardown error
///
/// `Registry::close` attempts to close every cached pool and collects all
/// failures here instead of stopping at the first one.
#[derive(Debug, Error)]
#[error("Failed to close {} connection pool(s)", failures.len())]
pub struct CloseError {
    /// Connection name and failure reason for every pool that failed to close
    pub failures: Vec<(String, String)>,
}

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

impl RegistryError {
    /// Create an unknown connection error
    pub fn unknown_connection<S: Into<String>>(name: S) -> Self {
        RegistryError::UnknownConnection { name: name.into() }
    }

    /// Create a build error scoped to a connection name
    pub fn build<S: Into<String>>(name: S, source: BuildError) -> Self {
        RegistryError::Build {
            name: name.into(),
            source,
        }
    }

    /// Check if this error is recoverable by retrying the same call
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RegistryError::Build { .. })
    }
}
