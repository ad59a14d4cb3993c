use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::common::limits::{CONNECTION_LIMIT_DEFAULT, WORKERS_DEFAULT};
use crate::{ModuleTable, PathPolicy, SocketConfig};

/// Default document root
pub const DOCUMENT_ROOT_DEFAULT: &str = "/var/www";
/// Default name of a directory index file
pub const INDEX_DEFAULT: &str = "index.html";

/// Represents the config parameters required to create a server.
///
/// # Example
///
/// ```
/// # use srv::ServerConfig;
/// let cfg = ServerConfig {
///     document_root: "/srv/www".into(),
///     workers: 4,
///     ..ServerConfig::default()
/// };
/// ```
///
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// One listening socket is bound per address
    pub addr: Vec<SocketAddr>,

    /// Directory request paths are resolved against
    pub document_root: PathBuf,

    /// File served for a directory request when present
    pub index: String,

    /// Number of worker threads
    pub workers: usize,

    /// Connections are limited to `connection_limit`, further ones are
    /// closed right after accept
    pub connection_limit: usize,

    /// Treatment of `.` and `..` in request paths
    pub path_policy: PathPolicy,

    /// Modules answering instead of the file system
    pub modules: ModuleTable,

    /// Socket configuration
    /// See [SocketConfig]
    pub socket_config: SocketConfig,
}

impl ServerConfig {
    /// Config listening on `port` of all IPv4 interfaces
    #[must_use]
    pub fn with_port(port: u16) -> Self {
        Self {
            addr: vec![SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))],
            ..Self::default()
        }
    }

    /// Checks the values a server can't start with.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for no addresses, zero workers, zero connections or an empty index name
    /// - `NotFound` when the document root is not a directory
    pub fn validate(&self) -> io::Result<()> {
        if self.addr.is_empty() {
            return Err(invalid("no listen address"));
        }
        if self.workers == 0 {
            return Err(invalid("workers must be at least 1"));
        }
        if self.connection_limit == 0 {
            return Err(invalid("connection_limit must be at least 1"));
        }
        if self.index.is_empty() || self.index.contains('/') {
            return Err(invalid("index must be a plain file name"));
        }
        if !self.document_root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "document root {} is not a directory",
                    self.document_root.display()
                ),
            ));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: vec![SocketAddr::from((Ipv4Addr::LOCALHOST, 0))],
            document_root: PathBuf::from(DOCUMENT_ROOT_DEFAULT),
            index: INDEX_DEFAULT.to_owned(),
            workers: WORKERS_DEFAULT,
            connection_limit: CONNECTION_LIMIT_DEFAULT,
            path_policy: PathPolicy::default(),
            modules: ModuleTable::new(),
            socket_config: SocketConfig::default(),
        }
    }
}
