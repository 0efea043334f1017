//! Connection pool.
//!
//! Process-wide cache mapping host names to shared connections, so every
//! caller touching the same host multiplexes over one child transport.
//! At most one live connection exists per host name.

use std::collections::HashMap;
use std::sync::Arc;

use sftpdiff_platform::SftpdiffResult;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::client::SftpClient;

/// Shared cache of SFTP connections, one per host.
///
/// Connections outlive individual callers; their lifetime ends at
/// [`ConnectionPool::disconnect_all`], which the owning process should call
/// before exit so child transports are reaped.
///
/// # Example
///
/// ```rust,no_run
/// use sftpdiff_proto::sftp::ConnectionPool;
///
/// # async fn example() -> sftpdiff_platform::SftpdiffResult<()> {
/// let pool = ConnectionPool::new();
///
/// // Lazily connects on first use, reuses thereafter
/// let conn = pool.get("server").await?;
/// let attrs = conn.stat("/etc/hostname").await?;
/// println!("{:?}", attrs.size);
///
/// pool.disconnect_all().await;
/// # Ok(())
/// # }
/// ```
pub struct ConnectionPool {
    connections: Mutex<HashMap<String, Arc<SftpClient>>>,
}

impl ConnectionPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Gets the shared connection for `host`, connecting it if necessary.
    ///
    /// `connect` is idempotent, so an entry left over from a failed attempt
    /// is simply retried on the next call.
    pub async fn get(&self, host: &str) -> SftpdiffResult<Arc<SftpClient>> {
        let client = {
            let mut connections = self.connections.lock().await;
            match connections.get(host) {
                Some(client) => Arc::clone(client),
                None => {
                    debug!(host, "creating pooled connection");
                    let client = Arc::new(SftpClient::new(host));
                    connections.insert(host.to_string(), Arc::clone(&client));
                    client
                }
            }
        };
        client.connect().await?;
        Ok(client)
    }

    /// Disconnects every pooled connection, best-effort.
    pub async fn disconnect_all(&self) {
        let connections: Vec<_> = {
            let mut map = self.connections.lock().await;
            map.drain().collect()
        };
        for (host, client) in connections {
            if let Err(e) = client.disconnect().await {
                warn!(host = %host, error = %e, "disconnect failed");
            }
        }
    }

    /// Number of connections currently pooled.
    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_pool() {
        let pool = ConnectionPool::new();
        assert_eq!(pool.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_disconnect_all_empty_pool() {
        let pool = ConnectionPool::new();
        pool.disconnect_all().await;
        assert_eq!(pool.connection_count().await, 0);
    }
}
