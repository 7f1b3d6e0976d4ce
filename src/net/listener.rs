//! Listener binding by network family.
//!
//! # Responsibilities
//! - Bind to the configured address for `tcp`, `tcp4`, `tcp6` or `unix`
//! - Report bind failures as task errors

use std::net::SocketAddr;
#[cfg(unix)]
use std::path::PathBuf;

use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;

/// Network families accepted by [`bind`].
#[cfg(unix)]
pub const NETWORKS: &[&str] = &["tcp", "tcp4", "tcp6", "unix"];
#[cfg(not(unix))]
pub const NETWORKS: &[&str] = &["tcp", "tcp4", "tcp6"];

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Unknown network family.
    UnsupportedNetwork(String),
    /// Address did not resolve to the requested family.
    Resolve(String, std::io::Error),
    /// Failed to bind to address.
    Bind(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::UnsupportedNetwork(n) => write!(f, "Unsupported network: {}", n),
            ListenerError::Resolve(addr, e) => write!(f, "Failed to resolve {}: {}", addr, e),
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::UnsupportedNetwork(_) => None,
            ListenerError::Resolve(_, e) | ListenerError::Bind(e) => Some(e),
        }
    }
}

/// A bound listener of any supported family.
#[derive(Debug)]
pub enum BoundListener {
    Tcp(TcpListener),
    /// Keep the [`SocketFile`] alive as long as the listener.
    #[cfg(unix)]
    Unix(UnixListener, SocketFile),
}

/// Unlinks a unix socket path when dropped, so the path can be bound again.
#[cfg(unix)]
#[derive(Debug)]
pub struct SocketFile(PathBuf);

#[cfg(unix)]
impl Drop for SocketFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => tracing::debug!(path = %self.0.display(), "Socket file removed"),
            Err(e) => tracing::warn!(path = %self.0.display(), error = %e, "Failed to remove socket file"),
        }
    }
}

impl BoundListener {
    /// Printable local address.
    pub fn local_addr(&self) -> String {
        match self {
            BoundListener::Tcp(l) => l
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "unknown".into()),
            #[cfg(unix)]
            BoundListener::Unix(l, _) => l
                .local_addr()
                .ok()
                .and_then(|a| a.as_pathname().map(|p| p.display().to_string()))
                .unwrap_or_else(|| "unnamed".into()),
        }
    }
}

/// Bind `address` on `network`.
pub async fn bind(network: &str, address: &str) -> Result<BoundListener, ListenerError> {
    let listener = match network {
        "tcp" => BoundListener::Tcp(TcpListener::bind(address).await.map_err(ListenerError::Bind)?),
        "tcp4" | "tcp6" => {
            let addr = resolve_family(address, network == "tcp4").await?;
            BoundListener::Tcp(TcpListener::bind(addr).await.map_err(ListenerError::Bind)?)
        }
        #[cfg(unix)]
        "unix" => {
            let listener = UnixListener::bind(address).map_err(ListenerError::Bind)?;
            BoundListener::Unix(listener, SocketFile(PathBuf::from(address)))
        }
        other => return Err(ListenerError::UnsupportedNetwork(other.to_string())),
    };

    tracing::info!(
        network,
        address = %listener.local_addr(),
        "Listener bound"
    );
    Ok(listener)
}

async fn resolve_family(address: &str, v4: bool) -> Result<SocketAddr, ListenerError> {
    let resolve_err = |e| ListenerError::Resolve(address.to_string(), e);
    tokio::net::lookup_host(address)
        .await
        .map_err(resolve_err)?
        .find(|a| a.is_ipv4() == v4)
        .ok_or_else(|| {
            resolve_err(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                if v4 { "no IPv4 address" } else { "no IPv6 address" },
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_tcp_ephemeral() {
        let listener = bind("tcp", "127.0.0.1:0").await.unwrap();
        assert!(matches!(listener, BoundListener::Tcp(_)));
        assert!(listener.local_addr().starts_with("127.0.0.1:"));
    }

    #[tokio::test]
    async fn test_bind_tcp4_rejects_v6_only() {
        let err = bind("tcp4", "[::1]:0").await.unwrap_err();
        assert!(matches!(err, ListenerError::Resolve(..)));
    }

    #[tokio::test]
    async fn test_unknown_network() {
        let err = bind("udp", "127.0.0.1:0").await.unwrap_err();
        assert_eq!(err.to_string(), "Unsupported network: udp");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_unix_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sock");
        let listener = bind("unix", path.to_str().unwrap()).await.unwrap();
        assert!(matches!(listener, BoundListener::Unix(..)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_socket_rebinds_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sock");
        let address = path.to_str().unwrap();

        let first = bind("unix", address).await.unwrap();
        assert!(path.exists());
        drop(first);
        assert!(!path.exists());

        let second = bind("unix", address).await.unwrap();
        assert_eq!(second.local_addr(), address);
    }
}
