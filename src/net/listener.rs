//! TCP listener construction.
//!
//! # Responsibilities
//! - Resolve the bind address for the configured network
//! - Create the socket with keep-alive enabled
//! - Hand a tokio `TcpListener` to the HTTP layer

use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};
use tokio::net::TcpListener;

use crate::error::{Result, ServerError};

/// Keep-alive period applied to accepted connections.
pub const TCP_KEEPALIVE: Duration = Duration::from_secs(3 * 60);

const BACKLOG: i32 = 1024;

/// Listener network, mirroring the `tcp`/`tcp4`/`tcp6` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Tcp,
    Tcp4,
    Tcp6,
}

impl Network {
    pub fn parse(network: &str) -> Result<Self> {
        match network {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            other => Err(ServerError::InvalidListenerNetwork(other.to_string())),
        }
    }

    fn accepts(self, addr: &SocketAddr) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => addr.is_ipv4(),
            Network::Tcp6 => addr.is_ipv6(),
        }
    }

    fn unspecified(self) -> &'static str {
        match self {
            Network::Tcp6 => "[::]",
            Network::Tcp | Network::Tcp4 => "0.0.0.0",
        }
    }
}

/// Resolve `address` for `network`. A bare `:port` binds every interface.
pub async fn resolve(address: &str, network: Network) -> Result<SocketAddr> {
    let address = match address.strip_prefix(':') {
        Some(port) => format!("{}:{}", network.unspecified(), port),
        None => address.to_string(),
    };

    let found = tokio::net::lookup_host(address.as_str())
        .await
        .map_err(|_| ServerError::InvalidAddress(address.clone()))?
        .find(|addr| network.accepts(addr));
    found.ok_or_else(|| ServerError::InvalidAddress(address))
}

/// Bind a listener on `address` using `network` (`tcp`, `tcp4` or `tcp6`).
pub async fn bind_listener(address: &str, network: &str) -> Result<TcpListener> {
    let network = Network::parse(network)?;
    let addr = resolve(address, network).await?;

    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    if network == Network::Tcp6 {
        socket.set_only_v6(true)?;
    }
    socket.set_keepalive(true)?;
    socket.set_tcp_keepalive(&TcpKeepalive::new().with_time(TCP_KEEPALIVE))?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    let listener = TcpListener::from_std(socket.into())?;

    tracing::debug!(
        address = %listener.local_addr()?,
        network = ?network,
        "Listener bound"
    );

    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parse() {
        assert_eq!(Network::parse("tcp").unwrap(), Network::Tcp);
        assert_eq!(Network::parse("tcp6").unwrap(), Network::Tcp6);
        assert!(matches!(
            Network::parse("unix"),
            Err(ServerError::InvalidListenerNetwork(n)) if n == "unix"
        ));
    }

    #[tokio::test]
    async fn test_resolve_port_shorthand() {
        let addr = resolve(":0", Network::Tcp4).await.unwrap();
        assert!(addr.is_ipv4());
        assert!(addr.ip().is_unspecified());
    }

    #[tokio::test]
    async fn test_resolve_rejects_wrong_family() {
        let err = resolve("127.0.0.1:0", Network::Tcp6).await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn test_bind_listener_on_ephemeral_port() {
        let listener = bind_listener("127.0.0.1:0", "tcp").await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_listener_rejects_network() {
        let err = bind_listener("127.0.0.1:0", "udp").await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidListenerNetwork(_)));
    }
}
