//! UDP transport for RTP datagrams
//!
//! [`Transport`] is the seam between the pacer and the network. The UDP
//! implementation configures its socket through socket2 before handing it to
//! tokio.

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use thiserror::Error;
use tokio::net::UdpSocket;

/// Socket errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid socket address")]
    InvalidAddress,
}

/// Datagram transport to a single media server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one datagram, returning the number of bytes written
    async fn send(&self, datagram: &[u8]) -> Result<usize, SocketError>;

    /// Receive one datagram into `buf`
    async fn receive(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), SocketError>;
}

/// UDP socket bound locally and aimed at one remote address
pub struct UdpTransport {
    socket: UdpSocket,
    remote: SocketAddr,
}

impl UdpTransport {
    /// Bind to `local` and send to `remote`
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(local: SocketAddr, remote: SocketAddr) -> Result<Self, SocketError> {
        let domain = if local.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&local.into())?;
        socket.set_nonblocking(true)?;

        let socket = UdpSocket::from_std(socket.into())?;
        tracing::debug!(local = %socket.local_addr()?, %remote, "udp transport bound");

        Ok(UdpTransport { socket, remote })
    }

    /// Bind an ephemeral port on the unspecified address of `remote`'s family
    pub fn connect(remote: SocketAddr) -> Result<Self, SocketError> {
        let local = if remote.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        Self::bind(local, remote)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Redirect subsequent sends
    pub fn set_remote(&mut self, remote: SocketAddr) {
        self.remote = remote;
    }

    /// Set the kernel send buffer size
    pub fn set_send_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        socket2::SockRef::from(&self.socket).set_send_buffer_size(size)?;
        Ok(())
    }

    /// Set the kernel receive buffer size
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        socket2::SockRef::from(&self.socket).set_recv_buffer_size(size)?;
        Ok(())
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, datagram: &[u8]) -> Result<usize, SocketError> {
        Ok(self.socket.send_to(datagram, self.remote).await?)
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), SocketError> {
        Ok(self.socket.recv_from(buf).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_bind_ephemeral() {
        let transport = UdpTransport::bind(localhost(), "127.0.0.1:9".parse().unwrap()).unwrap();
        assert!(transport.local_addr().unwrap().port() > 0);
        assert_eq!(transport.remote_addr().port(), 9);
    }

    #[tokio::test]
    async fn test_send_receive() {
        let receiver = UdpTransport::bind(localhost(), localhost()).unwrap();
        let sender = UdpTransport::bind(localhost(), receiver.local_addr().unwrap()).unwrap();

        let sent = sender.send(b"rtp datagram").await.unwrap();
        assert_eq!(sent, 12);

        let mut buf = [0u8; 64];
        let (n, from) = receiver.receive(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"rtp datagram");
        assert_eq!(from, sender.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_buffer_sizes() {
        let transport = UdpTransport::bind(localhost(), localhost()).unwrap();
        transport.set_send_buffer_size(262_144).unwrap();
        transport.set_recv_buffer_size(262_144).unwrap();
    }

    #[tokio::test]
    async fn test_connect_ipv6() {
        // May fail on systems without IPv6
        if let Ok(transport) = UdpTransport::connect("[::1]:9".parse().unwrap()) {
            assert!(transport.local_addr().unwrap().is_ipv6());
        }
    }
}
