//! External address discovery
//!
//! Before media flows the client sends a 74-byte probe carrying its SSRC to
//! the media server, which answers with the public address it saw:
//!
//! ```text
//! probe:    type=0x0001 (u16) | length=70 (u16) | ssrc (u32) | 66 zero bytes
//! response: 8 bytes | ip address, NUL terminated ... | port (u16, BE)
//! ```
//!
//! Responses are exactly as long as the probe. Datagrams from any address
//! other than the server are ignored, and the whole exchange is bounded by a
//! timeout.

use crate::socket::{SocketError, Transport};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use voxpipe_protocol::cursor::{ByteReader, ByteWriter, CursorError};

/// Total probe length
pub const PROBE_LEN: usize = 74;
const PROBE_TYPE: u16 = 0x0001;
const PROBE_BODY_LEN: u16 = 70;

/// Offset of the address string in a response
const ADDRESS_OFFSET: usize = 8;

/// Receive buffer, large enough to tell an oversized response from a valid one
const RECEIVE_BUF_LEN: usize = 512;

/// How long to wait for the server's answer
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Address discovery handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),
}

/// Build the discovery probe for `ssrc`
pub fn build_probe(ssrc: u32) -> Result<Vec<u8>, CursorError> {
    let mut writer = ByteWriter::with_size(PROBE_LEN);
    writer
        .write_u16(PROBE_TYPE)?
        .write_u16(PROBE_BODY_LEN)?
        .write_u32(ssrc)?;
    Ok(writer.as_bytes().to_vec())
}

/// Extract the discovered address from a response datagram
pub fn parse_response(response: &[u8]) -> Result<SocketAddr, DiscoveryError> {
    if response.len() < ADDRESS_OFFSET + 2 {
        return Err(DiscoveryError::HandshakeFailed(format!(
            "response too short ({} bytes)",
            response.len()
        )));
    }
    if response.len() > PROBE_LEN {
        return Err(DiscoveryError::HandshakeFailed(format!(
            "response too long ({} bytes)",
            response.len()
        )));
    }

    let address = &response[ADDRESS_OFFSET..response.len() - 2];
    let end = address
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| DiscoveryError::HandshakeFailed("unterminated address".into()))?;

    let ip: IpAddr = std::str::from_utf8(&address[..end])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| DiscoveryError::HandshakeFailed("malformed address".into()))?;

    let mut reader = ByteReader::new(&response[response.len() - 2..]);
    let port = reader.read_u16()?;

    Ok(SocketAddr::new(ip, port))
}

/// Perform the discovery handshake with `server` over `transport`
///
/// Fails with `HandshakeFailed` when no response from `server` arrives
/// within `timeout`.
pub async fn discover_address<T: Transport + ?Sized>(
    transport: &T,
    server: SocketAddr,
    ssrc: u32,
    timeout: Duration,
) -> Result<SocketAddr, DiscoveryError> {
    let probe = build_probe(ssrc)?;
    transport.send(&probe).await?;

    let address = tokio::time::timeout(timeout, receive_response(transport, server))
        .await
        .map_err(|_| {
            DiscoveryError::HandshakeFailed(format!("no response within {:?}", timeout))
        })??;

    tracing::info!(%address, %server, "discovered external address");
    Ok(address)
}

/// Wait for the first response from `server`, skipping other peers
async fn receive_response<T: Transport + ?Sized>(
    transport: &T,
    server: SocketAddr,
) -> Result<SocketAddr, DiscoveryError> {
    let mut buf = [0u8; RECEIVE_BUF_LEN];
    loop {
        let (n, from) = transport.receive(&mut buf).await?;
        if from != server {
            tracing::debug!(%from, %server, "ignoring datagram from unexpected peer");
            continue;
        }
        if n == buf.len() {
            return Err(DiscoveryError::HandshakeFailed(
                "response exceeds receive buffer".into(),
            ));
        }
        return parse_response(&buf[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn server() -> SocketAddr {
        "10.0.0.1:50000".parse().unwrap()
    }

    fn response(ip: &str, port: u16) -> Vec<u8> {
        let mut writer = ByteWriter::with_size(PROBE_LEN);
        writer.write_u16(0x0002).unwrap().write_u16(70).unwrap().write_u32(1).unwrap();
        writer.write_bytes(ip.as_bytes()).unwrap();
        writer.set_position(PROBE_LEN - 2).unwrap();
        writer.write_u16(port).unwrap();
        writer.to_vec()
    }

    /// Replays queued datagrams, then never answers again
    struct Echo {
        sent: Mutex<Vec<Vec<u8>>>,
        replies: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    }

    impl Echo {
        fn new(replies: Vec<(Vec<u8>, SocketAddr)>) -> Self {
            Echo {
                sent: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.into()),
            }
        }
    }

    #[async_trait]
    impl Transport for Echo {
        async fn send(&self, datagram: &[u8]) -> Result<usize, SocketError> {
            self.sent.lock().unwrap().push(datagram.to_vec());
            Ok(datagram.len())
        }

        async fn receive(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), SocketError> {
            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some((reply, from)) => {
                    // Truncate like a datagram socket would
                    let n = reply.len().min(buf.len());
                    buf[..n].copy_from_slice(&reply[..n]);
                    Ok((n, from))
                }
                None => std::future::pending().await,
            }
        }
    }

    #[test]
    fn test_probe_layout() {
        let probe = build_probe(0xDEAD_BEEF).unwrap();
        assert_eq!(probe.len(), 74);
        assert_eq!(&probe[..8], &[0x00, 0x01, 0x00, 0x46, 0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(probe[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_parse_response() {
        let addr = parse_response(&response("203.0.113.7", 50_004)).unwrap();
        assert_eq!(addr, "203.0.113.7:50004".parse().unwrap());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            parse_response(&[0u8; 4]),
            Err(DiscoveryError::HandshakeFailed(_))
        ));
        assert!(matches!(
            parse_response(&response("not-an-ip", 1)),
            Err(DiscoveryError::HandshakeFailed(_))
        ));

        let mut oversized = response("1.2.3.4", 5000);
        oversized.extend_from_slice(&[0x13, 0x88]);
        assert!(matches!(
            parse_response(&oversized),
            Err(DiscoveryError::HandshakeFailed(_))
        ));

        let mut unterminated = vec![0u8; 8];
        unterminated.extend_from_slice(b"1.2.3.4");
        unterminated.extend_from_slice(&[0x13, 0x88]);
        assert!(matches!(
            parse_response(&unterminated),
            Err(DiscoveryError::HandshakeFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_discover_address() {
        let transport = Echo::new(vec![(response("198.51.100.2", 4000), server())]);

        let addr = discover_address(&transport, server(), 42, DISCOVERY_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(addr, "198.51.100.2:4000".parse().unwrap());

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], build_probe(42).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_times_out_without_response() {
        let transport = Echo::new(Vec::new());

        let started = tokio::time::Instant::now();
        let result = discover_address(&transport, server(), 42, DISCOVERY_TIMEOUT).await;

        assert!(matches!(result, Err(DiscoveryError::HandshakeFailed(_))));
        assert_eq!(started.elapsed(), DISCOVERY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_discover_ignores_other_peers() {
        let stranger: SocketAddr = "192.0.2.99:50000".parse().unwrap();
        let transport = Echo::new(vec![
            (response("6.6.6.6", 666), stranger),
            (response("198.51.100.2", 4000), server()),
        ]);

        let addr = discover_address(&transport, server(), 42, DISCOVERY_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(addr, "198.51.100.2:4000".parse().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_only_strangers_times_out() {
        let stranger: SocketAddr = "192.0.2.99:50000".parse().unwrap();
        let transport = Echo::new(vec![(response("6.6.6.6", 666), stranger)]);

        let result = discover_address(&transport, server(), 42, DISCOVERY_TIMEOUT).await;
        assert!(matches!(result, Err(DiscoveryError::HandshakeFailed(_))));
    }

    #[tokio::test]
    async fn test_discover_rejects_oversized_response() {
        let mut long = response("198.51.100.2", 4000);
        long.extend(vec![0u8; 1024]);
        let transport = Echo::new(vec![(long, server())]);

        let result = discover_address(&transport, server(), 42, DISCOVERY_TIMEOUT).await;
        assert!(matches!(result, Err(DiscoveryError::HandshakeFailed(_))));

        let mut slightly_long = response("198.51.100.2", 4000);
        slightly_long.extend_from_slice(&[0x0F, 0xA0]);
        let transport = Echo::new(vec![(slightly_long, server())]);

        let result = discover_address(&transport, server(), 42, DISCOVERY_TIMEOUT).await;
        assert!(matches!(result, Err(DiscoveryError::HandshakeFailed(_))));
    }
}
