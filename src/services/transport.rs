use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::info;

use crate::error::{Result, WebboxError};
use crate::interfaces::transport::DatagramTransport;

pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub async fn bind(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|e| WebboxError::Transport(format!("bind {addr}: {e}")))?;
        let transport = Self { socket };
        info!(local_addr = %transport.local_addr()?, "udp transport bound");
        Ok(transport)
    }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> Result<usize> {
        self.socket
            .send_to(payload, target)
            .await
            .map_err(|e| WebboxError::Transport(e.to_string()))
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.socket
            .recv_from(buf)
            .await
            .map_err(|e| WebboxError::Transport(e.to_string()))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| WebboxError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_round_trip() {
        let a = UdpTransport::bind("127.0.0.1", 0).await.unwrap();
        let b = UdpTransport::bind("127.0.0.1", 0).await.unwrap();
        let b_addr = b.local_addr().unwrap();

        let sent = a.send_to(b"ping", b_addr).await.unwrap();
        assert_eq!(sent, 4);

        let mut buf = [0u8; 16];
        let (len, from) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"ping");
        assert_eq!(from, a.local_addr().unwrap());
    }

    #[tokio::test]
    async fn bind_failure_is_transport_error() {
        let taken = UdpTransport::bind("127.0.0.1", 0).await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let err = match UdpTransport::bind("127.0.0.1", port).await {
            Ok(_) => panic!("bind should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, WebboxError::Transport(_)));
    }
}
