use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait DatagramTransport: Send + Sync {
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> Result<usize>;

    /// Waits for the next datagram. Must be cancel safe, the dispatcher polls
    /// it inside `select!`.
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;

    fn local_addr(&self) -> Result<SocketAddr>;
}
