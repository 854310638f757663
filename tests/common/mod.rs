#![allow(dead_code)]

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};

use webbox_link::error::{Result, WebboxError};
use webbox_link::interfaces::transport::DatagramTransport;
use webbox_link::{Config, WebboxHandle};

pub const WAIT: Duration = Duration::from_secs(2);
pub const QUIET: Duration = Duration::from_millis(150);

type Datagram = (SocketAddr, Vec<u8>);

/// In-memory transport: every send lands on a channel the test reads, and the
/// test injects inbound datagrams.
pub struct ChannelTransport {
    local: SocketAddr,
    outbound_tx: mpsc::UnboundedSender<Datagram>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<Datagram>>,
    fail_sends: Arc<AtomicBool>,
}

pub struct ChannelPeer {
    outbound_rx: mpsc::UnboundedReceiver<Datagram>,
    inbound_tx: mpsc::UnboundedSender<Datagram>,
    fail_sends: Arc<AtomicBool>,
}

pub fn channel_transport() -> (ChannelTransport, ChannelPeer) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let fail_sends = Arc::new(AtomicBool::new(false));
    (
        ChannelTransport {
            local: "127.0.0.1:34268".parse().unwrap(),
            outbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            fail_sends: fail_sends.clone(),
        },
        ChannelPeer {
            outbound_rx,
            inbound_tx,
            fail_sends,
        },
    )
}

#[async_trait]
impl DatagramTransport for ChannelTransport {
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> Result<usize> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(WebboxError::Transport("network unreachable".to_string()));
        }
        self.outbound_tx
            .send((target, payload.to_vec()))
            .map_err(|e| WebboxError::Transport(e.to_string()))?;
        Ok(payload.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let mut inbound = self.inbound_rx.lock().await;
        match inbound.recv().await {
            Some((from, data)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok((len, from))
            }
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local)
    }
}

impl ChannelPeer {
    pub async fn next_sent(&mut self) -> (SocketAddr, Value) {
        let (target, data) = tokio::time::timeout(WAIT, self.outbound_rx.recv())
            .await
            .expect("timed out waiting for a send")
            .expect("transport dropped");
        (target, serde_json::from_slice(&data).unwrap())
    }

    /// Sends complete before `send_request` returns, so a non-blocking check
    /// is enough after awaiting it.
    pub fn assert_nothing_sent(&mut self) {
        assert!(self.outbound_rx.try_recv().is_err(), "unexpected send");
    }

    pub fn deliver(&self, from: IpAddr, data: &[u8]) {
        self.inbound_tx
            .send((SocketAddr::new(from, 34268), data.to_vec()))
            .unwrap();
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

pub fn test_config() -> Config {
    Config {
        bind_host: Some("127.0.0.1".to_string()),
        local_port: Some(0),
        ..Config::default()
    }
}

pub fn start_channel_link(config: &Config) -> (WebboxHandle, ChannelPeer) {
    let (transport, peer) = channel_transport();
    let handle = WebboxHandle::with_transport(Arc::new(transport), config).unwrap();
    (handle, peer)
}

pub fn reply(id: &str, procedure: &str, result: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "format": "JSON",
        "version": "1.0",
        "id": id,
        "proc": procedure,
        "result": result,
    }))
    .unwrap()
}

/// A data logger stand-in listening on a real loopback socket.
pub struct FakeDevice {
    pub socket: UdpSocket,
}

impl FakeDevice {
    pub async fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        Self { socket }
    }

    pub fn port(&self) -> u16 {
        self.socket.local_addr().unwrap().port()
    }

    pub async fn recv_request(&self) -> (SocketAddr, Value) {
        let mut buf = vec![0u8; 65_535];
        let (len, from) = tokio::time::timeout(WAIT, self.socket.recv_from(&mut buf))
            .await
            .expect("timed out waiting for a request")
            .unwrap();
        (from, serde_json::from_slice(&buf[..len]).unwrap())
    }

    pub async fn assert_silent(&self) {
        let mut buf = vec![0u8; 65_535];
        let received = tokio::time::timeout(QUIET, self.socket.recv_from(&mut buf)).await;
        assert!(received.is_err(), "device received an unexpected request");
    }

    pub async fn send(&self, to: SocketAddr, data: &[u8]) {
        self.socket.send_to(data, to).await.unwrap();
    }
}

pub async fn start_udp_link(device: &FakeDevice) -> WebboxHandle {
    let config = Config {
        peer_port: Some(device.port()),
        ..test_config()
    };
    WebboxHandle::start(&config).await.unwrap()
}

pub async fn start_dual_stack_link(device: &FakeDevice) -> WebboxHandle {
    let config = Config {
        bind_host: Some("::".to_string()),
        peer_port: Some(device.port()),
        ..test_config()
    };
    WebboxHandle::start(&config).await.unwrap()
}
