use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::codec::{self, Encoder};
use crate::config::Config;
use crate::domains::envelope::{CorrelationEvent, RequestId};
use crate::error::{Result, WebboxError};
use crate::interfaces::transport::DatagramTransport;
use crate::services::queue::{PeerQueues, PeerStatus, PendingMessage, Submission};
use crate::services::transport::UdpTransport;

const MAX_DATAGRAM_SIZE: usize = 65_535;
const MAX_ID_ATTEMPTS: usize = 32;

enum LinkCommand {
    SendRequest {
        peer: IpAddr,
        procedure: String,
        params: Option<Map<String, Value>>,
        respond_to: oneshot::Sender<Result<RequestId>>,
    },
    PeerStatus {
        peer: IpAddr,
        respond_to: oneshot::Sender<PeerStatus>,
    },
    Shutdown,
}

struct Dispatcher {
    transport: Arc<dyn DatagramTransport>,
    queues: PeerQueues,
    encoder: Encoder,
    peer_port: u16,
    local_is_ipv6: bool,
    event_tx: broadcast::Sender<CorrelationEvent>,
}

impl Dispatcher {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<LinkCommand>,
        connectivity_tx: watch::Sender<bool>,
    ) {
        info!(
            peer_port = self.peer_port,
            queue_capacity = self.queues.capacity(),
            "dispatcher started"
        );
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(LinkCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }
                received = self.transport.recv_from(&mut buf) => {
                    match received {
                        Ok((len, from)) => self.handle_datagram(from, &buf[..len]).await,
                        Err(err) => warn!(error = %err, "error reading pending datagram"),
                    }
                }
            }
        }

        connectivity_tx.send_replace(false);
        info!("dispatcher stopped");
    }

    async fn handle_command(&mut self, cmd: LinkCommand) {
        match cmd {
            LinkCommand::SendRequest {
                peer,
                procedure,
                params,
                respond_to,
            } => {
                let result = self.submit(peer, &procedure, params.as_ref()).await;
                let _ = respond_to.send(result);
            }
            LinkCommand::PeerStatus { peer, respond_to } => {
                let _ = respond_to.send(self.queues.status(peer.to_canonical()));
            }
            LinkCommand::Shutdown => {}
        }
    }

    async fn submit(
        &mut self,
        peer: IpAddr,
        procedure: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<RequestId> {
        let peer = peer.to_canonical();
        let (id, payload) = encode_unique(&self.encoder, &self.queues, peer, procedure, params)?;
        let message = PendingMessage {
            id: id.clone(),
            payload,
        };
        match self.queues.submit(peer, message) {
            Ok(Submission::SendNow(message)) => self.transmit(peer, &message).await,
            Ok(Submission::Queued { position }) => {
                debug!(%peer, %id, procedure, position, "request queued");
            }
            Err(err) => {
                warn!(%peer, procedure, "message queue overflow");
                return Err(err);
            }
        }
        Ok(id)
    }

    async fn transmit(&self, peer: IpAddr, message: &PendingMessage) {
        // An IPv6 socket can only address IPv4 peers through mapped addresses.
        let addr = match peer {
            IpAddr::V4(v4) if self.local_is_ipv6 => IpAddr::V6(v4.to_ipv6_mapped()),
            other => other,
        };
        let target = SocketAddr::new(addr, self.peer_port);
        debug!(
            %target,
            id = %message.id,
            payload = %String::from_utf8_lossy(&message.payload),
            "send message"
        );
        if let Err(err) = self.transport.send_to(&message.payload, target).await {
            warn!(%target, id = %message.id, error = %err, "failed to send datagram");
        }
    }

    async fn handle_datagram(&mut self, from: SocketAddr, data: &[u8]) {
        let peer = from.ip().to_canonical();
        debug!(%from, len = data.len(), "datagram received");

        // Any traffic from the peer frees the slot, even if it does not decode.
        if let Some(next) = self.queues.on_peer_activity(peer) {
            self.transmit(peer, &next).await;
        }

        match codec::decode(data) {
            Ok(envelope) => match envelope.into_event(peer) {
                Some(event) => {
                    debug!(%peer, id = %event.request_id, procedure = %event.procedure, "reply received");
                    let _ = self.event_tx.send(event);
                }
                None => debug!(%peer, "datagram carries no result"),
            },
            Err(err) => warn!(%peer, error = %err, "dropping datagram"),
        }
    }
}

fn encode_unique(
    encoder: &Encoder,
    queues: &PeerQueues,
    peer: IpAddr,
    procedure: &str,
    params: Option<&Map<String, Value>>,
) -> Result<(RequestId, Vec<u8>)> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let (id, payload) = encoder.encode(procedure, params)?;
        if !queues.is_outstanding(peer, &id) {
            return Ok((id, payload));
        }
        debug!(%peer, %id, "request id collision, regenerating");
    }
    Err(WebboxError::Runtime(format!(
        "could not generate a unique request id for {peer}"
    )))
}

#[derive(Clone)]
pub struct WebboxHandle {
    cmd_tx: mpsc::Sender<LinkCommand>,
    event_tx: broadcast::Sender<CorrelationEvent>,
    connectivity_rx: watch::Receiver<bool>,
    local_addr: SocketAddr,
}

impl WebboxHandle {
    pub async fn start(config: &Config) -> Result<Self> {
        config.validate()?;
        let transport = UdpTransport::bind(config.bind_host(), config.local_port()).await?;
        Self::with_transport(Arc::new(transport), config)
    }

    pub fn with_transport(transport: Arc<dyn DatagramTransport>, config: &Config) -> Result<Self> {
        config.validate()?;
        let local_addr = transport.local_addr()?;
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_capacity());
        let (event_tx, _) = broadcast::channel(config.event_capacity());
        let (connectivity_tx, connectivity_rx) = watch::channel(true);

        let dispatcher = Dispatcher {
            transport,
            queues: PeerQueues::new(config.queue_capacity()),
            encoder: Encoder::new(config.request_id_length()),
            peer_port: config.peer_port(),
            local_is_ipv6: local_addr.is_ipv6(),
            event_tx: event_tx.clone(),
        };
        tokio::spawn(dispatcher.run(cmd_rx, connectivity_tx));

        Ok(Self {
            cmd_tx,
            event_tx,
            connectivity_rx,
            local_addr,
        })
    }

    /// A successful return does not mean the datagram arrived.
    pub async fn send_request(
        &self,
        peer: IpAddr,
        procedure: &str,
        params: Option<Map<String, Value>>,
    ) -> Result<RequestId> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(LinkCommand::SendRequest {
                peer,
                procedure: procedure.to_string(),
                params,
                respond_to: tx,
            })
            .await
            .map_err(|e| WebboxError::Runtime(e.to_string()))?;
        rx.await.map_err(|e| WebboxError::Runtime(e.to_string()))?
    }

    pub async fn call(
        &self,
        peer: IpAddr,
        procedure: &str,
        params: Option<Map<String, Value>>,
        timeout: Duration,
    ) -> Result<CorrelationEvent> {
        let peer = peer.to_canonical();
        let mut events = self.subscribe();
        let id = self.send_request(peer, procedure, params).await?;

        let wait = async {
            loop {
                match events.recv().await {
                    Ok(event) if event.peer == peer && event.request_id == id => return Ok(event),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "reply subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(WebboxError::Runtime("dispatcher stopped".to_string()));
                    }
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| WebboxError::Timeout(id.to_string()))?
    }

    pub async fn peer_status(&self, peer: IpAddr) -> Result<PeerStatus> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(LinkCommand::PeerStatus {
                peer,
                respond_to: tx,
            })
            .await
            .map_err(|e| WebboxError::Runtime(e.to_string()))?;
        rx.await.map_err(|e| WebboxError::Runtime(e.to_string()))
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.cmd_tx
            .send(LinkCommand::Shutdown)
            .await
            .map_err(|e| WebboxError::Runtime(e.to_string()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CorrelationEvent> {
        self.event_tx.subscribe()
    }

    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connectivity_rx.clone()
    }

    pub fn is_bound(&self) -> bool {
        *self.connectivity_rx.borrow()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
