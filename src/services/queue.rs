use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;

use serde::Serialize;

use crate::domains::envelope::RequestId;
use crate::error::{Result, WebboxError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerState {
    Idle,
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerStatus {
    pub state: PeerState,
    pub in_flight: Option<RequestId>,
    pub queued: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Submission {
    SendNow(PendingMessage),
    Queued { position: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub id: RequestId,
    pub payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct PeerQueue {
    in_flight: Option<RequestId>,
    pending: VecDeque<PendingMessage>,
}

#[derive(Debug)]
pub struct PeerQueues {
    capacity: usize,
    peers: HashMap<IpAddr, PeerQueue>,
}

impl PeerQueues {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            peers: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn submit(&mut self, peer: IpAddr, message: PendingMessage) -> Result<Submission> {
        let queue = self.peers.entry(peer).or_default();
        if queue.in_flight.is_none() {
            queue.in_flight = Some(message.id.clone());
            return Ok(Submission::SendNow(message));
        }
        if queue.pending.len() >= self.capacity {
            return Err(WebboxError::QueueFull(peer));
        }
        queue.pending.push_back(message);
        Ok(Submission::Queued {
            position: queue.pending.len(),
        })
    }

    pub fn on_peer_activity(&mut self, peer: IpAddr) -> Option<PendingMessage> {
        let queue = self.peers.get_mut(&peer)?;
        match queue.pending.pop_front() {
            Some(next) => {
                queue.in_flight = Some(next.id.clone());
                Some(next)
            }
            None => {
                queue.in_flight = None;
                None
            }
        }
    }

    pub fn is_outstanding(&self, peer: IpAddr, id: &RequestId) -> bool {
        self.peers.get(&peer).is_some_and(|queue| {
            queue.in_flight.as_ref() == Some(id)
                || queue.pending.iter().any(|pending| &pending.id == id)
        })
    }

    pub fn status(&self, peer: IpAddr) -> PeerStatus {
        match self.peers.get(&peer) {
            Some(queue) => PeerStatus {
                state: if queue.in_flight.is_some() {
                    PeerState::InFlight
                } else {
                    PeerState::Idle
                },
                in_flight: queue.in_flight.clone(),
                queued: queue.pending.len(),
            },
            None => PeerStatus {
                state: PeerState::Idle,
                in_flight: None,
                queued: 0,
            },
        }
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}
