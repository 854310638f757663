use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const PROTOCOL_VERSION: &str = "1.0";
pub const ENVELOPE_FORMAT: &str = "JSON";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate(length: usize) -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(length);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outbound call. Field order is the serialized key order.
#[derive(Debug, Serialize)]
pub struct RequestEnvelope<'a> {
    pub format: &'a str,
    pub id: &'a RequestId,
    pub params: &'a Map<String, Value>,
    pub proc: &'a str,
    pub version: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub version: String,
    pub id: RequestId,
    pub procedure: String,
    pub format: Option<String>,
    pub params: Option<Map<String, Value>>,
    pub result: Option<Map<String, Value>>,
}

impl Envelope {
    pub fn is_reply(&self) -> bool {
        self.result.is_some()
    }

    pub fn into_event(self, peer: IpAddr) -> Option<CorrelationEvent> {
        let result = self.result?;
        Some(CorrelationEvent {
            peer,
            request_id: self.id,
            procedure: self.procedure,
            result,
        })
    }
}

/// Emitted for every decoded reply. The core keeps no table of issued ids, so
/// subscribers must ignore replies whose `request_id` they did not issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationEvent {
    pub peer: IpAddr,
    pub request_id: RequestId,
    pub procedure: String,
    pub result: Map<String, Value>,
}
