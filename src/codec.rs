use serde_json::{Map, Value};
use tracing::debug;

use crate::domains::envelope::{
    Envelope, RequestEnvelope, RequestId, ENVELOPE_FORMAT, PROTOCOL_VERSION,
};
use crate::error::{Result, WebboxError};

#[derive(Debug, Clone)]
pub struct Encoder {
    id_length: usize,
}

impl Encoder {
    pub fn new(id_length: usize) -> Self {
        Self { id_length }
    }

    pub fn encode(
        &self,
        procedure: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<(RequestId, Vec<u8>)> {
        let id = RequestId::generate(self.id_length);
        let bytes = encode_with_id(&id, procedure, params)?;
        Ok((id, bytes))
    }
}

pub fn encode_with_id(
    id: &RequestId,
    procedure: &str,
    params: Option<&Map<String, Value>>,
) -> Result<Vec<u8>> {
    let empty = Map::new();
    let envelope = RequestEnvelope {
        format: ENVELOPE_FORMAT,
        id,
        params: params.unwrap_or(&empty),
        proc: procedure,
        version: PROTOCOL_VERSION,
    };
    serde_json::to_vec(&envelope).map_err(|e| WebboxError::Serialization(e.to_string()))
}

pub fn strip_padding(data: &[u8]) -> Vec<u8> {
    data.iter().copied().filter(|byte| *byte != 0).collect()
}

pub fn decode(data: &[u8]) -> Result<Envelope> {
    let clean = strip_padding(data);
    debug!(payload = %String::from_utf8_lossy(&clean), "decoding datagram");

    let value: Value = serde_json::from_slice(&clean)
        .map_err(|e| WebboxError::MalformedPayload(e.to_string()))?;
    let Value::Object(mut map) = value else {
        return Err(WebboxError::MalformedPayload(
            "payload is not a JSON object".to_string(),
        ));
    };

    let version = match map.remove("version") {
        Some(Value::String(version)) if version == PROTOCOL_VERSION => version,
        Some(other) => return Err(WebboxError::UnsupportedVersion(other.to_string())),
        None => return Err(WebboxError::UnsupportedVersion("missing".to_string())),
    };

    let procedure = match map.remove("proc") {
        Some(Value::String(procedure)) => procedure,
        Some(other) => {
            return Err(WebboxError::MalformedPayload(format!(
                "proc is not a string: {other}"
            )))
        }
        None => return Err(WebboxError::IncompleteEnvelope("proc".to_string())),
    };

    let result = take_object(&mut map, "result")?;
    let params = take_object(&mut map, "params")?;
    if result.is_none() && params.is_none() {
        return Err(WebboxError::IncompleteEnvelope(
            "result or params".to_string(),
        ));
    }

    let id = match map.remove("id") {
        Some(Value::String(id)) => RequestId::from(id),
        _ => RequestId::default(),
    };
    let format = match map.remove("format") {
        Some(Value::String(format)) => Some(format),
        _ => None,
    };

    Ok(Envelope {
        version,
        id,
        procedure,
        format,
        params,
        result,
    })
}

fn take_object(map: &mut Map<String, Value>, key: &str) -> Result<Option<Map<String, Value>>> {
    match map.remove(key) {
        Some(Value::Object(object)) => Ok(Some(object)),
        Some(other) => Err(WebboxError::MalformedPayload(format!(
            "{key} is not an object: {other}"
        ))),
        None => Ok(None),
    }
}
