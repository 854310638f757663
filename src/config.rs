use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, WebboxError};

pub const DEFAULT_PORT: u16 = 34268;
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_QUEUE_CAPACITY: usize = 40;
pub const DEFAULT_REQUEST_ID_LENGTH: usize = 14;
pub const MAX_REQUEST_ID_LENGTH: usize = 32;
pub const DEFAULT_EVENT_CAPACITY: usize = 256;
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;
// Id space must be this many times larger than the ids one peer can hold.
const ID_SPACE_HEADROOM: usize = 4;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub bind_host: Option<String>,
    pub local_port: Option<u16>,
    pub peer_port: Option<u16>,
    pub queue_capacity: Option<usize>,
    pub request_id_length: Option<usize>,
    pub event_capacity: Option<usize>,
    pub command_capacity: Option<usize>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| WebboxError::Config(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| WebboxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let id_length = self.request_id_length();
        if id_length == 0 || id_length > MAX_REQUEST_ID_LENGTH {
            return Err(WebboxError::Config(format!(
                "request_id_length must be between 1 and {MAX_REQUEST_ID_LENGTH}, got {id_length}"
            )));
        }
        let outstanding = self.queue_capacity().saturating_add(1);
        let required = outstanding.saturating_mul(ID_SPACE_HEADROOM);
        let id_space = 16usize.checked_pow(id_length as u32).unwrap_or(usize::MAX);
        if id_space < required {
            return Err(WebboxError::Config(format!(
                "request_id_length {id_length} gives {id_space} ids, too few for queue_capacity {}",
                self.queue_capacity()
            )));
        }
        if self.event_capacity() == 0 {
            return Err(WebboxError::Config(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        if self.command_capacity() == 0 {
            return Err(WebboxError::Config(
                "command_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_host(&self) -> &str {
        self.bind_host.as_deref().unwrap_or(DEFAULT_BIND_HOST)
    }

    pub fn local_port(&self) -> u16 {
        self.local_port.unwrap_or(DEFAULT_PORT)
    }

    pub fn peer_port(&self) -> u16 {
        self.peer_port.unwrap_or(DEFAULT_PORT)
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn request_id_length(&self) -> usize {
        self.request_id_length.unwrap_or(DEFAULT_REQUEST_ID_LENGTH)
    }

    pub fn event_capacity(&self) -> usize {
        self.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY)
    }

    pub fn command_capacity(&self) -> usize {
        self.command_capacity.unwrap_or(DEFAULT_COMMAND_CAPACITY)
    }
}
