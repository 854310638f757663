use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebboxError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("message queue for {0} is full")]
    QueueFull(std::net::IpAddr),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),
    #[error("incomplete envelope: {0}")]
    IncompleteEnvelope(String),
    #[error("timed out waiting for reply to {0}")]
    Timeout(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, WebboxError>;
