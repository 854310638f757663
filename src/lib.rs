pub mod codec;
pub mod config;
pub mod domains;
pub mod error;
pub mod interfaces;
pub mod services;

pub use crate::config::Config;
pub use crate::domains::envelope::{CorrelationEvent, Envelope, RequestId};
pub use crate::error::{Result, WebboxError};
pub use crate::services::dispatcher::WebboxHandle;
pub use crate::services::queue::{PeerState, PeerStatus};
