//! Outcome notifications.
//!
//! Two logical channels, one per terminal outcome. Each message is a UTF-8
//! text payload plus a `file_name` attribute carrying the file identity so
//! subscribers can route or filter without parsing the body.
//!
//! - [`PubSubPublisher`] - Pub/Sub REST `:publish` over HTTP
//! - [`MemoryPublisher`] - records messages, for tests

mod memory;
mod pubsub;

pub use memory::{MemoryPublisher, PublishedMessage};
pub use pubsub::{PubSubConfig, PubSubPublisher};

use crate::Result;
use async_trait::async_trait;

/// Attribute key carrying the file identity on every message.
pub const FILE_NAME_ATTRIBUTE: &str = "file_name";

const SUCCESS_TOPIC: &str = "streaming_success_topic";
const ERROR_TOPIC: &str = "streaming_error_topic";

/// Which outcome channel a message goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Success,
    Error,
}

/// Fully-qualified topic names for both channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub success: String,
    pub error: String,
}

impl Topics {
    /// `projects/<project>/topics/streaming_{success,error}_topic`
    pub fn for_project(project: &str) -> Self {
        Self {
            success: format!("projects/{project}/topics/{SUCCESS_TOPIC}"),
            error: format!("projects/{project}/topics/{ERROR_TOPIC}"),
        }
    }

    pub fn topic(&self, channel: Channel) -> &str {
        match channel {
            Channel::Success => &self.success,
            Channel::Error => &self.error,
        }
    }
}

/// Publish-by-channel access to the notification bus.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `payload` on `channel` with `file_name` as routing attribute.
    ///
    /// Returning `Ok` only means the bus accepted the message.
    async fn publish(&self, channel: Channel, payload: Vec<u8>, file_name: &str) -> Result<()>;
}
