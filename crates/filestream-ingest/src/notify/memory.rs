use super::{Channel, Publisher};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// A message captured by [`MemoryPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub channel: Channel,
    pub payload: Vec<u8>,
    pub file_name: String,
}

impl PublishedMessage {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Publisher that keeps every message in memory.
#[derive(Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
    failing: AtomicBool,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().clone()
    }

    pub fn on(&self, channel: Channel) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.channel == channel)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, channel: Channel, payload: Vec<u8>, file_name: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Publish("notification bus unavailable".to_string()));
        }
        self.messages.lock().push(PublishedMessage {
            channel,
            payload,
            file_name: file_name.to_string(),
        });
        Ok(())
    }
}
