//! In-memory broker backend
//!
//! Records every accepted publish so tests and the development server can
//! inspect what would have reached devices.

use async_trait::async_trait;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use crate::broker::{validate_publish_topic, MessageBroker, QoS};
use crate::error::{BridgeError, Result};

/// A message accepted by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub qos: QoS,
    pub payload: Vec<u8>,
}

/// In-memory message broker
#[derive(Debug, Default)]
pub struct MemoryBroker {
    messages: RwLock<Vec<PublishedMessage>>,
    fault: RwLock<Option<BridgeError>>,
}

impl MemoryBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next publish with `error`
    pub fn fail_next_publish(&self, error: BridgeError) {
        *write(&self.fault) = Some(error);
    }

    /// All accepted messages, oldest first
    pub fn published(&self) -> Vec<PublishedMessage> {
        read(&self.messages).clone()
    }

    /// Accepted messages for one topic
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        read(&self.messages)
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn publish(&self, topic: &str, qos: QoS, payload: Vec<u8>) -> Result<()> {
        if let Some(err) = write(&self.fault).take() {
            return Err(err);
        }
        validate_publish_topic(topic)?;

        info!(topic = %topic, qos = qos.level(), size = payload.len(), "Accepted publish");
        write(&self.messages).push(PublishedMessage {
            topic: topic.to_string(),
            qos,
            payload,
        });
        Ok(())
    }

    fn description(&self) -> &str {
        "in-memory message broker"
    }
}
