//! Publish/subscribe broker seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Delivery guarantee requested for a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QoS {
    /// Fire and forget
    AtMostOnce,
    /// Delivered one or more times once the publish is acknowledged
    AtLeastOnce,
}

impl QoS {
    /// Numeric QoS level on the wire
    pub fn level(&self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
        }
    }
}

/// Message broker accepting device-scoped publishes
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish a payload to a topic. `Ok` means the broker accepted it.
    async fn publish(&self, topic: &str, qos: QoS, payload: Vec<u8>) -> Result<()>;

    /// Get a description of this broker (for logging)
    fn description(&self) -> &str {
        "message broker"
    }
}

/// Validate a topic name for publishing
///
/// Wildcards are only meaningful in subscriptions.
pub fn validate_publish_topic(topic: &str) -> Result<()> {
    use crate::error::BridgeError;

    if topic.is_empty() {
        return Err(BridgeError::InvalidRequest("empty topic".into()));
    }
    if topic.contains(['+', '#']) {
        return Err(BridgeError::InvalidRequest(format!(
            "wildcards are not allowed in publish topics: {}",
            topic
        )));
    }
    Ok(())
}
