//! Change events published by query bindings.
//!
//! Dependent views subscribe to a binding's events instead of threading
//! refresh callbacks through each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a binding instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BindingId(pub Uuid);

impl BindingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BindingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An event emitted by a binding after a refresh settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingEvent {
    pub binding_id: BindingId,
    pub timestamp: DateTime<Utc>,
    pub payload: BindingEventPayload,
}

impl BindingEvent {
    pub fn new(binding_id: BindingId, payload: BindingEventPayload) -> Self {
        Self {
            binding_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// What happened to the binding's cached result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event_type")]
pub enum BindingEventPayload {
    /// The cache was replaced with freshly fetched records.
    Refreshed { records: usize },
    /// The cache now holds an error marker.
    Failed { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_payload_tags() {
        let event = BindingEvent::new(BindingId::new(), BindingEventPayload::Refreshed { records: 3 });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"Refreshed\""));

        let back: BindingEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.binding_id, event.binding_id);
        assert_eq!(back.payload, BindingEventPayload::Refreshed { records: 3 });
    }
}
