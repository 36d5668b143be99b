//! Session events pushed to whoever renders the device list and GATT tree.

use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::core::bluetooth::constants::EVENT_CHANNEL_CAPACITY;
use crate::core::bluetooth::types::{ConnectionState, DiscoveredDevice};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SessionEvent {
    ScanStart,
    DeviceFound(DiscoveredDevice),
    ScanFailed { message: String },
    ScanComplete,
    DeviceState { id: String, state: ConnectionState },
    CharacteristicUpdated { service: Uuid, characteristic: Uuid },
}

/// Fan-out of [`SessionEvent`]s. Emitting with no subscriber is not an error.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventEmitter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.sender.send(event) {
            debug!("No listener for session event {:?}", e.0);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
