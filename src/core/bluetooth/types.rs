//! Defines shared data structures for the Bluetooth module.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::core::bluetooth::codec;
use crate::core::bluetooth::error::BleError;

/// Connection state tracked for every discovered device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    Discovered,
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

/// Represents a discovered Bluetooth device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredDevice {
    /// Platform-specific unique identifier for the device
    pub id: String,
    /// The advertised or cached name of the device, if available
    pub name: Option<String>,
    /// MAC address when the platform id embeds one
    pub address: Option<String>,
    /// Service UUIDs carried in the advertisement
    pub service_uuids: Vec<Uuid>,
    /// The signal strength (RSSI) of the last advertisement
    pub rssi: Option<i16>,
    pub state: ConnectionState,
}

impl DiscoveredDevice {
    /// Creates a new DiscoveredDevice in the `Discovered` state
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
            address: None,
            service_uuids: Vec::new(),
            rssi: None,
            state: ConnectionState::Discovered,
        }
    }

    pub fn with_services(mut self, service_uuids: Vec<Uuid>) -> Self {
        self.service_uuids = service_uuids;
        self
    }

    /// Only devices advertising at least one service are offered for connection.
    pub fn is_connectable(&self) -> bool {
        !self.service_uuids.is_empty()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("N/A")
    }
}

/// A GATT service together with the device that owns it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ServiceRef {
    pub uuid: Uuid,
    pub device_id: String,
}

impl ServiceRef {
    pub fn new(uuid: Uuid, device_id: impl Into<String>) -> Self {
        Self {
            uuid,
            device_id: device_id.into(),
        }
    }
}

/// Capability flags declared by a characteristic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CharacteristicProperties {
    pub readable: bool,
    pub writable_with_response: bool,
    pub writable_without_response: bool,
    pub notifiable: bool,
}

impl CharacteristicProperties {
    pub fn is_writable(&self) -> bool {
        self.writable_with_response || self.writable_without_response
    }

    /// Writes go with a response unless the characteristic only accepts unacknowledged writes.
    pub fn prefers_write_with_response(&self) -> bool {
        self.writable_with_response || !self.writable_without_response
    }

    /// Short labels such as `READ, WRITE`
    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.readable {
            labels.push("READ");
        }
        if self.is_writable() {
            labels.push("WRITE");
        }
        if self.notifiable {
            labels.push("NOTIFY");
        }
        labels
    }
}

/// A characteristic with its cached value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    pub service: ServiceRef,
    /// Last known value, base64 encoded as it crosses the transport
    pub value: Option<String>,
    pub properties: CharacteristicProperties,
    /// Transient status line, e.g. `Wrote Value: hello`
    pub message: Option<String>,
}

impl CharacteristicInfo {
    pub fn new(uuid: Uuid, service: ServiceRef, properties: CharacteristicProperties) -> Self {
        Self {
            uuid,
            service,
            value: None,
            properties,
            message: None,
        }
    }

    pub fn decoded_value(&self) -> Result<Vec<u8>, BleError> {
        match &self.value {
            Some(value) => codec::decode(value),
            None => Ok(Vec::new()),
        }
    }
}

/// One discovered service and its characteristics, in discovery order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDetail {
    pub service: ServiceRef,
    pub characteristics: Vec<CharacteristicInfo>,
}

/// The selected device and its GATT tree.
///
/// Service details are shared behind `Arc`s, so an updated session only
/// reallocates the detail that actually changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedSession {
    pub device: DiscoveredDevice,
    pub details: Vec<Arc<ServiceDetail>>,
}

impl SelectedSession {
    pub fn new(device: DiscoveredDevice, details: Vec<ServiceDetail>) -> Self {
        Self {
            device,
            details: details.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn find_characteristic(
        &self,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Option<&CharacteristicInfo> {
        self.details
            .iter()
            .find(|detail| detail.service.uuid == service_uuid)?
            .characteristics
            .iter()
            .find(|chr| chr.uuid == characteristic_uuid)
    }
}

/// Result of a read or write round trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacteristicValue {
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    /// Base64 encoded payload
    pub value: String,
}

impl CharacteristicValue {
    pub fn from_bytes(service_uuid: Uuid, characteristic_uuid: Uuid, bytes: &[u8]) -> Self {
        Self {
            service_uuid,
            characteristic_uuid,
            value: codec::encode(bytes),
        }
    }

    pub fn bytes(&self) -> Result<Vec<u8>, BleError> {
        codec::decode(&self.value)
    }
}
