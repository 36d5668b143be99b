//! Session state: the discovered device list and the selected device's GATT tree.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use uuid::Uuid;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::events::{EventEmitter, SessionEvent};
use crate::core::bluetooth::resolver;
use crate::core::bluetooth::transport::TransportBinding;
use crate::core::bluetooth::types::{
    CharacteristicInfo, ConnectionState, DiscoveredDevice, SelectedSession, ServiceDetail,
};

#[derive(Debug, Default)]
struct SessionState {
    devices: Vec<DiscoveredDevice>,
    selected: Option<SelectedSession>,
}

/// Shared handle to the session state.
///
/// Clones refer to the same state, so the scan task and the manager see the
/// same device list. The lock is never held across an `.await`.
#[derive(Clone)]
pub struct SessionStore {
    transport: Arc<dyn TransportBinding>,
    events: EventEmitter,
    state: Arc<Mutex<SessionState>>,
    release_after_discovery: bool,
}

impl SessionStore {
    pub fn new(
        transport: Arc<dyn TransportBinding>,
        events: EventEmitter,
        release_after_discovery: bool,
    ) -> Self {
        Self {
            transport,
            events,
            state: Arc::new(Mutex::new(SessionState::default())),
            release_after_discovery,
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts `device` unless a device with the same id is already known.
    /// Returns whether it was inserted; the first-seen entry is kept.
    pub fn record_discovered(&self, device: DiscoveredDevice) -> bool {
        let mut state = self.state();
        if state.devices.iter().any(|known| known.id == device.id) {
            return false;
        }
        debug!("Recording device {} ({})", device.id, device.display_name());
        state.devices.push(device);
        true
    }

    pub fn discovered(&self) -> Vec<DiscoveredDevice> {
        self.state().devices.clone()
    }

    pub fn device(&self, device_id: &str) -> Option<DiscoveredDevice> {
        self.state()
            .devices
            .iter()
            .find(|device| device.id == device_id)
            .cloned()
    }

    pub fn connection_state(&self, device_id: &str) -> Option<ConnectionState> {
        self.device(device_id).map(|device| device.state)
    }

    pub fn set_connection_state(&self, device_id: &str, new_state: ConnectionState) {
        {
            let mut state = self.state();
            if let Some(device) = state.devices.iter_mut().find(|d| d.id == device_id) {
                device.state = new_state;
            }
            if let Some(selected) = state.selected.as_mut() {
                if selected.device.id == device_id {
                    selected.device.state = new_state;
                }
            }
        }
        self.events.emit(SessionEvent::DeviceState {
            id: device_id.to_string(),
            state: new_state,
        });
    }

    /// Forgets the discovered devices, keeping any selection.
    pub fn clear_devices(&self) {
        self.state().devices.clear();
    }

    pub fn selected(&self) -> Option<SelectedSession> {
        self.state().selected.clone()
    }

    /// Connects to the device, discovers its GATT tree and makes it the
    /// selected session. On failure the device is marked `Failed` and no
    /// device is selected.
    pub async fn select_device(&self, device_id: &str) -> Result<SelectedSession, BleError> {
        let device = self
            .device(device_id)
            .ok_or_else(|| BleError::UnknownDevice(device_id.to_string()))?;

        info!("Selecting device {} ({})", device.id, device.display_name());
        self.set_connection_state(device_id, ConnectionState::Connecting);

        let details = match self.discover_details(device_id).await {
            Ok(details) => details,
            Err(e) => {
                warn!("Discovery on {} failed: {}", device_id, e);
                self.state().selected = None;
                self.set_connection_state(device_id, ConnectionState::Failed);
                // best effort, the link may be half open
                if let Err(e) = self.transport.disconnect(device_id).await {
                    debug!("Disconnect after failed discovery: {}", e);
                }
                return Err(e.into_connection());
            }
        };

        let final_state = if self.release_after_discovery {
            match self.transport.disconnect(device_id).await {
                Ok(()) => ConnectionState::Disconnected,
                Err(e) => {
                    warn!("Failed to release {} after discovery: {}", device_id, e);
                    ConnectionState::Connected
                }
            }
        } else {
            ConnectionState::Connected
        };

        let mut device = device;
        device.state = final_state;
        let session = SelectedSession::new(device, details);
        info!(
            "Device {} selected with {} service(s)",
            device_id,
            session.details.len()
        );

        self.state().selected = Some(session.clone());
        self.set_connection_state(device_id, final_state);
        Ok(session)
    }

    async fn discover_details(&self, device_id: &str) -> Result<Vec<ServiceDetail>, BleError> {
        self.transport.connect(device_id).await?;
        self.transport.discover_all(device_id).await?;
        info!("Connected to {}, discovering services...", device_id);

        let mut seen = HashSet::new();
        let mut details = Vec::new();
        for service in self.transport.services(device_id).await? {
            // the stack may report a service more than once
            if !seen.insert(service.uuid) {
                debug!("Skipping duplicate service {}", service.uuid);
                continue;
            }
            let characteristics = self.transport.characteristics(&service).await?;
            debug!(
                "Service {} has {} characteristic(s)",
                service.uuid,
                characteristics.len()
            );
            details.push(ServiceDetail {
                service,
                characteristics,
            });
        }
        Ok(details)
    }

    /// Returns to the device list.
    pub fn clear_selection(&self) -> Option<SelectedSession> {
        let previous = self.state().selected.take();
        if let Some(session) = &previous {
            info!("Cleared selection of {}", session.device.id);
        }
        previous
    }

    /// Forgets everything, as after an app restart.
    pub fn reset(&self) {
        let mut state = self.state();
        state.devices.clear();
        state.selected = None;
    }

    /// Runs the update resolver against the selected session and stores the result.
    pub fn apply_update<F>(
        &self,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        updater: F,
    ) -> Result<SelectedSession, BleError>
    where
        F: FnOnce(CharacteristicInfo) -> CharacteristicInfo,
    {
        let updated = {
            let mut state = self.state();
            let current = state.selected.as_ref().ok_or(BleError::NoSelection)?;
            let updated =
                resolver::apply_update(current, service_uuid, characteristic_uuid, updater)?;
            state.selected = Some(updated.clone());
            updated
        };
        self.events.emit(SessionEvent::CharacteristicUpdated {
            service: service_uuid,
            characteristic: characteristic_uuid,
        });
        Ok(updated)
    }
}
