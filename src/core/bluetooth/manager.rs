//! Bluetooth manager
//! This module provides the main interface for bluetooth operations

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::core::bluetooth::codec;
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::events::{EventEmitter, SessionEvent};
use crate::core::bluetooth::permissions::PermissionGate;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::session::SessionStore;
use crate::core::bluetooth::transport::TransportBinding;
use crate::core::bluetooth::types::{
    CharacteristicValue, ConnectionState, DiscoveredDevice, SelectedSession, ServiceRef,
};

/// Manages Bluetooth operations
pub struct BluetoothManager {
    /// The binding every radio operation goes through
    transport: Arc<dyn TransportBinding>,
    /// Discovered devices and the selected session
    store: SessionStore,
    /// Bluetooth scanner
    scanner: BluetoothScanner,
    permissions: PermissionGate,
    events: EventEmitter,
    config: AppConfig,
    opened: bool,
}

impl BluetoothManager {
    /// Creates a new BluetoothManager over `transport`. Call [`start`](Self::start) before scanning.
    pub fn new(
        transport: Arc<dyn TransportBinding>,
        permissions: PermissionGate,
        config: AppConfig,
    ) -> Self {
        let events = EventEmitter::new();
        let store = SessionStore::new(
            transport.clone(),
            events.clone(),
            config.transport.release_after_discovery,
        );
        let scanner = BluetoothScanner::new(transport.clone(), store.clone(), events.clone());

        Self {
            transport,
            store,
            scanner,
            permissions,
            events,
            config,
            opened: false,
        }
    }

    /// Enables the adapter and initialises the binding.
    pub async fn start(&mut self) -> Result<(), BleError> {
        if self.opened {
            return Ok(());
        }
        self.transport.open().await.map_err(|e| {
            error!("Bluetooth is required to scan: {}", e);
            match e {
                BleError::AdapterUnavailable(_) => e,
                other => BleError::AdapterUnavailable(other.to_string()),
            }
        })?;
        self.opened = true;
        info!("Bluetooth module initialized.");
        Ok(())
    }

    /// Stops scanning, forgets the session and releases the binding.
    pub async fn shutdown(&mut self) -> Result<(), BleError> {
        self.scanner.stop_scan().await;
        if let Err(e) = self.clear_selection().await {
            warn!("Failed to release the selection: {}", e);
        }
        self.store.reset();
        if self.opened {
            self.transport.close().await?;
            self.opened = false;
            info!("Bluetooth module closed.");
        }
        Ok(())
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Requests permissions, then scans with the configured filter and duration.
    pub async fn start_scan(&mut self) -> Result<(), BleError> {
        let filter = self.config.scan.filter_uuids()?;
        let duration = Duration::from_secs(self.config.scan.duration_secs);
        self.start_scan_with(filter, duration).await
    }

    pub async fn start_scan_with(&mut self, filter: Vec<Uuid>, duration: Duration) -> Result<(), BleError> {
        if !self.permissions.request_permissions().await? {
            warn!("Scan not started: permission denied.");
            return Err(BleError::PermissionDenied);
        }
        self.start().await?;
        self.scanner.start_scan(filter, duration).await;
        Ok(())
    }

    pub async fn stop_scan(&mut self) {
        self.scanner.stop_scan().await;
    }

    /// Waits for the current scan to run its course and returns the device list.
    pub async fn wait_for_scan(&mut self) -> Vec<DiscoveredDevice> {
        self.scanner.wait().await;
        self.store.discovered()
    }

    pub fn is_scanning(&self) -> bool {
        self.scanner.is_scanning()
    }

    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        self.store.discovered()
    }

    /// Scans until `device_id` shows up or the scan ends, then stops scanning.
    pub async fn find_device(&mut self, device_id: &str) -> Result<DiscoveredDevice, BleError> {
        if let Some(device) = self.store.device(device_id) {
            return Ok(device);
        }

        let mut events = self.events.subscribe();
        self.start_scan().await?;
        let mut scan_error = None;
        loop {
            match events.recv().await {
                Ok(SessionEvent::DeviceFound(device)) if device.id == device_id => {
                    self.stop_scan().await;
                    return Ok(device);
                }
                Ok(SessionEvent::ScanFailed { message }) => scan_error = Some(message),
                Ok(SessionEvent::ScanComplete) | Err(RecvError::Closed) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => debug!("Skipped {} session events", skipped),
            }
        }
        self.scanner.wait().await;

        // the device may have been recorded while we lagged behind
        if let Some(device) = self.store.device(device_id) {
            return Ok(device);
        }
        Err(match scan_error {
            Some(message) => BleError::Scan(message),
            None => BleError::UnknownDevice(device_id.to_string()),
        })
    }

    /// Connects to a device and discovers its GATT tree, releasing the
    /// previously selected device first.
    pub async fn select_device(&mut self, device_id: &str) -> Result<SelectedSession, BleError> {
        if self.scanner.is_scanning() {
            self.scanner.stop_scan().await;
        }
        if let Err(e) = self.clear_selection().await {
            warn!("Failed to release the previous selection: {}", e);
        }
        self.store.select_device(device_id).await
    }

    pub fn selected(&self) -> Option<SelectedSession> {
        self.store.selected()
    }

    /// Returns to the device list, dropping a connection kept from discovery.
    pub async fn clear_selection(&mut self) -> Result<(), BleError> {
        if let Some(session) = self.store.clear_selection() {
            let id = session.device.id;
            if self.store.connection_state(&id) == Some(ConnectionState::Connected) {
                self.transport.disconnect(&id).await?;
                self.store.set_connection_state(&id, ConnectionState::Disconnected);
            }
        }
        Ok(())
    }

    /// Reads a characteristic.
    ///
    /// Reuses a connection kept from discovery, otherwise connects and
    /// disconnects around the read. Failures are not retried.
    pub async fn read(
        &self,
        service: &ServiceRef,
        characteristic_uuid: Uuid,
    ) -> Result<CharacteristicValue, BleError> {
        let transport = self.transport.clone();
        let service_uuid = service.uuid;
        self.with_connection(&service.device_id, |device_id| async move {
            transport
                .read_characteristic(&device_id, service_uuid, characteristic_uuid)
                .await
        })
        .await
        .inspect(|value| info!("Read {} from {}", value.value, characteristic_uuid))
        .inspect_err(|e| error!("Read of {} failed: {}", characteristic_uuid, e))
    }

    /// Writes `payload`, with response unless the characteristic only
    /// accepts unacknowledged writes.
    pub async fn write(
        &self,
        service: &ServiceRef,
        characteristic_uuid: Uuid,
        payload: &[u8],
    ) -> Result<CharacteristicValue, BleError> {
        let with_response = self
            .store
            .selected()
            .and_then(|session| {
                session
                    .find_characteristic(service.uuid, characteristic_uuid)
                    .map(|chr| chr.properties.prefers_write_with_response())
            })
            .unwrap_or(true);

        let transport = self.transport.clone();
        let service_uuid = service.uuid;
        let encoded = codec::encode(payload);
        self.with_connection(&service.device_id, |device_id| async move {
            transport
                .write_characteristic(
                    &device_id,
                    service_uuid,
                    characteristic_uuid,
                    &encoded,
                    with_response,
                )
                .await
        })
        .await
        .inspect(|value| info!("Wrote {} to {}", value.value, characteristic_uuid))
        .inspect_err(|e| error!("Write to {} failed: {}", characteristic_uuid, e))
    }

    /// Reads and patches the new value into the selected session.
    pub async fn read_value(
        &self,
        service: &ServiceRef,
        characteristic_uuid: Uuid,
    ) -> Result<CharacteristicValue, BleError> {
        let value = self.read(service, characteristic_uuid).await?;
        let new_value = value.value.clone();
        self.store
            .apply_update(value.service_uuid, characteristic_uuid, move |mut chr| {
                chr.value = Some(new_value);
                chr.message = None;
                chr
            })
            .inspect_err(|e| warn!("Read value could not be cached: {}", e))?;
        Ok(value)
    }

    /// Writes and records the value and a `Wrote Value:` message in the selected session.
    pub async fn write_value(
        &self,
        service: &ServiceRef,
        characteristic_uuid: Uuid,
        payload: &[u8],
    ) -> Result<CharacteristicValue, BleError> {
        let value = self.write(service, characteristic_uuid, payload).await?;
        let message = format!("Wrote Value: {}", codec::to_text(payload));
        let new_value = value.value.clone();
        self.store
            .apply_update(value.service_uuid, characteristic_uuid, move |mut chr| {
                chr.value = Some(new_value);
                chr.message = Some(message);
                chr
            })
            .inspect_err(|e| warn!("Written value could not be cached: {}", e))?;
        Ok(value)
    }

    /// Runs `op` on a connected device, negotiating the MTU first.
    /// A connection opened here is closed again whether `op` succeeded or not.
    async fn with_connection<F, Fut, T>(&self, device_id: &str, op: F) -> Result<T, BleError>
    where
        F: FnOnce(String) -> Fut,
        Fut: std::future::Future<Output = Result<T, BleError>>,
    {
        let mtu = self.config.transport.mtu;
        let reuse = self.store.connection_state(device_id) == Some(ConnectionState::Connected);

        if !reuse {
            self.store.set_connection_state(device_id, ConnectionState::Connecting);
            let connected = async {
                self.transport.connect(device_id).await?;
                self.transport.discover_all(device_id).await
            }
            .await;
            if let Err(e) = connected {
                self.store.set_connection_state(device_id, ConnectionState::Failed);
                if let Err(e) = self.transport.disconnect(device_id).await {
                    debug!("Disconnect after failed connect: {}", e);
                }
                return Err(e.into_transport());
            }
            self.store.set_connection_state(device_id, ConnectionState::Connected);
            debug!("Connected to {}", device_id);
        }

        if let Some(mtu) = mtu {
            match self.transport.request_mtu(device_id, mtu).await {
                Ok(Some(granted)) => debug!("MTU for {} is {}", device_id, granted),
                Ok(None) => debug!("MTU negotiation is handled by the platform"),
                Err(e) => warn!("MTU request on {} failed: {}", device_id, e),
            }
        }

        let result = op(device_id.to_string()).await;

        if !reuse {
            match self.transport.disconnect(device_id).await {
                Ok(()) => self.store.set_connection_state(device_id, ConnectionState::Disconnected),
                Err(e) => warn!("Failed to disconnect {}: {}", device_id, e),
            }
        }

        result.map_err(BleError::into_transport)
    }
}
