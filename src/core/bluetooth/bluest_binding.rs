//! [`TransportBinding`] over the `bluest` crate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bluest::{Adapter, Characteristic, Device};
use futures_util::StreamExt;
use log::{debug, info, warn};
use regex::Regex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::transport::{BleResult, ScanStream, TransportBinding};
use crate::core::bluetooth::types::{
    CharacteristicInfo, CharacteristicProperties, CharacteristicValue, ConnectionState,
    DiscoveredDevice, ServiceRef,
};

type DeviceMap = Arc<Mutex<HashMap<String, Device>>>;

/// Native binding. Device handles come from scanning, so a device must be
/// seen by [`scan`](TransportBinding::scan) before it can be connected.
#[derive(Default)]
pub struct BluestTransport {
    adapter: Mutex<Option<Adapter>>,
    /// Map of device ids to device handles
    devices: DeviceMap,
    /// Parent of every running scan's token, cancelled on close
    scans: Mutex<CancellationToken>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BluestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn adapter(&self) -> BleResult<Adapter> {
        lock(&self.adapter)
            .clone()
            .ok_or_else(|| BleError::AdapterUnavailable("binding is not open".into()))
    }

    fn scan_token(&self) -> CancellationToken {
        lock(&self.scans).child_token()
    }

    fn device(&self, device_id: &str) -> BleResult<Device> {
        lock(&self.devices)
            .get(device_id)
            .cloned()
            .ok_or_else(|| BleError::UnknownDevice(device_id.to_string()))
    }

    async fn find_characteristic(
        &self,
        device_id: &str,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> BleResult<Characteristic> {
        let device = self.device(device_id)?;
        let services = device.services().await.map_err(transport_error)?;
        let service = services
            .into_iter()
            .find(|s| s.uuid() == service_uuid)
            .ok_or_else(|| BleError::Transport(format!("service not found: {}", service_uuid)))?;
        service
            .characteristics()
            .await
            .map_err(transport_error)?
            .into_iter()
            .find(|c| c.uuid() == characteristic_uuid)
            .ok_or_else(|| {
                BleError::Transport(format!("characteristic not found: {}", characteristic_uuid))
            })
    }

    fn extract_mac_address(device_id_str: &str) -> Option<String> {
        let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok()?;
        re.find_iter(device_id_str)
            .last()
            .map(|m| m.as_str().to_uppercase())
    }
}

fn transport_error(e: bluest::Error) -> BleError {
    BleError::Transport(e.to_string())
}

fn connection_error(e: bluest::Error) -> BleError {
    BleError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl TransportBinding for BluestTransport {
    async fn open(&self) -> BleResult<()> {
        if lock(&self.adapter).is_some() {
            return Ok(());
        }
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| BleError::AdapterUnavailable("no Bluetooth adapter found".into()))?;
        adapter
            .wait_available()
            .await
            .map_err(|e| BleError::AdapterUnavailable(e.to_string()))?;
        info!("Bluetooth adapter is available.");
        *lock(&self.adapter) = Some(adapter);
        Ok(())
    }

    async fn close(&self) -> BleResult<()> {
        std::mem::take(&mut *lock(&self.scans)).cancel();
        lock(&self.devices).clear();
        lock(&self.adapter).take();
        info!("Bluetooth adapter released.");
        Ok(())
    }

    async fn scan(&self, filter: &[Uuid]) -> BleResult<ScanStream> {
        let adapter = self.adapter()?;
        let devices = self.devices.clone();
        let filter = filter.to_vec();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = self.scan_token();

        // the bluest stream borrows the adapter, so it lives in its own task
        tokio::spawn(async move {
            let started = tokio::select! {
                started = adapter.scan(&filter) => started,
                _ = cancel.cancelled() => return,
            };
            let mut scan_stream = match started {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(Err(BleError::Scan(e.to_string())));
                    return;
                }
            };
            loop {
                let advertisement = tokio::select! {
                    next = scan_stream.next() => match next {
                        Some(advertisement) => advertisement,
                        None => break,
                    },
                    _ = tx.closed() => {
                        debug!("Scan receiver dropped, ending native scan.");
                        break;
                    }
                    _ = cancel.cancelled() => {
                        debug!("Binding closed, ending native scan.");
                        break;
                    }
                };
                let device = advertisement.device;
                let id = device.id().to_string();
                let discovered = DiscoveredDevice {
                    address: Self::extract_mac_address(&id),
                    name: advertisement
                        .adv_data
                        .local_name
                        .or_else(|| device.name().ok()),
                    service_uuids: advertisement.adv_data.services.iter().copied().collect(),
                    rssi: advertisement.rssi,
                    state: ConnectionState::Discovered,
                    id: id.clone(),
                };
                lock(&devices).insert(id, device);
                if tx.send(Ok(discovered)).is_err() {
                    break;
                }
            }
        });

        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }

    async fn connect(&self, device_id: &str) -> BleResult<()> {
        let adapter = self.adapter()?;
        let device = self.device(device_id)?;
        if !device.is_connected().await {
            info!("Initiating connection to {}...", device_id);
            adapter.connect_device(&device).await.map_err(connection_error)?;
        }
        Ok(())
    }

    async fn discover_all(&self, device_id: &str) -> BleResult<()> {
        let device = self.device(device_id)?;
        for service in device.discover_services().await.map_err(connection_error)? {
            service
                .discover_characteristics()
                .await
                .map_err(connection_error)?;
        }
        Ok(())
    }

    async fn disconnect(&self, device_id: &str) -> BleResult<()> {
        let adapter = self.adapter()?;
        let device = self.device(device_id)?;
        if device.is_connected().await {
            info!("Disconnecting from device {}", device_id);
            adapter.disconnect_device(&device).await.map_err(transport_error)?;
        } else {
            debug!("Device {} not connected", device_id);
        }
        Ok(())
    }

    async fn services(&self, device_id: &str) -> BleResult<Vec<ServiceRef>> {
        let device = self.device(device_id)?;
        let services = device.services().await.map_err(connection_error)?;
        Ok(services
            .iter()
            .map(|service| ServiceRef::new(service.uuid(), device_id))
            .collect())
    }

    async fn characteristics(&self, service: &ServiceRef) -> BleResult<Vec<CharacteristicInfo>> {
        let device = self.device(&service.device_id)?;
        let native_service = device
            .services()
            .await
            .map_err(connection_error)?
            .into_iter()
            .find(|s| s.uuid() == service.uuid)
            .ok_or_else(|| BleError::Connection(format!("service vanished: {}", service.uuid)))?;

        let mut characteristics = Vec::new();
        for chr in native_service.characteristics().await.map_err(connection_error)? {
            let properties = match chr.properties().await {
                Ok(props) => CharacteristicProperties {
                    readable: props.read,
                    writable_with_response: props.write,
                    writable_without_response: props.write_without_response,
                    notifiable: props.notify || props.indicate,
                },
                Err(e) => {
                    warn!("Could not read properties of {}: {}", chr.uuid(), e);
                    CharacteristicProperties::default()
                }
            };
            characteristics.push(CharacteristicInfo::new(chr.uuid(), service.clone(), properties));
        }
        Ok(characteristics)
    }

    async fn read_characteristic(
        &self,
        device_id: &str,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> BleResult<CharacteristicValue> {
        let chr = self
            .find_characteristic(device_id, service_uuid, characteristic_uuid)
            .await?;
        let bytes = chr.read().await.map_err(transport_error)?;
        Ok(CharacteristicValue::from_bytes(service_uuid, characteristic_uuid, &bytes))
    }

    async fn write_characteristic(
        &self,
        device_id: &str,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        value: &str,
        with_response: bool,
    ) -> BleResult<CharacteristicValue> {
        let chr = self
            .find_characteristic(device_id, service_uuid, characteristic_uuid)
            .await?;
        let bytes = crate::core::bluetooth::codec::decode(value)?;
        if with_response {
            chr.write(&bytes).await.map_err(transport_error)?;
        } else {
            chr.write_without_response(&bytes)
                .await
                .map_err(transport_error)?;
        }
        Ok(CharacteristicValue {
            service_uuid,
            characteristic_uuid,
            value: value.to_string(),
        })
    }

    // bluest negotiates the MTU with the OS; report what it settled on
    async fn request_mtu(&self, device_id: &str, mtu: u16) -> BleResult<Option<u16>> {
        let device = self.device(device_id)?;
        let Some(service) = device.services().await.map_err(transport_error)?.into_iter().next() else {
            return Ok(None);
        };
        let Some(chr) = service
            .characteristics()
            .await
            .map_err(transport_error)?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        let max_write = chr.max_write_len().map_err(transport_error)?;
        // ATT write header is 3 bytes
        let effective = u16::try_from(max_write + 3).unwrap_or(u16::MAX);
        debug!("Requested MTU {}, platform settled on {}", mtu, effective);
        Ok(Some(effective.min(mtu)))
    }
}
