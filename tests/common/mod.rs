//! Scripted transport binding shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use ble_explorer_lib::core::bluetooth::codec;
use ble_explorer_lib::core::bluetooth::{
    BleError, BleResult, CharacteristicInfo, CharacteristicProperties, CharacteristicValue,
    DiscoveredDevice, ScanStream, ServiceRef, TransportBinding,
};
use futures_util::StreamExt;
use uuid::Uuid;

pub fn uuid(short: u32) -> Uuid {
    codec::from_short(short)
}

pub fn readable() -> CharacteristicProperties {
    CharacteristicProperties {
        readable: true,
        ..Default::default()
    }
}

#[derive(Default)]
pub struct FakeTransport {
    scan_events: Mutex<Vec<BleResult<DiscoveredDevice>>>,
    scan_error: Option<BleError>,
    /// device id -> services in the order the stack reports them
    services: HashMap<String, Vec<Uuid>>,
    /// (device id, service) -> characteristics
    characteristics: HashMap<(String, Uuid), Vec<(Uuid, CharacteristicProperties, Option<String>)>>,
    /// (service, characteristic) -> current value on the peripheral
    values: Mutex<HashMap<(Uuid, Uuid), Vec<u8>>>,
    unreachable: HashSet<String>,
    mtu_supported: bool,
    /// Keep the scan stream open after the scripted advertisements
    endless_scan: bool,
    connected: Mutex<HashSet<String>>,
    /// Every binding call, in order
    pub calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advertise(self, id: &str, services: &[Uuid]) -> Self {
        self.scan_events
            .lock()
            .unwrap()
            .push(Ok(DiscoveredDevice::new(id, Some(format!("device {}", id))).with_services(services.to_vec())));
        self
    }

    pub fn scan_fails(mut self, error: BleError) -> Self {
        self.scan_error = Some(error);
        self
    }

    pub fn scan_stream_fails(self, error: BleError) -> Self {
        self.scan_events.lock().unwrap().push(Err(error));
        self
    }

    pub fn service(mut self, device_id: &str, service: Uuid) -> Self {
        self.services
            .entry(device_id.to_string())
            .or_default()
            .push(service);
        self
    }

    pub fn characteristic(
        mut self,
        device_id: &str,
        service: Uuid,
        characteristic: Uuid,
        properties: CharacteristicProperties,
        value: Option<&str>,
    ) -> Self {
        self.characteristics
            .entry((device_id.to_string(), service))
            .or_default()
            .push((characteristic, properties, value.map(str::to_string)));
        self
    }

    pub fn value(self, service: Uuid, characteristic: Uuid, bytes: &[u8]) -> Self {
        self.values
            .lock()
            .unwrap()
            .insert((service, characteristic), bytes.to_vec());
        self
    }

    pub fn unreachable(mut self, device_id: &str) -> Self {
        self.unreachable.insert(device_id.to_string());
        self
    }

    pub fn endless_scan(mut self) -> Self {
        self.endless_scan = true;
        self
    }

    pub fn with_mtu(mut self) -> Self {
        self.mtu_supported = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn current_value(&self, service: Uuid, characteristic: Uuid) -> Option<Vec<u8>> {
        self.values
            .lock()
            .unwrap()
            .get(&(service, characteristic))
            .cloned()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn ensure_connected(&self, device_id: &str) -> BleResult<()> {
        if self.connected.lock().unwrap().contains(device_id) {
            Ok(())
        } else {
            Err(BleError::Transport(format!("{} is not connected", device_id)))
        }
    }
}

#[async_trait::async_trait]
impl TransportBinding for FakeTransport {
    async fn open(&self) -> BleResult<()> {
        self.record("open".into());
        Ok(())
    }

    async fn close(&self) -> BleResult<()> {
        self.record("close".into());
        self.connected.lock().unwrap().clear();
        Ok(())
    }

    async fn scan(&self, filter: &[Uuid]) -> BleResult<ScanStream> {
        self.record(format!("scan {:?}", filter));
        if let Some(e) = &self.scan_error {
            return Err(e.clone());
        }
        let events: Vec<_> = self.scan_events.lock().unwrap().drain(..).collect();
        let scripted = futures_util::stream::iter(events);
        if self.endless_scan {
            Ok(scripted.chain(futures_util::stream::pending()).boxed())
        } else {
            Ok(scripted.boxed())
        }
    }

    async fn connect(&self, device_id: &str) -> BleResult<()> {
        self.record(format!("connect {}", device_id));
        if self.unreachable.contains(device_id) {
            return Err(BleError::Connection("page timeout".into()));
        }
        self.connected.lock().unwrap().insert(device_id.to_string());
        Ok(())
    }

    async fn discover_all(&self, device_id: &str) -> BleResult<()> {
        self.record(format!("discover {}", device_id));
        self.ensure_connected(device_id)
    }

    async fn disconnect(&self, device_id: &str) -> BleResult<()> {
        self.record(format!("disconnect {}", device_id));
        self.connected.lock().unwrap().remove(device_id);
        Ok(())
    }

    async fn services(&self, device_id: &str) -> BleResult<Vec<ServiceRef>> {
        self.ensure_connected(device_id)?;
        Ok(self
            .services
            .get(device_id)
            .map(|uuids| {
                uuids
                    .iter()
                    .map(|uuid| ServiceRef::new(*uuid, device_id))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn characteristics(&self, service: &ServiceRef) -> BleResult<Vec<CharacteristicInfo>> {
        self.ensure_connected(&service.device_id)?;
        let key = (service.device_id.clone(), service.uuid);
        Ok(self
            .characteristics
            .get(&key)
            .map(|chars| {
                chars
                    .iter()
                    .map(|(uuid, properties, value)| {
                        let mut chr = CharacteristicInfo::new(*uuid, service.clone(), *properties);
                        chr.value = value.clone();
                        chr
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn read_characteristic(
        &self,
        device_id: &str,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> BleResult<CharacteristicValue> {
        self.record(format!("read {}", device_id));
        self.ensure_connected(device_id)?;
        let bytes = self
            .current_value(service_uuid, characteristic_uuid)
            .ok_or_else(|| BleError::Transport("read not permitted".into()))?;
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
        let kind = if with_response { "with-response" } else { "without-response" };
        self.record(format!("write {} {} {}", device_id, kind, value));
        self.ensure_connected(device_id)?;
        let bytes = codec::decode(value)?;
        self.values
            .lock()
            .unwrap()
            .insert((service_uuid, characteristic_uuid), bytes);
        Ok(CharacteristicValue {
            service_uuid,
            characteristic_uuid,
            value: value.to_string(),
        })
    }

    async fn request_mtu(&self, device_id: &str, mtu: u16) -> BleResult<Option<u16>> {
        self.record(format!("mtu {} {}", device_id, mtu));
        Ok(self.mtu_supported.then_some(mtu.min(247)))
    }
}
