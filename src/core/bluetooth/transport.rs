//! The library call surface of the native Bluetooth stack.
//! Everything radio-facing goes through [`TransportBinding`], so the session
//! logic can run against a real adapter or a scripted fake.

use futures_util::stream::BoxStream;
use uuid::Uuid;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::types::{
    CharacteristicInfo, CharacteristicValue, DiscoveredDevice, ServiceRef,
};

pub type BleResult<T> = Result<T, BleError>;

/// One item per advertisement observed; the receiver deduplicates.
pub type ScanStream = BoxStream<'static, BleResult<DiscoveredDevice>>;

#[async_trait::async_trait]
pub trait TransportBinding: Send + Sync {
    /// Enables the adapter and initialises the binding.
    async fn open(&self) -> BleResult<()>;

    /// Releases the adapter and forgets every device handle.
    async fn close(&self) -> BleResult<()>;

    /// Starts scanning for peripherals advertising any of `filter` (all when empty).
    async fn scan(&self, filter: &[Uuid]) -> BleResult<ScanStream>;

    async fn connect(&self, device_id: &str) -> BleResult<()>;

    /// Discovers every service and characteristic of a connected device.
    async fn discover_all(&self, device_id: &str) -> BleResult<()>;

    async fn disconnect(&self, device_id: &str) -> BleResult<()>;

    async fn services(&self, device_id: &str) -> BleResult<Vec<ServiceRef>>;

    async fn characteristics(&self, service: &ServiceRef) -> BleResult<Vec<CharacteristicInfo>>;

    async fn read_characteristic(
        &self,
        device_id: &str,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> BleResult<CharacteristicValue>;

    /// Writes a base64 encoded `value`.
    async fn write_characteristic(
        &self,
        device_id: &str,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        value: &str,
        with_response: bool,
    ) -> BleResult<CharacteristicValue>;

    /// Asks for a larger MTU. `Ok(None)` when the binding negotiates it on its own.
    async fn request_mtu(&self, device_id: &str, mtu: u16) -> BleResult<Option<u16>> {
        let _ = (device_id, mtu);
        Ok(None)
    }
}
