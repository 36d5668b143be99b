//! Commands
//! This module defines all the commands that can be invoked from a front end.
//! Errors cross this boundary as plain strings.

use std::time::Duration;

use crate::core::BluetoothManager;
use crate::core::bluetooth::codec;
use crate::core::bluetooth::{CharacteristicInfo, DiscoveredDevice, SelectedSession, ServiceRef};
use crate::state::AppState;

/// Scans for Bluetooth devices and returns the deduplicated list
///
/// # Arguments
/// * `app_state` - The application state
/// * `duration_secs` - Scan duration, the configured one when `None`
/// * `filter` - Service UUIDs to filter on, the configured ones when `None`
pub async fn scan_devices(
    app_state: &AppState,
    duration_secs: Option<u64>,
    filter: Option<Vec<String>>,
) -> Result<Vec<DiscoveredDevice>, String> {
    let bluetooth_manager_arc = app_state.get_bluetooth_manager_arc();
    let mut bluetooth_manager_guard = bluetooth_manager_arc.lock().await;

    let scan_config = &bluetooth_manager_guard.config().scan;
    let duration = Duration::from_secs(duration_secs.unwrap_or(scan_config.duration_secs));
    let filter = match filter {
        Some(filter) => filter
            .iter()
            .map(|text| codec::parse_uuid(text))
            .collect::<Result<Vec<_>, _>>(),
        None => scan_config.filter_uuids(),
    }
    .map_err(|e| e.to_string())?;

    bluetooth_manager_guard
        .start_scan_with(filter, duration)
        .await
        .map_err(|e| e.to_string())?;
    Ok(bluetooth_manager_guard.wait_for_scan().await)
}

/// Connects to a device and returns its services and characteristics
///
/// # Arguments
/// * `app_state` - The application state
/// * `device_id` - The platform-specific identifier of the device
pub async fn inspect_device(app_state: &AppState, device_id: &str) -> Result<SelectedSession, String> {
    let bluetooth_manager_arc = app_state.get_bluetooth_manager_arc();
    let mut bluetooth_manager_guard = bluetooth_manager_arc.lock().await;

    select(&mut bluetooth_manager_guard, device_id).await
}

/// Reads a characteristic and returns its cached entry
pub async fn read_characteristic(
    app_state: &AppState,
    device_id: &str,
    service: &str,
    characteristic: &str,
) -> Result<CharacteristicInfo, String> {
    let bluetooth_manager_arc = app_state.get_bluetooth_manager_arc();
    let mut bluetooth_manager_guard = bluetooth_manager_arc.lock().await;

    let (service_ref, characteristic_uuid) = resolve(device_id, service, characteristic)?;
    select(&mut bluetooth_manager_guard, device_id).await?;

    bluetooth_manager_guard
        .read_value(&service_ref, characteristic_uuid)
        .await
        .map_err(|e| e.to_string())?;
    cached(&bluetooth_manager_guard, &service_ref, characteristic_uuid)
}

/// Writes `text` to a characteristic and returns its cached entry
pub async fn write_characteristic(
    app_state: &AppState,
    device_id: &str,
    service: &str,
    characteristic: &str,
    text: &str,
) -> Result<CharacteristicInfo, String> {
    let bluetooth_manager_arc = app_state.get_bluetooth_manager_arc();
    let mut bluetooth_manager_guard = bluetooth_manager_arc.lock().await;

    let (service_ref, characteristic_uuid) = resolve(device_id, service, characteristic)?;
    select(&mut bluetooth_manager_guard, device_id).await?;

    bluetooth_manager_guard
        .write_value(&service_ref, characteristic_uuid, text.as_bytes())
        .await
        .map_err(|e| e.to_string())?;
    cached(&bluetooth_manager_guard, &service_ref, characteristic_uuid)
}

/// Drops the selection and releases the adapter
pub async fn disconnect(app_state: &AppState) -> Result<(), String> {
    let bluetooth_manager_arc = app_state.get_bluetooth_manager_arc();
    let mut bluetooth_manager_guard = bluetooth_manager_arc.lock().await;

    bluetooth_manager_guard
        .clear_selection()
        .await
        .map_err(|e| e.to_string())?;
    bluetooth_manager_guard
        .shutdown()
        .await
        .map_err(|e| e.to_string())
}

fn resolve(
    device_id: &str,
    service: &str,
    characteristic: &str,
) -> Result<(ServiceRef, uuid::Uuid), String> {
    let service_uuid = codec::parse_uuid(service).map_err(|e| e.to_string())?;
    let characteristic_uuid = codec::parse_uuid(characteristic).map_err(|e| e.to_string())?;
    Ok((ServiceRef::new(service_uuid, device_id), characteristic_uuid))
}

/// Reuses the selected session when it belongs to `device_id`.
async fn select(manager: &mut BluetoothManager, device_id: &str) -> Result<SelectedSession, String> {
    if let Some(session) = manager.selected() {
        if session.device.id == device_id {
            return Ok(session);
        }
    }
    manager.find_device(device_id).await.map_err(|e| e.to_string())?;
    manager.select_device(device_id).await.map_err(|e| e.to_string())
}

fn cached(
    manager: &BluetoothManager,
    service: &ServiceRef,
    characteristic_uuid: uuid::Uuid,
) -> Result<CharacteristicInfo, String> {
    manager
        .selected()
        .and_then(|session| {
            session
                .find_characteristic(service.uuid, characteristic_uuid)
                .cloned()
        })
        .ok_or_else(|| format!("characteristic {} is not cached", characteristic_uuid))
}
