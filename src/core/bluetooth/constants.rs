//! Constants used throughout the application
//! Standard UUIDs, default scan parameters and transport settings.

use uuid::Uuid;

/// Bluetooth base UUID `00000000-0000-1000-8000-00805f9b34fb`
pub const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Standard Bluetooth Service UUIDs
pub const UUID_GENERIC_ACCESS_SERVICE: Uuid = Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb);
pub const UUID_DEVICE_INFORMATION_SERVICE: Uuid = Uuid::from_u128(0x0000180a_0000_1000_8000_00805f9b34fb);
pub const UUID_BATTERY_SERVICE: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

/// Service advertised by the peripherals the explorer looks for by default
pub const DEFAULT_SCAN_SERVICE: &str = "ab25";

/// Scan duration in seconds
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 15;

/// MTU requested before each read/write
pub const DEFAULT_REQUESTED_MTU: u16 = 512;

/// Capacity of the session event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Returns a readable label for well-known services
pub fn service_label(uuid: &Uuid) -> &'static str {
    if *uuid == UUID_GENERIC_ACCESS_SERVICE {
        "Generic Access"
    } else if *uuid == UUID_DEVICE_INFORMATION_SERVICE {
        "Device Information"
    } else if *uuid == UUID_BATTERY_SERVICE {
        "Battery"
    } else {
        "Custom Service"
    }
}
