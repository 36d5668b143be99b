//! Bluetooth functionality for the explorer
//! This module handles scanning, selecting a device, browsing its GATT
//! tree and reading/writing characteristic values.

pub mod codec;
pub mod constants;
mod error;
mod events;
mod manager;
mod permissions;
pub mod resolver;
mod scanner;
mod session;
mod transport;
mod types;

#[cfg(feature = "native")]
mod bluest_binding;

// Re-export types that should be publicly accessible
#[cfg(feature = "native")]
pub use bluest_binding::BluestTransport;
pub use error::BleError;
pub use events::{EventEmitter, SessionEvent};
pub use manager::BluetoothManager;
pub use permissions::{
    DesktopPermissions, Permission, PermissionGate, PermissionStatus, PlatformPermissions,
};
pub use scanner::BluetoothScanner;
pub use session::SessionStore;
pub use transport::{BleResult, ScanStream, TransportBinding};
pub use types::{
    CharacteristicInfo, CharacteristicProperties, CharacteristicValue, ConnectionState,
    DiscoveredDevice, SelectedSession, ServiceDetail, ServiceRef,
};
