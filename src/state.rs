//! Application state management
//! This module defines and manages the application state shared by the commands.

use std::sync::Arc;

use log::info;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::core::bluetooth::{PermissionGate, TransportBinding};
use crate::core::BluetoothManager;

/// Application state
pub struct AppState {
    /// The Bluetooth manager instance
    pub bluetooth_manager: Arc<Mutex<BluetoothManager>>,
}

impl AppState {
    /// Creates the state over the native adapter
    #[cfg(feature = "native")]
    pub fn new(config: AppConfig) -> Self {
        use crate::core::bluetooth::BluestTransport;

        Self::with_transport(Arc::new(BluestTransport::new()), PermissionGate::default(), config)
    }

    /// Creates the state over any binding, e.g. a fake one in tests
    pub fn with_transport(
        transport: Arc<dyn TransportBinding>,
        permissions: PermissionGate,
        config: AppConfig,
    ) -> Self {
        info!("Initializing BluetoothManager...");
        let manager = BluetoothManager::new(transport, permissions, config);
        Self {
            bluetooth_manager: Arc::new(Mutex::new(manager)),
        }
    }

    /// Gets a reference to the Bluetooth manager
    pub fn get_bluetooth_manager_arc(&self) -> Arc<Mutex<BluetoothManager>> {
        self.bluetooth_manager.clone()
    }
}
