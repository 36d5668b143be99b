//! BLE explorer library
//! Scans for peripherals, browses their GATT tree and reads/writes
//! characteristic values through a pluggable transport binding.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod logging;
pub mod state;
pub mod utils;

pub use config::AppConfig;
pub use crate::core::bluetooth::{BleError, BluetoothManager, TransportBinding};
pub use state::AppState;
