//! Error taxonomy for Bluetooth operations.
//! Nothing here is retried automatically; every variant is surfaced to the caller.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BleError {
    /// The user or the OS refused Bluetooth/location access.
    #[error("permission denied: location access is required to scan")]
    PermissionDenied,

    /// The adapter could not be enabled or initialised.
    #[error("bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// Scanning failed at the transport level.
    #[error("scan failed: {0}")]
    Scan(String),

    /// Connecting to a device or discovering its services failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A read or write round trip failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The update resolver found no characteristic for the pair.
    #[error("characteristic {characteristic} not found in service {service}")]
    NotFound { service: Uuid, characteristic: Uuid },

    #[error("unknown device: {0}")]
    UnknownDevice(String),

    #[error("no device selected")]
    NoSelection,

    /// A value could not be decoded from its transport encoding.
    #[error("failed to decode value: {0}")]
    Decode(String),
}

impl BleError {
    /// Re-labels a binding failure as a connection failure.
    /// Errors that already carry a more specific meaning are kept.
    pub fn into_connection(self) -> Self {
        match self {
            Self::Transport(msg) | Self::Scan(msg) => Self::Connection(msg),
            other => other,
        }
    }

    /// Re-labels a binding failure as a read/write transport failure.
    pub fn into_transport(self) -> Self {
        match self {
            Self::Connection(msg) | Self::Scan(msg) => Self::Transport(msg),
            other => other,
        }
    }
}
