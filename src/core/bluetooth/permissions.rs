//! Runtime permission gate run before a scan may start.

use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::core::bluetooth::error::BleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Permission {
    /// Fine location, required by the OS to see advertisements
    AccessFineLocation,
    BluetoothScan,
    BluetoothConnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
    NeverAskAgain,
}

/// Platform permission API
#[async_trait::async_trait]
pub trait PlatformPermissions: Send + Sync {
    /// Whether the platform asks the user for grants at runtime.
    fn requires_runtime_grants(&self) -> bool;

    async fn request(&self, permission: Permission) -> Result<PermissionStatus, BleError>;
}

/// Desktop stacks grant Bluetooth access at install time.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopPermissions;

#[async_trait::async_trait]
impl PlatformPermissions for DesktopPermissions {
    fn requires_runtime_grants(&self) -> bool {
        false
    }

    async fn request(&self, _permission: Permission) -> Result<PermissionStatus, BleError> {
        Ok(PermissionStatus::Granted)
    }
}

#[derive(Clone)]
pub struct PermissionGate {
    platform: Arc<dyn PlatformPermissions>,
}

impl PermissionGate {
    pub fn new(platform: Arc<dyn PlatformPermissions>) -> Self {
        Self { platform }
    }

    /// Requests location, then Bluetooth scan/connect.
    ///
    /// Resolves `true` iff location is granted; the Bluetooth grants are
    /// requested but their outcome is only logged. No retries.
    pub async fn request_permissions(&self) -> Result<bool, BleError> {
        if !self.platform.requires_runtime_grants() {
            return Ok(true);
        }

        let location = self
            .platform
            .request(Permission::AccessFineLocation)
            .await?;
        info!("Location permission: {:?}", location);

        for permission in [Permission::BluetoothScan, Permission::BluetoothConnect] {
            match self.platform.request(permission).await {
                Ok(PermissionStatus::Granted) => {}
                Ok(status) => warn!("{:?} permission: {:?}", permission, status),
                Err(e) => warn!("Failed to request {:?}: {}", permission, e),
            }
        }

        Ok(location == PermissionStatus::Granted)
    }
}

impl Default for PermissionGate {
    fn default() -> Self {
        Self::new(Arc::new(DesktopPermissions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Answers each permission from a fixed table and records the requests.
    struct ScriptedPlatform {
        location: PermissionStatus,
        bluetooth: Result<PermissionStatus, BleError>,
        requested: Mutex<Vec<Permission>>,
    }

    impl ScriptedPlatform {
        fn new(location: PermissionStatus, bluetooth: Result<PermissionStatus, BleError>) -> Arc<Self> {
            Arc::new(Self {
                location,
                bluetooth,
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl PlatformPermissions for ScriptedPlatform {
        fn requires_runtime_grants(&self) -> bool {
            true
        }

        async fn request(&self, permission: Permission) -> Result<PermissionStatus, BleError> {
            self.requested.lock().unwrap().push(permission);
            match permission {
                Permission::AccessFineLocation => Ok(self.location),
                _ => self.bluetooth.clone(),
            }
        }
    }

    #[tokio::test]
    async fn desktop_always_grants() {
        assert!(PermissionGate::default().request_permissions().await.unwrap());
    }

    #[tokio::test]
    async fn gated_on_location_only() {
        let cases = [
            (PermissionStatus::Granted, Ok(PermissionStatus::Granted), true),
            (PermissionStatus::Granted, Ok(PermissionStatus::Denied), true),
            (PermissionStatus::Granted, Err(BleError::PermissionDenied), true),
            (PermissionStatus::Denied, Ok(PermissionStatus::Granted), false),
            (PermissionStatus::NeverAskAgain, Ok(PermissionStatus::Granted), false),
        ];

        for (location, bluetooth, expected) in cases {
            let platform = ScriptedPlatform::new(location, bluetooth);
            let gate = PermissionGate::new(platform.clone());
            assert_eq!(gate.request_permissions().await.unwrap(), expected);
            assert_eq!(
                *platform.requested.lock().unwrap(),
                [
                    Permission::AccessFineLocation,
                    Permission::BluetoothScan,
                    Permission::BluetoothConnect
                ]
            );
        }
    }
}
