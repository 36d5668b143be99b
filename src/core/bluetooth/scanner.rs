use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::events::{EventEmitter, SessionEvent};
use crate::core::bluetooth::session::SessionStore;
use crate::core::bluetooth::transport::TransportBinding;

pub struct BluetoothScanner {
    transport: Arc<dyn TransportBinding>,
    store: SessionStore,
    events: EventEmitter,
    cancel_token: CancellationToken,
    scan_task_handle: Option<JoinHandle<()>>,
}

impl BluetoothScanner {
    pub fn new(transport: Arc<dyn TransportBinding>, store: SessionStore, events: EventEmitter) -> Self {
        Self {
            transport,
            store,
            events,
            cancel_token: CancellationToken::new(),
            scan_task_handle: None,
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scan_task_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Starts a scan task that records deduplicated devices into the store
    /// until `duration` elapses, the stream ends, or the scan is stopped.
    pub async fn start_scan(&mut self, filter: Vec<Uuid>, duration: Duration) {
        if self.scan_task_handle.is_some() {
            self.stop_scan().await;
        }
        // a new scan session starts from an empty list
        self.store.clear_devices();

        self.cancel_token = CancellationToken::new();
        let cancel_token_for_task = self.cancel_token.clone();
        let transport_for_task = self.transport.clone();
        let store_for_task = self.store.clone();
        let events_for_task = self.events.clone();

        let handle = tokio::spawn(async move {
            Self::internal_scan_task(
                transport_for_task,
                store_for_task,
                events_for_task,
                cancel_token_for_task,
                filter,
                duration,
            )
            .await;
        });
        self.scan_task_handle = Some(handle);

        self.events.emit(SessionEvent::ScanStart);
        info!("Device scan task started for {:?}.", duration);
    }

    async fn internal_scan_task(
        transport: Arc<dyn TransportBinding>,
        store: SessionStore,
        events: EventEmitter,
        cancel_token: CancellationToken,
        filter: Vec<Uuid>,
        duration: Duration,
    ) {
        info!("Starting bluetooth scan, filter: {:?}", filter);
        match transport.scan(&filter).await {
            Ok(mut scan_stream) => {
                let deadline = tokio::time::sleep(duration);
                tokio::pin!(deadline);

                loop {
                    tokio::select! {
                        result = scan_stream.next() => {
                            match result {
                                Some(Ok(device)) => {
                                    debug!("Found device - ID: {}, RSSI: {:?}", device.id, device.rssi);
                                    if store.record_discovered(device.clone()) {
                                        info!("Found device: ID: {}, Name: {}", device.id, device.display_name());
                                        events.emit(SessionEvent::DeviceFound(device));
                                    }
                                }
                                Some(Err(e)) => {
                                    error!("Bluetooth scan failed: {}", e);
                                    events.emit(SessionEvent::ScanFailed { message: e.to_string() });
                                    break;
                                }
                                None => {
                                    info!("Bluetooth scan stream has ended.");
                                    break;
                                }
                            }
                        }
                        _ = &mut deadline => {
                            info!("Scan duration elapsed.");
                            break;
                        }
                        _ = cancel_token.cancelled() => {
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to start scan: {}", e);
                events.emit(SessionEvent::ScanFailed {
                    message: e.to_string(),
                });
            }
        }

        events.emit(SessionEvent::ScanComplete);
    }

    pub async fn stop_scan(&mut self) {
        info!("Stopping Bluetooth scan.");
        self.cancel_token.cancel();
        self.wait().await;
    }

    /// Waits for the running scan task, if any, to finish.
    pub async fn wait(&mut self) {
        if let Some(handle) = self.scan_task_handle.take() {
            match handle.await {
                Ok(()) => info!("Scan task finished."),
                Err(e) if e.is_cancelled() => info!("Scan task was cancelled."),
                Err(e) => error!("Scan task finished with an unexpected join error: {:?}", e),
            }
        } else {
            debug!("No active scan task handle found to wait for.");
        }
    }
}
