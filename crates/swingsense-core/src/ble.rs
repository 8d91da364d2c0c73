//! btleplug implementation of [`Transport`].
//!
//! Link liveness is tracked in an atomic flag per connection so that
//! [`Transport::is_connected`] never has to await the stack. The flag is
//! cleared when the adapter reports the peripheral disconnected, when the
//! notification stream ends, or on [`Transport::disconnect`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Characteristic, Peripheral as _};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::discovery::{AdvertisementFilter, DeviceCandidate};
use crate::error::{Error, Result};
use crate::scan::{get_adapter, scan_for_target};
use crate::transport::{FrameHandler, Transport};

/// Timeouts for establishing a link.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for the BLE connect call.
    pub connection_timeout: Duration,
    /// Timeout for GATT service discovery.
    pub discovery_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(15),
            discovery_timeout: Duration::from_secs(10),
        }
    }
}

impl ConnectionConfig {
    /// Set the connection timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Validate the config and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.connection_timeout.is_zero() {
            return Err(Error::invalid_config("connection_timeout must be > 0"));
        }
        if self.discovery_timeout.is_zero() {
            return Err(Error::invalid_config("discovery_timeout must be > 0"));
        }
        Ok(())
    }
}

/// A connected peripheral.
pub struct BleConnection {
    peripheral: Peripheral,
    id: String,
    connected: Arc<AtomicBool>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for BleConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleConnection")
            .field("id", &self.id)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl BleConnection {
    /// Identifier of the connected peripheral.
    pub fn id(&self) -> &str {
        &self.id
    }

    fn track(&self, handle: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(handle);
    }

    fn abort_tasks(&self) {
        let tasks = std::mem::take(
            &mut *self
                .tasks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        for task in tasks {
            task.abort();
        }
    }

    fn find_characteristic(&self, uuid: Uuid) -> Result<Characteristic> {
        let services = self.peripheral.services();
        services
            .iter()
            .flat_map(|service| service.characteristics.iter())
            .find(|c| c.uuid == uuid)
            .cloned()
            .ok_or_else(|| Error::characteristic_not_found(uuid.to_string(), services.len()))
    }
}

impl Drop for BleConnection {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// Transport over the first local Bluetooth adapter.
pub struct BleTransport {
    adapter: Adapter,
    config: ConnectionConfig,
    peripherals: Mutex<HashMap<String, Peripheral>>,
}

impl std::fmt::Debug for BleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleTransport")
            .field("config", &self.config)
            .finish()
    }
}

impl BleTransport {
    /// Open the first available adapter with default timeouts.
    pub async fn new() -> Result<Self> {
        Self::with_config(ConnectionConfig::default()).await
    }

    /// Open the first available adapter.
    pub async fn with_config(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        let adapter = get_adapter().await?;
        Ok(Self::with_adapter(adapter, config))
    }

    /// Use a specific adapter.
    pub fn with_adapter(adapter: Adapter, config: ConnectionConfig) -> Self {
        Self {
            adapter,
            config,
            peripherals: Mutex::new(HashMap::new()),
        }
    }

    async fn watch_disconnect(&self, connection: &BleConnection) -> Result<()> {
        let mut events = self.adapter.events().await?;
        let peripheral_id = connection.peripheral.id();
        let connected = Arc::clone(&connection.connected);

        connection.track(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(id) = event
                    && id == peripheral_id
                {
                    debug!("Adapter reported disconnect");
                    connected.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }));
        Ok(())
    }
}

#[async_trait]
impl Transport for BleTransport {
    type Connection = BleConnection;

    async fn scan(
        &self,
        filter: &AdvertisementFilter,
        timeout: Duration,
    ) -> Result<Option<DeviceCandidate>> {
        let Some((peripheral, candidate)) = scan_for_target(&self.adapter, filter, timeout).await?
        else {
            return Ok(None);
        };
        self.peripherals
            .lock()
            .await
            .insert(candidate.id.clone(), peripheral);
        Ok(Some(candidate))
    }

    #[tracing::instrument(level = "info", skip_all, fields(id = %candidate.id))]
    async fn connect(&self, candidate: &DeviceCandidate) -> Result<BleConnection> {
        let peripheral = self
            .peripherals
            .lock()
            .await
            .remove(&candidate.id)
            .ok_or_else(|| Error::device_not_found(candidate.id.clone()))?;

        info!("Connecting to device...");
        timeout(self.config.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| Error::timeout("connect to device", self.config.connection_timeout))??;

        debug!("Discovering services...");
        let discovered = timeout(self.config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| Error::timeout("discover services", self.config.discovery_timeout))
            .and_then(|r| r.map_err(Error::from));
        if let Err(e) = discovered {
            let _ = peripheral.disconnect().await;
            return Err(e);
        }
        debug!("Found {} services", peripheral.services().len());

        let connection = BleConnection {
            peripheral,
            id: candidate.id.clone(),
            connected: Arc::new(AtomicBool::new(true)),
            tasks: std::sync::Mutex::new(Vec::new()),
        };
        if let Err(e) = self.watch_disconnect(&connection).await {
            warn!("Cannot watch adapter events: {}", e);
        }
        Ok(connection)
    }

    #[tracing::instrument(level = "info", skip_all, fields(id = %connection.id, channel = %channel))]
    async fn subscribe(
        &self,
        connection: &BleConnection,
        channel: Uuid,
        on_frame: FrameHandler,
    ) -> Result<()> {
        let characteristic = connection.find_characteristic(channel)?;
        connection.peripheral.subscribe(&characteristic).await?;

        let mut stream = connection.peripheral.notifications().await?;
        let connected = Arc::clone(&connection.connected);
        connection.track(tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == channel {
                    on_frame(&notification.value);
                }
            }
            debug!("Notification stream ended");
            connected.store(false, Ordering::SeqCst);
        }));

        info!("Subscribed to notifications");
        Ok(())
    }

    fn is_connected(&self, connection: &BleConnection) -> bool {
        connection.connected.load(Ordering::SeqCst)
    }

    async fn unsubscribe(&self, connection: &BleConnection, channel: Uuid) {
        let result = match connection.find_characteristic(channel) {
            Ok(characteristic) => connection
                .peripheral
                .unsubscribe(&characteristic)
                .await
                .map_err(Error::from),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            debug!("Unsubscribe failed: {}", e);
        }
    }

    async fn disconnect(&self, connection: &BleConnection) {
        connection.connected.store(false, Ordering::SeqCst);
        connection.abort_tasks();
        if let Err(e) = connection.peripheral.disconnect().await {
            debug!("Disconnect failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.connection_timeout, Duration::from_secs(15));
        assert_eq!(config.discovery_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_connection_config_builder() {
        let config = ConnectionConfig::default()
            .connection_timeout(Duration::from_secs(30))
            .discovery_timeout(Duration::from_secs(5));
        assert_eq!(config.connection_timeout, Duration::from_secs(30));
        assert_eq!(config.discovery_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_connection_config_validation() {
        assert!(ConnectionConfig::default().validate().is_ok());

        let config = ConnectionConfig::default().connection_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = ConnectionConfig::default().discovery_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
