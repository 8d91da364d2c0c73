//! Mock transport implementation for testing.
//!
//! This module provides a scripted transport that can be used for unit
//! testing the supervisor without requiring actual BLE hardware.
//!
//! # Features
//!
//! - **Visibility**: choose which advertisement, if any, scans will see
//! - **Failure injection**: fail scans, or a number of connects or subscribes
//! - **Notifications**: push raw payloads to the subscriber with [`MockTransport::emit`]
//! - **Link loss**: drop the current link with [`MockTransport::drop_link`]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use uuid::Uuid;

use crate::discovery::{AdvertisementFilter, DeviceCandidate};
use crate::error::{Error, Result};
use crate::transport::{FrameHandler, Transport};

/// Link handed out by [`MockTransport::connect`].
#[derive(Debug, Clone)]
pub struct MockConnection {
    /// Identifier of the connected candidate.
    pub id: String,
    generation: u64,
}

/// A scripted transport for testing.
///
/// # Example
///
/// ```
/// use swingsense_core::{AdvertisementFilter, MockTransport, Transport};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let transport = MockTransport::new();
///     let found = transport
///         .scan(&AdvertisementFilter::default(), Duration::from_secs(1))
///         .await
///         .unwrap();
///     assert!(found.is_some());
/// }
/// ```
pub struct MockTransport {
    visible: Mutex<Option<DeviceCandidate>>,
    scan_fails: AtomicBool,
    connect_failures: AtomicU32,
    subscribe_failures: AtomicU32,
    connected: AtomicBool,
    generation: AtomicU64,
    handler: Mutex<Option<(Uuid, FrameHandler)>>,
    scan_count: AtomicU32,
    connect_count: AtomicU32,
    subscribe_count: AtomicU32,
    unsubscribe_count: AtomicU32,
    disconnect_count: AtomicU32,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .field("connect_count", &self.connect_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a transport that sees one SwingSense peripheral.
    pub fn new() -> Self {
        let candidate = DeviceCandidate::new(format!(
            "MOCK-{:06X}",
            rand::random::<u32>() % 0xFFFFFF
        ))
        .with_name("SwingSense");
        Self::with_candidate(Some(candidate))
    }

    /// Create a transport whose scans see `candidate`, or nothing.
    pub fn with_candidate(candidate: Option<DeviceCandidate>) -> Self {
        Self {
            visible: Mutex::new(candidate),
            scan_fails: AtomicBool::new(false),
            connect_failures: AtomicU32::new(0),
            subscribe_failures: AtomicU32::new(0),
            connected: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            handler: Mutex::new(None),
            scan_count: AtomicU32::new(0),
            connect_count: AtomicU32::new(0),
            subscribe_count: AtomicU32::new(0),
            unsubscribe_count: AtomicU32::new(0),
            disconnect_count: AtomicU32::new(0),
        }
    }

    /// Change what scans see.
    pub fn set_visible(&self, candidate: Option<DeviceCandidate>) {
        *self.visible.lock().unwrap_or_else(PoisonError::into_inner) = candidate;
    }

    /// Make every scan return a transport error.
    pub fn set_scan_fails(&self, fail: bool) {
        self.scan_fails.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `count` connects.
    pub fn set_connect_failures(&self, count: u32) {
        self.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` subscribes.
    pub fn set_subscribe_failures(&self, count: u32) {
        self.subscribe_failures.store(count, Ordering::SeqCst);
    }

    /// Deliver a notification to the current subscriber.
    ///
    /// Returns `false` if no link is up or nothing is subscribed.
    pub fn emit(&self, data: &[u8]) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        let handler = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
        match handler.as_ref() {
            Some((_, on_frame)) => {
                on_frame(data);
                true
            }
            None => false,
        }
    }

    /// Simulate the peripheral going away.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Whether a link is up.
    pub fn is_link_up(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Number of scans started.
    pub fn scan_count(&self) -> u32 {
        self.scan_count.load(Ordering::SeqCst)
    }

    /// Number of connect attempts.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Number of subscribe attempts.
    pub fn subscribe_count(&self) -> u32 {
        self.subscribe_count.load(Ordering::SeqCst)
    }

    /// Number of unsubscribe calls.
    pub fn unsubscribe_count(&self) -> u32 {
        self.unsubscribe_count.load(Ordering::SeqCst)
    }

    /// Number of disconnect calls.
    pub fn disconnect_count(&self) -> u32 {
        self.disconnect_count.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn is_current(&self, connection: &MockConnection) -> bool {
        self.generation.load(Ordering::SeqCst) == connection.generation
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Connection = MockConnection;

    async fn scan(
        &self,
        filter: &AdvertisementFilter,
        timeout: Duration,
    ) -> Result<Option<DeviceCandidate>> {
        self.scan_count.fetch_add(1, Ordering::SeqCst);
        if self.scan_fails.load(Ordering::SeqCst) {
            return Err(Error::connection_failed(None, "mock scanner failure"));
        }

        let visible = self
            .visible
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match visible {
            Some(candidate) if filter.matches(&candidate) => Ok(Some(candidate)),
            _ => {
                sleep(timeout).await;
                Ok(None)
            }
        }
    }

    async fn connect(&self, candidate: &DeviceCandidate) -> Result<MockConnection> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.connect_failures) {
            return Err(Error::connection_failed(
                Some(candidate.id.clone()),
                "mock connect failure",
            ));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.connected.store(true, Ordering::SeqCst);
        Ok(MockConnection {
            id: candidate.id.clone(),
            generation,
        })
    }

    async fn subscribe(
        &self,
        connection: &MockConnection,
        channel: Uuid,
        on_frame: FrameHandler,
    ) -> Result<()> {
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        if !self.is_current(connection) || !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        if Self::take_failure(&self.subscribe_failures) {
            return Err(Error::characteristic_not_found(channel.to_string(), 1));
        }

        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some((channel, on_frame));
        Ok(())
    }

    fn is_connected(&self, connection: &MockConnection) -> bool {
        self.is_current(connection) && self.connected.load(Ordering::SeqCst)
    }

    async fn unsubscribe(&self, connection: &MockConnection, channel: Uuid) {
        self.unsubscribe_count.fetch_add(1, Ordering::SeqCst);
        if !self.is_current(connection) {
            return;
        }
        let mut handler = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(handler.as_ref(), Some((subscribed, _)) if *subscribed == channel) {
            handler.take();
        }
    }

    async fn disconnect(&self, connection: &MockConnection) {
        self.disconnect_count.fetch_add(1, Ordering::SeqCst);
        if self.is_current(connection) {
            self.drop_link();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;

    fn collector() -> (Arc<StdMutex<Vec<Vec<u8>>>>, FrameHandler) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: FrameHandler = Box::new(move |data: &[u8]| {
            sink.lock().unwrap().push(data.to_vec());
        });
        (seen, handler)
    }

    #[test]
    fn test_mock_candidate_identity() {
        let transport = MockTransport::new();
        let visible = transport.visible.lock().unwrap().clone().unwrap();
        assert!(visible.id.starts_with("MOCK-"));
        assert_eq!(visible.name.as_deref(), Some("SwingSense"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_respects_filter() {
        let transport =
            MockTransport::with_candidate(Some(DeviceCandidate::new("x").with_name("Polar H10")));
        let found = transport
            .scan(&AdvertisementFilter::default(), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(found.is_none());
        assert_eq!(transport.scan_count(), 1);
    }

    #[tokio::test]
    async fn test_scan_failure() {
        let transport = MockTransport::new();
        transport.set_scan_fails(true);
        let result = transport
            .scan(&AdvertisementFilter::default(), Duration::from_secs(1))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_transient_connect_failures() {
        let transport = MockTransport::new();
        transport.set_connect_failures(2);
        let candidate = DeviceCandidate::new("a");

        assert!(transport.connect(&candidate).await.is_err());
        assert!(transport.connect(&candidate).await.is_err());
        assert!(transport.connect(&candidate).await.is_ok());
        assert_eq!(transport.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_emit_and_drop_link() {
        let transport = MockTransport::new();
        let conn = transport.connect(&DeviceCandidate::new("a")).await.unwrap();
        let (seen, handler) = collector();
        let channel = Uuid::nil();
        transport.subscribe(&conn, channel, handler).await.unwrap();

        assert!(transport.emit(&[0x01]));
        assert!(transport.is_connected(&conn));
        assert_eq!(seen.lock().unwrap().as_slice(), &[vec![0x01]]);

        transport.drop_link();
        assert!(!transport.is_connected(&conn));
        assert!(!transport.emit(&[0x02]));
    }

    #[tokio::test]
    async fn test_stale_connection_is_not_connected() {
        let transport = MockTransport::new();
        let first = transport.connect(&DeviceCandidate::new("a")).await.unwrap();
        let second = transport.connect(&DeviceCandidate::new("a")).await.unwrap();
        assert!(!transport.is_connected(&first));
        assert!(transport.is_connected(&second));

        // Disconnecting a stale link leaves the current one alone.
        transport.disconnect(&first).await;
        assert!(transport.is_connected(&second));
    }

    #[tokio::test]
    async fn test_subscribe_failure() {
        let transport = MockTransport::new();
        transport.set_subscribe_failures(1);
        let conn = transport.connect(&DeviceCandidate::new("a")).await.unwrap();
        let (_seen, handler) = collector();
        let err = transport
            .subscribe(&conn, Uuid::nil(), handler)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CharacteristicNotFound { .. }));
    }
}
