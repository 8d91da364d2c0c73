//! Wireless transport abstraction.
//!
//! This module provides the [`Transport`] trait the supervisor drives. It
//! abstracts over the btleplug stack ([`crate::ble::BleTransport`]) and the
//! scripted transport used in tests ([`crate::mock::MockTransport`]).

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::discovery::{AdvertisementFilter, DeviceCandidate};
use crate::error::Result;

/// Callback invoked with the raw payload of every notification.
pub type FrameHandler = Box<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// Capabilities the supervisor needs from a wireless stack.
///
/// # Example
///
/// ```ignore
/// use swingsense_core::{Transport, Result};
///
/// async fn probe<T: Transport>(transport: &T, conn: &T::Connection) -> bool {
///     transport.is_connected(conn)
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// An established link to one peripheral.
    type Connection: Send + Sync;

    /// Scan until an advertisement matches `filter` or `timeout` elapses.
    ///
    /// Returns `Ok(None)` on timeout.
    async fn scan(
        &self,
        filter: &AdvertisementFilter,
        timeout: Duration,
    ) -> Result<Option<DeviceCandidate>>;

    /// Connect to a candidate returned by [`scan`](Self::scan).
    async fn connect(&self, candidate: &DeviceCandidate) -> Result<Self::Connection>;

    /// Enable notifications on `channel` and deliver every payload to `on_frame`.
    ///
    /// Payloads are delivered in arrival order.
    async fn subscribe(
        &self,
        connection: &Self::Connection,
        channel: Uuid,
        on_frame: FrameHandler,
    ) -> Result<()>;

    /// Whether the link is still up. Must not block.
    fn is_connected(&self, connection: &Self::Connection) -> bool;

    /// Disable notifications on `channel`. Errors are swallowed.
    async fn unsubscribe(&self, connection: &Self::Connection, channel: Uuid);

    /// Drop the link. Errors are swallowed.
    async fn disconnect(&self, connection: &Self::Connection);
}
