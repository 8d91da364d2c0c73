//! Connection supervision and recording for SwingSense IMU peripherals.
//!
//! This crate keeps a link to one SwingSense swing sensor alive, decodes its
//! notifications and writes each recording the device starts and stops to a
//! numbered CSV file.
//!
//! # Features
//!
//! - **Device discovery**: match by vendor prefix, name or IMU service
//! - **Auto-reconnection**: bounded exponential backoff, quick rescans
//! - **Recording sessions**: `<base>/<base>_<N>.csv`, one line per sample, flushed per line
//! - **Undo**: delete the last recording from another thread and reuse its number
//! - **Events**: every state and session change on a broadcast channel
//! - **Mock transport**: drive the supervisor in tests without hardware
//!
//! # Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`discovery`] | [`AdvertisementFilter`] and [`find_target`] |
//! | [`transport`] | The [`Transport`] trait the supervisor drives |
//! | [`ble`] | btleplug implementation of [`Transport`] |
//! | [`session`] | [`SessionManager`] and the cross-thread [`SessionHandle`] |
//! | [`supervisor`] | The [`Supervisor`] state machine |
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use swingsense_core::{BleTransport, SessionManager, Supervisor, SupervisorConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(BleTransport::new().await?);
//!     let sessions = SessionManager::new(".", "swing");
//!     let undo = sessions.handle();
//!
//!     let mut supervisor = Supervisor::new(transport, sessions, SupervisorConfig::default())?;
//!     let shutdown = CancellationToken::new();
//!
//!     std::thread::spawn(move || {
//!         let _ = undo.undo_last();
//!     });
//!
//!     supervisor.run(shutdown).await;
//!     Ok(())
//! }
//! ```

pub mod ble;
pub mod discovery;
pub mod error;
pub mod events;
pub mod mock;
pub mod reconnect;
pub mod scan;
pub mod session;
pub mod supervisor;
pub mod transport;

// Core exports
pub use ble::{BleConnection, BleTransport, ConnectionConfig};
pub use discovery::{AdvertisementFilter, DeviceCandidate, find_target};
pub use error::{DeviceNotFoundReason, Error, ErrorCategory, Result, StorageAction};
pub use events::{EventReceiver, EventSender, SupervisorEvent};
pub use mock::{MockConnection, MockTransport};
pub use reconnect::{Backoff, ReconnectOptions};
pub use session::{
    RecordingSession, SessionHandle, SessionManager, SessionSnapshot, SessionStatus, UndoOutcome,
};
pub use supervisor::{ConnectionState, LinkStats, Supervisor, SupervisorConfig};
pub use transport::{FrameHandler, Transport};

// Re-export from swingsense-types
pub use swingsense_types::uuids;
pub use swingsense_types::{ControlFrame, Frame, SampleRecord};
