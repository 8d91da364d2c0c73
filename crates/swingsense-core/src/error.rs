//! Error types for swingsense-core.
//!
//! Errors fall into four categories, reported by [`Error::category`]:
//!
//! | Category | Variants | Handling |
//! |----------|----------|----------|
//! | [`ErrorCategory::Transport`] | `Bluetooth`, `DeviceNotFound`, `NotConnected`, `CharacteristicNotFound`, `ConnectionFailed`, `Timeout` | Logged; the supervisor backs off and rescans |
//! | [`ErrorCategory::Storage`] | `Storage`, `NothingToUndo` | Logged; the session degrades to "not recording", the stream continues |
//! | [`ErrorCategory::Config`] | `InvalidConfig` | Fix the configuration and restart |
//! | [`ErrorCategory::Cancelled`] | `Cancelled` | Shutdown in progress |
//!
//! Malformed notifications are not errors: the decoder returns
//! [`swingsense_types::Frame::Malformed`] and the supervisor logs and drops it.
//! Nothing in this crate terminates the process.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while supervising a SwingSense peripheral.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Device not found during scan or connection.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// Operation attempted while not connected to device.
    #[error("Not connected to device")]
    NotConnected,

    /// Required BLE characteristic not found on device.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// Connection failed with specific reason.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// The device identifier that failed to connect.
        device_id: Option<String>,
        /// The reason for the failure.
        reason: String,
    },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// A recording file operation failed.
    #[error("Failed to {action} {}: {source}", path.display())]
    Storage {
        /// What was being attempted.
        action: StorageAction,
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Undo was requested but no closed recording is pending, or its file is gone.
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Reason why a device was not found.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// A scan candidate is no longer known to the adapter.
    NotFound { identifier: String },
    /// No Bluetooth adapter available.
    NoAdapter,
}

impl fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { identifier } => write!(f, "device '{}' not found", identifier),
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
        }
    }
}

/// File operation that produced an [`Error::Storage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageAction {
    /// Creating the recording directory.
    CreateDirectory,
    /// Opening a recording file.
    OpenFile,
    /// Appending a sample line.
    WriteFile,
    /// Flushing and closing a recording file.
    CloseFile,
    /// Deleting a recording file on undo.
    DeleteFile,
}

impl fmt::Display for StorageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::CreateDirectory => "create directory",
            Self::OpenFile => "open",
            Self::WriteFile => "write to",
            Self::CloseFile => "close",
            Self::DeleteFile => "delete",
        };
        f.write_str(verb)
    }
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Scan, connect, subscribe or disconnect failure. Always recoverable.
    Transport,
    /// Directory, open, write or delete failure on the recording files.
    Storage,
    /// Rejected configuration.
    Config,
    /// Shutdown was requested.
    Cancelled,
}

impl Error {
    /// Create a device not found error for a specific identifier.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            identifier: identifier.into(),
        })
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    /// Create a connection failure.
    pub fn connection_failed(device_id: Option<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            device_id,
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a storage error for a file operation.
    pub fn storage(
        action: StorageAction,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            action,
            path: path.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Bluetooth(_)
            | Self::DeviceNotFound(_)
            | Self::NotConnected
            | Self::CharacteristicNotFound { .. }
            | Self::ConnectionFailed { .. }
            | Self::Timeout { .. } => ErrorCategory::Transport,
            Self::Storage { .. } | Self::NothingToUndo => ErrorCategory::Storage,
            Self::InvalidConfig(_) => ErrorCategory::Config,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Whether this is a transport failure that should drive reconnection.
    pub fn is_transport(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }
}

/// Result type alias using swingsense-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
