//! Bluetooth UUIDs and advertisement markers for SwingSense peripherals.
//!
//! The peripheral exposes a single custom service with one notify
//! characteristic carrying control and sample frames, and one write
//! characteristic for stream control.

use uuid::{Uuid, uuid};

// --- SwingSense Service UUIDs ---

/// Custom IMU service (16-bit `0xFF00` on the Bluetooth base UUID).
pub const IMU_SERVICE: Uuid = uuid!("0000ff00-0000-1000-8000-00805f9b34fb");

// --- SwingSense Characteristic UUIDs ---

/// IMU notify characteristic. Every control and sample frame arrives here.
pub const IMU_CHARACTERISTIC: Uuid = uuid!("0000ff01-0000-1000-8000-00805f9b34fb");

/// Stream control write characteristic (`0x01` stream on, `0x00` stream off).
pub const CONTROL_CHARACTERISTIC: Uuid = uuid!("0000ff02-0000-1000-8000-00805f9b34fb");

// --- Advertisement markers ---

/// Local name the peripheral advertises (matched as a substring).
pub const DEVICE_NAME: &str = "SwingSense";

/// Leading bytes of the peripheral's manufacturer-specific advertisement data.
pub const VENDOR_PREFIX: [u8; 2] = [0x12, 0x34];

/// Short service marker matched case-insensitively against advertised service UUIDs.
pub const SERVICE_HINT: &str = "ff00";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_characteristics_share_service_base() {
        let service = IMU_SERVICE.to_string();
        assert!(service.starts_with("0000ff00"));
        assert!(IMU_CHARACTERISTIC.to_string().starts_with("0000ff01"));
        assert!(CONTROL_CHARACTERISTIC.to_string().starts_with("0000ff02"));
        assert!(service.contains(SERVICE_HINT));
    }
}
