//! Core types for SwingSense notification payloads.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Length in bytes of a control frame.
pub const CONTROL_FRAME_LEN: usize = 1;

/// Length in bytes of a sample frame (six `f32`).
pub const SAMPLE_FRAME_LEN: usize = 24;

/// A one-byte control frame sent by the peripheral when its record switch toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ControlFrame {
    /// Begin a new recording session (`0x01`).
    Start,
    /// End the current recording session (`0x02`).
    Stop,
    /// Any other byte. Carried for logging only.
    Unknown(u8),
}

impl ControlFrame {
    /// Wire value of a Start frame.
    pub const START_BYTE: u8 = 0x01;
    /// Wire value of a Stop frame.
    pub const STOP_BYTE: u8 = 0x02;

    /// Map a control byte to its frame.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            Self::START_BYTE => ControlFrame::Start,
            Self::STOP_BYTE => ControlFrame::Stop,
            other => ControlFrame::Unknown(other),
        }
    }

    /// The byte this frame is encoded as.
    #[must_use]
    pub fn as_byte(&self) -> u8 {
        match self {
            ControlFrame::Start => Self::START_BYTE,
            ControlFrame::Stop => Self::STOP_BYTE,
            ControlFrame::Unknown(b) => *b,
        }
    }
}

impl fmt::Display for ControlFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlFrame::Start => write!(f, "start"),
            ControlFrame::Stop => write!(f, "stop"),
            ControlFrame::Unknown(b) => write!(f, "unknown(0x{:02X})", b),
        }
    }
}

/// One IMU sample: acceleration in g and angular rate in degrees per second.
///
/// Decoded from a 24-byte little-endian frame. Written to a recording as one
/// CSV line with six fractional digits per value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SampleRecord {
    /// Acceleration, X axis (g).
    pub ax: f32,
    /// Acceleration, Y axis (g).
    pub ay: f32,
    /// Acceleration, Z axis (g).
    pub az: f32,
    /// Angular rate, X axis (dps).
    pub gx: f32,
    /// Angular rate, Y axis (dps).
    pub gy: f32,
    /// Angular rate, Z axis (dps).
    pub gz: f32,
}

impl SampleRecord {
    /// Build a sample from its six components.
    #[must_use]
    pub fn new(ax: f32, ay: f32, az: f32, gx: f32, gy: f32, gz: f32) -> Self {
        Self {
            ax,
            ay,
            az,
            gx,
            gy,
            gz,
        }
    }

    /// Parse a sample from exactly [`SAMPLE_FRAME_LEN`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if `data` is not exactly
    /// 24 bytes long.
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        use bytes::Buf;

        if data.len() != SAMPLE_FRAME_LEN {
            return Err(ParseError::InsufficientBytes {
                expected: SAMPLE_FRAME_LEN,
                actual: data.len(),
            });
        }

        let mut buf = data;
        Ok(SampleRecord {
            ax: buf.get_f32_le(),
            ay: buf.get_f32_le(),
            az: buf.get_f32_le(),
            gx: buf.get_f32_le(),
            gy: buf.get_f32_le(),
            gz: buf.get_f32_le(),
        })
    }

    /// Encode the sample in the peripheral's wire format.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SAMPLE_FRAME_LEN] {
        use bytes::BufMut;

        let mut out = [0u8; SAMPLE_FRAME_LEN];
        let mut buf = &mut out[..];
        for value in self.values() {
            buf.put_f32_le(value);
        }
        out
    }

    /// The six components in wire order.
    #[must_use]
    pub fn values(&self) -> [f32; 6] {
        [self.ax, self.ay, self.az, self.gx, self.gy, self.gz]
    }

    /// Format as a newline-terminated CSV line with six fractional digits.
    ///
    /// ```
    /// use swingsense_types::SampleRecord;
    ///
    /// let s = SampleRecord::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
    /// assert_eq!(
    ///     s.to_csv_line(),
    ///     "1.000000,2.000000,3.000000,4.000000,5.000000,6.000000\n"
    /// );
    /// ```
    #[must_use]
    pub fn to_csv_line(&self) -> String {
        format!(
            "{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}\n",
            self.ax, self.ay, self.az, self.gx, self.gy, self.gz
        )
    }
}

impl fmt::Display for SampleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IMU | Accel: {:7.4} {:7.4} {:7.4} | Gyro: {:7.4} {:7.4} {:7.4}",
            self.ax, self.ay, self.az, self.gx, self.gy, self.gz
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_from_byte() {
        assert_eq!(ControlFrame::from_byte(0x01), ControlFrame::Start);
        assert_eq!(ControlFrame::from_byte(0x02), ControlFrame::Stop);
        assert_eq!(ControlFrame::from_byte(0x00), ControlFrame::Unknown(0x00));
        assert_eq!(ControlFrame::from_byte(0xFF), ControlFrame::Unknown(0xFF));
    }

    #[test]
    fn test_control_display() {
        assert_eq!(ControlFrame::Start.to_string(), "start");
        assert_eq!(ControlFrame::Unknown(0x7F).to_string(), "unknown(0x7F)");
    }

    #[test]
    fn test_sample_from_known_bytes() {
        // 1.0f32 = 0x3F800000, -2.5f32 = 0xC0200000
        let mut bytes = [0u8; 24];
        bytes[0..4].copy_from_slice(&[0x00, 0x00, 0x80, 0x3F]);
        bytes[20..24].copy_from_slice(&[0x00, 0x00, 0x20, 0xC0]);

        let sample = SampleRecord::from_bytes(&bytes).unwrap();
        assert_eq!(sample.ax, 1.0);
        assert_eq!(sample.ay, 0.0);
        assert_eq!(sample.gz, -2.5);
    }

    #[test]
    fn test_sample_wrong_length() {
        let err = SampleRecord::from_bytes(&[0u8; 23]).unwrap_err();
        assert_eq!(
            err,
            ParseError::InsufficientBytes {
                expected: 24,
                actual: 23
            }
        );
        assert!(SampleRecord::from_bytes(&[0u8; 25]).is_err());
    }

    #[test]
    fn test_to_bytes_matches_wire_order() {
        let sample = SampleRecord::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let bytes = sample.to_bytes();
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[12..16], &4.0f32.to_le_bytes());
        assert_eq!(&bytes[20..24], &6.0f32.to_le_bytes());
    }

    #[test]
    fn test_csv_line_negative_and_rounding() {
        let sample = SampleRecord::new(-0.5, 0.1234567, 9.81, -250.0, 0.0, 1e-7);
        assert_eq!(
            sample.to_csv_line(),
            "-0.500000,0.123457,9.810000,-250.000000,0.000000,0.000000\n"
        );
    }

    #[test]
    fn test_display_console_line() {
        let sample = SampleRecord::new(1.0, 0.0, -1.0, 0.5, 0.25, 0.125);
        let line = sample.to_string();
        assert!(line.starts_with("IMU | Accel:  1.0000  0.0000 -1.0000"));
        assert!(line.contains("| Gyro:  0.5000  0.2500  0.1250"));
    }
}
