//! Notification decoding.
//!
//! [`Frame::decode`] is a pure mapping from a raw notification payload to a
//! typed frame. It holds no state and never fails: payloads of unexpected
//! length are returned as [`Frame::Malformed`] so the caller can log them.

use core::fmt::Write as _;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::{CONTROL_FRAME_LEN, ControlFrame, SAMPLE_FRAME_LEN, SampleRecord};

/// A decoded notification from the IMU characteristic.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "value", rename_all = "snake_case"))]
pub enum Frame {
    /// One-byte start/stop (or unrecognised) control frame.
    Control(ControlFrame),
    /// 24-byte sensor sample.
    Sample(SampleRecord),
    /// Any other length.
    Malformed {
        /// Length of the rejected payload.
        length: usize,
    },
}

impl Frame {
    /// Decode a raw notification payload.
    ///
    /// ```
    /// use swingsense_types::{Frame, SampleRecord};
    ///
    /// let sample = SampleRecord::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
    /// assert_eq!(Frame::decode(&sample.to_bytes()), Frame::Sample(sample));
    /// ```
    #[must_use]
    pub fn decode(data: &[u8]) -> Frame {
        match data.len() {
            CONTROL_FRAME_LEN => Frame::Control(ControlFrame::from_byte(data[0])),
            SAMPLE_FRAME_LEN => match SampleRecord::from_bytes(data) {
                Ok(sample) => Frame::Sample(sample),
                Err(_) => Frame::Malformed { length: data.len() },
            },
            length => Frame::Malformed { length },
        }
    }
}

/// Lowercase hex rendering of a payload, for logging rejected frames.
#[must_use]
pub fn to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}
