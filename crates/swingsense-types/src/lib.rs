//! Platform-agnostic types for SwingSense IMU peripherals.
//!
//! This crate holds everything about the peripheral's notification protocol
//! that does not need a Bluetooth stack: the UUIDs and advertisement markers
//! used to find the device, the sample and control frame types, and the pure
//! [`Frame::decode`] function that turns a raw notification into a typed event.
//!
//! # Wire format
//!
//! | Length | Meaning |
//! |--------|---------|
//! | 1 byte | Control frame: `0x01` start recording, `0x02` stop recording |
//! | 24 bytes | Sample frame: six little-endian `f32` (ax, ay, az, gx, gy, gz) |
//! | other | Malformed, reported and discarded |
//!
//! # Example
//!
//! ```
//! use swingsense_types::{ControlFrame, Frame};
//!
//! assert_eq!(Frame::decode(&[0x01]), Frame::Control(ControlFrame::Start));
//! assert_eq!(Frame::decode(&[0xAA, 0xBB]), Frame::Malformed { length: 2 });
//! ```

pub mod error;
pub mod frame;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use frame::Frame;
pub use types::{CONTROL_FRAME_LEN, ControlFrame, SAMPLE_FRAME_LEN, SampleRecord};
pub use uuid as uuids;
