//! High-level Data Link Control (HDLC) framing and frame codec.
//!
//! Frames use a one-byte address, a one-byte control field with 3-bit
//! sequence numbers, and a 16-bit FCS. Byte stuffing uses `0x7D` as escape
//! byte and `0x7E` as frame flag.

pub mod codec;
pub mod consts;
pub mod crc;
pub mod decoder;
pub mod encoder;
pub mod frame;

pub use codec::Codec;
pub use decoder::{Decoded, Decoder};
pub use frame::{Frame, FrameClass, FrameType, Validity};
