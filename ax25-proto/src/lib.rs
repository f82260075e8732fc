//! Bit-exact AX.25 address/frame codec and the BSS peer-message TLV codec.
//!
//! This crate only encodes and decodes bytes; it holds no session state.
//! Decoding never panics on attacker-controlled input — malformed frames
//! and packets come back as `Err`/`None`, never a panic.

mod address;
mod bss;
mod error;
mod frame;

pub use address::Address;
pub use bss::{BssPacket, Location, RawField};
pub use error::{CodecError, CodecResult};
pub use frame::{Frame, FrameBody, SFrameType, UFrameType};
