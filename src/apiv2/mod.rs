//! The Sphero API v2 packet protocol.
//!
//! Pure framing and codec logic with no transport dependencies: byte layout,
//! checksum, sequence numbers, and the reassembly of frames from the chunked
//! notification stream.

mod checksum;
mod codec;
pub mod constants;
mod error;
mod frame;
mod types;

pub use codec::PacketCodec;
pub use error::{Error, Result};
pub use frame::Frame;
pub use types::SequenceNumber;
