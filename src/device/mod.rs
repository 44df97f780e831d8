//! Device sessions and domain commands.
//!
//! [`connect`] turns a resolved target into a ready [`Sphero`];
//! [`DeviceSession`] underneath owns the one-at-a-time request/response
//! dispatch over the transport link.

mod connect;
mod error;
mod session;
mod sphero;

pub use connect::connect;
pub use error::{Error, Result};
pub use session::DeviceSession;
pub use sphero::Sphero;
