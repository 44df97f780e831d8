//! BLE driver for the Sphero Mini robot.
//!
//! The driver speaks the Sphero API v2 packet protocol over a GATT
//! connection: commands are framed, checksummed and sequence-numbered, and
//! the device answers asynchronously through characteristic notifications.
//! [`device::connect`] resolves a target by name or address, establishes the
//! link with bounded retries, and returns a [`device::Sphero`] that exposes
//! the domain commands (wake, sleep, LED, roll, battery query).

pub mod apiv2;
pub mod ble;
pub mod device;
pub mod logging;
pub mod settings;

#[cfg(test)]
mod test;
