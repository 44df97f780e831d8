use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::ble;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no device named or addressed \"{target}\" discovered within {window:?}")]
    ScanTimeout { target: String, window: Duration },

    #[error("gave up connecting to {address} after {attempts} attempts")]
    ConnectAttemptsExhausted {
        address: String,
        attempts: u32,
        #[source]
        source: ble::Error,
    },

    #[error("required characteristic {0} missing after service discovery")]
    CharacteristicNotFound(Uuid),

    #[error("timed out waiting for a response")]
    ResponseTimeout,

    #[error("a command is already awaiting its response")]
    CommandInFlight,

    #[error("device session closed while a response was pending")]
    SessionClosed,

    #[error(transparent)]
    Transport(#[from] ble::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
