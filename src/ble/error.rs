use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no bluetooth adapter available on this host")]
    NoAdapter,

    #[error("no known peripheral with address {0}")]
    PeripheralNotFound(String),

    #[error("connection attempt timed out")]
    ConnectTimeout,

    #[error("characteristic {0} has not been discovered on this connection")]
    UnknownCharacteristic(Uuid),

    #[error(transparent)]
    Backend(#[from] btleplug::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
