use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The byte range is shorter than the smallest possible frame.
    #[error("frame truncated: {len} bytes, need at least 7")]
    Truncated { len: usize },

    /// The byte range is not bracketed by the start and end markers.
    #[error("frame is missing its start or end marker")]
    MissingDelimiter,

    /// The checksum recomputed over the frame body does not match the one
    /// carried on the wire. The frame must be dropped, never partially
    /// trusted.
    #[error("frame checksum invalid: expected {expected:#04x}, found {found:#04x}")]
    InvalidChecksum { expected: u8, found: u8 },

    /// The frame body could not be parsed after checksum validation.
    #[error("frame body malformed")]
    InvalidBody,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
