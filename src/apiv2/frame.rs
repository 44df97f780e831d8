use bytes::{BufMut, Bytes, BytesMut};
use nom::{
    combinator::{cond, rest},
    number::complete::u8,
    sequence::tuple,
    Finish, IResult,
};

use super::{
    checksum::body_checksum,
    constants::{
        END_BYTE, FLAG_IS_RESPONSE, FLAG_REQUESTS_RESPONSE, FLAG_RESETS_INACTIVITY_TIMEOUT,
        START_BYTE,
    },
    error::{Error, Result},
    types::SequenceNumber,
};

/// Header, checksum and end marker around an empty payload.
pub const MIN_FRAME_LEN: usize = 7;

pub type ParserResult<'a, O> = IResult<&'a [u8], O>;

/// A single protocol message.
///
/// On the wire a frame is `[START, flags, device id, command id, sequence,
/// payload.., checksum, END]`. Response frames additionally carry an error
/// code as the first body byte after the sequence. For any well-formed,
/// checksum-valid byte range, `serialize(parse(bytes)) == bytes`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    flags: u8,
    device_id: u8,
    command_id: u8,
    sequence: SequenceNumber,
    error_code: Option<u8>,
    payload: Bytes,
}

impl Frame {
    pub fn new(
        flags: u8,
        device_id: u8,
        command_id: u8,
        sequence: SequenceNumber,
        error_code: Option<u8>,
        payload: Bytes,
    ) -> Frame {
        Frame {
            flags,
            device_id,
            command_id,
            sequence,
            error_code,
            payload,
        }
    }

    /// An outgoing command frame. Every command resets the device inactivity
    /// timeout and asks for a response; unsolicited responses to
    /// fire-and-forget sends are disposed by the dispatcher.
    pub fn request(
        device_id: u8,
        command_id: u8,
        sequence: SequenceNumber,
        payload: &[u8],
    ) -> Frame {
        Frame {
            flags: FLAG_RESETS_INACTIVITY_TIMEOUT | FLAG_REQUESTS_RESPONSE,
            device_id,
            command_id,
            sequence,
            error_code: None,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// A response frame as the device would emit it.
    pub fn response(
        device_id: u8,
        command_id: u8,
        sequence: SequenceNumber,
        error_code: u8,
        payload: &[u8],
    ) -> Frame {
        Frame {
            flags: FLAG_IS_RESPONSE | FLAG_RESETS_INACTIVITY_TIMEOUT,
            device_id,
            command_id,
            sequence,
            error_code: Some(error_code),
            payload: Bytes::copy_from_slice(payload),
        }
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    pub fn command_id(&self) -> u8 {
        self.command_id
    }

    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    pub fn error_code(&self) -> Option<u8> {
        self.error_code
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn is_response(&self) -> bool {
        self.flags & FLAG_IS_RESPONSE != 0
    }

    pub fn encoded_len(&self) -> usize {
        MIN_FRAME_LEN + self.error_code.map_or(0, |_| 1) + self.payload.len()
    }

    /// Serialize the frame and write it into a buffer.
    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_u8(START_BYTE);
        let body_start = buf.len();
        buf.put_u8(self.flags);
        buf.put_u8(self.device_id);
        buf.put_u8(self.command_id);
        buf.put_u8(*self.sequence);
        if let Some(code) = self.error_code {
            buf.put_u8(code);
        }
        buf.put_slice(&self.payload);
        let checksum = body_checksum(&buf[body_start..]);
        buf.put_u8(checksum);
        buf.put_u8(END_BYTE);
    }

    /// Parse a complete, delimiter-bracketed frame, validating the checksum
    /// before the body is interpreted.
    pub fn parse(buf: &[u8]) -> Result<Frame> {
        if buf.len() < MIN_FRAME_LEN {
            return Err(Error::Truncated { len: buf.len() });
        }
        if buf[0] != START_BYTE || buf[buf.len() - 1] != END_BYTE {
            return Err(Error::MissingDelimiter);
        }

        let body = &buf[1..buf.len() - 2];
        let found = buf[buf.len() - 2];
        let expected = body_checksum(body);
        if found != expected {
            return Err(Error::InvalidChecksum { expected, found });
        }

        parse_body(body)
            .finish()
            .map(|(_, frame)| frame)
            .map_err(|_| Error::InvalidBody)
    }
}

fn parse_body(input: &[u8]) -> ParserResult<'_, Frame> {
    let (input, (flags, device_id, command_id, sequence)) = tuple((u8, u8, u8, u8))(input)?;
    let (input, error_code) =
        cond(flags & FLAG_IS_RESPONSE != 0 && !input.is_empty(), u8)(input)?;
    let (input, payload) = rest(input)?;

    let frame = Frame {
        flags,
        device_id,
        command_id,
        sequence: SequenceNumber::new(sequence),
        error_code,
        payload: Bytes::copy_from_slice(payload),
    };
    Ok((input, frame))
}
