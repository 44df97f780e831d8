use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use super::{
    constants::{END_BYTE, START_BYTE},
    error::{Error, Result},
    frame::Frame,
};

/// Reassembles frames from the chunked notification stream.
///
/// Notifications deliver arbitrary fragments, down to a single byte each. A
/// start marker opens (or reopens) a frame, discarding any incomplete
/// accumulation before it; the first end marker after a start hands the
/// accumulated range to [`Frame::parse`].
///
/// Known limitation, kept from the protocol as deployed: there is no
/// escaping or length prefix, so a payload byte equal to the end marker
/// terminates the frame early. Such a frame fails checksum validation and is
/// dropped.
///
/// Per-frame failures (checksum, malformed body) are soft: they surface as
/// `Ok(Some(Err(_)))` and leave the codec ready for the next frame.
#[derive(Debug, Default)]
pub struct PacketCodec;

impl Decoder for PacketCodec {
    type Item = Result<Frame>;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            let Some(end) = src.iter().position(|&b| b == END_BYTE) else {
                // No complete frame yet. Anything before the most recent
                // start marker can never become one, so drop it.
                match src.iter().rposition(|&b| b == START_BYTE) {
                    Some(start) if start > 0 => {
                        trace!(dropped = start, "discarded bytes before restarted frame");
                        src.advance(start);
                    }
                    Some(_) => {}
                    None => src.clear(),
                }
                return Ok(None);
            };

            let Some(start) = src[..end].iter().rposition(|&b| b == START_BYTE) else {
                // An end marker with no open frame, the tail of something we
                // never saw the beginning of.
                trace!(dropped = end + 1, "discarded end marker with no open frame");
                src.advance(end + 1);
                continue;
            };

            src.advance(start);
            let raw = src.split_to(end - start + 1);
            return Ok(Some(Frame::parse(&raw)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apiv2::SequenceNumber;

    const WAKE_RESPONSE: [u8; 8] = [0x8D, 0x09, 0x13, 0x0D, 0x01, 0x00, 0xD5, 0xD8];

    fn drain(codec: &mut PacketCodec, buf: &mut BytesMut) -> Vec<Result<Frame>> {
        let mut out = Vec::new();
        while let Ok(Some(item)) = codec.decode(buf) {
            out.push(item);
        }
        out
    }

    #[test]
    fn it_decodes_a_frame_delivered_in_one_chunk() {
        let mut buf = BytesMut::from(WAKE_RESPONSE.as_ref());
        let mut codec = PacketCodec;

        let frame = codec.decode(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(*frame.sequence(), 1);
        assert!(buf.is_empty());
    }

    #[test]
    fn it_decodes_a_frame_delivered_one_byte_at_a_time() {
        let mut buf = BytesMut::new();
        let mut codec = PacketCodec;
        let mut frames = Vec::new();

        for &byte in WAKE_RESPONSE.iter() {
            buf.extend_from_slice(&[byte]);
            frames.extend(drain(&mut codec, &mut buf));
        }

        assert_eq!(frames.len(), 1);
        let frame = frames.pop().unwrap().unwrap();
        assert_eq!(Frame::parse(&WAKE_RESPONSE).unwrap(), frame);
    }

    #[test]
    fn it_skips_garbage_before_the_start_marker() {
        let mut buf = BytesMut::from([0xFF, 0x00, 0x42].as_ref());
        buf.extend_from_slice(&WAKE_RESPONSE);
        let mut codec = PacketCodec;

        let frame = codec.decode(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(*frame.sequence(), 1);
    }

    #[test]
    fn it_discards_a_stale_partial_when_a_frame_restarts() {
        // an interrupted frame that never completed, then a full one
        let mut buf = BytesMut::from([0x8D, 0x09, 0x13].as_ref());
        buf.extend_from_slice(&WAKE_RESPONSE);
        let mut codec = PacketCodec;

        let frames = drain(&mut codec, &mut buf);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_ok());
        assert!(buf.is_empty());
    }

    #[test]
    fn it_consumes_an_end_marker_with_no_open_frame() {
        let mut buf = BytesMut::from([0x00, 0xD8].as_ref());
        buf.extend_from_slice(&WAKE_RESPONSE);
        let mut codec = PacketCodec;

        let frames = drain(&mut codec, &mut buf);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_ok());
    }

    #[test]
    fn it_soft_fails_on_checksum_corruption_and_recovers() {
        let mut corrupted = WAKE_RESPONSE;
        corrupted[4] = 0x02; // sequence no longer matches the checksum

        let mut buf = BytesMut::from(corrupted.as_ref());
        buf.extend_from_slice(&WAKE_RESPONSE);
        let mut codec = PacketCodec;

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(first, Err(Error::InvalidChecksum { .. })));

        let second = codec.decode(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(second.sequence(), SequenceNumber::new(1));
        assert!(buf.is_empty());
    }

    #[test]
    fn it_keeps_an_incomplete_frame_buffered() {
        let mut buf = BytesMut::from(&WAKE_RESPONSE[..5]);
        let mut codec = PacketCodec;

        assert!(matches!(codec.decode(&mut buf), Ok(None)));
        assert_eq!(buf.len(), 5);

        buf.extend_from_slice(&WAKE_RESPONSE[5..]);
        assert!(matches!(codec.decode(&mut buf), Ok(Some(Ok(_)))));
    }

    #[test]
    fn it_drops_unframed_noise_when_no_frame_is_open() {
        let mut buf = BytesMut::from([0xFF, 0x00, 0x42].as_ref());
        let mut codec = PacketCodec;

        assert!(matches!(codec.decode(&mut buf), Ok(None)));
        assert!(buf.is_empty());
    }
}
