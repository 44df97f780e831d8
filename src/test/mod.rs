//! Shared helpers for the protocol and device tests.

use bytes::BytesMut;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::apiv2::constants::CHAR_API_V2;
use crate::apiv2::Frame;
use crate::ble::Notification;

pub type NotificationSender = UnboundedSender<Notification>;

/// An in-memory notification stream and its feeding end.
pub fn notification_feed() -> (NotificationSender, BoxStream<'static, Notification>) {
    let (tx, rx) = unbounded_channel();
    (tx, UnboundedReceiverStream::new(rx).boxed())
}

/// Wrap a frame into a single primary-channel notification chunk.
pub fn api_chunk(frame: &Frame) -> Notification {
    let mut buf = BytesMut::new();
    frame.serialize(&mut buf);
    Notification {
        uuid: CHAR_API_V2,
        value: buf.to_vec(),
    }
}

/// Parse a written request and feed the device's response to it back into
/// the notification stream.
pub fn respond_with(tx: &NotificationSender, request: &[u8], error_code: u8, payload: &[u8]) {
    let request = Frame::parse(request).expect("request bytes must form a valid frame");
    let response = Frame::response(
        request.device_id(),
        request.command_id(),
        request.sequence(),
        error_code,
        payload,
    );
    let _ = tx.send(api_chunk(&response));
}
