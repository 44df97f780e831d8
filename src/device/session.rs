use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures::stream::BoxStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::StreamExt;
use tokio_util::codec::Decoder;
use tracing::{debug, trace, warn};

use crate::apiv2::constants::CHAR_API_V2;
use crate::apiv2::{Frame, PacketCodec, SequenceNumber};
use crate::ble::{Link, Notification};

use super::error::{Error, Result};

/// Correlation state for the one command the session allows in flight.
///
/// The dispatch path is the only writer of the sequence counter; this slot
/// is shared with the notification pump, which takes the sender on an exact
/// sequence match and disposes everything else.
enum PendingState {
    Idle,
    Pending {
        sequence: SequenceNumber,
        tx: oneshot::Sender<Frame>,
    },
}

/// An established command channel to one device.
///
/// Owns the transport link, the sequence counter and the pending-command
/// slot, plus the pump task that turns notification fragments back into
/// frames. Destroyed by [`shutdown`], which the façade calls from its sleep
/// and disconnect paths.
///
/// [`shutdown`]: DeviceSession::shutdown
pub struct DeviceSession {
    link: Box<dyn Link>,
    sequence: SequenceNumber,
    pending: Arc<Mutex<PendingState>>,
    response_timeout: Duration,
    pump: JoinHandle<()>,
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("response_timeout", &self.response_timeout)
            .finish_non_exhaustive()
    }
}

impl DeviceSession {
    /// Take over a fully prepared link (characteristics discovered,
    /// subscriptions active) and start the notification pump.
    pub async fn start(link: Box<dyn Link>, response_timeout: Duration) -> Result<DeviceSession> {
        let notifications = link.notifications().await?;
        let pending = Arc::new(Mutex::new(PendingState::Idle));
        let pump = tokio::spawn(pump_notifications(notifications, pending.clone()));

        Ok(DeviceSession {
            link,
            sequence: SequenceNumber::zero(),
            pending,
            response_timeout,
            pump,
        })
    }

    /// Send one command and, when `expect_response` is set, block until the
    /// response with the matching sequence number arrives or the response
    /// timeout elapses. Frames with any other sequence never complete the
    /// wait; they are disposed by the pump.
    pub async fn send(
        &mut self,
        device_id: u8,
        command_id: u8,
        expect_response: bool,
        payload: &[u8],
    ) -> Result<Option<Frame>> {
        self.sequence += 1;
        let frame = Frame::request(device_id, command_id, self.sequence, payload);

        // The waiter is registered before the write goes out so a response
        // arriving faster than this task resumes cannot be lost.
        let receiver = if expect_response {
            Some(self.register(self.sequence).await?)
        } else {
            None
        };

        let mut buf = BytesMut::with_capacity(frame.encoded_len());
        frame.serialize(&mut buf);
        trace!(data = ?buf, "sending frame");

        if let Err(error) = self.link.write_without_response(CHAR_API_V2, &buf).await {
            self.clear_pending().await;
            return Err(error.into());
        }

        let Some(receiver) = receiver else {
            return Ok(None);
        };

        match timeout(self.response_timeout, receiver).await {
            Ok(Ok(frame)) => {
                if let Some(code) = frame.error_code().filter(|&c| c != 0) {
                    warn!(
                        code,
                        device_id = frame.device_id(),
                        command_id = frame.command_id(),
                        "device reported a command error"
                    );
                }
                Ok(Some(frame))
            }
            Ok(Err(_)) => {
                self.clear_pending().await;
                Err(Error::SessionClosed)
            }
            Err(_) => {
                self.clear_pending().await;
                warn!(sequence = %self.sequence, "timed out waiting for response");
                Err(Error::ResponseTimeout)
            }
        }
    }

    /// Stop the pump and close the transport connection.
    pub async fn shutdown(self) -> Result<()> {
        let result = self.link.disconnect().await;
        self.pump.abort();
        result.map_err(Into::into)
    }

    async fn register(&self, sequence: SequenceNumber) -> Result<oneshot::Receiver<Frame>> {
        let mut pending = self.pending.lock().await;
        if matches!(*pending, PendingState::Pending { .. }) {
            return Err(Error::CommandInFlight);
        }

        let (tx, rx) = oneshot::channel();
        *pending = PendingState::Pending { sequence, tx };
        Ok(rx)
    }

    async fn clear_pending(&self) {
        *self.pending.lock().await = PendingState::Idle;
    }
}

/// Reassemble frames from the primary channel and complete the pending
/// command on an exact sequence match. Anything that does not match (other
/// channels, malformed frames, stale sequences) is logged and dropped.
async fn pump_notifications(
    mut notifications: BoxStream<'static, Notification>,
    pending: Arc<Mutex<PendingState>>,
) {
    let mut codec = PacketCodec;
    let mut buf = BytesMut::new();

    while let Some(notification) = notifications.next().await {
        if notification.uuid != CHAR_API_V2 {
            trace!(
                uuid = %notification.uuid,
                data = ?notification.value,
                "disposed notification on secondary channel"
            );
            continue;
        }

        buf.extend_from_slice(&notification.value);
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(Ok(frame))) => deliver(&pending, frame).await,
                Ok(Some(Err(error))) => warn!(%error, "dropped malformed frame"),
                Ok(None) => break,
                Err(error) => {
                    warn!(%error, "frame reassembly failed");
                    break;
                }
            }
        }
    }

    debug!("notification stream ended");
}

async fn deliver(pending: &Mutex<PendingState>, frame: Frame) {
    let mut slot = pending.lock().await;
    match std::mem::replace(&mut *slot, PendingState::Idle) {
        PendingState::Pending { sequence, tx } if sequence == frame.sequence() => {
            if tx.send(frame).is_err() {
                debug!("response waiter went away before delivery");
            }
        }
        other => {
            *slot = other;
            debug!(sequence = %frame.sequence(), "disposed frame with no matching request");
        }
    }
}
