use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::apiv2::constants::{
    DEVICE_DRIVING, DEVICE_POWER_INFO, DEVICE_USER_IO, DRIVING_WITH_HEADING, LED_BACKLIGHT_MASK,
    LED_BODY_MASK, POWER_BATTERY_VOLTAGE, POWER_DEEP_SLEEP, POWER_SLEEP, POWER_WAKE,
    USER_IO_ALL_LEDS,
};
use crate::apiv2::Frame;

use super::error::Result;
use super::session::DeviceSession;

/// Time the ball needs to come to rest after a stop command before it can
/// change direction cleanly.
const STOP_SETTLE: Duration = Duration::from_millis(500);

/// Action [`hold`] runs once its delay elapses. Armed by the command that
/// needs undoing; at most one is stored and it is cleared on execution.
///
/// [`hold`]: Sphero::hold
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Followup {
    LedOff,
    Stop,
}

/// One connected Sphero Mini.
///
/// Values of this type only exist for an established, awake session:
/// [`connect`] is the sole constructor, and [`sleep`]/[`deep_sleep`]/
/// [`shutdown`] consume the device, so no command can be issued on a dead
/// connection. Commands take `&mut self`, which serializes callers and
/// keeps the dispatcher's single-outstanding-request rule intact.
///
/// [`connect`]: super::connect
/// [`sleep`]: Sphero::sleep
/// [`deep_sleep`]: Sphero::deep_sleep
/// [`shutdown`]: Sphero::shutdown
#[derive(Debug)]
pub struct Sphero {
    session: DeviceSession,
    backlight_on: bool,
    followup: Option<Followup>,
}

impl Sphero {
    pub(crate) fn new(session: DeviceSession) -> Sphero {
        Sphero {
            session,
            backlight_on: false,
            followup: None,
        }
    }

    /// Bring the device out of soft sleep.
    pub async fn wake(&mut self) -> Result<()> {
        debug!("wake");
        self.session
            .send(DEVICE_POWER_INFO, POWER_WAKE, true, &[])
            .await?;
        Ok(())
    }

    /// Query the battery voltage. The payload encoding is firmware specific,
    /// so the raw response bytes are returned as reported.
    pub async fn battery_voltage(&mut self) -> Result<Bytes> {
        debug!("query battery voltage");
        let response = self
            .session
            .send(DEVICE_POWER_INFO, POWER_BATTERY_VOLTAGE, true, &[])
            .await?;

        Ok(response.map(Frame::into_payload).unwrap_or_default())
    }

    /// Set the main body LEDs to the given color. A following [`hold`]
    /// switches them off again.
    ///
    /// [`hold`]: Sphero::hold
    pub async fn set_led_color(&mut self, r: u8, g: u8, b: u8) -> Result<()> {
        debug!(r, g, b, "set led color");
        self.set_leds(&[0x00, LED_BODY_MASK, r, g, b]).await?;
        self.followup = Some(Followup::LedOff);
        Ok(())
    }

    /// Switch on the small aiming LED on the back of the ball.
    pub async fn enable_backlight(&mut self) -> Result<()> {
        debug!("enable backlight");
        self.set_leds(&[0x00, LED_BACKLIGHT_MASK, 0xFF]).await?;
        self.backlight_on = true;
        Ok(())
    }

    pub async fn disable_backlight(&mut self) -> Result<()> {
        debug!("disable backlight");
        self.set_leds(&[0x00, LED_BACKLIGHT_MASK, 0x00]).await?;
        self.backlight_on = false;
        Ok(())
    }

    /// Roll towards `heading` (degrees, 0-360) at `speed`. The ball keeps
    /// rolling until told otherwise; a following [`hold`] stops it.
    ///
    /// [`hold`]: Sphero::hold
    pub async fn roll(&mut self, heading: u16, speed: u16) -> Result<()> {
        debug!(heading, speed, "roll");
        self.drive(heading, speed).await?;
        self.followup = Some(Followup::Stop);
        Ok(())
    }

    /// Wait for `duration`, then run and clear the follow-up armed by the
    /// previous command: LEDs switch off, a roll comes to a stop.
    pub async fn hold(&mut self, duration: Duration) -> Result<()> {
        tokio::time::sleep(duration).await;
        match self.followup.take() {
            Some(Followup::LedOff) => self.set_leds(&[0x00, LED_BODY_MASK, 0, 0, 0]).await,
            Some(Followup::Stop) => {
                self.drive(0, 1).await?;
                tokio::time::sleep(STOP_SETTLE).await;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Put the device into soft sleep and close the connection.
    ///
    /// An active backlight is switched off first. The connection is closed
    /// as the last step regardless of whether the sleep command itself went
    /// through.
    pub async fn sleep(self) -> Result<()> {
        debug!("sleep");
        self.power_down(POWER_SLEEP).await
    }

    /// Like [`sleep`], but the device powers off completely and needs a
    /// physical charger contact to come back.
    ///
    /// [`sleep`]: Sphero::sleep
    pub async fn deep_sleep(self) -> Result<()> {
        debug!("deep sleep");
        self.power_down(POWER_DEEP_SLEEP).await
    }

    /// Close the connection without changing the device power state.
    pub async fn shutdown(self) -> Result<()> {
        self.session.shutdown().await
    }

    async fn power_down(mut self, command_id: u8) -> Result<()> {
        if self.backlight_on {
            if let Err(error) = self.disable_backlight().await {
                warn!(%error, "failed to disable backlight before sleep");
            }
        }

        let command = self
            .session
            .send(DEVICE_POWER_INFO, command_id, true, &[])
            .await;
        let shutdown = self.session.shutdown().await;

        command?;
        shutdown
    }

    async fn set_leds(&mut self, payload: &[u8]) -> Result<()> {
        self.session
            .send(DEVICE_USER_IO, USER_IO_ALL_LEDS, true, payload)
            .await?;
        Ok(())
    }

    async fn drive(&mut self, heading: u16, speed: u16) -> Result<()> {
        let payload = [
            (speed & 0xFF) as u8,
            (heading >> 8) as u8,
            (heading & 0xFF) as u8,
            (speed >> 8) as u8,
        ];
        self.session
            .send(DEVICE_DRIVING, DRIVING_WITH_HEADING, true, &payload)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;
    use crate::apiv2::Frame;
    use crate::ble::MockLink;
    use crate::device::Error;
    use crate::test::{notification_feed, respond_with};

    const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

    /// A link that records every primary-channel write and answers all of
    /// them except the optionally silenced (device id, command id) pair.
    fn scripted_link(silence: Option<(u8, u8)>) -> (MockLink, Arc<StdMutex<Vec<Vec<u8>>>>) {
        let (tx, stream) = notification_feed();
        let writes = Arc::new(StdMutex::new(Vec::new()));
        let capture = writes.clone();

        let mut link = MockLink::new();
        link.expect_notifications().return_once(move || Ok(stream));
        link.expect_write_without_response()
            .returning(move |_, data| {
                capture.lock().unwrap().push(data.to_vec());
                let request = Frame::parse(data).unwrap();
                if silence != Some((request.device_id(), request.command_id())) {
                    respond_with(&tx, data, 0, &[]);
                }
                Ok(())
            });
        (link, writes)
    }

    async fn ready_sphero(link: MockLink) -> Sphero {
        let session = DeviceSession::start(Box::new(link), RESPONSE_TIMEOUT)
            .await
            .unwrap();
        Sphero::new(session)
    }

    #[tokio::test]
    async fn it_sends_the_wake_command_bytes() {
        let (link, writes) = scripted_link(None);
        let mut ball = ready_sphero(link).await;

        ball.wake().await.unwrap();

        let writes = writes.lock().unwrap();
        assert_eq!(*writes, vec![vec![0x8D, 0x0A, 0x13, 0x0D, 0x01, 0xD4, 0xD8]]);
    }

    #[tokio::test]
    async fn it_encodes_roll_heading_and_speed() {
        let (link, writes) = scripted_link(None);
        let mut ball = ready_sphero(link).await;

        ball.roll(300, 150).await.unwrap();

        let writes = writes.lock().unwrap();
        assert_eq!(
            *writes,
            vec![vec![0x8D, 0x0A, 0x16, 0x07, 0x01, 0x96, 0x01, 0x2C, 0x00, 0x14, 0xD8]]
        );
    }

    #[tokio::test]
    async fn it_returns_the_raw_battery_payload() {
        let (tx, stream) = notification_feed();
        let mut link = MockLink::new();
        link.expect_notifications().return_once(move || Ok(stream));
        link.expect_write_without_response()
            .returning(move |_, data| {
                respond_with(&tx, data, 0, &[0x01, 0x91]);
                Ok(())
            });
        let mut ball = ready_sphero(link).await;

        let payload = ball.battery_voltage().await.unwrap();
        assert_eq!(payload.as_ref(), [0x01, 0x91]);
    }

    #[tokio::test(start_paused = true)]
    async fn it_turns_the_led_off_after_a_hold() {
        let (link, writes) = scripted_link(None);
        let mut ball = ready_sphero(link).await;

        ball.set_led_color(235, 64, 52).await.unwrap();
        ball.hold(Duration::from_secs(1)).await.unwrap();

        let writes = writes.lock().unwrap();
        assert_eq!(writes.len(), 2);
        assert_eq!(&writes[1][5..10], [0x00, LED_BODY_MASK, 0, 0, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn it_stops_the_ball_after_a_rolling_hold() {
        let (link, writes) = scripted_link(None);
        let mut ball = ready_sphero(link).await;

        ball.roll(180, 150).await.unwrap();
        ball.hold(Duration::from_secs(1)).await.unwrap();

        let writes = writes.lock().unwrap();
        assert_eq!(writes.len(), 2);
        // heading 0 at the minimum speed brings the ball to rest
        assert_eq!(&writes[1][5..9], [0x01, 0x00, 0x00, 0x00]);
    }

    #[tokio::test(start_paused = true)]
    async fn it_runs_no_followup_without_an_arming_command() {
        let (link, writes) = scripted_link(None);
        let mut ball = ready_sphero(link).await;

        ball.hold(Duration::from_secs(1)).await.unwrap();
        assert!(writes.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn it_disconnects_even_when_the_sleep_command_times_out() {
        let (mut link, writes) = scripted_link(Some((DEVICE_POWER_INFO, POWER_SLEEP)));
        link.expect_disconnect().times(1).returning(|| Ok(()));
        let mut ball = ready_sphero(link).await;

        ball.enable_backlight().await.unwrap();

        let err = ball.sleep().await.unwrap_err();
        assert!(matches!(err, Error::ResponseTimeout));

        let writes = writes.lock().unwrap();
        // backlight on, backlight off, then the unanswered sleep command
        assert_eq!(writes.len(), 3);
        assert_eq!(&writes[1][5..8], [0x00, LED_BACKLIGHT_MASK, 0x00]);
        assert_eq!(writes[2][2..4], [DEVICE_POWER_INFO, POWER_SLEEP]);
    }
}
