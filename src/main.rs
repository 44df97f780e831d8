use std::time::Duration;

use anyhow::{Context, Result};
use argh::FromArgs;
use tokio_stream::StreamExt;
use tracing::info;

use sphero_ble_driver::ble::{Adapter, BleCentral};
use sphero_ble_driver::device;
use sphero_ble_driver::logging::setup_logging;
use sphero_ble_driver::settings::Settings;

/// Drive a Sphero Mini over Bluetooth LE.
#[derive(FromArgs)]
struct Args {
    /// scan for nearby BLE devices and print them
    #[argh(switch)]
    scan: bool,

    /// address of the device to connect to
    #[argh(option)]
    address: Option<String>,

    /// display name of the device to connect to
    #[argh(option)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();
    let settings = Settings::new()?;
    setup_logging(settings.loglevel);

    let central = BleCentral::new()
        .await
        .context("unable to open the bluetooth adapter")?;

    if args.scan {
        return scan(&central).await;
    }

    let target = args
        .address
        .or(args.name)
        .context("pass --scan to discover devices, or --address/--name to connect")?;

    drive(&central, &target, &settings).await
}

async fn scan(central: &BleCentral) -> Result<()> {
    let mut results = central.scan().await?;
    while let Some(result) = results.next().await {
        println!(
            "found device: {}, address: {}",
            result.name.as_deref().unwrap_or("UNKNOWN"),
            result.address
        );
    }
    central.stop_scan().await?;
    Ok(())
}

/// Connect and run a short demo: color cycle, a roll out and back, then
/// sleep.
async fn drive(central: &BleCentral, target: &str, settings: &Settings) -> Result<()> {
    info!(%target, "connecting");
    let mut ball = device::connect(central, target, settings)
        .await
        .context("unable to set up the device session")?;

    // the backlight shows which way the ball is pointing
    ball.enable_backlight().await?;
    let battery = ball.battery_voltage().await?;
    info!(payload = ?battery, "battery voltage report");

    ball.set_led_color(235, 64, 52).await?;
    ball.hold(Duration::from_secs(1)).await?;
    ball.set_led_color(52, 235, 88).await?;
    ball.hold(Duration::from_secs(1)).await?;
    ball.set_led_color(52, 122, 235).await?;
    ball.hold(Duration::from_secs(1)).await?;

    ball.roll(0, 150).await?;
    ball.hold(Duration::from_secs(1)).await?;
    ball.roll(180, 150).await?;
    ball.hold(Duration::from_secs(1)).await?;

    ball.sleep().await?;
    info!("device asleep, connection closed");
    Ok(())
}
