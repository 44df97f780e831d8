use tokio::time::timeout;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::apiv2::constants::{ANTI_DOS_TOKEN, CHAR_ANTI_DOS, REQUIRED_CHARACTERISTICS};
use crate::ble::{Adapter, Discovery, Link};
use crate::settings::Settings;

use super::error::{Error, Result};
use super::session::DeviceSession;
use super::sphero::Sphero;

/// Resolve `target` (a display name or an address), establish the GATT
/// connection and return a ready device.
///
/// Connection establishment and service discovery are each retried up to the
/// configured budget: BLE stacks on some host platforms silently ignore
/// connect timeouts or return partial service lists, and a fresh attempt is
/// the only reliable recovery. Attempts are sequential; the retry counts are
/// settings, not constants, because the underlying platform behavior is not
/// understood well enough to hardcode them.
pub async fn connect<A>(adapter: &A, target: &str, settings: &Settings) -> Result<Sphero>
where
    A: Adapter + ?Sized,
{
    let discovery = resolve_target(adapter, target, settings).await?;
    info!(name = ?discovery.name, address = %discovery.address, "device resolved");

    let mut link = connect_with_retry(adapter, &discovery.address, settings).await?;
    discover_required_characteristics(link.as_mut(), settings).await?;

    // The keep-awake token has to land before anything else or the firmware
    // drops the connection after its 10 second inactivity window.
    link.write_without_response(CHAR_ANTI_DOS, ANTI_DOS_TOKEN)
        .await
        .map_err(Error::from)?;

    for uuid in REQUIRED_CHARACTERISTICS {
        link.subscribe(uuid).await.map_err(Error::from)?;
    }

    let session = DeviceSession::start(link, settings.response_timeout()).await?;
    let mut sphero = Sphero::new(session);
    sphero.wake().await?;

    Ok(sphero)
}

/// Scan until a device whose name or address equals `target` shows up, then
/// stop the scan. The scan is also stopped when the window elapses with no
/// match, so a failed resolution never leaks a running scan.
async fn resolve_target<A>(adapter: &A, target: &str, settings: &Settings) -> Result<Discovery>
where
    A: Adapter + ?Sized,
{
    let window = settings.connect_timeout();
    let mut results = adapter.scan().await.map_err(Error::from)?;

    let found = timeout(window, async {
        while let Some(result) = results.next().await {
            debug!(name = ?result.name, address = %result.address, "discovered device");
            if result.name.as_deref() == Some(target)
                || result.address.eq_ignore_ascii_case(target)
            {
                return Some(result);
            }
        }
        None
    })
    .await;

    if let Err(error) = adapter.stop_scan().await {
        warn!(%error, "failed to stop scan");
    }

    match found {
        Ok(Some(discovery)) => Ok(discovery),
        Ok(None) | Err(_) => Err(Error::ScanTimeout {
            target: target.to_string(),
            window,
        }),
    }
}

async fn connect_with_retry<A>(
    adapter: &A,
    address: &str,
    settings: &Settings,
) -> Result<Box<dyn Link>>
where
    A: Adapter + ?Sized,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match adapter.connect(address, settings.connect_timeout()).await {
            Ok(link) => {
                debug!(attempt, %address, "connected");
                return Ok(link);
            }
            Err(source) if attempt >= settings.connect_attempts => {
                return Err(Error::ConnectAttemptsExhausted {
                    address: address.to_string(),
                    attempts: attempt,
                    source,
                });
            }
            Err(error) => warn!(attempt, %address, %error, "connect attempt failed"),
        }
    }
}

/// Re-run service discovery until every protocol characteristic is present.
/// A characteristic still missing once the budget is spent is fatal to
/// session setup.
async fn discover_required_characteristics(
    link: &mut dyn Link,
    settings: &Settings,
) -> Result<()> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match link.discover_characteristics().await {
            Ok(available) => {
                match REQUIRED_CHARACTERISTICS
                    .into_iter()
                    .find(|uuid| !available.contains(uuid))
                {
                    None => {
                        debug!(attempt, "all protocol characteristics resolved");
                        return Ok(());
                    }
                    Some(uuid) if attempt >= settings.discovery_attempts => {
                        return Err(Error::CharacteristicNotFound(uuid));
                    }
                    Some(uuid) => {
                        warn!(attempt, %uuid, "service discovery came back incomplete")
                    }
                }
            }
            Err(source) if attempt >= settings.discovery_attempts => {
                return Err(source.into());
            }
            Err(error) => warn!(attempt, %error, "service discovery failed"),
        }
    }
}
