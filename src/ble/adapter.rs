use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter as HostAdapter, Manager, Peripheral};
use futures::stream::{BoxStream, StreamExt};
use tracing::trace;
use uuid::Uuid;

use super::error::{Error, Result};
use super::traits::{Adapter, Discovery, Link, Notification};

/// The first bluetooth adapter of the host, driven through btleplug.
pub struct BleCentral {
    central: HostAdapter,
}

impl BleCentral {
    pub async fn new() -> Result<BleCentral> {
        let manager = Manager::new().await?;
        let central = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NoAdapter)?;

        Ok(BleCentral { central })
    }

    async fn find_peripheral(&self, address: &str) -> Result<Peripheral> {
        for peripheral in self.central.peripherals().await? {
            if peripheral.address().to_string().eq_ignore_ascii_case(address) {
                return Ok(peripheral);
            }
        }
        Err(Error::PeripheralNotFound(address.to_string()))
    }
}

#[async_trait]
impl Adapter for BleCentral {
    async fn scan(&self) -> Result<BoxStream<'static, Discovery>> {
        let events = self.central.events().await?;
        self.central.start_scan(ScanFilter::default()).await?;

        let central = self.central.clone();
        let stream = events.filter_map(move |event| {
            let central = central.clone();
            async move {
                let CentralEvent::DeviceDiscovered(id) = event else {
                    return None;
                };
                let peripheral = central.peripheral(&id).await.ok()?;
                let properties = peripheral.properties().await.ok().flatten();
                let discovery = Discovery {
                    name: properties.and_then(|p| p.local_name),
                    address: peripheral.address().to_string(),
                };
                trace!(?discovery, "scan event");
                Some(discovery)
            }
        });

        Ok(stream.boxed())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.central.stop_scan().await?;
        Ok(())
    }

    async fn connect(&self, address: &str, timeout: Duration) -> Result<Box<dyn Link>> {
        let peripheral = self.find_peripheral(address).await?;

        tokio::time::timeout(timeout, peripheral.connect())
            .await
            .map_err(|_| Error::ConnectTimeout)??;

        Ok(Box::new(PeripheralLink {
            peripheral,
            characteristics: HashMap::new(),
        }))
    }
}

/// A connected peripheral with its characteristic table cached at discovery
/// time.
struct PeripheralLink {
    peripheral: Peripheral,
    characteristics: HashMap<Uuid, Characteristic>,
}

impl PeripheralLink {
    fn characteristic(&self, uuid: Uuid) -> Result<&Characteristic> {
        self.characteristics
            .get(&uuid)
            .ok_or(Error::UnknownCharacteristic(uuid))
    }
}

#[async_trait]
impl Link for PeripheralLink {
    async fn discover_characteristics(&mut self) -> Result<Vec<Uuid>> {
        self.peripheral.discover_services().await?;
        self.characteristics = self
            .peripheral
            .characteristics()
            .into_iter()
            .map(|c| (c.uuid, c))
            .collect();

        Ok(self.characteristics.keys().copied().collect())
    }

    async fn subscribe(&self, uuid: Uuid) -> Result<()> {
        self.peripheral.subscribe(self.characteristic(uuid)?).await?;
        Ok(())
    }

    async fn write_without_response(&self, uuid: Uuid, data: &[u8]) -> Result<()> {
        self.peripheral
            .write(self.characteristic(uuid)?, data, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }

    async fn notifications(&self) -> Result<BoxStream<'static, Notification>> {
        let stream = self.peripheral.notifications().await?;
        Ok(stream
            .map(|n| Notification {
                uuid: n.uuid,
                value: n.value,
            })
            .boxed())
    }

    async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
