use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use mockall::automock;
use uuid::Uuid;

use super::error::Result;

/// A device seen while scanning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discovery {
    pub name: Option<String>,
    pub address: String,
}

/// One value pushed by the peripheral on a subscribed characteristic.
#[derive(Clone, Debug)]
pub struct Notification {
    pub uuid: Uuid,
    pub value: Vec<u8>,
}

/// The host-side bluetooth stack: discovery and connection establishment.
#[automock]
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Start scanning and stream discovered devices until [`stop_scan`] is
    /// called or the stream is dropped.
    ///
    /// [`stop_scan`]: Adapter::stop_scan
    async fn scan(&self) -> Result<BoxStream<'static, Discovery>>;

    async fn stop_scan(&self) -> Result<()>;

    async fn connect(&self, address: &str, timeout: Duration) -> Result<Box<dyn Link>>;
}

/// An established GATT connection to one peripheral.
#[automock]
#[async_trait]
pub trait Link: Send {
    /// Enumerate services and flatten their characteristics to the set of
    /// available uuids. May legitimately come back incomplete on flaky host
    /// stacks; callers decide whether to retry.
    async fn discover_characteristics(&mut self) -> Result<Vec<Uuid>>;

    async fn subscribe(&self, uuid: Uuid) -> Result<()>;

    async fn write_without_response(&self, uuid: Uuid, data: &[u8]) -> Result<()>;

    /// The single notification stream for this connection; values are tagged
    /// with the characteristic uuid they arrived on.
    async fn notifications(&self) -> Result<BoxStream<'static, Notification>>;

    async fn disconnect(&self) -> Result<()>;
}
