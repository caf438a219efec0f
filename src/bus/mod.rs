//! Publish/subscribe transport between the pipeline services
//!
//! Three topics carry JSON payloads:
//!
//! - [`POLL_TASKS_TOPIC`]: `PollTask` values from the scheduler to workers
//! - [`METRICS_TOPIC`]: `Metric` values from workers to the alert engine and
//!   the inventory tracker
//! - [`INVENTORY_TOPIC`]: `InventorySnapshot` values from the gateway's sync
//!   endpoint to the inventory tracker that owns the scheduler's store
//!
//! [`MemoryBus`] wires the services together inside one process (hub, tests),
//! `NatsBus` connects separately deployed services.

pub mod error;
pub mod memory;
#[cfg(feature = "nats")]
pub mod nats;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use tracing::trace;

pub use error::{BusError, BusResult};
pub use memory::MemoryBus;
#[cfg(feature = "nats")]
pub use nats::NatsBus;

pub const POLL_TASKS_TOPIC: &str = "nms.poll.tasks";
pub const METRICS_TOPIC: &str = "nms.metrics";
pub const INVENTORY_TOPIC: &str = "nms.inventory.sync";

/// Stream of raw payloads received on one topic
pub type Subscription = BoxStream<'static, Vec<u8>>;

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BusResult<()>;

    async fn subscribe(&self, topic: &str) -> BusResult<Subscription>;
}

/// Encode `value` as JSON and publish it on `topic`
pub async fn publish_json<T>(bus: &dyn MessageBus, topic: &str, value: &T) -> BusResult<()>
where
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_vec(value)?;
    trace!("publishing {} bytes on {topic}", payload.len());
    bus.publish(topic, payload).await
}
