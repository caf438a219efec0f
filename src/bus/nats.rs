//! NATS transport for separately deployed services

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, info};

use super::{BusError, BusResult, MessageBus, Subscription};

#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connect to the broker; failure here is fatal for a service
    pub async fn connect(url: &str) -> BusResult<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BusError::ConnectionFailed(format!("{url}: {e}")))?;

        info!("connected to NATS at {url}");

        Ok(Self { client })
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BusResult<()> {
        self.client
            .publish(topic.to_string(), Bytes::from(payload))
            .await
            .map_err(|e| BusError::PublishFailed(e.to_string()))
    }

    async fn subscribe(&self, topic: &str) -> BusResult<Subscription> {
        let subscriber = self
            .client
            .subscribe(topic.to_string())
            .await
            .map_err(|e| BusError::SubscribeFailed(e.to_string()))?;

        debug!("subscribed to {topic}");

        Ok(subscriber.map(|message| message.payload.to_vec()).boxed())
    }
}
