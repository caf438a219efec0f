//! In-process bus backed by one `broadcast` channel per topic

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tokio::sync::{RwLock, broadcast};
use tracing::{trace, warn};

use super::{BusResult, MessageBus, Subscription};

const DEFAULT_CAPACITY: usize = 1024;

pub struct MemoryBus {
    topics: RwLock<HashMap<String, broadcast::Sender<Vec<u8>>>>,
    capacity: usize,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    async fn sender(&self, topic: &str) -> broadcast::Sender<Vec<u8>> {
        if let Some(sender) = self.topics.read().await.get(topic) {
            return sender.clone();
        }

        self.topics
            .write()
            .await
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BusResult<()> {
        match self.sender(topic).await.send(payload) {
            Ok(receivers) => trace!("delivered message on {topic} to {receivers} subscribers"),
            Err(_) => trace!("no subscribers on {topic} (this is OK)"),
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> BusResult<Subscription> {
        let receiver = self.sender(topic).await.subscribe();
        let topic = topic.to_string();

        let messages = stream::unfold(receiver, move |mut receiver| {
            let topic = topic.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(payload) => return Some((payload, receiver)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("subscriber on {topic} lagged, skipped {skipped} messages");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(messages.boxed())
    }
}
