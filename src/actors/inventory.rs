//! InventoryTracker - Keeps the scheduler's device store current
//!
//! ```text
//! nms.inventory.sync → decode InventorySnapshot → DeviceStore::replace_all
//! nms.metrics        → decode Metric            → DeviceRegistry::record_poll
//! ```
//!
//! Runs in the process that owns the store, so syncs accepted by a remote
//! gateway and poll outcomes from remote workers land where the scheduler
//! reads. A snapshot with duplicate IPs leaves the store untouched.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, trace, warn};

use crate::bus::{INVENTORY_TOPIC, METRICS_TOPIC, MessageBus, Subscription};
use crate::model::{InventorySnapshot, Metric};
use crate::registry::{DeviceRegistry, DeviceStore};

use super::messages::{InventoryCommand, InventoryStats};

pub struct InventoryTracker {
    store: Arc<DeviceStore>,
    snapshots: Subscription,
    metrics: Subscription,
    command_rx: mpsc::Receiver<InventoryCommand>,
    stats: InventoryStats,
}

impl InventoryTracker {
    pub fn new(
        store: Arc<DeviceStore>,
        snapshots: Subscription,
        metrics: Subscription,
        command_rx: mpsc::Receiver<InventoryCommand>,
    ) -> Self {
        Self {
            store,
            snapshots,
            metrics,
            command_rx,
            stats: InventoryStats::default(),
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting inventory tracker");

        loop {
            tokio::select! {
                payload = self.snapshots.next() => {
                    match payload {
                        Some(payload) => self.apply_snapshot(&payload).await,
                        None => {
                            warn!("inventory subscription ended, shutting down");
                            break;
                        }
                    }
                }

                payload = self.metrics.next() => {
                    match payload {
                        Some(payload) => self.record_metric(&payload).await,
                        None => {
                            warn!("metric subscription ended, shutting down");
                            break;
                        }
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        InventoryCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats);
                        }

                        InventoryCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("inventory tracker stopped");
    }

    async fn apply_snapshot(&mut self, payload: &[u8]) {
        let snapshot = match serde_json::from_slice::<InventorySnapshot>(payload) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.stats.malformed += 1;
                warn!("dropping malformed inventory snapshot: {e}");
                return;
            }
        };

        match self.store.replace_all(snapshot.devices).await {
            Ok(count) => {
                self.stats.syncs_applied += 1;
                info!("inventory replaced with {count} devices (synced at {})", snapshot.timestamp);
            }
            Err(e) => {
                self.stats.syncs_rejected += 1;
                warn!("rejected inventory snapshot: {e}");
            }
        }
    }

    async fn record_metric(&mut self, payload: &[u8]) {
        let metric = match serde_json::from_slice::<Metric>(payload) {
            Ok(metric) => metric,
            Err(e) => {
                self.stats.malformed += 1;
                warn!("dropping malformed metric: {e}");
                return;
            }
        };

        let Some(success) = metric.value("success") else {
            trace!("metric for {} carries no poll outcome", metric.device_id);
            return;
        };

        self.store
            .record_poll(&metric.device_id, success.as_f64() != 0.0, metric.timestamp)
            .await;
        self.stats.polls_recorded += 1;
    }
}

/// Handle for controlling the inventory tracker
#[derive(Clone)]
pub struct InventoryHandle {
    sender: mpsc::Sender<InventoryCommand>,
}

impl InventoryHandle {
    /// Subscribe to inventory snapshots and metrics, then start tracking
    pub async fn spawn(bus: &dyn MessageBus, store: Arc<DeviceStore>) -> Result<Self> {
        let snapshots = bus
            .subscribe(INVENTORY_TOPIC)
            .await
            .context("failed to subscribe to inventory snapshots")?;
        let metrics = bus
            .subscribe(METRICS_TOPIC)
            .await
            .context("failed to subscribe to metrics")?;

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let actor = InventoryTracker::new(store, snapshots, metrics, cmd_rx);
        tokio::spawn(actor.run());

        Ok(Self { sender: cmd_tx })
    }

    pub async fn stats(&self) -> Result<InventoryStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(InventoryCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(InventoryCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;

        self.sender.closed().await;
        Ok(())
    }
}
