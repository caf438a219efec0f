//! Scheduler - Dispatches one poll task per enabled device on every tick
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → list devices → keep enabled → publish PollTask on nms.poll.tasks
//!     ↑
//!     └─── Commands (TickNow, Shutdown)
//! ```
//!
//! Registry and publish failures are logged and the next tick tries again.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::bus::{MessageBus, POLL_TASKS_TOPIC, publish_json};
use crate::model::PollTask;
use crate::registry::DeviceRegistry;

use super::messages::SchedulerCommand;

pub struct Scheduler {
    registry: Arc<dyn DeviceRegistry>,
    bus: Arc<dyn MessageBus>,
    tick: Duration,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl Scheduler {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        bus: Arc<dyn MessageBus>,
        tick: Duration,
        command_rx: mpsc::Receiver<SchedulerCommand>,
    ) -> Self {
        Self {
            registry,
            bus,
            tick,
            command_rx,
        }
    }

    #[instrument(skip(self), fields(tick = ?self.tick))]
    pub async fn run(mut self) {
        debug!("starting scheduler");

        // The first tick completes immediately
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.schedule_polls().await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        SchedulerCommand::TickNow { respond_to } => {
                            let published = self.schedule_polls().await;
                            let _ = respond_to.send(published);
                        }

                        SchedulerCommand::Shutdown => {
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

        debug!("scheduler stopped");
    }

    /// Publish a task for every enabled device, returning how many were published
    pub async fn schedule_polls(&self) -> usize {
        let devices = match self.registry.list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                error!("failed to list devices: {e:#}");
                return 0;
            }
        };

        let now = Utc::now();
        let mut published = 0;

        for device in devices.iter().filter(|d| d.enabled) {
            let task = PollTask::for_device(device, now);
            match publish_json(self.bus.as_ref(), POLL_TASKS_TOPIC, &task).await {
                Ok(()) => {
                    trace!("scheduled poll for {}", device.id);
                    published += 1;
                }
                Err(e) => warn!("failed to publish poll task for {}: {e}", device.id),
            }
        }

        info!("scheduled {published} of {} devices", devices.len());
        published
    }
}

/// Handle for controlling the scheduler
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub fn spawn(
        registry: Arc<dyn DeviceRegistry>,
        bus: Arc<dyn MessageBus>,
        tick: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let actor = Scheduler::new(registry, bus, tick, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Dispatch a round right away, bypassing the timer
    pub async fn tick_now(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::TickNow { respond_to: tx })
            .await
            .context("failed to send TickNow command")?;

        rx.await.context("failed to receive response")
    }

    /// Stop the scheduler and wait until it has exited
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SchedulerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;

        self.sender.closed().await;
        Ok(())
    }
}
