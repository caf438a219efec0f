//! Worker - Executes poll tasks received from the bus
//!
//! Every task runs on its own tokio task so a slow device never holds up the
//! others. The adapter is chosen by the task's protocol alone:
//!
//! - `mikrotik_api`: RouterOS resource query, with an ICMP echo alongside for RTT
//! - everything else: a single ICMP echo
//!
//! Each attempt, successful or not, ends with one `device_poll` point in the
//! sink and one `Metric` on `nms.metrics`. Router interface counters become
//! extra `interface_metrics` points.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio::time::timeout;
use tracing::{debug, info, instrument, trace, warn};

use crate::bus::{METRICS_TOPIC, MessageBus, POLL_TASKS_TOPIC, Subscription, publish_json};
use crate::config::WorkerConfig;
use crate::model::{Metric, MetricValue, PollTask, Protocol};
use crate::protocols::mikrotik::MikrotikAdapter;
use crate::protocols::ping::PingAdapter;
use crate::protocols::{PollAdapter, PollOutcome};
use crate::registry::DeviceRegistry;
use crate::sink::{MetricSink, Point};

use super::messages::{WorkerCommand, WorkerStats};

/// The adapters a worker can dispatch to
#[derive(Clone)]
pub struct Adapters {
    pub ping: Arc<dyn PollAdapter>,
    pub mikrotik: Arc<dyn PollAdapter>,
}

impl Adapters {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            ping: Arc::new(PingAdapter::new(config.ping_timeout())),
            mikrotik: Arc::new(MikrotikAdapter::new(&config.mikrotik)),
        }
    }
}

/// Everything needed to turn a `PollTask` into a point and a metric
pub struct PollPipeline {
    adapters: Adapters,
    sink: Arc<dyn MetricSink>,
    bus: Arc<dyn MessageBus>,
    registry: Option<Arc<dyn DeviceRegistry>>,
    poll_timeout: Duration,
}

impl PollPipeline {
    pub fn new(
        adapters: Adapters,
        sink: Arc<dyn MetricSink>,
        bus: Arc<dyn MessageBus>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            adapters,
            sink,
            bus,
            registry: None,
            poll_timeout,
        }
    }

    /// Report poll outcomes back to a device registry
    pub fn with_registry(mut self, registry: Arc<dyn DeviceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Poll one device and emit its results; returns whether the device answered
    #[instrument(skip_all, fields(device = %task.device_id, protocol = %task.protocol))]
    pub async fn execute(&self, task: PollTask) -> bool {
        let started = Instant::now();
        let outcome = self.poll(&task).await;
        let poll_duration = started.elapsed();
        let now = Utc::now();

        let success = outcome.success;
        let rtt_ms = outcome.rtt_ms();
        let PollOutcome {
            mut fields,
            tags,
            interfaces,
            ..
        } = outcome;

        fields.insert("rtt_ms".to_string(), MetricValue::from(rtt_ms));
        fields.insert("success".to_string(), MetricValue::from(success));
        fields.insert(
            "poll_duration_ms".to_string(),
            MetricValue::from(poll_duration.as_micros() as f64 / 1000.0),
        );

        let point = Point::device_poll(&task, fields.clone(), now);
        if let Err(e) = self.sink.write_point(point).await {
            warn!("failed to write poll point: {e}");
        }

        for stats in &interfaces {
            let point = Point::interface(&task, stats, now);
            if let Err(e) = self.sink.write_point(point).await {
                warn!("failed to write interface point for {}: {e}", stats.name);
            }
        }

        let mut metric = Metric::new(task.device_id.clone(), task.ip_address, now);
        metric.values = fields;
        metric.tags = tags;
        metric
            .tags
            .insert("device_type".to_string(), task.device_type.to_string());
        metric
            .tags
            .insert("protocol".to_string(), task.protocol.to_string());

        if let Err(e) = publish_json(self.bus.as_ref(), METRICS_TOPIC, &metric).await {
            warn!("failed to publish metric: {e}");
        }

        if let Some(registry) = &self.registry {
            registry.record_poll(&task.device_id, success, now).await;
        }

        debug!("poll finished: success={success} rtt={rtt_ms:.3}ms");
        success
    }

    async fn poll(&self, task: &PollTask) -> PollOutcome {
        match task.protocol {
            Protocol::MikrotikApi => {
                let (vendor, echo) = tokio::join!(
                    self.bounded(self.adapters.mikrotik.as_ref(), task),
                    self.bounded(self.adapters.ping.as_ref(), task),
                );
                PollOutcome {
                    rtt: echo.rtt,
                    ..vendor
                }
            }
            _ => self.bounded(self.adapters.ping.as_ref(), task).await,
        }
    }

    /// Run one adapter under the poll deadline; a missed deadline is a failed poll
    async fn bounded(&self, adapter: &dyn PollAdapter, task: &PollTask) -> PollOutcome {
        match timeout(self.poll_timeout, adapter.poll(task)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    "{} poll timed out after {:?}",
                    adapter.name(),
                    self.poll_timeout
                );
                PollOutcome::unreachable()
            }
        }
    }
}

pub struct Worker {
    pipeline: Arc<PollPipeline>,
    tasks: Subscription,
    command_rx: mpsc::Receiver<WorkerCommand>,
    running: JoinSet<bool>,
    stats: WorkerStats,
}

impl Worker {
    pub fn new(
        pipeline: PollPipeline,
        tasks: Subscription,
        command_rx: mpsc::Receiver<WorkerCommand>,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            tasks,
            command_rx,
            running: JoinSet::new(),
            stats: WorkerStats::default(),
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting worker");

        loop {
            tokio::select! {
                payload = self.tasks.next() => {
                    match payload {
                        Some(payload) => self.dispatch(&payload),
                        None => {
                            warn!("task subscription ended, shutting down");
                            break;
                        }
                    }
                }

                Some(result) = self.running.join_next(), if !self.running.is_empty() => {
                    self.reap(result);
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        WorkerCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.current_stats());
                        }

                        WorkerCommand::Shutdown => {
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

        if !self.running.is_empty() {
            info!("waiting for {} running polls", self.running.len());
        }
        while let Some(result) = self.running.join_next().await {
            self.reap(result);
        }

        debug!("worker stopped");
    }

    fn dispatch(&mut self, payload: &[u8]) {
        let task: PollTask = match serde_json::from_slice(payload) {
            Ok(task) => task,
            Err(e) => {
                self.stats.malformed += 1;
                warn!("dropping malformed poll task: {e}");
                return;
            }
        };

        trace!("received poll task for {}", task.device_id);
        self.stats.received += 1;

        let pipeline = Arc::clone(&self.pipeline);
        self.running
            .spawn(async move { pipeline.execute(task).await });
    }

    fn reap(&mut self, result: Result<bool, JoinError>) {
        match result {
            Ok(success) => {
                self.stats.completed += 1;
                if success {
                    self.stats.succeeded += 1;
                }
            }
            Err(e) => warn!("poll task failed to complete: {e}"),
        }
    }

    fn current_stats(&self) -> WorkerStats {
        WorkerStats {
            in_flight: self.running.len(),
            ..self.stats
        }
    }
}

/// Handle for controlling a worker
#[derive(Clone)]
pub struct WorkerHandle {
    sender: mpsc::Sender<WorkerCommand>,
}

impl WorkerHandle {
    /// Subscribe to the task topic and start consuming
    pub async fn spawn(pipeline: PollPipeline) -> Result<Self> {
        let tasks = pipeline
            .bus
            .subscribe(POLL_TASKS_TOPIC)
            .await
            .context("failed to subscribe to poll tasks")?;

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let actor = Worker::new(pipeline, tasks, cmd_rx);
        tokio::spawn(actor.run());

        Ok(Self { sender: cmd_tx })
    }

    pub async fn stats(&self) -> Result<WorkerStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WorkerCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive response")
    }

    /// Stop consuming and wait for running polls to finish
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(WorkerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;

        self.sender.closed().await;
        Ok(())
    }
}
