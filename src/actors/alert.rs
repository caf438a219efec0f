//! AlertEngine - Evaluates metrics from the bus against a fixed rule set
//!
//! ```text
//! nms.metrics → decode Metric → RuleSet::evaluate → Notifier::send (once per match)
//! ```
//!
//! There is no deduplication: a rule that keeps matching notifies on every
//! metric. Payloads that do not decode are logged and dropped.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, trace, warn};

use crate::bus::{METRICS_TOPIC, MessageBus, Subscription};
use crate::model::Metric;
use crate::notify::{Notification, Notifier};
use crate::rules::RuleSet;

use super::messages::{AlertCommand, AlertStats};

pub struct AlertEngine {
    rules: RuleSet,
    notifier: Arc<dyn Notifier>,
    metrics: Subscription,
    command_rx: mpsc::Receiver<AlertCommand>,
    stats: AlertStats,
}

impl AlertEngine {
    pub fn new(
        rules: RuleSet,
        notifier: Arc<dyn Notifier>,
        metrics: Subscription,
        command_rx: mpsc::Receiver<AlertCommand>,
    ) -> Self {
        Self {
            rules,
            notifier,
            metrics,
            command_rx,
            stats: AlertStats::default(),
        }
    }

    #[instrument(skip(self), fields(rules = self.rules.len()))]
    pub async fn run(mut self) {
        debug!("starting alert engine");

        loop {
            tokio::select! {
                payload = self.metrics.next() => {
                    match payload {
                        Some(payload) => self.handle_payload(&payload).await,
                        None => {
                            warn!("metric subscription ended, shutting down");
                            break;
                        }
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        AlertCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats);
                        }

                        AlertCommand::Shutdown => {
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

        debug!("alert engine stopped");
    }

    async fn handle_payload(&mut self, payload: &[u8]) {
        match serde_json::from_slice::<Metric>(payload) {
            Ok(metric) => self.evaluate(&metric).await,
            Err(e) => {
                self.stats.malformed += 1;
                warn!("dropping malformed metric: {e}");
            }
        }
    }

    #[instrument(skip_all, fields(device = %metric.device_id))]
    async fn evaluate(&mut self, metric: &Metric) {
        self.stats.metrics_evaluated += 1;

        let notifications: Vec<Notification> = self
            .rules
            .evaluate(metric)
            .iter()
            .map(|violation| Notification::from_violation(violation, metric))
            .collect();

        if notifications.is_empty() {
            trace!("no rule matched");
            return;
        }

        for notification in &notifications {
            debug!("{}", notification.body);
            self.stats.alerts_fired += 1;

            if let Err(e) = self.notifier.send(notification).await {
                self.stats.notify_failures += 1;
                warn!("failed to deliver alert {}: {e:#}", notification.rule_id);
            }
        }
    }
}

/// Handle for controlling the alert engine
#[derive(Clone)]
pub struct AlertHandle {
    sender: mpsc::Sender<AlertCommand>,
}

impl AlertHandle {
    /// Subscribe to the metric topic and start evaluating
    pub async fn spawn(
        bus: &dyn MessageBus,
        rules: RuleSet,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let metrics = bus
            .subscribe(METRICS_TOPIC)
            .await
            .context("failed to subscribe to metrics")?;

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let actor = AlertEngine::new(rules, notifier, metrics, cmd_rx);
        tokio::spawn(actor.run());

        Ok(Self { sender: cmd_tx })
    }

    pub async fn stats(&self) -> Result<AlertStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(AlertCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;

        self.sender.closed().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{MemoryBus, publish_json};
    use crate::rules::{AlertRule, Operator, Severity};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Notifier that remembers what it was asked to send
    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
            self.sent.lock().await.push(notification.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        async fn send(&self, _notification: &Notification) -> anyhow::Result<()> {
            anyhow::bail!("smtp relay refused")
        }
    }

    fn metric(device_id: &str, values: &[(&str, crate::model::MetricValue)]) -> Metric {
        let mut metric = Metric::new(device_id, "10.0.0.1".parse().unwrap(), Utc::now());
        for (name, value) in values {
            metric.insert(*name, *value);
        }
        metric
    }

    async fn wait_for_evaluated(handle: &AlertHandle, count: u64) -> AlertStats {
        loop {
            let stats = handle.stats().await.unwrap();
            if stats.metrics_evaluated + stats.malformed >= count {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_high_latency_notifies_once() {
        let bus = MemoryBus::new();
        let recorder = Arc::new(Recorder::default());
        let handle = AlertHandle::spawn(&bus, RuleSet::defaults(), recorder.clone())
            .await
            .unwrap();

        let sample = metric("r1", &[("rtt_ms", 150.0.into()), ("success", true.into())]);
        publish_json(&bus, METRICS_TOPIC, &sample).await.unwrap();

        let stats = wait_for_evaluated(&handle, 1).await;
        assert_eq!(stats.alerts_fired, 1);

        let sent = recorder.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "NMS Alert: High Latency (>100ms)");
        assert_eq!(sent[0].rule_id, "rule-1");
    }

    #[tokio::test]
    async fn test_device_down_fires() {
        let bus = MemoryBus::new();
        let recorder = Arc::new(Recorder::default());
        let handle = AlertHandle::spawn(&bus, RuleSet::defaults(), recorder.clone())
            .await
            .unwrap();

        let sample = metric("sw1", &[("rtt_ms", 0.0.into()), ("success", false.into())]);
        publish_json(&bus, METRICS_TOPIC, &sample).await.unwrap();
        wait_for_evaluated(&handle, 1).await;

        let sent = recorder.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "NMS Alert: Device Down");
        assert!(sent[0].body.starts_with("ALERT [critical]: Device sw1 (10.0.0.1)"));
    }

    #[tokio::test]
    async fn test_malformed_payload_keeps_subscription_alive() {
        let bus = MemoryBus::new();
        let recorder = Arc::new(Recorder::default());
        let handle = AlertHandle::spawn(&bus, RuleSet::defaults(), recorder.clone())
            .await
            .unwrap();

        bus.publish(METRICS_TOPIC, b"garbage".to_vec()).await.unwrap();
        let sample = metric("r1", &[("success", false.into())]);
        publish_json(&bus, METRICS_TOPIC, &sample).await.unwrap();

        let stats = wait_for_evaluated(&handle, 2).await;
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.metrics_evaluated, 1);
        assert_eq!(recorder.sent.lock().await.len(), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_scoped_rule_ignores_other_devices() {
        let rules = RuleSet::new(vec![AlertRule {
            id: "olt-temp".to_string(),
            device_id: Some("olt-1".to_string()),
            metric_name: "temperature".to_string(),
            operator: Operator::Ge,
            threshold: 60.0,
            severity: Severity::Critical,
            description: "OLT overheating".to_string(),
        }]);

        let bus = MemoryBus::new();
        let recorder = Arc::new(Recorder::default());
        let handle = AlertHandle::spawn(&bus, rules, recorder.clone()).await.unwrap();

        publish_json(&bus, METRICS_TOPIC, &metric("olt-2", &[("temperature", 70.0.into())]))
            .await
            .unwrap();
        publish_json(&bus, METRICS_TOPIC, &metric("olt-1", &[("temperature", 60.0.into())]))
            .await
            .unwrap();
        wait_for_evaluated(&handle, 2).await;

        let sent = recorder.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].device_id, "olt-1");
    }

    #[tokio::test]
    async fn test_notifier_failures_are_counted() {
        let bus = MemoryBus::new();
        let handle = AlertHandle::spawn(&bus, RuleSet::defaults(), Arc::new(Failing))
            .await
            .unwrap();

        let sample = metric("r1", &[("rtt_ms", 500.0.into()), ("success", false.into())]);
        publish_json(&bus, METRICS_TOPIC, &sample).await.unwrap();

        let stats = wait_for_evaluated(&handle, 1).await;
        assert_eq!(stats.alerts_fired, 2);
        assert_eq!(stats.notify_failures, 2);
    }
}
