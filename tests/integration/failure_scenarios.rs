//! Failure tests for the pipeline
//!
//! These tests verify that the system handles failures gracefully:
//! - Unavailable time-series store
//! - Failing notification sinks
//! - Message bus errors
//! - Malformed payloads

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use optical_nms::{
    Metric, Protocol,
    actors::{AlertHandle, PollPipeline, SchedulerHandle, WorkerHandle},
    bus::{
        BusError, BusResult, METRICS_TOPIC, MemoryBus, MessageBus, POLL_TASKS_TOPIC,
        Subscription, publish_json,
    },
    config::InfluxConfig,
    notify::WebhookNotifier,
    registry::DeviceStore,
    rules::RuleSet,
    sink::InfluxSink,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_sink_outage_does_not_block_metrics() {
    let influx = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/write"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&influx)
        .await;

    let sink = InfluxSink::new(&InfluxConfig {
        url: influx.uri(),
        token: "token".to_string(),
        org: "noc".to_string(),
        bucket: "polls".to_string(),
    })
    .unwrap();

    let bus = Arc::new(MemoryBus::new());
    let mut metrics = bus.subscribe(METRICS_TOPIC).await.unwrap();

    let pipeline = PollPipeline::new(
        fake_adapters(&["10.0.0.1"], Duration::from_millis(2)),
        Arc::new(sink),
        bus.clone(),
        Duration::from_secs(1),
    );
    let worker = WorkerHandle::spawn(pipeline).await.unwrap();

    let device = create_device("r1", "10.0.0.1", Protocol::Snmp);
    let task = optical_nms::PollTask::for_device(&device, chrono::Utc::now());
    publish_json(bus.as_ref(), POLL_TASKS_TOPIC, &task).await.unwrap();

    let payload = tokio::time::timeout(Duration::from_secs(5), metrics.next())
        .await
        .unwrap()
        .unwrap();
    let metric: Metric = serde_json::from_slice(&payload).unwrap();
    assert_eq!(metric.device_id, "r1");

    worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failing_webhook_does_not_stop_evaluation() {
    let hook = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&hook)
        .await;

    let bus = MemoryBus::new();
    let alerts = AlertHandle::spawn(
        &bus,
        RuleSet::defaults(),
        Arc::new(WebhookNotifier::new(hook.uri())),
    )
    .await
    .unwrap();

    for device_id in ["a", "b"] {
        let mut metric = Metric::new(device_id, "10.0.0.1".parse().unwrap(), chrono::Utc::now());
        metric.insert("success", false);
        publish_json(&bus, METRICS_TOPIC, &metric).await.unwrap();
    }

    let stats = wait_for_evaluated(&alerts, 2).await;
    assert_eq!(stats.alerts_fired, 2);
    assert_eq!(stats.notify_failures, 2);

    alerts.shutdown().await.unwrap();
}

/// Bus that refuses every publish
#[derive(Default)]
struct RefusingBus {
    attempts: AtomicUsize,
}

#[async_trait]
impl MessageBus for RefusingBus {
    async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> BusResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(BusError::PublishFailed("broker unavailable".to_string()))
    }

    async fn subscribe(&self, topic: &str) -> BusResult<Subscription> {
        Err(BusError::SubscribeFailed(topic.to_string()))
    }
}

#[tokio::test]
async fn test_scheduler_survives_publish_failures() {
    let store = DeviceStore::from_devices(vec![
        create_device("r1", "10.0.0.1", Protocol::Snmp),
        create_device("r2", "10.0.0.2", Protocol::MikrotikApi),
    ])
    .unwrap();
    let bus = Arc::new(RefusingBus::default());

    let scheduler = SchedulerHandle::spawn(Arc::new(store), bus.clone(), Duration::from_secs(3600));

    assert_eq!(scheduler.tick_now().await.unwrap(), 0);
    assert_eq!(scheduler.tick_now().await.unwrap(), 0);
    // Two manual rounds plus the immediate first one, two devices each
    assert!(bus.attempts.load(Ordering::SeqCst) >= 4);

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_worker_spawn_fails_without_subscription() {
    let pipeline = PollPipeline::new(
        fake_adapters(&[], Duration::ZERO),
        Arc::new(optical_nms::sink::MemorySink::new()),
        Arc::new(RefusingBus::default()),
        Duration::from_secs(1),
    );

    let err = WorkerHandle::spawn(pipeline).await.err().unwrap();
    assert!(err.to_string().contains("failed to subscribe to poll tasks"));
}

#[tokio::test]
async fn test_malformed_metrics_are_dropped() {
    let bus = MemoryBus::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let alerts = AlertHandle::spawn(&bus, RuleSet::defaults(), notifier.clone())
        .await
        .unwrap();

    bus.publish(METRICS_TOPIC, b"{\"device_id\": 5}".to_vec())
        .await
        .unwrap();
    bus.publish(METRICS_TOPIC, Vec::new()).await.unwrap();

    let stats = wait_for_evaluated(&alerts, 2).await;
    assert_eq!(stats.malformed, 2);
    assert!(notifier.sent.lock().await.is_empty());

    alerts.shutdown().await.unwrap();
}
