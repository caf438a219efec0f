//! End-to-end tests of scheduler → worker → alert engine over the in-process bus

use std::sync::Arc;
use std::time::Duration;

use optical_nms::{
    DeviceStatus, MetricValue, Protocol,
    actors::{AlertHandle, PollPipeline, SchedulerHandle, WorkerHandle},
    bus::{MemoryBus, MessageBus},
    registry::{DeviceRegistry, DeviceStore},
    rules::RuleSet,
    sink::MemorySink,
};

use crate::helpers::*;

const HOUR: Duration = Duration::from_secs(3600);

struct Pipeline {
    store: Arc<DeviceStore>,
    sink: Arc<MemorySink>,
    notifier: Arc<RecordingNotifier>,
    scheduler: SchedulerHandle,
    worker: WorkerHandle,
    alerts: AlertHandle,
}

impl Pipeline {
    async fn start(store: DeviceStore, reachable: &[&str], rtt: Duration) -> Self {
        let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
        let store = Arc::new(store);
        let registry: Arc<dyn DeviceRegistry> = store.clone();
        let sink = Arc::new(MemorySink::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let alerts = AlertHandle::spawn(bus.as_ref(), RuleSet::defaults(), notifier.clone())
            .await
            .unwrap();

        let pipeline = PollPipeline::new(
            fake_adapters(reachable, rtt),
            sink.clone(),
            bus.clone(),
            Duration::from_secs(1),
        )
        .with_registry(registry.clone());
        let worker = WorkerHandle::spawn(pipeline).await.unwrap();

        // Long tick: only the immediate first round runs unless a test asks for more
        let scheduler = SchedulerHandle::spawn(registry, bus, HOUR);

        Self {
            store,
            sink,
            notifier,
            scheduler,
            worker,
            alerts,
        }
    }

    async fn stop(self) {
        self.scheduler.shutdown().await.unwrap();
        self.worker.shutdown().await.unwrap();
        self.alerts.shutdown().await.unwrap();
    }
}

#[tokio::test]
async fn test_unreachable_device_raises_device_down() {
    let store = DeviceStore::from_devices(vec![
        create_device("r1", "10.0.0.1", Protocol::Snmp),
        create_device("sw1", "10.0.0.2", Protocol::Ssh),
    ])
    .unwrap();
    let pipeline = Pipeline::start(store, &["10.0.0.1"], Duration::from_millis(5)).await;

    wait_for_completed(&pipeline.worker, 2).await;
    wait_for_evaluated(&pipeline.alerts, 2).await;

    assert_eq!(
        pipeline.notifier.subjects_for("sw1").await,
        vec!["NMS Alert: Device Down".to_string()]
    );
    assert!(pipeline.notifier.subjects_for("r1").await.is_empty());

    assert_eq!(pipeline.store.get("r1").await.unwrap().status, DeviceStatus::Online);
    assert!(pipeline.store.get("r1").await.unwrap().last_seen.is_some());
    assert_eq!(pipeline.store.get("sw1").await.unwrap().status, DeviceStatus::Offline);

    pipeline.stop().await;
}

#[tokio::test]
async fn test_high_latency_raises_warning() {
    let store =
        DeviceStore::from_devices(vec![create_device("r1", "10.0.0.1", Protocol::Snmp)]).unwrap();
    let pipeline = Pipeline::start(store, &["10.0.0.1"], Duration::from_millis(150)).await;

    wait_for_evaluated(&pipeline.alerts, 1).await;

    let sent = pipeline.notifier.sent.lock().await.clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "NMS Alert: High Latency (>100ms)");
    assert_eq!(sent[0].value, 150.0);

    pipeline.stop().await;
}

#[tokio::test]
async fn test_disabled_devices_are_never_polled() {
    let store = DeviceStore::from_devices(vec![
        create_device("r1", "10.0.0.1", Protocol::Snmp),
        create_disabled_device("r2", "10.0.0.2"),
    ])
    .unwrap();
    let pipeline = Pipeline::start(store, &["10.0.0.1", "10.0.0.2"], Duration::from_millis(1)).await;

    assert_eq!(pipeline.scheduler.tick_now().await.unwrap(), 1);
    wait_for_completed(&pipeline.worker, 2).await;

    let points = pipeline.sink.points().await;
    assert_eq!(points.len(), 2);
    assert!(points.iter().all(|p| p.tags["device_id"] == "r1"));
    assert_eq!(pipeline.store.get("r2").await.unwrap().status, DeviceStatus::Unknown);

    pipeline.stop().await;
}

#[tokio::test]
async fn test_failed_poll_still_writes_a_point() {
    let store =
        DeviceStore::from_devices(vec![create_device("sw1", "10.0.0.9", Protocol::Telnet)]).unwrap();
    let pipeline = Pipeline::start(store, &[], Duration::from_millis(1)).await;

    wait_for_completed(&pipeline.worker, 1).await;

    let points = pipeline.sink.points().await;
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].fields["success"], MetricValue::Bool(false));
    assert_eq!(points[0].fields["rtt_ms"], MetricValue::Number(0.0));

    pipeline.stop().await;
}
