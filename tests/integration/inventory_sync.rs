//! Split deployment: gateway, collector and worker share nothing but the bus
//!
//! The collector side owns the store and runs the scheduler next to the
//! inventory tracker. The worker runs without a registry and the gateway only
//! publishes syncs, as the separate binaries do.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use optical_nms::{
    ApiAuth, DeviceStatus, PollTask, Protocol,
    actors::{InventoryHandle, PollPipeline, SchedulerHandle, WorkerHandle},
    bus::{MemoryBus, MessageBus, POLL_TASKS_TOPIC},
    registry::{DeviceStore, InventorySync, PublishedInventory},
    sink::MemorySink,
};

use crate::helpers::*;

const HOUR: Duration = Duration::from_secs(3600);

struct Collector {
    store: Arc<DeviceStore>,
    tracker: InventoryHandle,
    scheduler: SchedulerHandle,
}

impl Collector {
    async fn start(bus: &Arc<dyn MessageBus>, store: DeviceStore) -> Self {
        let store = Arc::new(store);
        let tracker = InventoryHandle::spawn(bus.as_ref(), store.clone()).await.unwrap();
        let scheduler = SchedulerHandle::spawn(store.clone(), bus.clone(), HOUR);

        Self {
            store,
            tracker,
            scheduler,
        }
    }

    async fn stop(self) {
        self.scheduler.shutdown().await.unwrap();
        self.tracker.shutdown().await.unwrap();
    }
}

async fn start_worker(bus: &Arc<dyn MessageBus>, reachable: &[&str]) -> WorkerHandle {
    let pipeline = PollPipeline::new(
        fake_adapters(reachable, Duration::from_millis(4)),
        Arc::new(MemorySink::new()),
        bus.clone(),
        Duration::from_secs(1),
    );
    WorkerHandle::spawn(pipeline).await.unwrap()
}

#[tokio::test]
async fn test_gateway_sync_reaches_scheduler_store() {
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
    let seeded = DeviceStore::from_devices(vec![create_device("r1", "10.0.0.1", Protocol::Snmp)]).unwrap();
    let collector = Collector::start(&bus, seeded).await;

    let gateway = PublishedInventory::new(bus.clone(), Vec::new()).unwrap();

    let mut edge = create_device("edge", "10.0.0.2", Protocol::MikrotikApi);
    edge.auth = Some(ApiAuth {
        username: "monitor".to_string(),
        password: "s3cret".to_string(),
        port: Some(8729),
    });
    let count = gateway
        .sync(vec![edge, create_device("sw1", "10.0.0.9", Protocol::Ssh)])
        .await
        .unwrap();
    assert_eq!(count, 2);

    wait_for_tracked(&collector.tracker, |s| s.syncs_applied >= 1).await;
    assert_eq!(collector.store.len().await, 2);
    assert!(collector.store.get("r1").await.is_none());

    let mut tasks = bus.subscribe(POLL_TASKS_TOPIC).await.unwrap();
    assert_eq!(collector.scheduler.tick_now().await.unwrap(), 2);

    let task = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let payload = tasks.next().await.unwrap();
            let task: PollTask = serde_json::from_slice(&payload).unwrap();
            if task.device_id == "edge" {
                return task;
            }
        }
    })
    .await
    .expect("no task for the synced device");

    let auth = task.auth.expect("synced credentials travel with the task");
    assert_eq!(auth.username, "monitor");
    assert_eq!(auth.port, Some(8729));

    collector.stop().await;
}

#[tokio::test]
async fn test_remote_poll_outcomes_reach_scheduler_store() {
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
    let store = DeviceStore::from_devices(vec![
        create_device("r1", "10.0.0.1", Protocol::Snmp),
        create_device("sw1", "10.0.0.9", Protocol::Telnet),
    ])
    .unwrap();

    // Worker first so the scheduler's immediate round is consumed
    let worker = start_worker(&bus, &["10.0.0.1"]).await;
    let collector = Collector::start(&bus, store).await;

    wait_for_completed(&worker, 2).await;
    wait_for_tracked(&collector.tracker, |s| s.polls_recorded >= 2).await;

    let r1 = collector.store.get("r1").await.unwrap();
    assert_eq!(r1.status, DeviceStatus::Online);
    assert!(r1.last_seen.is_some());
    assert_eq!(collector.store.get("sw1").await.unwrap().status, DeviceStatus::Offline);

    worker.shutdown().await.unwrap();
    collector.stop().await;
}

#[tokio::test]
async fn test_synced_device_is_polled_and_tracked() {
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
    let worker = start_worker(&bus, &["10.0.0.2"]).await;
    let collector = Collector::start(&bus, DeviceStore::new()).await;
    let gateway = PublishedInventory::new(bus.clone(), Vec::new()).unwrap();

    gateway
        .sync(vec![create_device("r2", "10.0.0.2", Protocol::Snmp)])
        .await
        .unwrap();
    wait_for_tracked(&collector.tracker, |s| s.syncs_applied >= 1).await;

    assert_eq!(collector.scheduler.tick_now().await.unwrap(), 1);
    wait_for_tracked(&collector.tracker, |s| s.polls_recorded >= 1).await;

    assert_eq!(collector.store.get("r2").await.unwrap().status, DeviceStatus::Online);

    worker.shutdown().await.unwrap();
    collector.stop().await;
}

#[tokio::test]
async fn test_rejected_sync_leaves_scheduler_store() {
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
    let seeded = DeviceStore::from_devices(vec![create_device("r1", "10.0.0.1", Protocol::Snmp)]).unwrap();
    let collector = Collector::start(&bus, seeded).await;
    let gateway = PublishedInventory::new(bus.clone(), Vec::new()).unwrap();

    let result = gateway
        .sync(vec![
            create_device("a", "10.0.0.7", Protocol::Ssh),
            create_device("b", "10.0.0.7", Protocol::Ssh),
        ])
        .await;
    assert!(result.is_err());

    // A later valid sync is the first thing the tracker sees
    gateway
        .sync(vec![create_device("c", "10.0.0.8", Protocol::Ssh)])
        .await
        .unwrap();
    let stats = wait_for_tracked(&collector.tracker, |s| s.syncs_applied >= 1).await;
    assert_eq!(stats.syncs_rejected, 0);
    assert_eq!(stats.syncs_applied, 1);

    let ids: Vec<String> = collector.store.list().await.into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec!["c"]);

    collector.stop().await;
}
