//! Helper functions for integration tests

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use optical_nms::{
    Device, DeviceType, PollTask, Protocol,
    actors::{
        Adapters, AlertHandle, AlertStats, InventoryHandle, InventoryStats, WorkerHandle, WorkerStats,
    },
    notify::{Notification, Notifier},
    protocols::{PollAdapter, PollOutcome},
    protocols::snmp::{SnmpValue, memory::MemoryAgent, oids},
};
use tokio::sync::Mutex;

pub fn create_device(id: &str, ip: &str, protocol: Protocol) -> Device {
    let mut device = Device::new(id, ip.parse().unwrap(), DeviceType::Router, protocol);
    device.name = format!("{id}-name");
    device
}

pub fn create_disabled_device(id: &str, ip: &str) -> Device {
    let mut device = create_device(id, ip, Protocol::Snmp);
    device.enabled = false;
    device
}

/// Ping stand-in: answers for the listed addresses only
pub struct FakePing {
    reachable: HashSet<IpAddr>,
    rtt: Duration,
}

impl FakePing {
    pub fn answering(ips: &[&str], rtt: Duration) -> Arc<Self> {
        Arc::new(Self {
            reachable: ips.iter().map(|ip| ip.parse().unwrap()).collect(),
            rtt,
        })
    }
}

#[async_trait]
impl PollAdapter for FakePing {
    fn name(&self) -> &'static str {
        "fake-ping"
    }

    async fn poll(&self, task: &PollTask) -> PollOutcome {
        if self.reachable.contains(&task.ip_address) {
            PollOutcome::reachable(self.rtt)
        } else {
            PollOutcome::unreachable()
        }
    }
}

pub fn fake_adapters(reachable: &[&str], rtt: Duration) -> Adapters {
    Adapters {
        ping: FakePing::answering(reachable, rtt),
        mikrotik: FakePing::answering(&[], rtt),
    }
}

/// Notifier that keeps every notification
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub async fn subjects_for(&self, device_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|n| n.device_id == device_id)
            .map(|n| n.subject.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

/// Poll `handle` until at least `count` polls have completed
pub async fn wait_for_completed(handle: &WorkerHandle, count: u64) -> WorkerStats {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let stats = handle.stats().await.unwrap();
            if stats.completed >= count {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("worker did not complete polls in time")
}

/// Poll `handle` until at least `count` metrics were evaluated
pub async fn wait_for_evaluated(handle: &AlertHandle, count: u64) -> AlertStats {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let stats = handle.stats().await.unwrap();
            if stats.metrics_evaluated + stats.malformed >= count {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("alert engine did not evaluate metrics in time")
}

/// Poll `handle` until its stats satisfy `done`
pub async fn wait_for_tracked(
    handle: &InventoryHandle,
    done: impl Fn(&InventoryStats) -> bool,
) -> InventoryStats {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let stats = handle.stats().await.unwrap();
            if done(&stats) {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("inventory tracker did not catch up in time")
}

/// A two-card OLT with two PON ports and three ONTs
pub fn create_olt_agent() -> MemoryAgent {
    MemoryAgent::new()
        .with(oids::SYS_DESCR, SnmpValue::OctetString(b"ZXA10 C300".to_vec()))
        .with(oids::SYS_NAME, SnmpValue::OctetString(b"olt-north".to_vec()))
        .with(oids::SYS_UPTIME, SnmpValue::TimeTicks(360_000))
        .with_row(oids::CARD_CPU_USAGE, 1, SnmpValue::Integer(20))
        .with_row(oids::CARD_CPU_USAGE, 2, SnmpValue::Integer(45))
        .with_row(oids::CARD_TEMPERATURE, 1, SnmpValue::Integer(52))
        .with_row(oids::CARD_MEMORY_USAGE, 1, SnmpValue::Integer(25))
        .with_row(oids::CARD_MEMORY_TOTAL, 1, SnmpValue::Integer(512))
        .with_row(oids::PON_ADMIN_STATUS, 1, SnmpValue::Integer(1))
        .with_row(oids::PON_ADMIN_STATUS, 2, SnmpValue::Integer(1))
        .with_row(oids::PON_OPER_STATUS, 1, SnmpValue::Integer(1))
        .with_row(oids::PON_OPER_STATUS, 2, SnmpValue::Integer(2))
        .with_row(oids::PON_TX_POWER, 1, SnmpValue::Integer(25))
        .with_row(oids::PON_RX_POWER, 1, SnmpValue::Integer(-180))
        .with_row(oids::PON_ONT_COUNT, 1, SnmpValue::Integer(2))
        .with_row(oids::ONT_OPER_STATUS, 10, SnmpValue::Integer(1))
        .with_row(oids::ONT_OPER_STATUS, 11, SnmpValue::Integer(2))
        .with_row(oids::ONT_OPER_STATUS, 12, SnmpValue::Integer(1))
        .with_row(oids::ONT_RX_POWER, 10, SnmpValue::Integer(-205))
        .with_row(oids::ONT_DISTANCE, 10, SnmpValue::Integer(830))
}
