//! ICMP echo reachability check

use std::net::IpAddr;
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tracing::{debug, instrument, warn};

use crate::model::PollTask;

use super::{PollAdapter, PollOutcome};

const PAYLOAD: [u8; 56] = [0; 56];

pub struct PingAdapter {
    timeout: Duration,
}

impl PingAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Send a single echo request; `None` when no reply arrived in time
    pub async fn ping(&self, ip: IpAddr) -> Option<Duration> {
        let config = match ip {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };

        let client = match Client::new(&config) {
            Ok(client) => client,
            Err(e) => {
                warn!("ICMP socket unavailable: {e}");
                return None;
            }
        };

        let mut pinger = client.pinger(ip, PingIdentifier(ping_id())).await;
        pinger.timeout(self.timeout);

        let start = Instant::now();
        match pinger.ping(PingSequence(0), &PAYLOAD).await {
            Ok(_) => Some(start.elapsed()),
            Err(e) => {
                debug!("no echo reply from {ip}: {e}");
                None
            }
        }
    }
}

fn ping_id() -> u16 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    ((nanos % 0xFFFF) as u16).wrapping_add(1)
}

#[async_trait]
impl PollAdapter for PingAdapter {
    fn name(&self) -> &'static str {
        "ping"
    }

    #[instrument(skip_all, fields(device = %task.device_id, ip = %task.ip_address))]
    async fn poll(&self, task: &PollTask) -> PollOutcome {
        match self.ping(task.ip_address).await {
            Some(rtt) => PollOutcome::reachable(rtt),
            None => PollOutcome::unreachable(),
        }
    }
}
