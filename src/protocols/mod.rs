//! Protocol adapters used by workers and the OLT gateway
//!
//! - [`ping::PingAdapter`]: ICMP reachability and round-trip time
//! - [`mikrotik::MikrotikAdapter`]: RouterOS API resource and interface queries
//! - [`snmp::olt::OltClient`]: OLT system, PON port and ONT metrics over SNMP

pub mod mikrotik;
pub mod ping;
pub mod routeros;
pub mod snmp;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::model::{MetricValue, PollTask};

use self::mikrotik::InterfaceStats;

/// What one adapter call learned about a device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollOutcome {
    pub success: bool,
    pub rtt: Option<Duration>,
    pub fields: BTreeMap<String, MetricValue>,
    pub tags: BTreeMap<String, String>,
    /// Per-interface counters, written as separate points
    pub interfaces: Vec<InterfaceStats>,
}

impl PollOutcome {
    pub fn reachable(rtt: Duration) -> Self {
        Self {
            success: true,
            rtt: Some(rtt),
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Round-trip time in milliseconds with microsecond resolution, 0 when unknown
    pub fn rtt_ms(&self) -> f64 {
        self.rtt
            .map(|rtt| rtt.as_micros() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

#[async_trait]
pub trait PollAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Poll the device described by `task`; transport failures are reported
    /// as `success == false`, never as errors
    async fn poll(&self, task: &PollTask) -> PollOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtt_ms_resolution() {
        let outcome = PollOutcome::reachable(Duration::from_micros(12_345));
        assert_eq!(outcome.rtt_ms(), 12.345);
        assert_eq!(PollOutcome::unreachable().rtt_ms(), 0.0);
    }
}
