//! Time-series sink for poll results
//!
//! Workers write one [`Point`] per poll attempt. [`InfluxSink`] speaks the
//! InfluxDB v2 line protocol over HTTP; [`MemorySink`] keeps recent points in a
//! ring buffer when no store is configured.

pub mod error;
pub mod influx;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{MetricValue, PollTask};
use crate::protocols::mikrotik::InterfaceStats;

pub use error::{SinkError, SinkResult};
pub use influx::InfluxSink;
pub use memory::MemorySink;

pub const DEVICE_POLL_MEASUREMENT: &str = "device_poll";
pub const INTERFACE_MEASUREMENT: &str = "interface_metrics";

#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn write_point(&self, point: Point) -> SinkResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, MetricValue>,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    /// The `device_poll` point written for every poll attempt
    pub fn device_poll(
        task: &PollTask,
        fields: BTreeMap<String, MetricValue>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let tags = BTreeMap::from([
            ("device_id".to_string(), task.device_id.clone()),
            ("ip_address".to_string(), task.ip_address.to_string()),
            ("device_type".to_string(), task.device_type.to_string()),
        ]);

        Self {
            measurement: DEVICE_POLL_MEASUREMENT.to_string(),
            tags,
            fields,
            timestamp,
        }
    }

    /// One `interface_metrics` point per router interface
    pub fn interface(task: &PollTask, stats: &InterfaceStats, timestamp: DateTime<Utc>) -> Self {
        let tags = BTreeMap::from([
            ("device_id".to_string(), task.device_id.clone()),
            ("ip_address".to_string(), task.ip_address.to_string()),
            ("interface".to_string(), stats.name.clone()),
        ]);

        Self {
            measurement: INTERFACE_MEASUREMENT.to_string(),
            tags,
            fields: stats.fields(),
            timestamp,
        }
    }

    /// Render as one line of InfluxDB line protocol (nanosecond precision)
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            line.push(',');
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            line.push_str(&escape(value, &[',', '=', ' ']));
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .filter_map(|(key, value)| {
                let rendered = match value {
                    MetricValue::Bool(b) => b.to_string(),
                    MetricValue::Number(n) if n.is_finite() => n.to_string(),
                    MetricValue::Number(_) => return None,
                };
                Some(format!("{}={rendered}", escape(key, &[',', '=', ' '])))
            })
            .collect();

        line.push(' ');
        line.push_str(&fields.join(","));

        if let Some(nanos) = self.timestamp.timestamp_nanos_opt() {
            line.push(' ');
            line.push_str(&nanos.to_string());
        }

        line
    }
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '\\' || special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
