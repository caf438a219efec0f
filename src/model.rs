//! Core data model shared by the scheduler, workers and the alert engine.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Router,
    Switch,
    Olt,
    Ont,
    AccessPoint,
    Wireless,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Router => "router",
            DeviceType::Switch => "switch",
            DeviceType::Olt => "olt",
            DeviceType::Ont => "ont",
            DeviceType::AccessPoint => "access_point",
            DeviceType::Wireless => "wireless",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Management protocol used to poll a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    MikrotikApi,
    Ssh,
    Telnet,
    Tr069,
    Snmp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::MikrotikApi => "mikrotik_api",
            Protocol::Ssh => "ssh",
            Protocol::Telnet => "telnet",
            Protocol::Tr069 => "tr069",
            Protocol::Snmp => "snmp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Offline,
    #[default]
    Unknown,
    Warning,
    Error,
}

/// Management-API login for a single device
///
/// When set it replaces the worker's default credentials for that device.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiAuth {
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl fmt::Debug for ApiAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .finish()
    }
}

/// A managed network device
///
/// `status` and `last_seen` are only written by the poll pipeline
/// (see [`crate::registry::DeviceRegistry::record_poll`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,

    #[serde(default)]
    pub name: String,

    pub ip_address: IpAddr,

    pub device_type: DeviceType,

    pub protocol: Protocol,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Desired polling interval in seconds (the scheduler currently polls every tick)
    #[serde(default = "default_polling_interval")]
    pub polling_interval: u64,

    /// Reference into the credential store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_id: Option<String>,

    /// Per-device API login (RouterOS)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<ApiAuth>,

    #[serde(default)]
    pub status: DeviceStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

fn default_enabled() -> bool {
    true
}

fn default_polling_interval() -> u64 {
    300
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        ip_address: IpAddr,
        device_type: DeviceType,
        protocol: Protocol,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            ip_address,
            device_type,
            protocol,
            enabled: default_enabled(),
            polling_interval: default_polling_interval(),
            credentials_id: None,
            auth: None,
            status: DeviceStatus::Unknown,
            last_seen: None,
        }
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval)
    }
}

/// Unit of work published by the scheduler on the task topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollTask {
    pub device_id: String,
    pub ip_address: IpAddr,
    pub device_type: DeviceType,
    pub protocol: Protocol,
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<ApiAuth>,
}

impl PollTask {
    pub fn for_device(device: &Device, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id: device.id.clone(),
            ip_address: device.ip_address,
            device_type: device.device_type,
            protocol: device.protocol,
            timestamp,
            auth: device.auth.clone(),
        }
    }
}

/// A single sample value: either numeric or boolean
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Bool(bool),
    Number(f64),
}

impl MetricValue {
    /// Numeric view used by rule evaluation (`true` → 1.0, `false` → 0.0)
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Bool(true) => 1.0,
            MetricValue::Bool(false) => 0.0,
            MetricValue::Number(n) => n,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Number(value)
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Bool(value)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Bool(b) => write!(f, "{b}"),
            MetricValue::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Complete device inventory, published when the gateway accepts a sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub devices: Vec<Device>,
    pub timestamp: DateTime<Utc>,
}

/// Normalized result of one poll attempt, published on the metric topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub device_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    pub ip_address: IpAddr,

    pub timestamp: DateTime<Utc>,

    pub values: BTreeMap<String, MetricValue>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl Metric {
    pub fn new(device_id: impl Into<String>, ip_address: IpAddr, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            device_name: None,
            ip_address,
            timestamp,
            values: BTreeMap::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<MetricValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn value(&self, name: &str) -> Option<MetricValue> {
        self.values.get(name).copied()
    }

    /// Name used in human-readable messages
    pub fn display_name(&self) -> &str {
        self.device_name.as_deref().unwrap_or(&self.device_id)
    }
}
