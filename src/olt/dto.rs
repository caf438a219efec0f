//! Request and response bodies of the OLT gateway

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocols::snmp::olt::{
    OltSystemMetrics, OntMetrics, OntStatus, PonPortMetrics, PonPortStatus,
};

/// SNMP agent addressed by a request; unset fields fall back to `public` / v2c / 161
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRequest {
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl TargetRequest {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            community: None,
            version: None,
            port: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OltRequest {
    pub target: TargetRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntRequest {
    pub target: TargetRequest,
    /// Validated (must be >= 0) but not used to filter the ONT list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pon_port: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetricsResponse {
    pub ip_address: String,
    pub timestamp: DateTime<Utc>,
    pub sys_descr: String,
    pub sys_name: String,
    pub uptime_seconds: u64,
    pub cpu_usage_percent: f64,
    pub memory_total_kb: i64,
    pub memory_used_kb: i64,
    pub memory_usage_percent: f64,
    pub temperature_celsius: f64,
}

impl SystemMetricsResponse {
    pub fn new(ip_address: String, metrics: OltSystemMetrics) -> Self {
        Self {
            ip_address,
            timestamp: metrics.timestamp,
            sys_descr: metrics.sys_descr,
            sys_name: metrics.sys_name,
            uptime_seconds: metrics.uptime_seconds,
            cpu_usage_percent: metrics.cpu_usage_percent,
            memory_total_kb: metrics.memory_total_kb,
            memory_used_kb: metrics.memory_used_kb,
            memory_usage_percent: metrics.memory_usage_percent,
            temperature_celsius: metrics.temperature_celsius,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PonPortInfo {
    pub ip_address: String,
    pub timestamp: DateTime<Utc>,
    pub port_index: i64,
    pub admin_status: PonPortStatus,
    pub oper_status: PonPortStatus,
    pub tx_power_dbm: f64,
    pub rx_power_dbm: f64,
    pub ont_count: i64,
}

impl PonPortInfo {
    pub fn new(ip_address: &str, port: PonPortMetrics) -> Self {
        Self {
            ip_address: ip_address.to_string(),
            timestamp: port.timestamp,
            port_index: port.port_index,
            admin_status: port.admin_status,
            oper_status: port.oper_status,
            tx_power_dbm: port.tx_power_dbm,
            rx_power_dbm: port.rx_power_dbm,
            ont_count: port.ont_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PonPortListResponse {
    pub ip_address: String,
    pub count: usize,
    pub pon_ports: Vec<PonPortInfo>,
}

impl PonPortListResponse {
    pub fn new(ip_address: String, ports: Vec<PonPortMetrics>) -> Self {
        let pon_ports: Vec<PonPortInfo> = ports
            .into_iter()
            .map(|port| PonPortInfo::new(&ip_address, port))
            .collect();
        Self {
            ip_address,
            count: pon_ports.len(),
            pon_ports,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntInfo {
    pub ip_address: String,
    pub timestamp: DateTime<Utc>,
    pub pon_port_index: i64,
    pub ont_index: i64,
    pub serial_number: String,
    pub oper_status: OntStatus,
    pub rx_power_dbm: f64,
    pub tx_power_dbm: f64,
    pub distance_meters: i64,
    pub description: String,
}

impl OntInfo {
    pub fn new(ip_address: &str, ont: OntMetrics) -> Self {
        Self {
            ip_address: ip_address.to_string(),
            timestamp: ont.timestamp,
            pon_port_index: ont.pon_port_index,
            ont_index: ont.ont_index,
            serial_number: ont.serial_number,
            oper_status: ont.oper_status,
            rx_power_dbm: ont.rx_power_dbm,
            tx_power_dbm: ont.tx_power_dbm,
            distance_meters: ont.distance_meters,
            description: ont.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntListResponse {
    pub ip_address: String,
    pub total: usize,
    pub onts: Vec<OntInfo>,
}

impl OntListResponse {
    pub fn new(ip_address: String, onts: Vec<OntMetrics>) -> Self {
        let onts: Vec<OntInfo> = onts
            .into_iter()
            .map(|ont| OntInfo::new(&ip_address, ont))
            .collect();
        Self {
            ip_address,
            total: onts.len(),
            onts,
        }
    }
}

/// ONTs split by operational state; anything not online counts as down
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntStatusResponse {
    pub ip_address: String,
    pub up: Vec<OntInfo>,
    pub down: Vec<OntInfo>,
}

impl OntStatusResponse {
    pub fn new(ip_address: String, onts: Vec<OntMetrics>) -> Self {
        let (up, down) = onts
            .into_iter()
            .map(|ont| OntInfo::new(&ip_address, ont))
            .partition(|ont| ont.oper_status == OntStatus::Online);

        Self {
            ip_address,
            up,
            down,
        }
    }
}
