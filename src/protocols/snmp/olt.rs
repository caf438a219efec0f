//! OLT metrics collected over SNMP
//!
//! Scalars come from GET, tables from WALKs that are folded into per-index
//! records. A record is created the first time any column mentions its index
//! and later columns fill in the remaining fields. Raw encodings are converted
//! here: hundredths of seconds, 0.1 dBm, megabytes.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use futures::future;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use super::{
    SnmpConnector, SnmpError, SnmpResult, SnmpTarget, SnmpTransport, SnmpValue,
    extract_last_oid_index, oids,
};

/// Optical power is reported in tenths of a dBm
pub const POWER_SCALE: f64 = 10.0;

pub fn raw_to_dbm(raw: i64) -> f64 {
    raw as f64 / POWER_SCALE
}

/// Used memory in KB, 0 unless both the total and the percentage are positive
pub fn memory_used_kb(total_kb: i64, used_percent: f64) -> i64 {
    if total_kb > 0 && used_percent > 0.0 {
        (total_kb as f64 * used_percent / 100.0) as i64
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PonPortStatus {
    Up,
    Down,
    #[default]
    Unknown,
}

impl PonPortStatus {
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            1 => PonPortStatus::Up,
            2 => PonPortStatus::Down,
            _ => PonPortStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OntStatus {
    Online,
    Offline,
    Unregistered,
    #[default]
    Unknown,
}

impl OntStatus {
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            1 => OntStatus::Online,
            2 => OntStatus::Offline,
            3 => OntStatus::Unregistered,
            _ => OntStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OltSystemMetrics {
    pub device_id: String,
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

#[derive(Debug, Clone, PartialEq)]
pub struct PonPortMetrics {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub port_index: i64,
    pub admin_status: PonPortStatus,
    pub oper_status: PonPortStatus,
    pub tx_power_dbm: f64,
    pub rx_power_dbm: f64,
    pub ont_count: i64,
}

/// One ONT row; `pon_port_index` and `ont_index` both carry the raw packed index
#[derive(Debug, Clone, PartialEq)]
pub struct OntMetrics {
    pub device_id: String,
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

/// A table column that fills one field of a row record
trait TableColumn<R>: Copy {
    fn apply(self, row: &mut R, value: &SnmpValue);
}

#[derive(Debug, Clone, Copy)]
enum PonColumn {
    AdminStatus,
    OperStatus,
    TxPower,
    RxPower,
    OntCount,
}

const PON_COLUMNS: [(&str, PonColumn); 5] = [
    (oids::PON_ADMIN_STATUS, PonColumn::AdminStatus),
    (oids::PON_OPER_STATUS, PonColumn::OperStatus),
    (oids::PON_TX_POWER, PonColumn::TxPower),
    (oids::PON_RX_POWER, PonColumn::RxPower),
    (oids::PON_ONT_COUNT, PonColumn::OntCount),
];

impl TableColumn<PonPortMetrics> for PonColumn {
    fn apply(self, port: &mut PonPortMetrics, value: &SnmpValue) {
        let Some(raw) = value.as_i64() else {
            trace!("skipping non-numeric {self:?} value {value:?}");
            return;
        };

        match self {
            PonColumn::AdminStatus => port.admin_status = PonPortStatus::from_raw(raw),
            PonColumn::OperStatus => port.oper_status = PonPortStatus::from_raw(raw),
            PonColumn::TxPower => port.tx_power_dbm = raw_to_dbm(raw),
            PonColumn::RxPower => port.rx_power_dbm = raw_to_dbm(raw),
            PonColumn::OntCount => port.ont_count = raw,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum OntColumn {
    /// Vendor serial column; only used to discover rows, the serial is synthesized
    Presence,
    OperStatus,
    RxPower,
    TxPower,
    Distance,
}

const ONT_COLUMNS: [(&str, OntColumn); 5] = [
    (oids::ONT_SERIAL_NUMBER, OntColumn::Presence),
    (oids::ONT_OPER_STATUS, OntColumn::OperStatus),
    (oids::ONT_RX_POWER, OntColumn::RxPower),
    (oids::ONT_TX_POWER, OntColumn::TxPower),
    (oids::ONT_DISTANCE, OntColumn::Distance),
];

impl TableColumn<OntMetrics> for OntColumn {
    fn apply(self, ont: &mut OntMetrics, value: &SnmpValue) {
        if matches!(self, OntColumn::Presence) {
            return;
        }

        let Some(raw) = value.as_i64() else {
            trace!("skipping non-numeric {self:?} value {value:?}");
            return;
        };

        match self {
            OntColumn::Presence => {}
            OntColumn::OperStatus => ont.oper_status = OntStatus::from_raw(raw),
            OntColumn::RxPower => ont.rx_power_dbm = raw_to_dbm(raw),
            OntColumn::TxPower => ont.tx_power_dbm = raw_to_dbm(raw),
            OntColumn::Distance => ont.distance_meters = raw,
        }
    }
}

/// SNMP session to one OLT
pub struct OltClient {
    transport: Box<dyn SnmpTransport>,
    device_id: String,
}

impl std::fmt::Debug for OltClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OltClient")
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

impl OltClient {
    pub fn new(transport: Box<dyn SnmpTransport>, device_id: impl Into<String>) -> Self {
        Self {
            transport,
            device_id: device_id.into(),
        }
    }

    /// Open a session to `target`; fails before any I/O when no credentials are set
    pub async fn connect(
        connector: &dyn SnmpConnector,
        target: &SnmpTarget,
        device_id: impl Into<String>,
        timeout: Duration,
    ) -> SnmpResult<Self> {
        let credentials = target
            .credentials
            .as_ref()
            .ok_or_else(|| SnmpError::MissingCredentials(target.ip.to_string()))?;

        let transport = connector.connect(target, credentials, timeout).await?;
        Ok(Self::new(transport, device_id))
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    #[instrument(skip(self), fields(device = %self.device_id))]
    pub async fn system_metrics(&self) -> SnmpResult<OltSystemMetrics> {
        let bindings = self
            .transport
            .get(&[oids::SYS_DESCR, oids::SYS_NAME, oids::SYS_UPTIME])
            .await
            .map_err(|e| SnmpError::context("failed to get system metrics", e))?;

        let mut sys_descr = String::new();
        let mut sys_name = String::new();
        let mut uptime_seconds = 0;

        for binding in bindings {
            match binding.oid.trim_start_matches('.') {
                oids::SYS_DESCR => sys_descr = binding.value.as_string().unwrap_or_default(),
                oids::SYS_NAME => sys_name = binding.value.as_string().unwrap_or_default(),
                oids::SYS_UPTIME => {
                    if let Some(ticks) = binding.value.as_u32() {
                        uptime_seconds = u64::from(ticks) / 100;
                    }
                }
                other => trace!("ignoring unexpected binding {other}"),
            }
        }

        let cpu = self.column_max(oids::CARD_CPU_USAGE).await?.unwrap_or(0);
        let temperature = self.column_max(oids::CARD_TEMPERATURE).await?.unwrap_or(0);
        let memory_percent = self.column_max(oids::CARD_MEMORY_USAGE).await?.unwrap_or(0);
        let memory_total_mb = self.column_max(oids::CARD_MEMORY_TOTAL).await?.unwrap_or(0);

        let memory_total_kb = memory_total_mb.saturating_mul(1024);
        let memory_usage_percent = memory_percent as f64;

        Ok(OltSystemMetrics {
            device_id: self.device_id.clone(),
            timestamp: Utc::now(),
            sys_descr,
            sys_name,
            uptime_seconds,
            cpu_usage_percent: cpu as f64,
            memory_total_kb,
            memory_used_kb: memory_used_kb(memory_total_kb, memory_usage_percent),
            memory_usage_percent,
            temperature_celsius: temperature as f64,
        })
    }

    #[instrument(skip(self), fields(device = %self.device_id))]
    pub async fn pon_port_metrics(&self) -> SnmpResult<Vec<PonPortMetrics>> {
        let timestamp = Utc::now();
        let device_id = self.device_id.as_str();

        let ports = self
            .fold_table(&PON_COLUMNS, "PON port", |port_index| PonPortMetrics {
                device_id: device_id.to_string(),
                timestamp,
                port_index,
                admin_status: PonPortStatus::Unknown,
                oper_status: PonPortStatus::Unknown,
                tx_power_dbm: 0.0,
                rx_power_dbm: 0.0,
                ont_count: 0,
            })
            .await?;

        debug!("collected {} PON ports", ports.len());
        Ok(ports.into_values().collect())
    }

    #[instrument(skip(self), fields(device = %self.device_id))]
    pub async fn ont_metrics(&self) -> SnmpResult<Vec<OntMetrics>> {
        let timestamp = Utc::now();
        let device_id = self.device_id.as_str();

        let onts = self
            .fold_table(&ONT_COLUMNS, "ONT", |index| OntMetrics {
                device_id: device_id.to_string(),
                timestamp,
                pon_port_index: index,
                ont_index: index,
                serial_number: format!("{index:X}"),
                oper_status: OntStatus::Unknown,
                rx_power_dbm: 0.0,
                tx_power_dbm: 0.0,
                distance_meters: 0,
                description: format!("ONT-{index}"),
            })
            .await?;

        debug!("collected {} ONTs", onts.len());
        Ok(onts.into_values().collect())
    }

    /// Largest numeric value in a card column, `None` for an empty column
    async fn column_max(&self, base: &str) -> SnmpResult<Option<i64>> {
        self.transport
            .walk(base)
            .try_fold(None, |max: Option<i64>, binding| {
                let max = match binding.value.as_i64() {
                    Some(value) => Some(max.map_or(value, |m| m.max(value))),
                    None => max,
                };
                future::ready(Ok(max))
            })
            .await
            .map_err(|e| SnmpError::context(format!("failed to walk card OID {base}"), e))
    }

    /// Walk every column and merge the rows by their index
    ///
    /// A transport error in any walk aborts the whole table.
    async fn fold_table<R, C, F>(
        &self,
        columns: &[(&'static str, C)],
        what: &str,
        mut new_row: F,
    ) -> SnmpResult<BTreeMap<i64, R>>
    where
        C: TableColumn<R>,
        F: FnMut(i64) -> R,
    {
        let mut rows = BTreeMap::new();

        for &(base, column) in columns {
            rows = self
                .transport
                .walk(base)
                .try_fold(rows, |mut rows, binding| {
                    let index = extract_last_oid_index(&binding.oid, base);
                    if index >= 0 {
                        let row = rows.entry(index).or_insert_with(|| new_row(index));
                        column.apply(row, &binding.value);
                    } else {
                        trace!("skipping row {} outside {base}", binding.oid);
                    }
                    future::ready(Ok(rows))
                })
                .await
                .map_err(|e| SnmpError::context(format!("failed to walk {what} OID {base}"), e))?;
        }

        Ok(rows)
    }
}
