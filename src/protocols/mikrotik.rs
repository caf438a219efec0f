//! MikroTik RouterOS polling: system resources and interface counters
//!
//! One API session per poll. The resource query decides success; the
//! interface query is best effort.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, instrument, warn};

use crate::config::MikrotikConfig;
use crate::model::{MetricValue, PollTask};

use super::routeros::{Attributes, RouterOsClient, RouterOsError, RouterOsResult};
use super::{PollAdapter, PollOutcome};

const RESOURCE_COMMAND: &str = "/system/resource/print";
const INTERFACE_COMMAND: &str = "/interface/print";
const STATS_FLAG: &str = "=stats";

/// Fixed-schema view of `/system/resource/print`; unparsable attributes stay `None`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemResources {
    pub cpu_load: Option<f64>,
    pub free_memory: Option<u64>,
    pub total_memory: Option<u64>,
    pub free_hdd_space: Option<u64>,
    pub total_hdd_space: Option<u64>,
    pub uptime: Option<String>,
    pub version: Option<String>,
    pub board_name: Option<String>,
}

impl SystemResources {
    pub fn from_attributes(attributes: &Attributes) -> Self {
        let number = |key: &str| attributes.get(key).and_then(|v| v.trim().parse::<u64>().ok());
        let text = |key: &str| attributes.get(key).filter(|v| !v.is_empty()).cloned();

        Self {
            cpu_load: attributes.get("cpu-load").and_then(|v| parse_percentage(v)),
            free_memory: number("free-memory"),
            total_memory: number("total-memory"),
            free_hdd_space: number("free-hdd-space"),
            total_hdd_space: number("total-hdd-space"),
            uptime: text("uptime"),
            version: text("version"),
            board_name: text("board-name"),
        }
    }

    pub fn memory_usage_percent(&self) -> Option<f64> {
        usage_percent(self.free_memory?, self.total_memory?)
    }

    pub fn disk_usage_percent(&self) -> Option<f64> {
        usage_percent(self.free_hdd_space?, self.total_hdd_space?)
    }

    pub fn uptime_seconds(&self) -> Option<u64> {
        self.uptime.as_deref().map(|u| parse_uptime(u).as_secs())
    }

    /// Numeric fields for the metric; text attributes go to tags
    pub fn into_outcome(self) -> PollOutcome {
        let mut fields = BTreeMap::new();
        let mut insert = |name: &str, value: Option<f64>| {
            if let Some(value) = value {
                fields.insert(name.to_string(), MetricValue::Number(value));
            }
        };

        insert("cpu_load", self.cpu_load);
        insert("free_memory", self.free_memory.map(|v| v as f64));
        insert("total_memory", self.total_memory.map(|v| v as f64));
        insert("memory_usage_percent", self.memory_usage_percent());
        insert("disk_usage_percent", self.disk_usage_percent());
        insert("uptime_seconds", self.uptime_seconds().map(|v| v as f64));

        let mut tags = BTreeMap::new();
        for (name, value) in [
            ("uptime", self.uptime),
            ("version", self.version),
            ("board_name", self.board_name),
        ] {
            if let Some(value) = value {
                tags.insert(name.to_string(), value);
            }
        }

        PollOutcome {
            success: true,
            rtt: None,
            fields,
            tags,
            interfaces: Vec::new(),
        }
    }
}

/// Counters of one interface from `/interface/print =stats`; unparsable counters read as 0
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterfaceStats {
    pub name: String,
    pub running: bool,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_drops: u64,
    pub tx_drops: u64,
}

impl InterfaceStats {
    /// `None` for rows without an interface name
    pub fn from_attributes(attributes: &Attributes) -> Option<Self> {
        let name = attributes.get("name").filter(|n| !n.is_empty())?.clone();
        let counter = |key: &str| {
            attributes
                .get(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(0)
        };

        Some(Self {
            running: attributes.get("running").is_some_and(|v| v == "true"),
            rx_bytes: counter("rx-byte"),
            tx_bytes: counter("tx-byte"),
            rx_packets: counter("rx-packet"),
            tx_packets: counter("tx-packet"),
            rx_errors: counter("rx-error"),
            tx_errors: counter("tx-error"),
            rx_drops: counter("rx-drop"),
            tx_drops: counter("tx-drop"),
            name,
        })
    }

    pub fn fields(&self) -> BTreeMap<String, MetricValue> {
        let mut fields: BTreeMap<String, MetricValue> = [
            ("bytes_in", self.rx_bytes),
            ("bytes_out", self.tx_bytes),
            ("packets_in", self.rx_packets),
            ("packets_out", self.tx_packets),
            ("errors_in", self.rx_errors),
            ("errors_out", self.tx_errors),
            ("drops_in", self.rx_drops),
            ("drops_out", self.tx_drops),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), MetricValue::Number(value as f64)))
        .collect();

        fields.insert("running".to_string(), MetricValue::Bool(self.running));
        fields
    }
}

fn usage_percent(free: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| total.saturating_sub(free) as f64 / total as f64 * 100.0)
}

fn parse_percentage(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches('%').trim().parse().ok()
}

/// Parse RouterOS uptime, either `1w2d3h4m5s` or `3d14:25:10`
///
/// Oversized numbers saturate instead of overflowing.
pub fn parse_uptime(raw: &str) -> Duration {
    let mut seconds = 0u64;
    let mut number = 0u64;
    let mut clock: Vec<u64> = Vec::new();

    let add = |seconds: &mut u64, value: u64, unit: u64| {
        *seconds = seconds.saturating_add(value.saturating_mul(unit));
    };

    for c in raw.trim().chars() {
        match c {
            '0'..='9' => {
                number = number
                    .saturating_mul(10)
                    .saturating_add(u64::from(c as u8 - b'0'))
            }
            'w' => add(&mut seconds, std::mem::take(&mut number), 7 * 86_400),
            'd' => add(&mut seconds, std::mem::take(&mut number), 86_400),
            'h' => add(&mut seconds, std::mem::take(&mut number), 3_600),
            'm' => add(&mut seconds, std::mem::take(&mut number), 60),
            's' => add(&mut seconds, std::mem::take(&mut number), 1),
            ':' => clock.push(std::mem::take(&mut number)),
            _ => number = 0,
        }
    }

    if clock.is_empty() {
        return Duration::from_secs(seconds.saturating_add(number));
    }

    clock.push(number);
    let clock_seconds = clock
        .iter()
        .fold(0u64, |acc, part| acc.saturating_mul(60).saturating_add(*part));
    Duration::from_secs(seconds.saturating_add(clock_seconds))
}

pub struct MikrotikAdapter {
    username: String,
    password: String,
    port: u16,
    timeout: Duration,
}

/// Where and as whom to log in for one poll
#[derive(Debug, Clone, PartialEq)]
pub struct Login<'a> {
    pub addr: SocketAddr,
    pub username: &'a str,
    pub password: &'a str,
}

impl MikrotikAdapter {
    pub fn new(config: &MikrotikConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            port: config.port,
            timeout: config.timeout(),
        }
    }

    /// The device's own API login when it has one, the configured default otherwise
    pub fn login_for<'a>(&'a self, task: &'a PollTask) -> Login<'a> {
        match &task.auth {
            Some(auth) => Login {
                addr: SocketAddr::new(task.ip_address, auth.port.unwrap_or(self.port)),
                username: &auth.username,
                password: &auth.password,
            },
            None => Login {
                addr: SocketAddr::new(task.ip_address, self.port),
                username: &self.username,
                password: &self.password,
            },
        }
    }

    pub async fn fetch(
        &self,
        task: &PollTask,
    ) -> RouterOsResult<(SystemResources, Vec<InterfaceStats>)> {
        let login = self.login_for(task);
        let mut client = RouterOsClient::connect(
            &login.addr.to_string(),
            login.username,
            login.password,
            self.timeout,
        )
        .await?;

        collect(&mut client, self.timeout).await
    }
}

/// Run the resource and interface queries on an authenticated session
pub async fn collect<S>(
    client: &mut RouterOsClient<S>,
    timeout: Duration,
) -> RouterOsResult<(SystemResources, Vec<InterfaceStats>)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let rows = tokio::time::timeout(timeout, client.run(RESOURCE_COMMAND))
        .await
        .map_err(|_| RouterOsError::Timeout)??;

    let resources = rows
        .first()
        .map(SystemResources::from_attributes)
        .ok_or_else(|| RouterOsError::Protocol("no system resource data returned".to_string()))?;

    let interfaces = match tokio::time::timeout(
        timeout,
        client.run_with(&[INTERFACE_COMMAND, STATS_FLAG]),
    )
    .await
    {
        Ok(Ok(rows)) => rows
            .iter()
            .filter_map(InterfaceStats::from_attributes)
            .collect(),
        Ok(Err(e)) => {
            warn!("failed to fetch interface stats: {e}");
            Vec::new()
        }
        Err(_) => {
            warn!("interface stats timed out");
            Vec::new()
        }
    };

    debug!("collected {} interfaces", interfaces.len());
    Ok((resources, interfaces))
}

#[async_trait]
impl PollAdapter for MikrotikAdapter {
    fn name(&self) -> &'static str {
        "mikrotik_api"
    }

    #[instrument(skip_all, fields(device = %task.device_id, ip = %task.ip_address))]
    async fn poll(&self, task: &PollTask) -> PollOutcome {
        match self.fetch(task).await {
            Ok((resources, interfaces)) => PollOutcome {
                interfaces,
                ..resources.into_outcome()
            },
            Err(e) => {
                warn!("failed to fetch system resources: {e}");
                PollOutcome::unreachable()
            }
        }
    }
}
