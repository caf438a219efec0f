use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, trace};

use crate::model::Device;
use crate::rules::{AlertRule, RuleSet};

pub const SERVER_PORT: &str = "SERVER_PORT";
pub const SERVER_MODE: &str = "SERVER_MODE";
pub const NATS_URL: &str = "NATS_URL";
pub const INFLUX_URL: &str = "INFLUX_URL";
pub const INFLUX_TOKEN: &str = "INFLUX_TOKEN";
pub const INFLUX_ORG: &str = "INFLUX_ORG";
pub const INFLUX_BUCKET: &str = "INFLUX_BUCKET";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub bus: BusConfig,

    /// Time-series store (optional - points are kept in memory without it)
    pub influx: Option<InfluxConfig>,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub olt: OltConfig,

    /// Static device inventory loaded into the device store at start
    #[serde(default)]
    pub devices: Vec<Device>,

    /// Alert rules (optional - the built-in latency/down rules are used without it)
    pub rules: Option<Vec<AlertRule>>,

    #[serde(default)]
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    #[default]
    Debug,
    Release,
}

impl std::str::FromStr for ServerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(ServerMode::Debug),
            "release" => Ok(ServerMode::Release),
            other => Err(format!("unknown server mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default)]
    pub mode: ServerMode,
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_server_port(),
            mode: ServerMode::default(),
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_server_port() -> u16 {
    8008
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_bus_url")]
    pub url: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: default_bus_url(),
        }
    }
}

fn default_bus_url() -> String {
    "nats://127.0.0.1:4222".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InfluxConfig {
    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub org: String,
    #[serde(default)]
    pub bucket: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }
}

fn default_tick_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
    /// Upper bound for one adapter call, whatever the protocol
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default)]
    pub mikrotik: MikrotikConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            ping_timeout_ms: default_ping_timeout_ms(),
            poll_timeout_secs: default_poll_timeout_secs(),
            mikrotik: MikrotikConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

fn default_ping_timeout_ms() -> u64 {
    1000
}

fn default_poll_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct MikrotikConfig {
    #[serde(default = "default_mikrotik_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_mikrotik_port")]
    pub port: u16,
    #[serde(default = "default_mikrotik_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MikrotikConfig {
    fn default() -> Self {
        Self {
            username: default_mikrotik_username(),
            password: String::new(),
            port: default_mikrotik_port(),
            timeout_secs: default_mikrotik_timeout_secs(),
        }
    }
}

impl MikrotikConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_mikrotik_username() -> String {
    "admin".to_string()
}

fn default_mikrotik_port() -> u16 {
    8728
}

fn default_mikrotik_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct OltConfig {
    /// Deadline for one SNMP request
    #[serde(default = "default_snmp_timeout_secs")]
    pub snmp_timeout_secs: u64,
    /// Deadline for one gateway call (connect plus all requests)
    #[serde(default = "default_olt_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OltConfig {
    fn default() -> Self {
        Self {
            snmp_timeout_secs: default_snmp_timeout_secs(),
            request_timeout_secs: default_olt_timeout_secs(),
        }
    }
}

impl OltConfig {
    pub fn snmp_timeout(&self) -> Duration {
        Duration::from_secs(self.snmp_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_snmp_timeout_secs() -> u64 {
    10
}

fn default_olt_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierConfig {
    Log(LogTarget),
    Discord(Discord),
    Webhook(Webhook),
}

impl Default for NotifierConfig {
    fn default() -> Self {
        NotifierConfig::Log(LogTarget::default())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogTarget {
    #[serde(default = "default_recipient")]
    pub recipient: String,
}

impl Default for LogTarget {
    fn default() -> Self {
        Self {
            recipient: default_recipient(),
        }
    }
}

fn default_recipient() -> String {
    "admin@example.com".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Webhook {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Discord {
    pub url: String,
    pub user_id: Option<String>,
}

impl Config {
    pub fn rule_set(&self) -> RuleSet {
        match &self.rules {
            Some(rules) => RuleSet::new(rules.clone()),
            None => RuleSet::defaults(),
        }
    }

    /// Apply environment overrides using `lookup` (normally `std::env::var`)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(SERVER_PORT).and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(mode) = lookup(SERVER_MODE).and_then(|v| v.parse().ok()) {
            self.server.mode = mode;
        }
        if let Some(url) = lookup(NATS_URL) {
            self.bus.url = url;
        }

        let influx_url = lookup(INFLUX_URL);
        if influx_url.is_some() || self.influx.is_some() {
            let influx = self.influx.get_or_insert_with(InfluxConfig::default);
            if let Some(url) = influx_url {
                influx.url = url;
            }
            if let Some(token) = lookup(INFLUX_TOKEN) {
                influx.token = token;
            }
            if let Some(org) = lookup(INFLUX_ORG) {
                influx.org = org;
            }
            if let Some(bucket) = lookup(INFLUX_BUCKET) {
                influx.bucket = bucket;
            }
        }
    }
}

/// Parse a JSON or TOML (by `.toml` extension) configuration file
pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let config: Config = if is_toml {
        toml::from_str(&file_content)
            .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?
    } else {
        serde_json::from_str(&file_content)
            .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?
    };

    trace!("loaded config: {config:?}");
    Ok(config)
}

/// Load `.env`, read the optional config file and apply environment overrides
pub fn load(path: Option<&str>) -> anyhow::Result<Config> {
    if dotenv::dotenv().is_ok() {
        debug!("loaded environment from .env");
    }

    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => Config::default(),
    };

    config.apply_overrides(|key| std::env::var(key).ok());

    Ok(config)
}
