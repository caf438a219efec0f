//! SNMP v2c access for optical line terminals
//!
//! [`SnmpTransport`] is the seam between the OLT logic and the wire: GET for
//! scalar values and WALK as a lazy, finite stream of decoded [`VarBind`]s.
//! [`session::Snmp2Transport`] talks to real agents, [`memory::MemoryAgent`]
//! serves a fixed MIB view from memory.

pub mod error;
pub mod memory;
pub mod oid;
pub mod oids;
pub mod olt;
pub mod session;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use error::{SnmpError, SnmpResult};
pub use oid::extract_last_oid_index;

pub const DEFAULT_COMMUNITY: &str = "public";
pub const DEFAULT_PORT: u16 = 161;

/// Decoded SNMP value
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectIdentifier(String),
    IpAddress(Ipv4Addr),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Counter64(u64),
    Null,
    /// Any type the adapters never read
    Unsupported,
}

impl SnmpValue {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            SnmpValue::Integer(v) => Some(v),
            SnmpValue::Counter32(v) | SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => {
                Some(i64::from(v))
            }
            SnmpValue::Counter64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            SnmpValue::Counter32(v) | SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => Some(v),
            SnmpValue::Integer(v) => u32::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            SnmpValue::OctetString(bytes) => {
                Some(String::from_utf8_lossy(bytes).trim().to_string())
            }
            SnmpValue::ObjectIdentifier(oid) => Some(oid.clone()),
            SnmpValue::IpAddress(ip) => Some(ip.to_string()),
            _ => None,
        }
    }
}

/// One `(oid, value)` binding from a response
#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    pub oid: String,
    pub value: SnmpValue,
}

impl VarBind {
    pub fn new(oid: impl Into<String>, value: SnmpValue) -> Self {
        Self {
            oid: oid.into(),
            value,
        }
    }
}

#[async_trait]
pub trait SnmpTransport: Send + Sync {
    /// Fetch scalar values; OIDs the agent does not know are omitted from the result
    async fn get(&self, oids: &[&str]) -> SnmpResult<Vec<VarBind>>;

    /// Every row below `base`, in agent order; ends when the subtree is exhausted
    fn walk<'a>(&'a self, base: &'a str) -> BoxStream<'a, SnmpResult<VarBind>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnmpVersion {
    #[default]
    V2c,
}

impl std::str::FromStr for SnmpVersion {
    type Err = SnmpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "2c" | "v2c" | "2" => Ok(SnmpVersion::V2c),
            other => Err(SnmpError::UnsupportedVersion(other.to_string())),
        }
    }
}

impl fmt::Display for SnmpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpVersion::V2c => f.write_str("2c"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpCredentials {
    pub community: String,
    pub version: SnmpVersion,
}

impl Default for SnmpCredentials {
    fn default() -> Self {
        Self {
            community: DEFAULT_COMMUNITY.to_string(),
            version: SnmpVersion::V2c,
        }
    }
}

/// Agent to connect to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpTarget {
    pub ip: IpAddr,
    pub port: u16,
    pub credentials: Option<SnmpCredentials>,
}

impl SnmpTarget {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            port: DEFAULT_PORT,
            credentials: Some(SnmpCredentials::default()),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// Opens transports for targets
#[async_trait]
pub trait SnmpConnector: Send + Sync {
    async fn connect(
        &self,
        target: &SnmpTarget,
        credentials: &SnmpCredentials,
        timeout: Duration,
    ) -> SnmpResult<Box<dyn SnmpTransport>>;
}
