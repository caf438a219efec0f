//! SNMP v2c transport backed by `snmp2::AsyncSession`

use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use snmp2::{AsyncSession, Oid, Value};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, trace};

use super::oid::{format_oid, is_descendant, parse_oid};
use super::{
    SnmpConnector, SnmpCredentials, SnmpError, SnmpResult, SnmpTarget, SnmpTransport, SnmpValue,
    VarBind,
};

/// Rows requested per GETBULK round trip during a walk
const DEFAULT_MAX_REPETITIONS: u32 = 25;

pub struct Snmp2Transport {
    session: Mutex<AsyncSession>,
    timeout: Duration,
    max_repetitions: u32,
}

impl Snmp2Transport {
    pub async fn connect(addr: SocketAddr, community: &str, timeout_dur: Duration) -> SnmpResult<Self> {
        let session = timeout(
            timeout_dur,
            AsyncSession::new_v2c(addr, community.as_bytes(), 0),
        )
        .await
        .map_err(|_| SnmpError::Timeout)?
        .map_err(|e| SnmpError::ConnectionFailed(format!("{addr}: {e}")))?;

        debug!("opened SNMP v2c session to {addr}");

        Ok(Self {
            session: Mutex::new(session),
            timeout: timeout_dur,
            max_repetitions: DEFAULT_MAX_REPETITIONS,
        })
    }

    pub fn with_max_repetitions(mut self, max_repetitions: u32) -> Self {
        self.max_repetitions = max_repetitions.max(1);
        self
    }
}

fn to_oid(arcs: &[u64]) -> SnmpResult<Oid<'static>> {
    Oid::from(arcs).map_err(|_| SnmpError::InvalidOid(format_oid(arcs)))
}

fn oid_arcs(oid: &Oid<'_>) -> Option<Vec<u64>> {
    oid.iter().map(|arcs| arcs.collect())
}

/// `None` for the exception values (`noSuchObject`, `noSuchInstance`, `endOfMibView`)
fn decode_value(value: Value<'_>) -> Option<SnmpValue> {
    let decoded = match value {
        Value::Integer(v) => SnmpValue::Integer(v),
        Value::OctetString(bytes) => SnmpValue::OctetString(bytes.to_vec()),
        Value::ObjectIdentifier(oid) => match oid_arcs(&oid) {
            Some(arcs) => SnmpValue::ObjectIdentifier(format_oid(&arcs)),
            None => SnmpValue::Unsupported,
        },
        Value::IpAddress(octets) => SnmpValue::IpAddress(Ipv4Addr::from(octets)),
        Value::Counter32(v) => SnmpValue::Counter32(v),
        Value::Unsigned32(v) => SnmpValue::Gauge32(v),
        Value::Timeticks(v) => SnmpValue::TimeTicks(v),
        Value::Counter64(v) => SnmpValue::Counter64(v),
        Value::Null => SnmpValue::Null,
        Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => return None,
        _ => SnmpValue::Unsupported,
    };
    Some(decoded)
}

#[async_trait]
impl SnmpTransport for Snmp2Transport {
    async fn get(&self, oids: &[&str]) -> SnmpResult<Vec<VarBind>> {
        let mut session = self.session.lock().await;
        let mut bindings = Vec::with_capacity(oids.len());

        for oid in oids {
            let name = to_oid(&parse_oid(oid)?)?;

            let response = timeout(self.timeout, session.get(&name))
                .await
                .map_err(|_| SnmpError::Timeout)?
                .map_err(|e| SnmpError::RequestFailed(format!("GET {oid}: {e:?}")))?;

            if response.error_status != 0 {
                return Err(SnmpError::AgentError {
                    status: response.error_status,
                    index: response.error_index,
                });
            }

            for (name, value) in response.varbinds {
                let Some(arcs) = oid_arcs(&name) else {
                    continue;
                };
                match decode_value(value) {
                    Some(value) => bindings.push(VarBind::new(format_oid(&arcs), value)),
                    None => trace!("agent has no value for {oid}"),
                }
            }
        }

        Ok(bindings)
    }

    fn walk<'a>(&'a self, base: &'a str) -> BoxStream<'a, SnmpResult<VarBind>> {
        let base = match parse_oid(base) {
            Ok(base) => base,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        let walk = Walk {
            transport: self,
            cursor: base.clone(),
            base,
            buffered: VecDeque::new(),
            finished: false,
        };

        stream::unfold(walk, |mut walk| async move {
            loop {
                if let Some(binding) = walk.buffered.pop_front() {
                    return Some((Ok(binding), walk));
                }
                if walk.finished {
                    return None;
                }
                if let Err(e) = walk.fetch_page().await {
                    walk.finished = true;
                    return Some((Err(e), walk));
                }
            }
        })
        .boxed()
    }
}

/// Cursor over one subtree, fetching GETBULK pages on demand
struct Walk<'a> {
    transport: &'a Snmp2Transport,
    base: Vec<u64>,
    cursor: Vec<u64>,
    buffered: VecDeque<VarBind>,
    finished: bool,
}

impl Walk<'_> {
    async fn fetch_page(&mut self) -> SnmpResult<()> {
        let transport = self.transport;
        let start = to_oid(&self.cursor)?;

        let mut session = transport.session.lock().await;
        let response = timeout(
            transport.timeout,
            session.getbulk(&[&start], 0, transport.max_repetitions),
        )
        .await
        .map_err(|_| SnmpError::Timeout)?
        .map_err(|e| SnmpError::RequestFailed(format!("GETBULK {}: {e:?}", format_oid(&self.cursor))))?;

        if response.error_status != 0 {
            return Err(SnmpError::AgentError {
                status: response.error_status,
                index: response.error_index,
            });
        }

        let mut received = 0usize;
        for (name, value) in response.varbinds {
            received += 1;

            let Some(arcs) = oid_arcs(&name) else {
                self.finished = true;
                break;
            };

            // Leaving the subtree, end of view, or a non-increasing OID all end the walk
            if matches!(value, Value::EndOfMibView)
                || !is_descendant(&arcs, &self.base)
                || arcs <= self.cursor
            {
                self.finished = true;
                break;
            }

            let oid = format_oid(&arcs);
            self.cursor = arcs;
            if let Some(value) = decode_value(value) {
                self.buffered.push_back(VarBind::new(oid, value));
            }
        }

        if received == 0 {
            self.finished = true;
        }

        trace!("walk page: {received} bindings");
        Ok(())
    }
}

/// Opens [`Snmp2Transport`] sessions
#[derive(Debug, Clone, Copy, Default)]
pub struct Snmp2Connector;

#[async_trait]
impl SnmpConnector for Snmp2Connector {
    async fn connect(
        &self,
        target: &SnmpTarget,
        credentials: &SnmpCredentials,
        timeout: Duration,
    ) -> SnmpResult<Box<dyn SnmpTransport>> {
        let transport =
            Snmp2Transport::connect(target.socket_addr(), &credentials.community, timeout).await?;
        Ok(Box::new(transport))
    }
}
