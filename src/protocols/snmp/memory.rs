//! In-memory SNMP agent
//!
//! Serves a fixed MIB view without any network I/O. Used for dry runs of the
//! gateway and to exercise the OLT logic in tests, including walks that fail
//! part-way through.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tracing::warn;

use super::oid::{format_oid, is_descendant, parse_oid};
use super::{
    SnmpConnector, SnmpCredentials, SnmpError, SnmpResult, SnmpTarget, SnmpTransport, SnmpValue,
    VarBind,
};

#[derive(Debug, Clone, Default)]
pub struct MemoryAgent {
    values: BTreeMap<Vec<u64>, SnmpValue>,
    failing_walks: BTreeSet<Vec<u64>>,
    failing_gets: bool,
}

impl MemoryAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `oid` to `value`; malformed OIDs are ignored
    pub fn with(mut self, oid: &str, value: SnmpValue) -> Self {
        self.insert(oid, value);
        self
    }

    pub fn insert(&mut self, oid: &str, value: SnmpValue) {
        match parse_oid(oid) {
            Ok(arcs) => {
                self.values.insert(arcs, value);
            }
            Err(e) => warn!("ignoring agent value: {e}"),
        }
    }

    /// Set a table cell `base.index`
    pub fn with_row(self, base: &str, index: i64, value: SnmpValue) -> Self {
        self.with(&format!("{base}.{index}"), value)
    }

    /// Walks of `base` yield at most one row and then a transport error
    pub fn fail_walk(mut self, base: &str) -> Self {
        if let Ok(arcs) = parse_oid(base) {
            self.failing_walks.insert(arcs);
        }
        self
    }

    /// Every GET fails with a transport error
    pub fn fail_gets(mut self) -> Self {
        self.failing_gets = true;
        self
    }
}

#[async_trait]
impl SnmpTransport for MemoryAgent {
    async fn get(&self, oids: &[&str]) -> SnmpResult<Vec<VarBind>> {
        if self.failing_gets {
            return Err(SnmpError::RequestFailed("agent unreachable".to_string()));
        }

        let mut bindings = Vec::with_capacity(oids.len());
        for oid in oids {
            let arcs = parse_oid(oid)?;
            if let Some(value) = self.values.get(&arcs) {
                bindings.push(VarBind::new(format_oid(&arcs), value.clone()));
            }
        }
        Ok(bindings)
    }

    fn walk<'a>(&'a self, base: &'a str) -> BoxStream<'a, SnmpResult<VarBind>> {
        let base = match parse_oid(base) {
            Ok(base) => base,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        let prefix = base.clone();
        let parent = base.clone();
        let rows = self
            .values
            .range(base.clone()..)
            .take_while(move |(oid, _)| oid.starts_with(&prefix))
            .filter(move |(oid, _)| is_descendant(oid, &parent))
            .map(|(oid, value)| Ok(VarBind::new(format_oid(oid), value.clone())));

        if self.failing_walks.contains(&base) {
            let failure = Err(SnmpError::RequestFailed(format!(
                "walk of {} interrupted",
                format_oid(&base)
            )));
            return stream::iter(rows.take(1).chain(std::iter::once(failure))).boxed();
        }

        stream::iter(rows).boxed()
    }
}

#[async_trait]
impl SnmpTransport for Arc<MemoryAgent> {
    async fn get(&self, oids: &[&str]) -> SnmpResult<Vec<VarBind>> {
        self.as_ref().get(oids).await
    }

    fn walk<'a>(&'a self, base: &'a str) -> BoxStream<'a, SnmpResult<VarBind>> {
        self.as_ref().walk(base)
    }
}

/// Hands out the same [`MemoryAgent`] for every target
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    agent: Arc<MemoryAgent>,
}

impl MemoryConnector {
    pub fn new(agent: MemoryAgent) -> Self {
        Self {
            agent: Arc::new(agent),
        }
    }
}

#[async_trait]
impl SnmpConnector for MemoryConnector {
    async fn connect(
        &self,
        _target: &SnmpTarget,
        _credentials: &SnmpCredentials,
        _timeout: Duration,
    ) -> SnmpResult<Box<dyn SnmpTransport>> {
        Ok(Box::new(Arc::clone(&self.agent)))
    }
}
