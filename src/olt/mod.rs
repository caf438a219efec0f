//! OLT queries on behalf of HTTP callers
//!
//! Resolves a [`TargetRequest`] into an SNMP target, opens a session through
//! the injected [`SnmpConnector`] and runs one collection under the request
//! deadline. Every request gets its own session.

pub mod dto;

use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::OltConfig;
use crate::protocols::snmp::olt::OltClient;
use crate::protocols::snmp::{
    DEFAULT_COMMUNITY, DEFAULT_PORT, SnmpConnector, SnmpCredentials, SnmpError, SnmpResult,
    SnmpTarget, SnmpVersion,
};

pub use dto::{
    OltRequest, OntListResponse, OntRequest, OntStatusResponse, PonPortListResponse,
    SystemMetricsResponse, TargetRequest,
};

#[async_trait]
pub trait OltService: Send + Sync {
    async fn system_metrics(&self, target: &TargetRequest) -> SnmpResult<SystemMetricsResponse>;

    async fn pon_ports(&self, target: &TargetRequest) -> SnmpResult<PonPortListResponse>;

    async fn onts(&self, target: &TargetRequest) -> SnmpResult<OntListResponse>;

    async fn ont_status(&self, target: &TargetRequest) -> SnmpResult<OntStatusResponse>;
}

/// Build the SNMP target for a request, applying the protocol defaults
pub fn resolve_target(request: &TargetRequest) -> SnmpResult<SnmpTarget> {
    let ip: IpAddr = request
        .ip
        .trim()
        .parse()
        .map_err(|_| SnmpError::InvalidTarget(format!("'{}' is not an IP address", request.ip)))?;

    let version: SnmpVersion = request.version.as_deref().unwrap_or_default().parse()?;
    let community = request
        .community
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_COMMUNITY)
        .to_string();

    Ok(SnmpTarget {
        ip,
        port: request.port.unwrap_or(DEFAULT_PORT),
        credentials: Some(SnmpCredentials { community, version }),
    })
}

pub struct SnmpOltService {
    connector: Arc<dyn SnmpConnector>,
    snmp_timeout: Duration,
    request_timeout: Duration,
}

impl SnmpOltService {
    pub fn new(connector: Arc<dyn SnmpConnector>, config: &OltConfig) -> Self {
        Self {
            connector,
            snmp_timeout: config.snmp_timeout(),
            request_timeout: config.request_timeout(),
        }
    }

    /// Connect to the target and run `collect` on the session, bounded by the request deadline
    async fn with_client<T, F, Fut>(&self, request: &TargetRequest, collect: F) -> SnmpResult<T>
    where
        F: FnOnce(OltClient) -> Fut + Send,
        Fut: Future<Output = SnmpResult<T>> + Send,
        T: Send,
    {
        let target = resolve_target(request)?;
        let device_id = target.ip.to_string();

        let work = async {
            let client = OltClient::connect(
                self.connector.as_ref(),
                &target,
                device_id,
                self.snmp_timeout,
            )
            .await?;
            collect(client).await
        };

        tokio::time::timeout(self.request_timeout, work)
            .await
            .map_err(|_| SnmpError::Timeout)?
    }
}

#[async_trait]
impl OltService for SnmpOltService {
    #[instrument(skip_all, fields(ip = %target.ip))]
    async fn system_metrics(&self, target: &TargetRequest) -> SnmpResult<SystemMetricsResponse> {
        let metrics = self
            .with_client(target, |client| async move { client.system_metrics().await })
            .await?;

        debug!("system metrics collected");
        Ok(SystemMetricsResponse::new(target.ip.clone(), metrics))
    }

    #[instrument(skip_all, fields(ip = %target.ip))]
    async fn pon_ports(&self, target: &TargetRequest) -> SnmpResult<PonPortListResponse> {
        let ports = self
            .with_client(target, |client| async move { client.pon_port_metrics().await })
            .await?;

        Ok(PonPortListResponse::new(target.ip.clone(), ports))
    }

    #[instrument(skip_all, fields(ip = %target.ip))]
    async fn onts(&self, target: &TargetRequest) -> SnmpResult<OntListResponse> {
        let onts = self
            .with_client(target, |client| async move { client.ont_metrics().await })
            .await?;

        Ok(OntListResponse::new(target.ip.clone(), onts))
    }

    #[instrument(skip_all, fields(ip = %target.ip))]
    async fn ont_status(&self, target: &TargetRequest) -> SnmpResult<OntStatusResponse> {
        let onts = self
            .with_client(target, |client| async move { client.ont_metrics().await })
            .await?;

        Ok(OntStatusResponse::new(target.ip.clone(), onts))
    }
}
