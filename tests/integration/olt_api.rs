//! Integration tests for the OLT gateway over HTTP

use std::net::SocketAddr;
use std::sync::Arc;

use optical_nms::{
    actors::InventoryHandle,
    api::{ApiConfig, ApiState, spawn_api_server},
    bus::{MemoryBus, MessageBus},
    config::OltConfig,
    olt::SnmpOltService,
    protocols::snmp::{SnmpValue, memory::{MemoryAgent, MemoryConnector}, oids},
    registry::{DeviceStore, InventorySync, PublishedInventory},
};
use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::helpers::*;

async fn spawn_gateway(agent: MemoryAgent) -> (SocketAddr, Arc<DeviceStore>) {
    let devices = Arc::new(DeviceStore::new());
    (serve(agent, devices.clone()).await, devices)
}

async fn serve(agent: MemoryAgent, devices: Arc<dyn InventorySync>) -> SocketAddr {
    let olt = SnmpOltService::new(Arc::new(MemoryConnector::new(agent)), &OltConfig::default());
    let state = ApiState::new(Arc::new(olt), devices);

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        enable_cors: true,
    };

    spawn_api_server(config, state).await.unwrap()
}

async fn post(addr: SocketAddr, route: &str, body: Value) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{addr}{route}"))
        .json(&body)
        .send()
        .await
        .unwrap();

    let status = response.status();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_health() {
    let (addr, _) = spawn_gateway(MemoryAgent::new()).await;

    let body: Value = reqwest::get(format!("http://{addr}/api/v1/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["devices"], 0);
}

#[tokio::test]
async fn test_system_metrics() {
    let (addr, _) = spawn_gateway(create_olt_agent()).await;

    let (status, body) = post(addr, "/api/v1/olt/system", json!({"target": {"ip": "10.0.0.5"}})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uptime_seconds"], 3600);
    assert_eq!(body["sys_name"], "olt-north");
    assert_eq!(body["cpu_usage_percent"], 45.0);
    assert_eq!(body["memory_total_kb"], 524_288);
    assert_eq!(body["memory_used_kb"], 131_072);
    assert_eq!(body["temperature_celsius"], 52.0);
}

#[tokio::test]
async fn test_pon_ports() {
    let (addr, _) = spawn_gateway(create_olt_agent()).await;

    let (status, body) = post(
        addr,
        "/api/v1/olt/pon-ports",
        json!({"target": {"ip": "10.0.0.5", "community": "private", "port": 1161}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    let first = &body["pon_ports"][0];
    assert_eq!(first["port_index"], 1);
    assert_eq!(first["ip_address"], "10.0.0.5");
    assert!(first["timestamp"].is_string());
    assert_eq!(first["admin_status"], "up");
    assert_eq!(first["tx_power_dbm"], 2.5);
    assert_eq!(first["rx_power_dbm"], -18.0);
    assert_eq!(body["pon_ports"][1]["oper_status"], "down");
}

#[tokio::test]
async fn test_onts_and_status() {
    let (addr, _) = spawn_gateway(create_olt_agent()).await;
    let target = json!({"ip": "10.0.0.5"});

    let (status, body) = post(addr, "/api/v1/olt/onts", json!({"target": target, "pon_port": 1})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["onts"][0]["serial_number"], "A");
    assert_eq!(body["onts"][0]["ip_address"], "10.0.0.5");
    assert_eq!(body["onts"][0]["description"], "ONT-10");
    assert_eq!(body["onts"][0]["rx_power_dbm"], -20.5);
    assert_eq!(body["onts"][0]["distance_meters"], 830);

    let (status, body) = post(addr, "/api/v1/olt/ont-status", json!({"target": target})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["up"].as_array().unwrap().len(), 2);
    assert_eq!(body["down"][0]["ont_index"], 11);
}

#[tokio::test]
async fn test_negative_pon_port() {
    let (addr, _) = spawn_gateway(create_olt_agent()).await;

    let (status, body) = post(
        addr,
        "/api/v1/olt/ont-status",
        json!({"target": {"ip": "10.0.0.5"}, "pon_port": -3}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "pon_port must be >= 0");
}

#[tokio::test]
async fn test_pon_walk_failure_is_not_a_partial_list() {
    let agent = create_olt_agent().fail_walk(oids::PON_RX_POWER);
    let (addr, _) = spawn_gateway(agent).await;

    let (status, body) = post(addr, "/api/v1/olt/pon-ports", json!({"target": {"ip": "10.0.0.5"}})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.get("pon_ports").is_none());
    assert!(body["error"].as_str().unwrap().contains(oids::PON_RX_POWER));
}

#[tokio::test]
async fn test_unreachable_system_get() {
    let agent = MemoryAgent::new()
        .with(oids::SYS_UPTIME, SnmpValue::TimeTicks(1))
        .fail_gets();
    let (addr, _) = spawn_gateway(agent).await;

    let (status, body) = post(addr, "/api/v1/olt/system", json!({"target": {"ip": "10.0.0.5"}})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().starts_with("failed to get system metrics"));
}

#[tokio::test]
async fn test_inventory_sync() {
    let (addr, devices) = spawn_gateway(MemoryAgent::new()).await;

    let (status, body) = post(
        addr,
        "/api/v1/monitoring/sync",
        json!({"devices": [
            {"id": "r1", "ip_address": "10.0.0.1", "device_type": "router", "protocol": "mikrotik_api"},
            {"id": "olt1", "ip_address": "10.0.0.5", "device_type": "olt", "protocol": "snmp", "enabled": false}
        ]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(devices.len().await, 2);

    // Duplicate IPs reject the whole batch and keep the previous inventory
    let (status, _) = post(
        addr,
        "/api/v1/monitoring/sync",
        json!({"devices": [
            {"id": "a", "ip_address": "10.0.0.7", "device_type": "switch", "protocol": "ssh"},
            {"id": "b", "ip_address": "10.0.0.7", "device_type": "switch", "protocol": "ssh"}
        ]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(devices.get("r1").await.is_some());
}

#[tokio::test]
async fn test_sync_is_forwarded_to_collector() {
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());

    // Collector side: the store the scheduler reads
    let store = Arc::new(DeviceStore::new());
    let tracker = InventoryHandle::spawn(bus.as_ref(), store.clone()).await.unwrap();

    let gateway = PublishedInventory::new(bus.clone(), Vec::new()).unwrap();
    let addr = serve(MemoryAgent::new(), Arc::new(gateway)).await;

    let (status, body) = post(
        addr,
        "/api/v1/monitoring/sync",
        json!({"devices": [
            {"id": "r1", "ip_address": "10.0.0.1", "device_type": "router", "protocol": "mikrotik_api",
             "auth": {"username": "monitor", "password": "pw", "port": 8729}},
            {"id": "olt1", "ip_address": "10.0.0.5", "device_type": "olt", "protocol": "snmp"}
        ]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    wait_for_tracked(&tracker, |s| s.syncs_applied >= 1).await;
    assert_eq!(store.len().await, 2);

    let auth = store.get("r1").await.unwrap().auth.unwrap();
    assert_eq!(auth.username, "monitor");
    assert_eq!(auth.port, Some(8729));

    let health: Value = reqwest::get(format!("http://{addr}/api/v1/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["devices"], 2);

    tracker.shutdown().await.unwrap();
}
