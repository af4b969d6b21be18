//! Integration coverage for the request security pipeline, driven through
//! the dispatcher the way the IPC layer drives it.

use std::collections::HashMap;

use serde_json::{json, Value};

use hosts_helper::config::SecurityConfig;
use hosts_helper::ipc::Request;

mod common;

fn request(operation: &str, client_id: &str, params: Value) -> Request {
    let parameters: HashMap<String, Value> = serde_json::from_value(params).unwrap();
    Request::new(operation, client_id, parameters)
}

#[test]
fn quota_violation_escalates_to_blacklist() {
    let mut security = SecurityConfig::default();
    security.max_requests_per_minute = 5;
    let env = common::build_env(security);

    for _ in 0..5 {
        let response = env
            .dispatcher
            .handle(&request("get_status", "burst-client", json!({})));
        assert!(response.success, "{:?}", response.error);
    }

    let response = env
        .dispatcher
        .handle(&request("get_status", "burst-client", json!({})));
    assert_eq!(response.error_code(), Some("RATE_LIMIT_EXCEEDED"));

    // Once blacklisted, the limiter never even sees the client again.
    let response = env
        .dispatcher
        .handle(&request("get_status", "burst-client", json!({})));
    assert_eq!(response.error_code(), Some("CLIENT_BLACKLISTED"));

    // A different client is unaffected.
    let response = env
        .dispatcher
        .handle(&request("get_status", "calm-client", json!({})));
    assert!(response.success);
}

#[test]
fn trusted_clients_are_exempt_from_quota() {
    let mut security = SecurityConfig::default();
    security.max_requests_per_minute = 1;
    security.trusted_clients = vec!["system-agent".to_string()];
    let env = common::build_env(security);

    for _ in 0..20 {
        let response = env
            .dispatcher
            .handle(&request("get_status", "system-agent", json!({})));
        assert!(response.success, "{:?}", response.error);
    }
}

#[test]
fn operations_outside_the_allow_list_are_rejected() {
    let env = common::default_env();

    let response = env
        .dispatcher
        .handle(&request("flush_dns_cache", "c1", json!({})));
    assert_eq!(response.error_code(), Some("OPERATION_NOT_ALLOWED"));

    let records = env.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation, "flush_dns_cache");
    assert!(records[0].reason.is_some());
}

#[test]
fn allow_list_narrowing_is_honored() {
    let mut security = SecurityConfig::default();
    security.allowed_operations = vec!["get_status".to_string()];
    let env = common::build_env(security);

    let response = env.dispatcher.handle(&request("get_status", "c1", json!({})));
    assert!(response.success);

    let response = env.dispatcher.handle(&request(
        "backup_hosts",
        "c1",
        json!({}),
    ));
    assert_eq!(response.error_code(), Some("OPERATION_NOT_ALLOWED"));
}

#[test]
fn stale_requests_are_rejected_before_any_other_check() {
    let env = common::default_env();

    let mut stale = request("get_status", "c1", json!({}));
    stale.timestamp = chrono::Utc::now() - chrono::Duration::minutes(10);
    let response = env.dispatcher.handle(&stale);
    assert_eq!(response.error_code(), Some("REQUEST_EXPIRED"));

    let mut future = request("get_status", "c1", json!({}));
    future.timestamp = chrono::Utc::now() + chrono::Duration::minutes(5);
    let response = env.dispatcher.handle(&future);
    assert_eq!(response.error_code(), Some("REQUEST_EXPIRED"));
}

#[test]
fn dangerous_hostnames_are_blocked() {
    let env = common::default_env();

    for hostname in ["localhost", "evil.local", "fake-127.0.0.1.example.com"] {
        let response = env.dispatcher.handle(&request(
            "write_hosts",
            "c1",
            json!({"entries": [{"ip": "10.0.0.1", "hostname": hostname, "enabled": true}]}),
        ));
        assert_eq!(
            response.error_code(),
            Some("VALIDATION_FAILED"),
            "hostname {:?} should have been rejected",
            hostname
        );
    }

    // A benign name on the same shape passes.
    let response = env.dispatcher.handle(&request(
        "write_hosts",
        "c1",
        json!({"entries": [{"ip": "10.0.0.1", "hostname": "db.internal.example.com", "enabled": true}]}),
    ));
    assert!(response.success, "{:?}", response.error);
}

#[test]
fn multicast_and_unspecified_ips_are_blocked() {
    let env = common::default_env();

    for ip in ["224.0.0.1", "0.0.0.0", "ff02::1", "::"] {
        let response = env.dispatcher.handle(&request(
            "write_hosts",
            "c1",
            json!({"entries": [{"ip": ip, "hostname": "ok.example.com", "enabled": true}]}),
        ));
        assert_eq!(
            response.error_code(),
            Some("VALIDATION_FAILED"),
            "ip {:?} should have been rejected",
            ip
        );
    }
}

#[test]
fn entry_cap_is_enforced() {
    let mut security = SecurityConfig::default();
    security.max_host_entries = 2;
    let env = common::build_env(security);

    let entries: Vec<Value> = (0..3)
        .map(|i| json!({"ip": format!("10.0.0.{}", i + 1), "hostname": format!("h{}.example.com", i), "enabled": true}))
        .collect();
    let response = env
        .dispatcher
        .handle(&request("write_hosts", "c1", json!({"entries": entries})));
    assert_eq!(response.error_code(), Some("VALIDATION_FAILED"));
}

#[test]
fn rejections_and_successes_both_reach_the_audit_trail() {
    let env = common::default_env();

    let response = env.dispatcher.handle(&request("get_status", "c1", json!({})));
    assert!(response.success);

    let response = env.dispatcher.handle(&request(
        "restore_hosts",
        "c1",
        json!({"backup_path": "../etc/shadow"}),
    ));
    assert_eq!(response.error_code(), Some("VALIDATION_FAILED"));

    let records = env.audit.records();
    assert_eq!(records.len(), 2);
    assert!(records[0].reason.is_none());
    assert!(records[1].reason.as_deref().unwrap().contains("parameter_validation"));
}
