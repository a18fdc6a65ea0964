//! Integration tests for nismap.
//!
//! These tests run the export command end to end: snapshot file in, map
//! files out.

mod helpers;

use helpers::{
    read_lines, SnapshotBuilder, TestEnv, GROUP_SPREAD, HOST_SPREAD, NETGROUP_SPREAD, USER_SPREAD,
};
use nismap::commands::export::{cmd_export, ExportRequest, Mode};
use nismap::config::Config;
use nismap::report::{SkipCategory, WriteStatus};
use serde_json::json;
use std::fs;
use std::os::unix::fs::PermissionsExt;

fn sample() -> SnapshotBuilder {
    SnapshotBuilder::new()
        .group(1, "staff", Some(1000), &[GROUP_SPREAD, NETGROUP_SPREAD])
        .group(2, "admins", Some(1001), &[GROUP_SPREAD, NETGROUP_SPREAD])
        .group(3, "servers", None, &[HOST_SPREAD])
        .account(10, "alice", 1000)
        .account(11, "bob", 500)
        .account(12, "carol", 500)
        .host(20, "ulrik.uio.no.")
        .member(1, 10, "account")
        .member(1, 11, "account")
        .member(1, 2, "group")
        .member(2, 12, "account")
        .member(3, 20, "dns_owner")
}

fn request(env: &TestEnv, snapshot: &SnapshotBuilder) -> ExportRequest {
    ExportRequest {
        snapshot: env.write_snapshot(snapshot),
        user_spread: Some(USER_SPREAD.to_string()),
        group_spread: Some(GROUP_SPREAD.to_string()),
        ..Default::default()
    }
}

// =============================================================================
// End-to-end export
// =============================================================================

#[test]
fn test_export_all_maps() {
    let env = TestEnv::new();
    let mut req = request(&env, &sample());
    req.passwd = Some(env.map("passwd"));
    req.shadow = Some(env.map("shadow"));
    req.group = Some(env.map("group"));
    req.auth_method = Some("MD5-crypt".to_string());

    let report = cmd_export(&req, &Config::default(), Mode::Write).unwrap();

    assert_eq!(
        read_lines(&env.map("passwd")),
        vec![
            "alice:x:10010:1000:alice:/home/alice:/bin/bash",
            "bob:x:10011:500:bob:/home/bob:/bin/bash",
            "carol:x:10012:500:carol:/home/carol:/bin/bash",
        ]
    );
    assert_eq!(read_lines(&env.map("shadow"))[1], "bob:$1$bob$hash:::");
    // admins is exported on its own, so staff does not inline carol
    assert_eq!(
        read_lines(&env.map("group")),
        vec!["staff:*:1000:bob", "admins:*:1001:carol"]
    );

    let mode = fs::metadata(env.map("shadow")).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
    assert_eq!(report.maps.len(), 3);
    assert!(matches!(report.map("group").unwrap().status, WriteStatus::Written { .. }));
}

#[test]
fn test_export_netgroups() {
    let env = TestEnv::new();
    let mut req = request(&env, &sample());
    req.group_spread = Some(NETGROUP_SPREAD.to_string());
    req.host_group_spread = Some(HOST_SPREAD.to_string());
    req.netgroup = Some(env.map("netgroup"));
    req.mnetgroup = Some(env.map("netgroup.host"));
    req.zone = Some(".uio.no.".to_string());

    cmd_export(&req, &Config::default(), Mode::Write).unwrap();

    assert_eq!(
        read_lines(&env.map("netgroup")),
        vec!["staff admins (,alice,) (,bob,)", "admins (,carol,)"]
    );
    assert_eq!(
        read_lines(&env.map("netgroup.host")),
        vec!["servers (ulrik,-,) (ulrik.uio.no,-,)"]
    );
}

#[test]
fn test_eof_marker() {
    let env = TestEnv::new();
    let mut req = request(&env, &sample());
    req.group = Some(env.map("group"));
    req.eof = true;

    cmd_export(&req, &Config::default(), Mode::Write).unwrap();
    assert_eq!(read_lines(&env.map("group")).last().unwrap(), "E_O_F");
}

#[test]
fn test_rerun_leaves_map_unchanged() {
    let env = TestEnv::new();
    let mut req = request(&env, &sample());
    req.passwd = Some(env.map("passwd"));

    cmd_export(&req, &Config::default(), Mode::Write).unwrap();
    let report = cmd_export(&req, &Config::default(), Mode::Write).unwrap();
    assert!(matches!(report.map("passwd").unwrap().status, WriteStatus::Unchanged { .. }));
}

#[test]
fn test_check_mode_writes_nothing() {
    let env = TestEnv::new();
    let mut req = request(&env, &sample());
    req.passwd = Some(env.map("passwd"));
    req.group = Some(env.map("group"));

    let report = cmd_export(&req, &Config::default(), Mode::Check).unwrap();
    assert!(!env.map("passwd").exists());
    assert!(!env.map("group").exists());
    assert_eq!(report.map("passwd").unwrap().records, 3);
    assert_eq!(report.map("group").unwrap().status, WriteStatus::NotWritten);
}

// =============================================================================
// Size sanity check
// =============================================================================

fn many_accounts(n: u64) -> SnapshotBuilder {
    (0..n).fold(SnapshotBuilder::new(), |b, i| {
        b.account(100 + i, &format!("user{:03}", i), 500)
    })
}

#[test]
fn test_shrinking_map_is_refused() {
    let env = TestEnv::new();
    let mut req = request(&env, &many_accounts(20));
    req.passwd = Some(env.map("passwd"));
    cmd_export(&req, &Config::default(), Mode::Write).unwrap();
    let before = fs::read_to_string(env.map("passwd")).unwrap();

    let mut req = request(&env, &many_accounts(2));
    req.passwd = Some(env.map("passwd"));
    let err = cmd_export(&req, &Config::default(), Mode::Write).unwrap_err();

    assert!(format!("{:#}", err).contains("size changed"));
    assert_eq!(fs::read_to_string(env.map("passwd")).unwrap(), before);
    // only the map itself, no leftover temp file
    assert_eq!(fs::read_dir(&env.maps).unwrap().count(), 1);
}

#[test]
fn test_failed_shadow_keeps_passwd_unchanged() {
    let env = TestEnv::new();
    let mut req = request(&env, &many_accounts(20));
    req.passwd = Some(env.map("passwd"));
    req.shadow = Some(env.map("shadow"));
    req.auth_method = Some("MD5-crypt".to_string());
    cmd_export(&req, &Config::default(), Mode::Write).unwrap();
    let passwd = fs::read_to_string(env.map("passwd")).unwrap();
    let shadow = fs::read_to_string(env.map("shadow")).unwrap();

    // one more account grows passwd by about 5% but shadow by far more
    let newbie = many_accounts(20).account_json(json!({
        "id": 500, "name": "newbie", "posix_uid": 10500, "posix_gid": 500,
        "shell": "/bin/bash", "home": "/home/newbie",
        "auth": {"MD5-crypt": format!("$1$newbie${}", "a".repeat(140))},
        "spreads": [USER_SPREAD]
    }));
    let mut req = request(&env, &newbie);
    req.passwd = Some(env.map("passwd"));
    req.shadow = Some(env.map("shadow"));
    req.auth_method = Some("MD5-crypt".to_string());
    let err = cmd_export(&req, &Config::default(), Mode::Write).unwrap_err();

    assert!(format!("{:#}", err).contains("shadow"));
    assert!(format!("{:#}", err).contains("size changed"));
    assert_eq!(fs::read_to_string(env.map("passwd")).unwrap(), passwd);
    assert_eq!(fs::read_to_string(env.map("shadow")).unwrap(), shadow);
    assert_eq!(fs::read_dir(&env.maps).unwrap().count(), 2);
}

#[test]
fn test_force_overrides_size_check() {
    let env = TestEnv::new();
    let mut req = request(&env, &many_accounts(20));
    req.passwd = Some(env.map("passwd"));
    cmd_export(&req, &Config::default(), Mode::Write).unwrap();

    let mut req = request(&env, &many_accounts(2));
    req.passwd = Some(env.map("passwd"));
    req.force = true;
    cmd_export(&req, &Config::default(), Mode::Write).unwrap();
    assert_eq!(read_lines(&env.map("passwd")).len(), 2);
}

#[test]
fn test_small_change_is_accepted() {
    let env = TestEnv::new();
    let mut req = request(&env, &many_accounts(40));
    req.passwd = Some(env.map("passwd"));
    cmd_export(&req, &Config::default(), Mode::Write).unwrap();

    let mut req = request(&env, &many_accounts(41));
    req.passwd = Some(env.map("passwd"));
    cmd_export(&req, &Config::default(), Mode::Write).unwrap();
    assert_eq!(read_lines(&env.map("passwd")).len(), 41);
}

// =============================================================================
// Failure handling
// =============================================================================

#[test]
fn test_bad_records_are_skipped_not_fatal() {
    let env = TestEnv::new();
    let snapshot = sample()
        .account_json(json!({
            "id": 30, "name": "colon", "posix_uid": 30, "posix_gid": 500,
            "gecos": "Doe: Jane", "shell": "/bin/bash", "spreads": [USER_SPREAD]
        }))
        .group(4, "nogid", None, &[GROUP_SPREAD]);
    let mut req = request(&env, &snapshot);
    req.passwd = Some(env.map("passwd"));
    req.group = Some(env.map("group"));

    let report = cmd_export(&req, &Config::default(), Mode::Write).unwrap();
    assert_eq!(read_lines(&env.map("passwd")).len(), 3);
    assert_eq!(read_lines(&env.map("group")).len(), 2);
    assert_eq!(report.count(SkipCategory::IllegalField), 1);
    assert_eq!(report.count(SkipCategory::MissingGid), 1);
}

#[test]
fn test_missing_snapshot_is_fatal() {
    let env = TestEnv::new();
    let req = ExportRequest {
        snapshot: env.base_dir.join("missing.json"),
        user_spread: Some(USER_SPREAD.to_string()),
        passwd: Some(env.map("passwd")),
        ..Default::default()
    };
    let err = cmd_export(&req, &Config::default(), Mode::Write).unwrap_err();
    assert!(err.to_string().contains("Failed to load snapshot"));
}

#[test]
fn test_usage_errors_before_loading() {
    let env = TestEnv::new();
    let req = ExportRequest {
        snapshot: env.base_dir.join("missing.json"),
        shadow: Some(env.map("shadow")),
        ..Default::default()
    };
    let err = cmd_export(&req, &Config::default(), Mode::Write).unwrap_err();
    assert!(err.to_string().contains("--passwd"));
}
