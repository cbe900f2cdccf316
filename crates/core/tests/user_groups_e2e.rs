//! End-to-end tests for user-group membership publishing.
//!
//! These tests exercise the real `SyncEngine` with the builtin mapper
//! registry and a `JsonDirPublisher` writing into a temporary directory.
//! The directory snapshot is built in memory, so no LDAP server is needed.

use std::collections::BTreeMap;
use std::path::Path;

use tempfile::TempDir;

use ldapmap_core::config::{MappingConfig, MemberScheme};
use ldapmap_core::directory::{DirectoryEntry, DirectorySnapshot};
use ldapmap_core::mapper::MapperRegistry;
use ldapmap_core::publish::JsonDirPublisher;
use ldapmap_core::sync_engine::SyncEngine;

// ===========================================================================
// Helpers
// ===========================================================================

fn user_dn(uid: &str) -> String {
    format!("uid={},ou=People,dc=example,dc=com", uid)
}

fn group_dn(cn: &str) -> String {
    format!("cn={},ou=Groups,dc=example,dc=com", cn)
}

fn user(uid: &str, gid: &str) -> DirectoryEntry {
    DirectoryEntry::new(user_dn(uid))
        .with_attr("uid", uid)
        .with_attr("gidNumber", gid)
}

fn group(cn: &str, gid: &str) -> DirectoryEntry {
    DirectoryEntry::new(group_dn(cn))
        .with_attr("cn", cn)
        .with_attr("gidNumber", gid)
}

fn mapping(scheme: MemberScheme) -> MappingConfig {
    MappingConfig {
        mappers: vec!["user-groups".into()],
        member_scheme: scheme,
        user_prefix: "user.".into(),
        ..Default::default()
    }
}

/// Run one cycle and read back the published user-groups map.
fn publish(dir: &Path, scheme: MemberScheme, snapshot: &DirectorySnapshot) -> BTreeMap<String, String> {
    let publisher = JsonDirPublisher::new(dir);
    let engine = SyncEngine::new(
        &mapping(scheme),
        &MapperRegistry::builtin(),
        Box::new(publisher.clone()),
    )
    .expect("engine construction failed");

    engine.run_cycle(snapshot).expect("cycle failed");

    let contents = std::fs::read_to_string(publisher.path_for("user-groups-map"))
        .expect("user-groups-map.json not written");
    serde_json::from_str(&contents).expect("published map is not a JSON object")
}

fn groups(data: &BTreeMap<String, String>, key: &str) -> Vec<String> {
    serde_json::from_str(&data[key]).expect("value is not a JSON string array")
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn primary_group_injected_without_explicit_membership() {
    let dir = TempDir::new().unwrap();
    let snapshot = DirectorySnapshot {
        users: vec![user("alice", "100")],
        groups: vec![group("staff", "100").with_values("member", Vec::<String>::new())],
    };

    let data = publish(dir.path(), MemberScheme::Member, &snapshot);
    assert_eq!(
        data,
        BTreeMap::from([("user.alice".to_string(), r#"["staff"]"#.to_string())])
    );
}

#[test]
fn primary_group_already_listed_is_not_duplicated() {
    let dir = TempDir::new().unwrap();
    let snapshot = DirectorySnapshot {
        users: vec![user("alice", "100")],
        groups: vec![
            group("staff", "100").with_values("member", [user_dn("alice")]),
            group("admins", "200").with_values("member", [user_dn("alice")]),
        ],
    };

    let data = publish(dir.path(), MemberScheme::Member, &snapshot);
    assert_eq!(groups(&data, "user.alice"), vec!["staff", "admins"]);
}

#[test]
fn memberuid_membership_and_empty_user() {
    let dir = TempDir::new().unwrap();
    let snapshot = DirectorySnapshot {
        users: vec![user("alice", "500"), user("bob", "501")],
        groups: vec![group("admins", "200").with_values("memberUid", ["alice"])],
    };

    let data = publish(dir.path(), MemberScheme::MemberUid, &snapshot);
    assert!(groups(&data, "user.alice").contains(&"admins".to_string()));
    assert_eq!(data["user.bob"], "[]");
}

#[test]
fn memberof_without_group_member_lists() {
    let dir = TempDir::new().unwrap();
    let snapshot = DirectorySnapshot {
        users: vec![user("alice", "500").with_values("memberOf", [group_dn("admins")])],
        groups: vec![group("admins", "200")],
    };

    let data = publish(dir.path(), MemberScheme::MemberOf, &snapshot);
    assert_eq!(groups(&data, "user.alice"), vec!["admins"]);
}

#[test]
fn dangling_member_reference_is_dropped() {
    let dir = TempDir::new().unwrap();
    let snapshot = DirectorySnapshot {
        users: vec![user("alice", "500")],
        groups: vec![group("admins", "200")
            .with_values("member", [user_dn("alice"), user_dn("departed")])],
    };

    let data = publish(dir.path(), MemberScheme::Member, &snapshot);
    assert_eq!(data.len(), 1);
    assert!(!data.contains_key("user.departed"));
    assert!(data.values().all(|v| !v.contains("departed")));
}

// ===========================================================================
// Properties
// ===========================================================================

/// Three users, four groups, memberships expressed consistently in all three
/// encodings.
fn equivalent_snapshot() -> DirectorySnapshot {
    let memberships: &[(&str, &str, &[&str])] = &[
        ("staff", "100", &["alice", "bob"]),
        ("admins", "200", &["alice"]),
        ("ops", "300", &["carol", "bob"]),
        ("empty", "400", &[]),
    ];

    let users = [("alice", "100"), ("bob", "300"), ("carol", "999")]
        .iter()
        .map(|(uid, gid)| {
            let member_of: Vec<String> = memberships
                .iter()
                .filter(|(_, _, members)| members.contains(uid))
                .map(|(cn, _, _)| group_dn(cn))
                .collect();
            user(uid, gid).with_values("memberOf", member_of)
        })
        .collect();

    let groups = memberships
        .iter()
        .map(|(cn, gid, members)| {
            group(cn, gid)
                .with_values("member", members.iter().map(|m| user_dn(m)))
                .with_values("memberUid", members.iter().copied())
        })
        .collect();

    DirectorySnapshot { users, groups }
}

#[test]
fn schemes_agree_on_equivalent_data() {
    let snapshot = equivalent_snapshot();
    let mut results = Vec::new();
    for scheme in [MemberScheme::Member, MemberScheme::MemberUid, MemberScheme::MemberOf] {
        let dir = TempDir::new().unwrap();
        results.push(publish(dir.path(), scheme, &snapshot));
    }

    for key in ["user.alice", "user.bob", "user.carol"] {
        let mut reference = groups(&results[0], key);
        let primary = reference.first().cloned();
        reference.sort();
        for data in &results[1..] {
            let mut other = groups(data, key);
            assert_eq!(other.first().cloned(), primary, "primary differs for {}", key);
            other.sort();
            assert_eq!(other, reference, "membership differs for {}", key);
        }
    }

    assert_eq!(groups(&results[0], "user.bob")[0], "ops");
    assert_eq!(groups(&results[0], "user.carol"), vec!["ops"]);
}

#[test]
fn every_user_has_one_valid_entry_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let snapshot = equivalent_snapshot();

    let data = publish(dir.path(), MemberScheme::Member, &snapshot);
    assert_eq!(
        data.keys().collect::<Vec<_>>(),
        vec!["user.alice", "user.bob", "user.carol"]
    );
    for key in data.keys() {
        let list = groups(&data, key);
        let mut deduped = list.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), list.len(), "duplicate group for {}", key);
    }
}

#[test]
fn repeated_cycles_publish_identical_output() {
    let snapshot = equivalent_snapshot();
    let dir = TempDir::new().unwrap();
    let publisher = JsonDirPublisher::new(dir.path());
    let engine = SyncEngine::new(
        &mapping(MemberScheme::MemberUid),
        &MapperRegistry::builtin(),
        Box::new(publisher.clone()),
    )
    .unwrap();

    engine.run_cycle(&snapshot).unwrap();
    let first = std::fs::read(publisher.path_for("user-groups-map")).unwrap();
    engine.run_cycle(&snapshot).unwrap();
    let second = std::fs::read(publisher.path_for("user-groups-map")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn duplicate_gid_keeps_last_group() {
    let dir = TempDir::new().unwrap();
    let snapshot = DirectorySnapshot {
        users: vec![user("alice", "100")],
        groups: vec![group("staff", "100"), group("legacy-staff", "100")],
    };

    let data = publish(dir.path(), MemberScheme::MemberUid, &snapshot);
    assert_eq!(groups(&data, "user.alice"), vec!["legacy-staff"]);
}
