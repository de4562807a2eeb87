//! End-to-end integration tests for the asset registry.
//!
//! These tests drive the public `Registry` API the way a host would: one
//! `CallContext` per call, the logical clock moving forward between calls,
//! and both store backends underneath. Each test builds its own registry.

use std::collections::BTreeSet;

use assetvault_registry::{
    AssetDetails, CallContext, Clock, LogicalClock, Registry, RegistryError, SledStore,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn details(name: &str, public_view: bool) -> AssetDetails {
    AssetDetails {
        name: name.into(),
        category: "vehicles".into(),
        acquisition_date: 5,
        acquisition_cost: 45_000,
        metadata: None,
        public_view,
    }
}

fn ids(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The full asset lifecycle, run against whichever backend is passed in.
fn run_lifecycle<S: assetvault_registry::RecordStore>(reg: &Registry<S>) {
    // 1. Register at clock 10.
    let at10 = CallContext::new("alice", 10);
    reg.register_asset(&at10, "a1", details("Roadster", false), 50_000)
        .unwrap();
    let history = reg.history(&at10, "alice", "a1").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!((history[0].timestamp, history[0].value), (10, 50_000));

    // 2. Revalue at clock 20.
    let at20 = CallContext::new("alice", 20);
    assert_eq!(reg.update_value(&at20, "a1", 60_000).unwrap(), 60_000);
    let history = reg.history(&at20, "alice", "a1").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!((history[1].timestamp, history[1].value), (20, 60_000));
    assert_eq!(reg.get_asset(&at20, "alice", "a1").unwrap().current_value, 60_000);

    // 3. Watch for values above 55,000.
    reg.set_threshold(&at20, "a1", "t1", "greater-than", 55_000, None)
        .unwrap();
    assert_eq!(reg.evaluate(&at20, "alice", "a1").unwrap(), ids(&["t1"]));

    // 4. Delete: the record goes, history and thresholds stay.
    let at30 = CallContext::new("alice", 30);
    reg.delete_asset(&at30, "a1").unwrap();
    assert!(matches!(
        reg.update_value(&at30, "a1", 1),
        Err(RegistryError::AssetNotFound(_))
    ));
    assert_eq!(reg.history(&at30, "alice", "a1").unwrap().len(), 2);
    assert_eq!(reg.get_threshold(&at30, "alice", "a1", "t1").unwrap().value, 55_000);

    let vault = reg.get_vault(&at30, "alice").unwrap();
    assert_eq!(vault.created_at, 10);
    assert_eq!(vault.last_updated, 30);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn lifecycle_in_memory() {
    run_lifecycle(&Registry::in_memory());
}

#[test]
fn lifecycle_on_sled() {
    let store = SledStore::open_temporary().expect("temp db");
    run_lifecycle(&Registry::new(store));
}

#[test]
fn records_persist_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let reg = Registry::new(SledStore::open(dir.path()).expect("open"));
        let ctx = CallContext::new("alice", 1);
        reg.register_asset(&ctx, "a1", details("Boat", false), 10)
            .unwrap();
        reg.set_threshold(&ctx, "a1", "low", "lt", 20, None).unwrap();
        reg.authorize_viewer(&ctx, "bob", None).unwrap();
        reg.store().flush().unwrap();
    }

    let reg = Registry::new(SledStore::open(dir.path()).expect("reopen"));
    let bob = CallContext::new("bob", 2);
    assert_eq!(reg.get_asset(&bob, "alice", "a1").unwrap().name, "Boat");
    assert_eq!(reg.evaluate(&bob, "alice", "a1").unwrap(), ids(&["low"]));
}

// ---------------------------------------------------------------------------
// Delegated access over time
// ---------------------------------------------------------------------------

#[test]
fn grant_window_tracks_the_clock() {
    let reg = Registry::in_memory();
    let clock = LogicalClock::new(100);

    let alice = CallContext::at("alice", &clock);
    reg.register_asset(&alice, "a1", details("Plane", false), 1_000_000)
        .unwrap();
    reg.authorize_viewer(&alice, "auditor", Some(103)).unwrap();

    let mut seen = Vec::new();
    for _ in 0..5 {
        let auditor = CallContext::at("auditor", &clock);
        seen.push((clock.now(), reg.get_asset(&auditor, "alice", "a1").is_ok()));
        clock.advance();
    }
    assert_eq!(
        seen,
        vec![(100, true), (101, true), (102, true), (103, false), (104, false)]
    );
}

#[test]
fn grants_never_allow_writes() {
    let reg = Registry::in_memory();
    let alice = CallContext::new("alice", 1);
    reg.register_asset(&alice, "a1", details("Car", false), 100)
        .unwrap();
    reg.authorize_viewer(&alice, "bob", None).unwrap();

    let bob = CallContext::new("bob", 2);
    assert!(reg.update_value(&bob, "a1", 0).is_err());
    assert!(reg.delete_asset(&bob, "a1").is_err());
    assert!(reg.delete_threshold(&bob, "a1", "t1").is_err());

    let asset = reg.get_asset(&bob, "alice", "a1").unwrap();
    assert_eq!(asset.current_value, 100);
}

#[test]
fn public_asset_does_not_expose_siblings() {
    let reg = Registry::in_memory();
    let alice = CallContext::new("alice", 1);
    reg.register_asset(&alice, "shown", details("Shown", true), 1)
        .unwrap();
    reg.register_asset(&alice, "hidden", details("Hidden", false), 2)
        .unwrap();
    reg.set_threshold(&alice, "shown", "t", "gt", 0, None).unwrap();

    let anyone = CallContext::new("anyone", 2);
    assert!(reg.history(&anyone, "alice", "shown").is_ok());
    assert_eq!(reg.evaluate(&anyone, "alice", "shown").unwrap(), ids(&["t"]));
    assert!(matches!(
        reg.history(&anyone, "alice", "hidden"),
        Err(RegistryError::NotAuthorized(_))
    ));
    assert!(matches!(
        reg.get_vault(&anyone, "alice"),
        Err(RegistryError::NotAuthorized(_))
    ));
}

#[test]
fn deleted_public_asset_history_hidden_from_strangers() {
    let reg = Registry::in_memory();
    let alice = CallContext::new("alice", 1);
    reg.register_asset(&alice, "a1", details("Shown", true), 1)
        .unwrap();
    reg.delete_asset(&CallContext::new("alice", 2), "a1").unwrap();

    let anyone = CallContext::new("anyone", 3);
    assert!(matches!(
        reg.history(&anyone, "alice", "a1"),
        Err(RegistryError::NotAuthorized(_))
    ));
    assert_eq!(
        reg.history(&CallContext::new("alice", 3), "alice", "a1")
            .unwrap()
            .len(),
        1
    );
}

// ---------------------------------------------------------------------------
// History accounting
// ---------------------------------------------------------------------------

#[test]
fn history_counts_every_value_setting_call() {
    let reg = Registry::in_memory();
    // A coarse clock: several writes share one timestamp.
    let ctx = CallContext::new("alice", 7);
    reg.register_asset(&ctx, "a1", details("Coin", false), 10)
        .unwrap();
    for value in [10, 20, 20, 30] {
        reg.update_value(&ctx, "a1", value).unwrap();
    }
    reg.update_details(&ctx, "a1", details("Rare coin", false))
        .unwrap();

    let history = reg.history(&ctx, "alice", "a1").unwrap();
    assert_eq!(history.len(), 5);
    let values: Vec<u64> = history.iter().map(|e| e.value).collect();
    assert_eq!(values, vec![10, 10, 20, 20, 30]);
    let sequences: Vec<u32> = history.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    assert_eq!(reg.value_at(&ctx, "alice", "a1", 7).unwrap(), Some(30));
}

#[test]
fn failed_operations_leave_no_trace() {
    let reg = Registry::in_memory();
    let ctx = CallContext::new("alice", 1);
    assert!(reg.update_value(&ctx, "a1", 1).is_err());
    assert!(reg.set_threshold(&ctx, "a1", "t1", "gt", 1, None).is_err());
    assert!(reg.delete_category(&ctx, "c1").is_err());
    assert!(reg.authorize_viewer(&ctx, "bob", Some(1)).is_err());
    assert!(reg.store().is_empty());
}
