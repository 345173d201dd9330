mod common;

use std::path::PathBuf;

use common::*;
use ledger_view::core::{InfoKey, Kind, Record};
use ledger_view::store::{Backend, MemoryStore, StoreError, find_record};

fn snapshot_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ledger-view-{}-{name}.json", std::process::id()))
}

#[test]
fn snapshot_round_trips_tables_and_info() {
    let store = ledger();
    store.set_info(InfoKey::BaseCurrencyId, Some("1")).unwrap();
    let path = snapshot_path("round-trip");
    store.save(&path).unwrap();

    let reopened = MemoryStore::open(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(reopened.categories().count(), Ok(3));
    assert_eq!(
        reopened.info(InfoKey::BaseCurrencyId),
        Ok(Some("1".to_string()))
    );
    assert_eq!(
        reopened.transactions().select_data().unwrap()[&POWER_BILL],
        power_bill()
    );
    assert_eq!(reopened.journal(), Vec::new());
}

#[test]
fn missing_snapshot_opens_empty() {
    let store = MemoryStore::open(snapshot_path("missing")).unwrap();
    assert_eq!(store.accounts().count(), Ok(0));
}

#[test]
fn corrupt_snapshot_is_a_format_error() {
    let path = snapshot_path("corrupt");
    std::fs::write(&path, "{ not json").unwrap();
    let result = MemoryStore::open(&path);
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(result, Err(StoreError::Format(_))));
}

#[test]
fn records_are_found_by_kind_and_id() {
    let store = ledger();
    let found = find_record(store.as_ref(), Kind::Transaction, POWER_BILL).unwrap();
    assert_eq!(found, Some(Record::Transaction(power_bill())));
    let tag = find_record(store.as_ref(), Kind::Tag, HOLIDAY).unwrap();
    assert_eq!(tag.map(|r| r.id()), Some(HOLIDAY));
    assert_eq!(find_record(store.as_ref(), Kind::Budget, CHECKING), Ok(None));
}

#[test]
fn used_sets_follow_references() {
    let store = ledger();
    let used = store.categories().select_used().unwrap();
    assert!(used.contains(&ELECTRICITY));
    assert!(used.contains(&FOOD));
    assert!(!used.contains(&BILLS));
    assert_eq!(store.tags().select_used().unwrap().len(), 1);
    assert!(store.assets().select_used().unwrap().is_empty());
}
