mod common;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use common::*;
use ledger_view::core::{
    AttachmentData, DataId, FieldData, FieldType, FieldValueData, Kind, RefType, ScheduledData,
    Search,
};
use ledger_view::store::memory::Op;
use ledger_view::store::{Backend, MemoryStore};
use ledger_view::view_model::{
    FieldChoice, GroupEntry, LoadState, ScheduledChoice, ValidationError,
};

const POWER: DataId = DataId::new(1);
const GROCERIES: DataId = DataId::new(2);
const RECEIPT_NO: DataId = DataId::new(1);
const MILEAGE: DataId = DataId::new(2);

fn day(month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2024, month, day)
}

/// The common ledger plus two fields and two scheduled transactions, the
/// second one due first.
fn scheduled() -> Arc<MemoryStore> {
    let store = ledger();
    for (description, ref_type, kind) in [
        ("Receipt no.", RefType::Transaction, FieldType::String),
        ("Mileage", RefType::Scheduled, FieldType::Decimal),
    ] {
        let mut field = FieldData {
            description: description.into(),
            ref_type,
            kind,
            ..FieldData::default()
        };
        store.fields().insert(&mut field).unwrap();
    }
    let mut power = ScheduledData {
        account_id: CHECKING,
        payee_id: CITY_POWER,
        category_id: ELECTRICITY,
        amount: 82.5,
        notes: "Power bill".into(),
        date: day(5, 1),
        repeat_num: 1,
        ..ScheduledData::default()
    };
    store.scheduled().insert(&mut power).unwrap();
    let mut groceries = ScheduledData {
        account_id: TRAVEL,
        payee_id: GROCER,
        category_id: FOOD,
        number: "T-7".into(),
        notes: "Trip groceries".into(),
        date: day(4, 15),
        field_value: vec![FieldValueData {
            field_id: MILEAGE,
            content: "120".into(),
        }],
        ..ScheduledData::default()
    };
    store.scheduled().insert(&mut groceries).unwrap();
    store.clear_journal();
    store
}

fn shown(groups: &[GroupEntry]) -> Vec<(&str, Vec<DataId>)> {
    groups
        .iter()
        .filter(|g| g.is_visible)
        .map(|g| (g.name.as_deref().unwrap_or(""), g.data_id.clone()))
        .collect()
}

#[tokio::test]
async fn scheduled_list_follows_due_dates() {
    let store = scheduled();
    let mut vm = view_model(&store);
    vm.load_scheduled_list().await;

    assert_eq!(vm.scheduled_list().state(), LoadState::Ready);
    assert_eq!(
        vm.scheduled_list().order().ready_value(),
        Some(&vec![GROCERIES, POWER])
    );
    assert_eq!(vm.account_list().name().state(), LoadState::Ready);
    assert_eq!(vm.account_list().state(), LoadState::Idle);
}

#[tokio::test]
async fn account_rename_regroups_scheduled_by_account() {
    let store = scheduled();
    let mut vm = view_model(&store);
    vm.load_scheduled_list().await;
    vm.load_scheduled_group(ScheduledChoice::Account);
    assert_eq!(
        shown(vm.scheduled_group().value()),
        vec![("Checking", vec![POWER]), ("Travel", vec![GROCERIES])]
    );

    vm.load_account_list().await;
    let old = vm.account_list().data().value()[&TRAVEL].clone();
    let mut new = old.clone();
    new.name = "Abroad".into();
    vm.update_account(&mut new).unwrap();
    vm.reload_account(Some(&old), Some(&new)).await;

    assert_eq!(vm.scheduled_group().state(), LoadState::Idle);
    vm.load_scheduled_group(ScheduledChoice::Account);
    assert_eq!(
        shown(vm.scheduled_group().value()),
        vec![("Abroad", vec![GROCERIES]), ("Checking", vec![POWER])]
    );
}

#[tokio::test]
async fn last_occurrences_group_apart_and_payees_are_searched() {
    let store = scheduled();
    let mut vm = view_model(&store);
    vm.load_scheduled_list().await;
    vm.load_scheduled_group(ScheduledChoice::Last);
    assert_eq!(
        shown(vm.scheduled_group().value()),
        vec![("Last", vec![POWER]), ("Other", vec![GROCERIES])]
    );

    vm.search_scheduled_group(&Search::new("grocer"), false);
    assert_eq!(
        shown(vm.scheduled_group().value()),
        vec![("Other", vec![GROCERIES])]
    );
}

#[tokio::test]
async fn scheduled_attachments_follow_their_owner() {
    let store = scheduled();
    let mut vm = view_model(&store);
    vm.load_scheduled_list().await;
    vm.load_scheduled_group(ScheduledChoice::Attachment);

    let mut invoice = AttachmentData {
        ref_type: RefType::Scheduled,
        ref_id: POWER,
        filename: "invoice.pdf".into(),
        ..AttachmentData::default()
    };
    vm.update_attachment(&mut invoice).unwrap();
    vm.reload_attachment(None, Some(&invoice)).await;
    assert_eq!(vm.scheduled_list().att().state(), LoadState::Idle);
    assert_eq!(vm.scheduled_group().state(), LoadState::Idle);

    vm.load_scheduled_list().await;
    vm.load_scheduled_group(ScheduledChoice::Attachment);
    assert_eq!(vm.scheduled_group().value()[0].data_id, vec![POWER]);

    let power = vm.scheduled_list().data().value()[&POWER].clone();
    assert_eq!(vm.delete_scheduled(&power), Ok(()));
    assert_eq!(store.attachments().count(), Ok(0));
    vm.reload_scheduled(Some(&power), None).await;
    assert_eq!(
        vm.scheduled_list().order().ready_value(),
        Some(&vec![GROCERIES])
    );
}

#[tokio::test]
async fn field_values_mark_fields_used() {
    let store = scheduled();
    let mut vm = view_model(&store);
    vm.load_field_list().await;
    assert_eq!(
        vm.field_list().used().ready_value(),
        Some(&HashSet::from([MILEAGE]))
    );

    let old = power_bill();
    let mut new = old.clone();
    new.field_value = vec![FieldValueData {
        field_id: RECEIPT_NO,
        content: "A-1".into(),
    }];
    vm.update_transaction(&mut new).unwrap();
    vm.reload_transaction(Some(&old), Some(&new));

    assert_eq!(vm.field_list().state(), LoadState::Ready);
    assert_eq!(
        vm.field_list().used().ready_value(),
        Some(&HashSet::from([RECEIPT_NO, MILEAGE]))
    );
    assert_eq!(store.calls(Kind::Field, Op::SelectUsed), 1);

    let receipt = vm.field_list().data().value()[&RECEIPT_NO].clone();
    assert_eq!(
        vm.delete_field(&receipt),
        Err(ValidationError::Invalid("Field Receipt no. is used".into()))
    );

    vm.load_field_group(FieldChoice::RefType);
    assert_eq!(
        shown(vm.field_group().value()),
        vec![("Transaction", vec![RECEIPT_NO]), ("Scheduled", vec![MILEAGE])]
    );
}

#[tokio::test]
async fn fields_belong_to_transactions() {
    let store = scheduled();
    let vm = view_model(&store);
    let mut field = FieldData {
        description: "Colour".into(),
        ref_type: RefType::Account,
        ..FieldData::default()
    };
    assert_eq!(
        vm.update_field(&mut field),
        Err(ValidationError::Invalid(
            "Fields cannot be defined for Account".into()
        ))
    );
    field.ref_type = RefType::Transaction;
    field.description = " ".into();
    assert_eq!(
        vm.update_field(&mut field),
        Err(ValidationError::Invalid("Description is empty".into()))
    );
    field.description = "Colour".into();
    assert_eq!(vm.update_field(&mut field), Ok(()));
    assert_eq!(field.id, DataId::new(3));
}
