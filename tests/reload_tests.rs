mod common;

use std::collections::HashSet;

use common::*;
use ledger_view::core::{
    AttachmentData, DataId, InfoKey, Kind, PayeeData, Record, RefType, TagData, TransactionData,
};
use ledger_view::store::Backend;
use ledger_view::store::memory::Op;
use ledger_view::view_model::{
    AccountChoice, LoadState, Notice, PayeeChoice, TagChoice, ViewModel,
};

/// Writes `old` with a new tag list and reloads.
fn retag(vm: &mut ViewModel, old: &TransactionData, tags: &[DataId]) -> TransactionData {
    let mut new = old.clone();
    new.tag_id = tags.to_vec();
    vm.update_transaction(&mut new).unwrap();
    vm.reload_transaction(Some(old), Some(&new));
    new
}

#[tokio::test]
async fn added_reference_patches_used_set() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_tag_list().await;
    vm.load_tag_group(TagChoice::Used);
    let mut notices = vm.subscribe();

    retag(&mut vm, &power_bill(), &[MONTHLY, HOLIDAY]);

    assert_eq!(vm.tag_list().state(), LoadState::Ready);
    assert_eq!(
        vm.tag_list().used().ready_value(),
        Some(&HashSet::from([MONTHLY, HOLIDAY]))
    );
    assert_eq!(store.calls(Kind::Tag, Op::SelectUsed), 1);
    // the Used grouping is stale
    assert_eq!(vm.tag_group().state(), LoadState::Idle);
    assert_eq!(
        notices.try_recv().ok(),
        Some(Notice::Group(Kind::Tag, LoadState::Idle))
    );
}

#[tokio::test]
async fn removed_reference_refetches_used_set() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_tag_list().await;

    retag(&mut vm, &power_bill(), &[HOLIDAY]);

    assert_eq!(vm.tag_list().state(), LoadState::Idle);
    assert_eq!(vm.tag_list().used().state(), LoadState::Idle);
    assert_eq!(vm.tag_list().data().state(), LoadState::Ready);

    vm.load_tag_list().await;
    assert_eq!(
        vm.tag_list().used().ready_value(),
        Some(&HashSet::from([HOLIDAY]))
    );
    assert_eq!(store.calls(Kind::Tag, Op::SelectUsed), 2);
    assert_eq!(store.calls(Kind::Tag, Op::SelectData), 1);
}

#[tokio::test]
async fn keyed_grouping_keeps_expansion_across_reload() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_account_list().await;
    vm.load_account_group(AccountChoice::Currency);
    let (_, groups) = vm.group(Kind::Account).unwrap();
    assert_eq!(groups[0].name.as_deref(), Some("Euro"));
    assert!(vm.toggle_expanded(Kind::Account, 0));

    let old = vm.account_list().data().value()[&TRAVEL].clone();
    let mut new = old.clone();
    new.notes = "cash for trips".into();
    vm.update_account(&mut new).unwrap();
    vm.reload_account(Some(&old), Some(&new)).await;

    let group = vm.account_group();
    assert_eq!(group.state(), LoadState::Ready);
    assert!(!group.value()[0].is_expanded);
    assert!(group.value()[1].is_expanded);
    assert_eq!(
        vm.account_list().data().value()[&TRAVEL].notes,
        "cash for trips"
    );
}

#[tokio::test]
async fn new_record_lands_in_its_group() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_account_list().await;
    vm.load_account_group(AccountChoice::Currency);

    let mut savings = vm.pref().new_account();
    savings.name = "Savings".into();
    savings.currency_id = USD;
    let mut record = Record::Account(savings);
    vm.update(&mut record).unwrap();
    vm.reload(None, Some(&record)).await;

    let (_, groups) = vm.group(Kind::Account).unwrap();
    let dollars = groups
        .iter()
        .find(|g| g.name.as_deref() == Some("US Dollar"))
        .unwrap();
    assert_eq!(dollars.data_id, vec![CHECKING, record.id()]);
    assert_eq!(vm.account_list().order().ready_value().unwrap().len(), 3);
}

#[tokio::test]
async fn currency_rename_invalidates_grouping_by_currency() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_account_list().await;
    vm.load_account_group(AccountChoice::Currency);
    vm.load_currency_list().await;

    let old = vm.currency_list().data().value()[&EUR].clone();
    let mut new = old.clone();
    new.name = "Euro Zone".into();
    vm.update_currency(&mut new).unwrap();
    vm.reload_currency(Some(&old), Some(&new)).await;

    assert_eq!(vm.account_group().state(), LoadState::Idle);
    vm.load_account_group(AccountChoice::Currency);
    let names: Vec<_> = vm.account_group().value().iter().map(|g| g.name.clone()).collect();
    assert_eq!(names, vec![Some("Euro Zone".to_string()), Some("US Dollar".to_string())]);
}

#[tokio::test]
async fn category_rename_refreshes_paths() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_payee_list().await;
    vm.load_payee_group(PayeeChoice::Category);
    vm.load_category_list().await;

    let old = vm.category_list().data().value()[&BILLS].clone();
    let mut new = old.clone();
    new.name = "Utilities".into();
    vm.update_category(&mut new).unwrap();
    vm.reload_category(Some(&old), Some(&new)).await;

    assert_eq!(vm.payee_group().state(), LoadState::Idle);
    assert_eq!(vm.category_list().state(), LoadState::Ready);
    let path = vm.category_path().ready_value().unwrap();
    assert_eq!(path[&ELECTRICITY], "Utilities:Electricity");

    vm.load_payee_group(PayeeChoice::Category);
    let names: Vec<_> = vm.payee_group().value().iter().map(|g| g.name.clone()).collect();
    assert!(names.contains(&Some("Utilities:Electricity".to_string())));
}

#[tokio::test]
async fn delimiter_change_reevaluates_paths() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_category_list().await;
    assert_eq!(
        vm.category_path().ready_value().unwrap()[&ELECTRICITY],
        "Bills:Electricity"
    );

    store.set_info(InfoKey::CategoryDelimiter, Some(" / ")).unwrap();
    vm.reload_info(InfoKey::CategoryDelimiter).await;

    assert_eq!(vm.info().ready_value().unwrap().category_delimiter.as_deref(), Some(" / "));
    assert_eq!(
        vm.category_path().ready_value().unwrap()[&ELECTRICITY],
        "Bills / Electricity"
    );
}

#[tokio::test]
async fn base_currency_change_refetches_used_currencies() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_currency_list().await;
    assert_eq!(
        vm.currency_list().used().ready_value(),
        Some(&HashSet::from([USD, EUR]))
    );

    store.set_info(InfoKey::BaseCurrencyId, Some("2")).unwrap();
    vm.reload_info(InfoKey::BaseCurrencyId).await;
    assert_eq!(vm.currency_list().used().state(), LoadState::Idle);
    vm.load_currency_list().await;
    assert_eq!(store.calls(Kind::Currency, Op::SelectUsed), 2);
}

#[tokio::test]
async fn attachment_invalidates_owner_map() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_account_list().await;
    vm.load_account_group(AccountChoice::Attachment);
    vm.load_attachment_list().await;

    let mut receipt = AttachmentData {
        ref_type: RefType::Account,
        ref_id: TRAVEL,
        filename: "booking.pdf".into(),
        ..AttachmentData::default()
    };
    vm.update_attachment(&mut receipt).unwrap();
    vm.reload_attachment(None, Some(&receipt)).await;

    assert_eq!(vm.account_list().att().state(), LoadState::Idle);
    assert_eq!(vm.account_group().state(), LoadState::Idle);
    assert_eq!(vm.attachment_list().state(), LoadState::Ready);
    assert_eq!(vm.attachment_list().order().ready_value(), Some(&vec![receipt.id]));

    vm.load_account_list().await;
    vm.load_account_group(AccountChoice::Attachment);
    let with_attachment = &vm.account_group().value()[0];
    assert_eq!(with_attachment.data_id, vec![TRAVEL]);
}

#[tokio::test]
async fn transaction_insert_invalidates_counts() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_manage().await;

    let mut bill = power_bill();
    bill.id = DataId::VOID;
    bill.tag_id.clear();
    let mut record = Record::Transaction(bill);
    vm.update(&mut record).unwrap();
    vm.reload(None, Some(&record)).await;

    assert_eq!(vm.manage_state(), LoadState::Idle);
    assert_eq!(vm.transaction_count().state(), LoadState::Idle);
    vm.load_manage().await;
    assert!(vm.counts().contains(&(Kind::Transaction, 2)));
}

#[tokio::test]
async fn reload_across_kinds_is_ignored() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_tag_list().await;
    let tag = vm.tag_list().data().value()[&MONTHLY].clone();
    let payee = PayeeData::default();
    vm.reload(Some(&Record::Tag(tag)), Some(&Record::Payee(payee)))
        .await;
    assert_eq!(vm.tag_list().state(), LoadState::Ready);
}

#[tokio::test]
async fn reload_leaves_unloaded_list_alone() {
    let store = ledger();
    let mut vm = view_model(&store);
    let mut tag = TagData {
        name: "weekend".into(),
        ..TagData::default()
    };
    vm.update_tag(&mut tag).unwrap();
    vm.reload_tag(None, Some(&tag)).await;

    assert_eq!(vm.tag_list().state(), LoadState::Idle);
    assert_eq!(store.calls(Kind::Tag, Op::SelectData), 0);
    assert_eq!(store.calls(Kind::Tag, Op::SelectOrder), 0);
}

#[tokio::test]
async fn owner_delete_refreshes_attachment_count() {
    let store = ledger();
    for filename in ["ticket.pdf", "visa.png"] {
        let mut att = AttachmentData {
            ref_type: RefType::Account,
            ref_id: TRAVEL,
            filename: filename.into(),
            ..AttachmentData::default()
        };
        store.attachments().insert(&mut att).unwrap();
    }
    let mut vm = view_model(&store);
    vm.load_account_list().await;
    vm.load_manage().await;
    assert!(vm.counts().contains(&(Kind::Attachment, 2)));

    let travel = vm.account_list().data().value()[&TRAVEL].clone();
    vm.delete_account(&travel).unwrap();
    vm.reload_account(Some(&travel), None).await;

    assert_eq!(vm.attachment_list().count().state(), LoadState::Idle);
    vm.load_manage().await;
    let counts = vm.counts();
    assert!(counts.contains(&(Kind::Attachment, 0)));
    assert!(counts.contains(&(Kind::Account, 1)));
}
