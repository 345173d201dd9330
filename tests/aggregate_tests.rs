mod common;

use common::{CHECKING, ledger, view_model};
use ledger_view::core::{AttachmentData, Kind, RefType};
use ledger_view::store::memory::Op;
use ledger_view::store::Backend;
use ledger_view::view_model::{LoadState, Notice};

#[tokio::test]
async fn list_is_ready_only_when_every_member_is() {
    let store = ledger();
    store.fail(Kind::Attachment);
    let mut vm = view_model(&store);
    let mut notices = vm.subscribe();

    vm.load_account_list().await;
    let list = vm.account_list();
    assert_eq!(list.state(), LoadState::Error);
    assert_eq!(list.data().state(), LoadState::Ready);
    assert_eq!(list.used().state(), LoadState::Ready);
    assert_eq!(list.order().state(), LoadState::Ready);
    assert_eq!(list.att().state(), LoadState::Error);
    assert_eq!(
        notices.try_recv().ok(),
        Some(Notice::List(Kind::Account, LoadState::Error))
    );

    let data_calls = store.calls(Kind::Account, Op::SelectData);
    store.repair(Kind::Attachment);
    vm.load_account_list().await;
    assert_eq!(vm.account_list().state(), LoadState::Ready);
    assert_eq!(vm.account_list().att().state(), LoadState::Ready);
    // only the failed member is fetched again
    assert_eq!(store.calls(Kind::Account, Op::SelectData), data_calls);
}

#[tokio::test]
async fn ready_list_is_not_fetched_again() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_account_list().await;
    let calls = store.journal().len();
    vm.load_account_list().await;
    assert_eq!(store.journal().len(), calls);
    assert_eq!(vm.account_list().state(), LoadState::Ready);
}

#[tokio::test]
async fn account_list_prefetches_currency_names() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_account_list().await;
    let names = vm.currency_list().name().ready_value().unwrap();
    assert_eq!(names.len(), 2);
    assert_eq!(vm.currency_list().state(), LoadState::Idle);
}

#[tokio::test]
async fn attachments_are_keyed_by_owner() {
    let store = ledger();
    let mut receipt = AttachmentData {
        ref_type: RefType::Account,
        ref_id: CHECKING,
        filename: "statement.pdf".into(),
        ..AttachmentData::default()
    };
    store.attachments().insert(&mut receipt).unwrap();
    let mut vm = view_model(&store);
    vm.load_account_list().await;
    let att = vm.account_list().att().ready_value().unwrap();
    assert_eq!(att[&CHECKING], vec![receipt]);
    assert_eq!(att.len(), 1);
}

#[tokio::test]
async fn manage_counts_every_table() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_manage().await;
    assert_eq!(vm.manage_state(), LoadState::Ready);
    let counts = vm.counts();
    assert!(counts.contains(&(Kind::Category, 3)));
    assert!(counts.contains(&(Kind::Transaction, 1)));
    assert!(counts.contains(&(Kind::Attachment, 0)));

    vm.load_category_list().await;
    vm.unload_category_list();
    assert_eq!(vm.category_list().count().state(), LoadState::Ready);
    assert_eq!(vm.category_list().data().state(), LoadState::Idle);
    assert_eq!(vm.category_path().state(), LoadState::Idle);
}

#[tokio::test]
async fn unloaded_list_can_be_loaded_again() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_tag_list().await;
    vm.unload_tag_list();
    assert_eq!(vm.tag_list().state(), LoadState::Idle);
    vm.load_tag_list().await;
    assert_eq!(vm.tag_list().state(), LoadState::Ready);
    assert_eq!(store.calls(Kind::Tag, Op::SelectData), 2);
}
