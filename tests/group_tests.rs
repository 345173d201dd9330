mod common;

use common::*;
use ledger_view::core::{AttachmentData, Kind, RefType, Search, SearchArea};
use ledger_view::store::Backend;
use ledger_view::view_model::{
    AccountChoice, CategoryChoice, GroupEntry, GroupKey, LoadState, PayeeChoice,
};

fn visible(groups: &[GroupEntry]) -> Vec<&str> {
    groups
        .iter()
        .filter(|g| g.is_visible)
        .filter_map(|g| g.name.as_deref())
        .collect()
}

#[tokio::test]
async fn every_ordered_record_lands_in_exactly_one_group() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_account_list().await;
    for choice in ["All", "Used", "Favorite", "Status", "Type", "Currency", "Attachment"] {
        vm.unload_group(Kind::Account);
        vm.load_group(Kind::Account, Some(choice)).unwrap();
        let (name, groups) = vm.group(Kind::Account).unwrap();
        assert_eq!(name, choice);
        let mut ids: Vec<_> = groups.iter().flat_map(|g| g.data_id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec![CHECKING, TRAVEL], "grouping by {choice}");
    }
}

#[tokio::test]
async fn used_grouping_expands_used_records() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_account_list().await;
    vm.load_account_group(AccountChoice::Used);
    let groups = vm.account_group().value();
    assert_eq!(groups[0].name.as_deref(), Some("Used"));
    assert_eq!(groups[0].data_id, vec![CHECKING]);
    assert!(groups[0].is_expanded);
    assert_eq!(groups[1].name.as_deref(), Some("Other"));
    assert_eq!(groups[1].data_id, vec![TRAVEL]);
    assert!(!groups[1].is_expanded);
}

#[tokio::test]
async fn type_grouping_hides_empty_types_until_searched() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_account_list().await;
    vm.load_account_group(AccountChoice::Type);
    assert_eq!(visible(vm.account_group().value()), vec!["Checking"]);

    vm.search_account_group(&Search::new("trav"), false);
    assert_eq!(visible(vm.account_group().value()), vec!["Checking"]);

    vm.search_account_group(&Search::new("nothing like this"), false);
    assert!(visible(vm.account_group().value()).is_empty());
}

#[tokio::test]
async fn search_reveals_and_expands_matching_groups() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_payee_list().await;
    vm.load_payee_group(PayeeChoice::Active);
    assert_eq!(visible(vm.payee_group().value()), vec!["Active", "Other"]);

    vm.search_payee_group(&Search::new("GROCER"), false);
    assert_eq!(visible(vm.payee_group().value()), vec!["Active"]);
    assert!(vm.payee_group().value()[0].is_expanded);

    // the category path is searched under Other
    let by_path = Search::new("electricity").with_areas([SearchArea::Other]);
    vm.search_payee_group(&by_path, false);
    assert_eq!(visible(vm.payee_group().value()), vec!["Active"]);
    let by_name = Search::new("electricity");
    vm.search_payee_group(&by_name, false);
    assert!(visible(vm.payee_group().value()).is_empty());

    vm.search_payee_group(&Search::default(), false);
    assert_eq!(visible(vm.payee_group().value()), vec!["Active", "Other"]);
}

#[tokio::test]
async fn attachment_text_is_searchable() {
    let store = ledger();
    let mut contract = AttachmentData {
        ref_type: RefType::Payee,
        ref_id: CITY_POWER,
        description: "Service contract".into(),
        filename: "contract.pdf".into(),
        ..AttachmentData::default()
    };
    store.attachments().insert(&mut contract).unwrap();
    let mut vm = view_model(&store);
    vm.load_payee_list().await;
    vm.load_payee_group(PayeeChoice::All);

    let search = Search::new("service").with_areas([SearchArea::Attachment]);
    vm.search_payee_group(&search, false);
    assert_eq!(visible(vm.payee_group().value()), vec!["All"]);

    vm.load_attachment_list().await;
    vm.load_group(Kind::Attachment, Some("ref type")).unwrap();
    let (_, groups) = vm.group(Kind::Attachment).unwrap();
    assert_eq!(visible(groups), vec!["Payee"]);
}

#[tokio::test]
async fn keyed_grouping_uses_category_paths() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_payee_list().await;
    vm.load_payee_group(PayeeChoice::Category);
    let names: Vec<_> = vm
        .payee_group()
        .value()
        .iter()
        .filter_map(|g| g.name.clone())
        .collect();
    assert_eq!(names, vec!["Bills:Electricity", "Food"]);
    assert_eq!(
        vm.payee_group().keys(),
        &[GroupKey::Id(ELECTRICITY), GroupKey::Id(FOOD)]
    );
}

#[tokio::test]
async fn categories_group_in_tree_order() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_category_list().await;
    vm.load_category_group(CategoryChoice::All);
    assert_eq!(
        vm.category_group().value()[0].data_id,
        vec![BILLS, ELECTRICITY, FOOD]
    );
}

#[tokio::test]
async fn grouping_waits_for_the_list() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_account_group(AccountChoice::All);
    assert_eq!(vm.account_group().state(), LoadState::Idle);
    assert!(vm.group(Kind::Account).is_none());
    assert!(vm.load_group(Kind::Account, Some("Colour")).is_err());
}

#[tokio::test]
async fn expand_flag_opens_visible_groups() {
    let store = ledger();
    let mut vm = view_model(&store);
    vm.load_account_list().await;
    vm.load_account_group(AccountChoice::Used);
    vm.search_account_group(&Search::default(), true);
    assert!(vm.account_group().value().iter().all(|g| g.is_expanded));
}
