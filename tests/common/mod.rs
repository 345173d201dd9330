#![allow(dead_code)]

use std::sync::Arc;

use ledger_view::config::Preference;
use ledger_view::core::{
    AccountData, CategoryData, CurrencyData, DataId, PayeeData, TagData, TransactionData,
};
use ledger_view::store::{Backend, MemoryStore};
use ledger_view::view_model::ViewModel;

// ids are assigned in insertion order, starting at 1 per table
pub const USD: DataId = DataId::new(1);
pub const EUR: DataId = DataId::new(2);
pub const CHECKING: DataId = DataId::new(1);
pub const TRAVEL: DataId = DataId::new(2);
pub const BILLS: DataId = DataId::new(1);
pub const ELECTRICITY: DataId = DataId::new(2);
pub const FOOD: DataId = DataId::new(3);
pub const CITY_POWER: DataId = DataId::new(1);
pub const GROCER: DataId = DataId::new(2);
pub const MONTHLY: DataId = DataId::new(1);
pub const HOLIDAY: DataId = DataId::new(2);
pub const POWER_BILL: DataId = DataId::new(1);

/// A small ledger: two currencies, two accounts, a two-level category
/// tree, two payees, two tags and one tagged transaction.
pub fn ledger() -> Arc<MemoryStore> {
    let store = MemoryStore::new();

    for (name, symbol) in [("US Dollar", "USD"), ("Euro", "EUR")] {
        let mut currency = CurrencyData {
            name: name.into(),
            symbol: symbol.into(),
            ..CurrencyData::default()
        };
        store.currencies().insert(&mut currency).unwrap();
    }
    for (name, currency_id) in [("Checking", USD), ("Travel", EUR)] {
        let mut account = AccountData {
            name: name.into(),
            currency_id,
            ..AccountData::default()
        };
        store.accounts().insert(&mut account).unwrap();
    }
    for (name, parent_id) in [("Bills", DataId::VOID), ("Electricity", BILLS), ("Food", DataId::VOID)] {
        let mut category = CategoryData {
            name: name.into(),
            parent_id,
            ..CategoryData::default()
        };
        store.categories().insert(&mut category).unwrap();
    }
    for (name, category_id) in [("City Power", ELECTRICITY), ("Corner Grocer", FOOD)] {
        let mut payee = PayeeData {
            name: name.into(),
            category_id,
            ..PayeeData::default()
        };
        store.payees().insert(&mut payee).unwrap();
    }
    for name in ["monthly", "holiday"] {
        let mut tag = TagData {
            name: name.into(),
            ..TagData::default()
        };
        store.tags().insert(&mut tag).unwrap();
    }
    let mut bill = power_bill();
    bill.id = DataId::VOID;
    store.transactions().insert(&mut bill).unwrap();

    store.clear_journal();
    Arc::new(store)
}

/// The transaction stored by [`ledger`].
pub fn power_bill() -> TransactionData {
    TransactionData {
        id: POWER_BILL,
        account_id: CHECKING,
        payee_id: CITY_POWER,
        category_id: ELECTRICITY,
        tag_id: vec![MONTHLY],
        amount: 82.5,
        notes: "March power bill".into(),
        ..TransactionData::default()
    }
}

pub fn view_model(store: &Arc<MemoryStore>) -> ViewModel {
    ViewModel::new(store.clone(), Preference::default())
}
