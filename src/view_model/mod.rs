//! Cached, observable views over the ledger database.
//!
//! A [`ViewModel`] owns one [`ListAggregate`] per listed entity together with
//! its grouping. Loads fetch from the [`Backend`] concurrently; mutations go
//! through [`ViewModel::update`] and [`ViewModel::delete`] and are followed by
//! [`ViewModel::reload`], which patches or invalidates exactly the cached
//! values the change affects.

pub mod group;
pub mod list;
pub mod load;
pub mod reload;
pub mod validation;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::Preference;
use crate::core::{
    AccountData, AssetData, AttachmentData, BudgetData, BudgetPeriodData, CategoryData,
    CategoryTree, CurrencyData, DataId, FieldData, Kind, PayeeData, ReportData, ScheduledData,
    StockData, TagData,
};
use crate::store::Backend;

pub use group::{
    AccountChoice, AssetChoice, AttachmentChoice, BudgetChoice, BudgetPeriodChoice,
    CategoryChoice, CurrencyChoice, FieldChoice, GroupChoice, GroupEntry, GroupKey, GroupState,
    PayeeChoice, ReportChoice, ScheduledChoice, StockChoice, TagChoice,
};
pub use list::{AttachmentMap, Infotable, ListAggregate};
pub use load::{Load, LoadState};
pub use validation::ValidationError;

/// State change broadcast to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A list aggregate reached the given state.
    List(Kind, LoadState),
    /// A grouping reached the given state.
    Group(Kind, LoadState),
    Manage(LoadState),
    Info(LoadState),
    /// Every cached value was dropped.
    Unloaded,
}

const NOTICE_CAPACITY: usize = 64;

/// Cache of everything the list and edit screens display.
pub struct ViewModel {
    backend: Arc<dyn Backend>,
    pref: Preference,
    notice: broadcast::Sender<Notice>,

    pub(crate) info: Load<Infotable>,
    pub(crate) manage: LoadState,
    pub(crate) transaction_count: Load<usize>,

    pub(crate) currency_list: ListAggregate<CurrencyData>,
    pub(crate) account_list: ListAggregate<AccountData>,
    pub(crate) asset_list: ListAggregate<AssetData>,
    pub(crate) stock_list: ListAggregate<StockData>,
    pub(crate) category_list: ListAggregate<CategoryData>,
    pub(crate) payee_list: ListAggregate<PayeeData>,
    pub(crate) tag_list: ListAggregate<TagData>,
    pub(crate) field_list: ListAggregate<FieldData>,
    pub(crate) attachment_list: ListAggregate<AttachmentData>,
    pub(crate) budget_period_list: ListAggregate<BudgetPeriodData>,
    pub(crate) budget_list: ListAggregate<BudgetData>,
    pub(crate) report_list: ListAggregate<ReportData>,
    pub(crate) scheduled_list: ListAggregate<ScheduledData>,

    pub(crate) category_path: Load<HashMap<DataId, String>>,
    pub(crate) category_tree: Load<CategoryTree>,
    /// Budget ids by period, then by category tree position.
    pub(crate) budget_order: Load<Vec<DataId>>,

    pub(crate) currency_group: GroupState<CurrencyChoice>,
    pub(crate) account_group: GroupState<AccountChoice>,
    pub(crate) asset_group: GroupState<AssetChoice>,
    pub(crate) stock_group: GroupState<StockChoice>,
    pub(crate) category_group: GroupState<CategoryChoice>,
    pub(crate) payee_group: GroupState<PayeeChoice>,
    pub(crate) tag_group: GroupState<TagChoice>,
    pub(crate) field_group: GroupState<FieldChoice>,
    pub(crate) attachment_group: GroupState<AttachmentChoice>,
    pub(crate) budget_period_group: GroupState<BudgetPeriodChoice>,
    pub(crate) budget_group: GroupState<BudgetChoice>,
    pub(crate) report_group: GroupState<ReportChoice>,
    pub(crate) scheduled_group: GroupState<ScheduledChoice>,
}

impl ViewModel {
    pub fn new(backend: Arc<dyn Backend>, pref: Preference) -> Self {
        let (notice, _) = broadcast::channel(NOTICE_CAPACITY);
        Self::with_sender(backend, pref, notice)
    }

    fn with_sender(
        backend: Arc<dyn Backend>,
        pref: Preference,
        notice: broadcast::Sender<Notice>,
    ) -> Self {
        Self {
            backend,
            pref,
            notice,
            info: Load::fetched("Info", list::fetch_info),
            manage: LoadState::Idle,
            transaction_count: Load::fetched("Count(Transaction)", list::fetch_transaction_count),
            currency_list: ListAggregate::new(),
            account_list: ListAggregate::new(),
            asset_list: ListAggregate::new(),
            stock_list: ListAggregate::new(),
            category_list: ListAggregate::new(),
            payee_list: ListAggregate::new(),
            tag_list: ListAggregate::new(),
            field_list: ListAggregate::new(),
            attachment_list: ListAggregate::new(),
            budget_period_list: ListAggregate::new(),
            budget_list: ListAggregate::new(),
            report_list: ListAggregate::new(),
            scheduled_list: ListAggregate::new(),
            category_path: Load::evaluated("Path(Category)"),
            category_tree: Load::evaluated("Tree(Category)"),
            budget_order: Load::evaluated("EvalOrder(Budget)"),
            currency_group: GroupState::default(),
            account_group: GroupState::default(),
            asset_group: GroupState::default(),
            stock_group: GroupState::default(),
            category_group: GroupState::default(),
            payee_group: GroupState::default(),
            tag_group: GroupState::default(),
            field_group: GroupState::default(),
            attachment_group: GroupState::default(),
            budget_period_group: GroupState::default(),
            budget_group: GroupState::default(),
            report_group: GroupState::default(),
            scheduled_group: GroupState::default(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn pref(&self) -> &Preference {
        &self.pref
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notice.subscribe()
    }

    pub(crate) fn notify(&self, notice: Notice) {
        // no receivers is fine
        let _ = self.notice.send(notice);
    }

    /// Drops every cached value, including members left in `Loading` by an
    /// abandoned load. Group choices are kept.
    pub fn unload_all(&mut self) {
        let mut fresh =
            Self::with_sender(Arc::clone(&self.backend), self.pref.clone(), self.notice.clone());
        fresh.currency_group.choice = self.currency_group.choice;
        fresh.account_group.choice = self.account_group.choice;
        fresh.asset_group.choice = self.asset_group.choice;
        fresh.stock_group.choice = self.stock_group.choice;
        fresh.category_group.choice = self.category_group.choice;
        fresh.payee_group.choice = self.payee_group.choice;
        fresh.tag_group.choice = self.tag_group.choice;
        fresh.field_group.choice = self.field_group.choice;
        fresh.attachment_group.choice = self.attachment_group.choice;
        fresh.budget_period_group.choice = self.budget_period_group.choice;
        fresh.budget_group.choice = self.budget_group.choice;
        fresh.report_group.choice = self.report_group.choice;
        fresh.scheduled_group.choice = self.scheduled_group.choice;
        *self = fresh;
        info!("All views unloaded");
        self.notify(Notice::Unloaded);
    }

    pub fn info(&self) -> &Load<Infotable> {
        &self.info
    }

    pub fn manage_state(&self) -> LoadState {
        self.manage
    }

    pub fn transaction_count(&self) -> &Load<usize> {
        &self.transaction_count
    }

    pub fn currency_list(&self) -> &ListAggregate<CurrencyData> {
        &self.currency_list
    }

    pub fn account_list(&self) -> &ListAggregate<AccountData> {
        &self.account_list
    }

    pub fn asset_list(&self) -> &ListAggregate<AssetData> {
        &self.asset_list
    }

    pub fn stock_list(&self) -> &ListAggregate<StockData> {
        &self.stock_list
    }

    pub fn category_list(&self) -> &ListAggregate<CategoryData> {
        &self.category_list
    }

    pub fn payee_list(&self) -> &ListAggregate<PayeeData> {
        &self.payee_list
    }

    pub fn tag_list(&self) -> &ListAggregate<TagData> {
        &self.tag_list
    }

    pub fn field_list(&self) -> &ListAggregate<FieldData> {
        &self.field_list
    }

    pub fn attachment_list(&self) -> &ListAggregate<AttachmentData> {
        &self.attachment_list
    }

    pub fn budget_period_list(&self) -> &ListAggregate<BudgetPeriodData> {
        &self.budget_period_list
    }

    pub fn budget_list(&self) -> &ListAggregate<BudgetData> {
        &self.budget_list
    }

    pub fn report_list(&self) -> &ListAggregate<ReportData> {
        &self.report_list
    }

    pub fn scheduled_list(&self) -> &ListAggregate<ScheduledData> {
        &self.scheduled_list
    }

    /// Full path of every category, e.g. `Bills:Electricity`.
    pub fn category_path(&self) -> &Load<HashMap<DataId, String>> {
        &self.category_path
    }

    pub fn category_tree(&self) -> &Load<CategoryTree> {
        &self.category_tree
    }

    pub fn budget_order(&self) -> &Load<Vec<DataId>> {
        &self.budget_order
    }

    pub fn currency_group(&self) -> &GroupState<CurrencyChoice> {
        &self.currency_group
    }

    pub fn account_group(&self) -> &GroupState<AccountChoice> {
        &self.account_group
    }

    pub fn asset_group(&self) -> &GroupState<AssetChoice> {
        &self.asset_group
    }

    pub fn stock_group(&self) -> &GroupState<StockChoice> {
        &self.stock_group
    }

    pub fn category_group(&self) -> &GroupState<CategoryChoice> {
        &self.category_group
    }

    pub fn payee_group(&self) -> &GroupState<PayeeChoice> {
        &self.payee_group
    }

    pub fn tag_group(&self) -> &GroupState<TagChoice> {
        &self.tag_group
    }

    pub fn field_group(&self) -> &GroupState<FieldChoice> {
        &self.field_group
    }

    pub fn attachment_group(&self) -> &GroupState<AttachmentChoice> {
        &self.attachment_group
    }

    pub fn budget_period_group(&self) -> &GroupState<BudgetPeriodChoice> {
        &self.budget_period_group
    }

    pub fn budget_group(&self) -> &GroupState<BudgetChoice> {
        &self.budget_group
    }

    pub fn report_group(&self) -> &GroupState<ReportChoice> {
        &self.report_group
    }

    pub fn scheduled_group(&self) -> &GroupState<ScheduledChoice> {
        &self.scheduled_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn view_model() -> ViewModel {
        ViewModel::new(Arc::new(MemoryStore::new()), Preference::default())
    }

    #[tokio::test]
    async fn unload_all_keeps_group_choices() {
        let mut vm = view_model();
        vm.load_tag_list().await;
        vm.load_tag_group(TagChoice::Active);
        assert!(vm.tag_group().state().is_ready());

        let mut notices = vm.subscribe();
        vm.unload_all();
        assert_eq!(vm.tag_list().state(), LoadState::Idle);
        assert_eq!(vm.tag_group().state(), LoadState::Idle);
        assert_eq!(vm.tag_group().choice(), TagChoice::Active);
        assert_eq!(notices.try_recv().ok(), Some(Notice::Unloaded));
    }

    #[tokio::test]
    async fn unload_all_keeps_non_default_budget_choice() {
        let mut vm = view_model();
        vm.budget_group.choice = BudgetChoice::Active;
        vm.unload_all();
        assert_eq!(vm.budget_group().choice(), BudgetChoice::Active);
        assert_eq!(vm.budget_order().state(), LoadState::Idle);
    }

    #[tokio::test]
    async fn unload_all_resets_abandoned_loads() {
        let mut vm = view_model();
        vm.account_list.data.state.loading();
        vm.unload_all();
        assert_eq!(vm.account_list().data().state(), LoadState::Idle);
        vm.load_account_list().await;
        assert_eq!(vm.account_list().state(), LoadState::Ready);
    }

    #[tokio::test]
    async fn delimiter_falls_back_to_preference() {
        let mut vm = view_model();
        assert_eq!(vm.category_delimiter(), ":");
        vm.backend()
            .set_info(crate::core::InfoKey::CategoryDelimiter, Some("/"))
            .unwrap();
        vm.load_info().await;
        assert_eq!(vm.category_delimiter(), "/");
    }
}
