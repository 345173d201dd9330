//! Per-entity aggregates of loads and their coordinated loading.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use super::load::{Fanout, Load, LoadState};
use super::{Notice, ViewModel};
use crate::core::{AttachmentData, DataId, InfoKey, Kind, eval_path, eval_tree};
use crate::store::{Backend, StoreError, Table};

/// Attachments keyed by owner id.
pub type AttachmentMap = HashMap<DataId, Vec<AttachmentData>>;

/// Cached queries of one entity, loaded and unloaded together.
#[derive(Debug, Clone)]
pub struct ListAggregate<D> {
    pub(crate) state: LoadState,
    pub(crate) count: Load<usize>,
    pub(crate) data: Load<HashMap<DataId, D>>,
    pub(crate) name: Load<HashMap<DataId, String>>,
    pub(crate) used: Load<HashSet<DataId>>,
    pub(crate) order: Load<Vec<DataId>>,
    pub(crate) att: Load<AttachmentMap>,
}

impl<D: Table> Default for ListAggregate<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Table> ListAggregate<D> {
    pub fn new() -> Self {
        let kind = D::KIND;
        Self {
            state: LoadState::Idle,
            count: Load::fetched(format!("Count({kind})"), fetch_count::<D>),
            data: Load::fetched(format!("Data({kind})"), fetch_data::<D>),
            name: Load::fetched(format!("Name({kind})"), fetch_name::<D>),
            used: Load::fetched(format!("Used({kind})"), fetch_used::<D>),
            order: Load::fetched(format!("Order({kind})"), fetch_order::<D>),
            att: Load::fetched(format!("Att({kind})"), fetch_att::<D>),
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn count(&self) -> &Load<usize> {
        &self.count
    }

    pub fn data(&self) -> &Load<HashMap<DataId, D>> {
        &self.data
    }

    pub fn name(&self) -> &Load<HashMap<DataId, String>> {
        &self.name
    }

    pub fn used(&self) -> &Load<HashSet<DataId>> {
        &self.used
    }

    pub fn order(&self) -> &Load<Vec<DataId>> {
        &self.order
    }

    pub fn att(&self) -> &Load<AttachmentMap> {
        &self.att
    }

    /// Clears every member except the count.
    pub(crate) fn unload(&mut self) -> bool {
        if !self.state.unloading() {
            return false;
        }
        self.data.unload();
        self.name.unload();
        self.used.unload();
        self.order.unload();
        self.att.unload();
        self.state.unloaded();
        true
    }

    /// Applies a single-record change to the members that can be derived
    /// from it and invalidates the rest.
    pub(crate) fn patch_record(&mut self, old: Option<&D>, new: Option<&D>) {
        self.state.unload();

        if old.is_some() != new.is_some() {
            self.count.unload();
        }

        self.data.patch(|data| match (old, new) {
            (_, Some(new)) => {
                data.insert(new.id(), new.clone());
            }
            (Some(old), None) => {
                data.remove(&old.id());
            }
            (None, None) => {}
        });

        if self.name.state().is_ready() {
            self.name.patch(|name| match (old, new) {
                (_, Some(new)) => {
                    name.insert(new.id(), new.name().to_string());
                }
                (Some(old), None) => {
                    name.remove(&old.id());
                }
                (None, None) => {}
            });
        }

        self.order.unload();

        match (old, new) {
            (None, Some(_)) => {
                self.att.unload();
            }
            (Some(old), None) if self.att.state().is_ready() => {
                self.att.patch(|att| {
                    att.remove(&old.id());
                });
            }
            _ => {}
        }
    }
}

fn fetch_data<D: Table>(backend: &dyn Backend) -> Result<HashMap<DataId, D>, StoreError> {
    D::repository(backend).select_data()
}

fn fetch_name<D: Table>(backend: &dyn Backend) -> Result<HashMap<DataId, String>, StoreError> {
    D::repository(backend).select_name()
}

fn fetch_used<D: Table>(backend: &dyn Backend) -> Result<HashSet<DataId>, StoreError> {
    D::repository(backend).select_used()
}

fn fetch_order<D: Table>(backend: &dyn Backend) -> Result<Vec<DataId>, StoreError> {
    D::repository(backend).select_order()
}

fn fetch_count<D: Table>(backend: &dyn Backend) -> Result<usize, StoreError> {
    D::repository(backend).count()
}

fn fetch_att<D: Table>(backend: &dyn Backend) -> Result<AttachmentMap, StoreError> {
    match D::REF_TYPE {
        Some(ref_type) => backend.attachment_map(ref_type),
        None => Ok(AttachmentMap::new()),
    }
}

/// Values of the settings table the engine depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Infotable {
    pub base_currency_id: DataId,
    pub default_account_id: DataId,
    pub category_delimiter: Option<String>,
}

pub(crate) fn fetch_info(backend: &dyn Backend) -> Result<Infotable, StoreError> {
    let id = |key| -> Result<DataId, StoreError> {
        Ok(backend
            .info(key)?
            .and_then(|v| v.parse::<DataId>().ok())
            .unwrap_or_default())
    };
    Ok(Infotable {
        base_currency_id: id(InfoKey::BaseCurrencyId)?,
        default_account_id: id(InfoKey::DefaultAccountId)?,
        category_delimiter: backend
            .info(InfoKey::CategoryDelimiter)?
            .filter(|d| !d.is_empty()),
    })
}

pub(crate) fn fetch_transaction_count(backend: &dyn Backend) -> Result<usize, StoreError> {
    backend.transactions().count()
}

impl ViewModel {
    fn list_loaded(&self, kind: Kind, state: LoadState) {
        match state {
            LoadState::Ready => info!(%kind, "List ready"),
            _ => warn!(%kind, "List failed to load"),
        }
        self.notify(Notice::List(kind, state));
    }

    fn list_unloaded(&self, kind: Kind) {
        debug!(%kind, "List unloaded");
        self.notify(Notice::List(kind, LoadState::Idle));
    }

    /// Delimiter for category paths, the stored one taking precedence over
    /// the preference.
    pub fn category_delimiter(&self) -> String {
        self.info
            .ready_value()
            .and_then(|info| info.category_delimiter.clone())
            .unwrap_or_else(|| self.pref.category_delimiter.clone())
    }

    pub async fn load_info(&mut self) {
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.info);
        fanout.finish().await;
        self.notify(Notice::Info(self.info.state()));
    }

    pub fn unload_info(&mut self) {
        if self.info.unload() {
            self.notify(Notice::Info(LoadState::Idle));
        }
    }

    /// Computes category paths and the category tree from ready category
    /// data and order.
    pub(crate) fn evaluate_category(&mut self) -> bool {
        let delimiter = self.category_delimiter();
        let data = self.category_list.data.ready_value();
        let order = self.category_list.order.ready_value();
        let path_ok = self
            .category_path
            .evaluate(|| data.map(|data| eval_path(data, &delimiter)));
        let tree_ok = self
            .category_tree
            .evaluate(|| Some(eval_tree(data?, order?)));
        path_ok && tree_ok
    }

    pub async fn load_currency_list(&mut self) {
        if !self.currency_list.state.retrying() {
            return;
        }
        debug!(kind = %Kind::Currency, "Loading list");
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.currency_list.data);
        fanout.load(&mut self.currency_list.name);
        fanout.load(&mut self.currency_list.used);
        fanout.load(&mut self.currency_list.order);
        fanout.load(&mut self.info);
        let ok = fanout.finish().await;
        self.currency_list.state.loaded(ok);
        self.list_loaded(Kind::Currency, self.currency_list.state);
    }

    pub fn unload_currency_list(&mut self) {
        self.currency_group.unload();
        if self.currency_list.unload() {
            self.list_unloaded(Kind::Currency);
        }
    }

    pub async fn load_account_list(&mut self) {
        if !self.account_list.state.retrying() {
            return;
        }
        debug!(kind = %Kind::Account, "Loading list");
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.account_list.data);
        fanout.load(&mut self.account_list.name);
        fanout.load(&mut self.account_list.used);
        fanout.load(&mut self.account_list.order);
        fanout.load(&mut self.account_list.att);
        // used when editing
        fanout.load(&mut self.currency_list.name);
        fanout.load(&mut self.currency_list.order);
        let ok = fanout.finish().await;
        self.account_list.state.loaded(ok);
        self.list_loaded(Kind::Account, self.account_list.state);
    }

    pub fn unload_account_list(&mut self) {
        self.account_group.unload();
        if self.account_list.unload() {
            self.list_unloaded(Kind::Account);
        }
    }

    pub async fn load_asset_list(&mut self) {
        if !self.asset_list.state.retrying() {
            return;
        }
        debug!(kind = %Kind::Asset, "Loading list");
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.asset_list.data);
        fanout.load(&mut self.asset_list.used);
        fanout.load(&mut self.asset_list.order);
        fanout.load(&mut self.asset_list.att);
        fanout.load(&mut self.currency_list.name);
        fanout.load(&mut self.currency_list.order);
        let ok = fanout.finish().await;
        self.asset_list.state.loaded(ok);
        self.list_loaded(Kind::Asset, self.asset_list.state);
    }

    pub fn unload_asset_list(&mut self) {
        self.asset_group.unload();
        if self.asset_list.unload() {
            self.list_unloaded(Kind::Asset);
        }
    }

    pub async fn load_stock_list(&mut self) {
        if !self.stock_list.state.retrying() {
            return;
        }
        debug!(kind = %Kind::Stock, "Loading list");
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.stock_list.data);
        fanout.load(&mut self.stock_list.used);
        fanout.load(&mut self.stock_list.order);
        fanout.load(&mut self.stock_list.att);
        fanout.load(&mut self.account_list.name);
        fanout.load(&mut self.account_list.order);
        let ok = fanout.finish().await;
        self.stock_list.state.loaded(ok);
        self.list_loaded(Kind::Stock, self.stock_list.state);
    }

    pub fn unload_stock_list(&mut self) {
        self.stock_group.unload();
        if self.stock_list.unload() {
            self.list_unloaded(Kind::Stock);
        }
    }

    pub async fn load_category_list(&mut self) {
        if !self.category_list.state.retrying() {
            return;
        }
        debug!(kind = %Kind::Category, "Loading list");
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.category_list.data);
        fanout.load(&mut self.category_list.used);
        fanout.load(&mut self.category_list.order);
        fanout.load(&mut self.info);
        let mut ok = fanout.finish().await;
        if ok {
            ok = self.evaluate_category();
        }
        self.category_list.state.loaded(ok);
        self.list_loaded(Kind::Category, self.category_list.state);
    }

    pub fn unload_category_list(&mut self) {
        self.category_group.unload();
        if self.category_list.unload() {
            self.category_path.unload();
            self.category_tree.unload();
            self.list_unloaded(Kind::Category);
        }
    }

    pub async fn load_payee_list(&mut self) {
        if !self.payee_list.state.retrying() {
            return;
        }
        debug!(kind = %Kind::Payee, "Loading list");
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.payee_list.data);
        fanout.load(&mut self.payee_list.used);
        fanout.load(&mut self.payee_list.order);
        fanout.load(&mut self.payee_list.att);
        // category paths are shown and searched next to payees
        fanout.load(&mut self.category_list.data);
        fanout.load(&mut self.category_list.order);
        fanout.load(&mut self.info);
        let mut ok = fanout.finish().await;
        if ok {
            ok = self.evaluate_category();
        }
        self.payee_list.state.loaded(ok);
        self.list_loaded(Kind::Payee, self.payee_list.state);
    }

    pub fn unload_payee_list(&mut self) {
        self.payee_group.unload();
        if self.payee_list.unload() {
            self.list_unloaded(Kind::Payee);
        }
    }

    pub async fn load_tag_list(&mut self) {
        if !self.tag_list.state.retrying() {
            return;
        }
        debug!(kind = %Kind::Tag, "Loading list");
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.tag_list.data);
        fanout.load(&mut self.tag_list.used);
        fanout.load(&mut self.tag_list.order);
        let ok = fanout.finish().await;
        self.tag_list.state.loaded(ok);
        self.list_loaded(Kind::Tag, self.tag_list.state);
    }

    pub fn unload_tag_list(&mut self) {
        self.tag_group.unload();
        if self.tag_list.unload() {
            self.list_unloaded(Kind::Tag);
        }
    }

    pub async fn load_attachment_list(&mut self) {
        if !self.attachment_list.state.retrying() {
            return;
        }
        debug!(kind = %Kind::Attachment, "Loading list");
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.attachment_list.data);
        fanout.load(&mut self.attachment_list.order);
        let ok = fanout.finish().await;
        self.attachment_list.state.loaded(ok);
        self.list_loaded(Kind::Attachment, self.attachment_list.state);
    }

    pub fn unload_attachment_list(&mut self) {
        self.attachment_group.unload();
        if self.attachment_list.unload() {
            self.list_unloaded(Kind::Attachment);
        }
    }

    pub async fn load_field_list(&mut self) {
        if !self.field_list.state.retrying() {
            return;
        }
        debug!(kind = %Kind::Field, "Loading list");
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.field_list.data);
        fanout.load(&mut self.field_list.used);
        fanout.load(&mut self.field_list.order);
        let ok = fanout.finish().await;
        self.field_list.state.loaded(ok);
        self.list_loaded(Kind::Field, self.field_list.state);
    }

    pub fn unload_field_list(&mut self) {
        self.field_group.unload();
        if self.field_list.unload() {
            self.list_unloaded(Kind::Field);
        }
    }

    pub async fn load_budget_period_list(&mut self) {
        if !self.budget_period_list.state.retrying() {
            return;
        }
        debug!(kind = %Kind::BudgetPeriod, "Loading list");
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.budget_period_list.data);
        fanout.load(&mut self.budget_period_list.used);
        fanout.load(&mut self.budget_period_list.order);
        let ok = fanout.finish().await;
        self.budget_period_list.state.loaded(ok);
        self.list_loaded(Kind::BudgetPeriod, self.budget_period_list.state);
    }

    pub fn unload_budget_period_list(&mut self) {
        self.budget_period_group.unload();
        if self.budget_period_list.unload() {
            self.list_unloaded(Kind::BudgetPeriod);
        }
    }

    /// Sorts budgets by the position of their period in the period order,
    /// then by the position of their category in the category tree.
    /// Unknown periods and categories sort first.
    pub(crate) fn evaluate_budget_order(&mut self) -> bool {
        let data = self.budget_list.data.ready_value();
        let order = self.budget_list.order.ready_value();
        let period_order = self.budget_period_list.order.ready_value();
        let tree = self.category_tree.ready_value();
        self.budget_order.evaluate(|| {
            let (data, order, period_order, tree) = (data?, order?, period_order?, tree?);
            let period_index: HashMap<DataId, usize> =
                period_order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
            let mut sorted = order.clone();
            sorted.sort_by_key(|id| {
                data.get(id).map(|d| {
                    (
                        period_index.get(&d.period_id).copied(),
                        tree.index.get(&d.category_id).copied(),
                    )
                })
            });
            Some(sorted)
        })
    }

    pub async fn load_budget_list(&mut self) {
        if !self.budget_list.state.retrying() {
            return;
        }
        debug!(kind = %Kind::Budget, "Loading list");
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.budget_list.data);
        fanout.load(&mut self.budget_list.used);
        fanout.load(&mut self.budget_list.order);
        fanout.load(&mut self.info);
        // periods and categories decide the budget order
        fanout.load(&mut self.budget_period_list.data);
        fanout.load(&mut self.budget_period_list.name);
        fanout.load(&mut self.budget_period_list.order);
        fanout.load(&mut self.category_list.data);
        fanout.load(&mut self.category_list.order);
        let mut ok = fanout.finish().await;
        if ok {
            ok = self.evaluate_category();
        }
        if ok {
            ok = self.evaluate_budget_order();
        }
        self.budget_list.state.loaded(ok);
        self.list_loaded(Kind::Budget, self.budget_list.state);
    }

    pub fn unload_budget_list(&mut self) {
        self.budget_group.unload();
        if self.budget_list.unload() {
            self.budget_order.unload();
            self.list_unloaded(Kind::Budget);
        }
    }

    pub async fn load_report_list(&mut self) {
        if !self.report_list.state.retrying() {
            return;
        }
        debug!(kind = %Kind::Report, "Loading list");
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.report_list.data);
        fanout.load(&mut self.report_list.used);
        fanout.load(&mut self.report_list.order);
        let ok = fanout.finish().await;
        self.report_list.state.loaded(ok);
        self.list_loaded(Kind::Report, self.report_list.state);
    }

    pub fn unload_report_list(&mut self) {
        self.report_group.unload();
        if self.report_list.unload() {
            self.list_unloaded(Kind::Report);
        }
    }

    pub async fn load_scheduled_list(&mut self) {
        if !self.scheduled_list.state.retrying() {
            return;
        }
        debug!(kind = %Kind::Scheduled, "Loading list");
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.scheduled_list.data);
        fanout.load(&mut self.scheduled_list.used);
        fanout.load(&mut self.scheduled_list.order);
        fanout.load(&mut self.scheduled_list.att);
        fanout.load(&mut self.info);
        // referenced names are shown, grouped and searched
        fanout.load(&mut self.account_list.name);
        fanout.load(&mut self.account_list.order);
        fanout.load(&mut self.payee_list.name);
        fanout.load(&mut self.tag_list.name);
        fanout.load(&mut self.field_list.data);
        fanout.load(&mut self.category_list.data);
        fanout.load(&mut self.category_list.order);
        let mut ok = fanout.finish().await;
        if ok {
            ok = self.evaluate_category();
        }
        self.scheduled_list.state.loaded(ok);
        self.list_loaded(Kind::Scheduled, self.scheduled_list.state);
    }

    pub fn unload_scheduled_list(&mut self) {
        self.scheduled_group.unload();
        if self.scheduled_list.unload() {
            self.list_unloaded(Kind::Scheduled);
        }
    }

    /// Loads the record counts of every list.
    pub async fn load_manage(&mut self) {
        if !self.manage.retrying() {
            return;
        }
        debug!("Loading counts");
        let mut fanout = Fanout::new(&self.backend);
        fanout.load(&mut self.currency_list.count);
        fanout.load(&mut self.account_list.count);
        fanout.load(&mut self.asset_list.count);
        fanout.load(&mut self.stock_list.count);
        fanout.load(&mut self.category_list.count);
        fanout.load(&mut self.payee_list.count);
        fanout.load(&mut self.tag_list.count);
        fanout.load(&mut self.field_list.count);
        fanout.load(&mut self.attachment_list.count);
        fanout.load(&mut self.budget_period_list.count);
        fanout.load(&mut self.budget_list.count);
        fanout.load(&mut self.report_list.count);
        fanout.load(&mut self.scheduled_list.count);
        fanout.load(&mut self.transaction_count);
        let ok = fanout.finish().await;
        self.manage.loaded(ok);
        self.notify(Notice::Manage(self.manage));
    }

    pub fn unload_manage(&mut self) {
        if !self.manage.unloading() {
            return;
        }
        self.currency_list.count.unload();
        self.account_list.count.unload();
        self.asset_list.count.unload();
        self.stock_list.count.unload();
        self.category_list.count.unload();
        self.payee_list.count.unload();
        self.tag_list.count.unload();
        self.field_list.count.unload();
        self.attachment_list.count.unload();
        self.budget_period_list.count.unload();
        self.budget_list.count.unload();
        self.report_list.count.unload();
        self.scheduled_list.count.unload();
        self.transaction_count.unload();
        self.manage.unloaded();
        self.notify(Notice::Manage(LoadState::Idle));
    }

    /// Counts by kind, for kinds whose count is ready.
    pub fn counts(&self) -> Vec<(Kind, usize)> {
        [
            (Kind::Currency, self.currency_list.count.ready_value()),
            (Kind::Account, self.account_list.count.ready_value()),
            (Kind::Asset, self.asset_list.count.ready_value()),
            (Kind::Stock, self.stock_list.count.ready_value()),
            (Kind::Category, self.category_list.count.ready_value()),
            (Kind::Payee, self.payee_list.count.ready_value()),
            (Kind::Tag, self.tag_list.count.ready_value()),
            (Kind::Field, self.field_list.count.ready_value()),
            (Kind::Attachment, self.attachment_list.count.ready_value()),
            (Kind::BudgetPeriod, self.budget_period_list.count.ready_value()),
            (Kind::Budget, self.budget_list.count.ready_value()),
            (Kind::Report, self.report_list.count.ready_value()),
            (Kind::Scheduled, self.scheduled_list.count.ready_value()),
            (Kind::Transaction, self.transaction_count.ready_value()),
        ]
        .into_iter()
        .filter_map(|(kind, count)| count.map(|c| (kind, *c)))
        .collect()
    }

    pub async fn load_list(&mut self, kind: Kind) {
        match kind {
            Kind::Currency => self.load_currency_list().await,
            Kind::Account => self.load_account_list().await,
            Kind::Asset => self.load_asset_list().await,
            Kind::Stock => self.load_stock_list().await,
            Kind::Category => self.load_category_list().await,
            Kind::Payee => self.load_payee_list().await,
            Kind::Tag => self.load_tag_list().await,
            Kind::Field => self.load_field_list().await,
            Kind::Attachment => self.load_attachment_list().await,
            Kind::BudgetPeriod => self.load_budget_period_list().await,
            Kind::Budget => self.load_budget_list().await,
            Kind::Report => self.load_report_list().await,
            Kind::Scheduled => self.load_scheduled_list().await,
            Kind::Transaction => {
                debug!(%kind, "No list aggregate for kind");
            }
        }
    }

    pub fn unload_list(&mut self, kind: Kind) {
        match kind {
            Kind::Currency => self.unload_currency_list(),
            Kind::Account => self.unload_account_list(),
            Kind::Asset => self.unload_asset_list(),
            Kind::Stock => self.unload_stock_list(),
            Kind::Category => self.unload_category_list(),
            Kind::Payee => self.unload_payee_list(),
            Kind::Tag => self.unload_tag_list(),
            Kind::Field => self.unload_field_list(),
            Kind::Attachment => self.unload_attachment_list(),
            Kind::BudgetPeriod => self.unload_budget_period_list(),
            Kind::Budget => self.unload_budget_list(),
            Kind::Report => self.unload_report_list(),
            Kind::Scheduled => self.unload_scheduled_list(),
            Kind::Transaction => {}
        }
    }

    /// State of the list aggregate of `kind`.
    pub fn list_state(&self, kind: Kind) -> LoadState {
        match kind {
            Kind::Currency => self.currency_list.state,
            Kind::Account => self.account_list.state,
            Kind::Asset => self.asset_list.state,
            Kind::Stock => self.stock_list.state,
            Kind::Category => self.category_list.state,
            Kind::Payee => self.payee_list.state,
            Kind::Tag => self.tag_list.state,
            Kind::Field => self.field_list.state,
            Kind::Attachment => self.attachment_list.state,
            Kind::BudgetPeriod => self.budget_period_list.state,
            Kind::Budget => self.budget_list.state,
            Kind::Report => self.report_list.state,
            Kind::Scheduled => self.scheduled_list.state,
            Kind::Transaction => LoadState::Idle,
        }
    }
}
