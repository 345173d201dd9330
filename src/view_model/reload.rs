//! Cache maintenance after a single-record change.
//!
//! Every reload follows the same steps: adjust the used sets of the
//! entities the record references, save the expansion of the record's own
//! grouping, patch the record into its list, load whatever the patch
//! invalidated, regroup and restore the expansion. A list that was never
//! loaded stays unloaded.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::group::{
    AccountChoice, AssetChoice, BudgetChoice, GroupChoice, GroupState, PayeeChoice,
    SavedExpansion, ScheduledChoice, StockChoice,
};
use super::list::ListAggregate;
use super::load::LoadState;
use super::{Notice, ViewModel};
use crate::core::{
    AccountData, AssetData, AttachmentData, BudgetData, BudgetPeriodData, CategoryData,
    CurrencyData, DataId, DataRecord, FieldData, InfoKey, Kind, PayeeData, Record, RefType,
    ReportData, ScheduledData, StockData, TagData, TransactionData,
};
use crate::store::Table;

/// What an invalidation unloaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Touched {
    pub(crate) list: bool,
    pub(crate) group: bool,
}

fn id_set(ids: &[DataId]) -> HashSet<DataId> {
    ids.iter().filter_map(|id| id.non_void()).collect()
}

/// Updates the used set of `list` after a referrer changed its references
/// from `old` to `new`.
///
/// Added references are patched in. A removed reference may still be held
/// by another record, so the used set is dropped and fetched again.
pub(crate) fn reload_used<D: Table, C: GroupChoice>(
    list: &mut ListAggregate<D>,
    group: &mut GroupState<C>,
    old: &[DataId],
    new: &[DataId],
) -> Touched {
    let old = id_set(old);
    let new = id_set(new);
    if old == new {
        return Touched::default();
    }
    let group_touched = group.choice().is_used() && group.unload();
    if old.iter().any(|id| !new.contains(id)) {
        list.used.unload();
        Touched {
            list: list.state.unload(),
            group: group_touched,
        }
    } else {
        let patched = list.used.patch(|used| used.extend(new.difference(&old).copied()));
        Touched {
            list: !patched && list.state.unload(),
            group: group_touched,
        }
    }
}

/// Forgets the used set of `list` entirely.
fn drop_used<D: Table, C: GroupChoice>(
    list: &mut ListAggregate<D>,
    group: &mut GroupState<C>,
) -> Touched {
    let group_touched = group.choice().is_used() && group.unload();
    list.used.unload();
    Touched {
        list: list.state.unload(),
        group: group_touched,
    }
}

/// Drops the attachment map of an owner list.
fn drop_att<D: Table, C: GroupChoice>(
    list: &mut ListAggregate<D>,
    group: &mut GroupState<C>,
    by_attachment: C,
) -> Touched {
    let group_touched = group.choice() == by_attachment && group.unload();
    list.att.unload();
    Touched {
        list: list.state.unload(),
        group: group_touched,
    }
}

/// Saves the expansion, unloads the group and patches the record into the
/// list. Returns whether the list had been loaded, and the saved expansion
/// when the group was.
fn begin<D: Table, C: GroupChoice>(
    list: &mut ListAggregate<D>,
    group: &mut GroupState<C>,
    old: Option<&D>,
    new: Option<&D>,
) -> (bool, Option<SavedExpansion>) {
    let listed = list.state != LoadState::Idle;
    let saved = group.save_expansion();
    group.unload();
    list.patch_record(old, new);
    (listed, saved)
}

fn unload_if<C: GroupChoice>(group: &mut GroupState<C>, choice: C) -> bool {
    group.choice() == choice && group.unload()
}

fn renamed<D: DataRecord>(old: Option<&D>, new: Option<&D>) -> bool {
    matches!((old, new), (Some(old), Some(new)) if old.name() != new.name())
}

fn refs<D>(old: Option<&D>, new: Option<&D>, f: impl Fn(&D) -> Vec<DataId>) -> [Vec<DataId>; 2] {
    [old.map(&f).unwrap_or_default(), new.map(&f).unwrap_or_default()]
}

impl ViewModel {
    fn touched(&self, kind: Kind, touched: Touched) {
        if touched.group {
            self.notify(Notice::Group(kind, LoadState::Idle));
        }
        if touched.list {
            self.notify(Notice::List(kind, LoadState::Idle));
        }
    }

    fn group_unloaded(&self, kind: Kind, unloaded: bool) {
        if unloaded {
            self.notify(Notice::Group(kind, LoadState::Idle));
        }
    }

    /// Marks the record counts as stale after an insert or delete.
    fn count_changed<D>(&mut self, old: Option<&D>, new: Option<&D>) {
        if old.is_some() != new.is_some() && self.manage.unload() {
            self.notify(Notice::Manage(LoadState::Idle));
        }
    }

    /// Attachments of a deleted owner are deleted with it.
    fn owner_deleted<D: DataRecord>(&mut self, old: Option<&D>, new: Option<&D>) {
        if D::REF_TYPE.is_some() && old.is_some() && new.is_none() {
            self.attachment_list.count.unload();
            self.unload_attachment_list();
        }
    }

    /// Drops the evaluated budget order and everything built on it.
    fn budget_order_changed(&mut self) {
        self.budget_order.unload();
        let touched = Touched {
            group: self.budget_group.unload(),
            list: self.budget_list.state.unload(),
        };
        self.touched(Kind::Budget, touched);
    }

    fn group_reloaded(&self, kind: Kind, state: LoadState) {
        if !state.is_ready() {
            self.notify(Notice::Group(kind, state));
        }
    }

    pub async fn reload_currency(&mut self, old: Option<&CurrencyData>, new: Option<&CurrencyData>) {
        if renamed(old, new) {
            let unloaded = unload_if(&mut self.account_group, AccountChoice::Currency);
            self.group_unloaded(Kind::Account, unloaded);
            let unloaded = unload_if(&mut self.asset_group, AssetChoice::Currency);
            self.group_unloaded(Kind::Asset, unloaded);
        }
        self.count_changed(old, new);

        let (listed, saved) = begin(&mut self.currency_list, &mut self.currency_group, old, new);
        if listed {
            self.load_currency_list().await;
        }
        if saved.is_some() {
            self.load_currency_group(self.currency_group.choice());
            self.currency_group.restore_expansion(saved);
            self.group_reloaded(Kind::Currency, self.currency_group.state());
        }
    }

    pub async fn reload_account(&mut self, old: Option<&AccountData>, new: Option<&AccountData>) {
        let [old_ids, new_ids] = refs(old, new, |d| vec![d.currency_id]);
        let touched = reload_used(
            &mut self.currency_list,
            &mut self.currency_group,
            &old_ids,
            &new_ids,
        );
        self.touched(Kind::Currency, touched);
        if renamed(old, new) {
            let unloaded = unload_if(&mut self.stock_group, StockChoice::Account);
            self.group_unloaded(Kind::Stock, unloaded);
            let unloaded = unload_if(&mut self.scheduled_group, ScheduledChoice::Account);
            self.group_unloaded(Kind::Scheduled, unloaded);
        }
        self.count_changed(old, new);
        self.owner_deleted(old, new);

        let (listed, saved) = begin(&mut self.account_list, &mut self.account_group, old, new);
        if listed {
            self.load_account_list().await;
        }
        if saved.is_some() {
            self.load_account_group(self.account_group.choice());
            self.account_group.restore_expansion(saved);
            self.group_reloaded(Kind::Account, self.account_group.state());
        }
    }

    pub async fn reload_asset(&mut self, old: Option<&AssetData>, new: Option<&AssetData>) {
        let [old_ids, new_ids] = refs(old, new, |d| vec![d.currency_id]);
        let touched = reload_used(
            &mut self.currency_list,
            &mut self.currency_group,
            &old_ids,
            &new_ids,
        );
        self.touched(Kind::Currency, touched);
        self.count_changed(old, new);
        self.owner_deleted(old, new);

        let (listed, saved) = begin(&mut self.asset_list, &mut self.asset_group, old, new);
        if listed {
            self.load_asset_list().await;
        }
        if saved.is_some() {
            self.load_asset_group(self.asset_group.choice());
            self.asset_group.restore_expansion(saved);
            self.group_reloaded(Kind::Asset, self.asset_group.state());
        }
    }

    pub async fn reload_stock(&mut self, old: Option<&StockData>, new: Option<&StockData>) {
        let [old_ids, new_ids] = refs(old, new, |d| vec![d.account_id]);
        let touched = reload_used(&mut self.account_list, &mut self.account_group, &old_ids, &new_ids);
        self.touched(Kind::Account, touched);
        self.count_changed(old, new);
        self.owner_deleted(old, new);

        let (listed, saved) = begin(&mut self.stock_list, &mut self.stock_group, old, new);
        if listed {
            self.load_stock_list().await;
        }
        if saved.is_some() {
            self.load_stock_group(self.stock_group.choice());
            self.stock_group.restore_expansion(saved);
            self.group_reloaded(Kind::Stock, self.stock_group.state());
        }
    }

    pub async fn reload_category(&mut self, old: Option<&CategoryData>, new: Option<&CategoryData>) {
        self.category_path.unload();
        self.category_tree.unload();
        let unloaded = unload_if(&mut self.payee_group, PayeeChoice::Category);
        self.group_unloaded(Kind::Payee, unloaded);
        let unloaded = unload_if(&mut self.scheduled_group, ScheduledChoice::Category);
        self.group_unloaded(Kind::Scheduled, unloaded);
        self.budget_order_changed();
        self.count_changed(old, new);

        let (listed, saved) = begin(&mut self.category_list, &mut self.category_group, old, new);
        if listed {
            self.load_category_list().await;
        }
        if saved.is_some() {
            self.load_category_group(self.category_group.choice());
            self.category_group.restore_expansion(saved);
            self.group_reloaded(Kind::Category, self.category_group.state());
        }
    }

    pub async fn reload_payee(&mut self, old: Option<&PayeeData>, new: Option<&PayeeData>) {
        let [old_ids, new_ids] = refs(old, new, |d| vec![d.category_id]);
        let touched = reload_used(
            &mut self.category_list,
            &mut self.category_group,
            &old_ids,
            &new_ids,
        );
        self.touched(Kind::Category, touched);
        self.count_changed(old, new);
        self.owner_deleted(old, new);

        let (listed, saved) = begin(&mut self.payee_list, &mut self.payee_group, old, new);
        if listed {
            self.load_payee_list().await;
        }
        if saved.is_some() {
            self.load_payee_group(self.payee_group.choice());
            self.payee_group.restore_expansion(saved);
            self.group_reloaded(Kind::Payee, self.payee_group.state());
        }
    }

    pub async fn reload_tag(&mut self, old: Option<&TagData>, new: Option<&TagData>) {
        self.count_changed(old, new);

        let (listed, saved) = begin(&mut self.tag_list, &mut self.tag_group, old, new);
        if listed {
            self.load_tag_list().await;
        }
        if saved.is_some() {
            self.load_tag_group(self.tag_group.choice());
            self.tag_group.restore_expansion(saved);
            self.group_reloaded(Kind::Tag, self.tag_group.state());
        }
    }

    /// Invalidates the attachment map of one owner kind.
    fn attachments_changed(&mut self, ref_type: RefType) {
        let touched = match ref_type {
            RefType::Account => drop_att(
                &mut self.account_list,
                &mut self.account_group,
                AccountChoice::Attachment,
            ),
            RefType::Asset => drop_att(
                &mut self.asset_list,
                &mut self.asset_group,
                AssetChoice::Attachment,
            ),
            RefType::Stock => drop_att(
                &mut self.stock_list,
                &mut self.stock_group,
                StockChoice::Attachment,
            ),
            RefType::Payee => drop_att(
                &mut self.payee_list,
                &mut self.payee_group,
                PayeeChoice::Attachment,
            ),
            RefType::Scheduled => drop_att(
                &mut self.scheduled_list,
                &mut self.scheduled_group,
                ScheduledChoice::Attachment,
            ),
            RefType::Transaction => Touched::default(),
        };
        self.touched(ref_type.kind(), touched);
    }

    pub async fn reload_attachment(
        &mut self,
        old: Option<&AttachmentData>,
        new: Option<&AttachmentData>,
    ) {
        let owners: HashSet<RefType> = old.into_iter().chain(new).map(|a| a.ref_type).collect();
        for ref_type in owners {
            self.attachments_changed(ref_type);
        }
        self.count_changed(old, new);

        let (listed, saved) = begin(&mut self.attachment_list, &mut self.attachment_group, old, new);
        if listed {
            self.load_attachment_list().await;
        }
        if saved.is_some() {
            self.load_attachment_group(self.attachment_group.choice());
            self.attachment_group.restore_expansion(saved);
            self.group_reloaded(Kind::Attachment, self.attachment_group.state());
        }
    }

    /// Transactions have no list of their own; only the entities they
    /// reference and the counts are refreshed.
    pub fn reload_transaction(
        &mut self,
        old: Option<&TransactionData>,
        new: Option<&TransactionData>,
    ) {
        let [old_ids, new_ids] = refs(old, new, |d| vec![d.account_id, d.to_account_id]);
        let touched = reload_used(&mut self.account_list, &mut self.account_group, &old_ids, &new_ids);
        self.touched(Kind::Account, touched);

        let [old_ids, new_ids] = refs(old, new, |d| vec![d.payee_id]);
        let touched = reload_used(&mut self.payee_list, &mut self.payee_group, &old_ids, &new_ids);
        self.touched(Kind::Payee, touched);

        let [old_ids, new_ids] = refs(old, new, |d| vec![d.category_id]);
        let touched = reload_used(
            &mut self.category_list,
            &mut self.category_group,
            &old_ids,
            &new_ids,
        );
        self.touched(Kind::Category, touched);

        let [old_ids, new_ids] = refs(old, new, |d| d.tag_id.clone());
        let touched = reload_used(&mut self.tag_list, &mut self.tag_group, &old_ids, &new_ids);
        self.touched(Kind::Tag, touched);

        let [old_ids, new_ids] = refs(old, new, |d| {
            d.field_value.iter().map(|v| v.field_id).collect()
        });
        let touched = reload_used(&mut self.field_list, &mut self.field_group, &old_ids, &new_ids);
        self.touched(Kind::Field, touched);

        if old.is_some() != new.is_some() {
            self.transaction_count.unload();
        }
        self.count_changed(old, new);
        self.owner_deleted(old, new);
    }

    pub async fn reload_field(&mut self, old: Option<&FieldData>, new: Option<&FieldData>) {
        self.count_changed(old, new);

        let (listed, saved) = begin(&mut self.field_list, &mut self.field_group, old, new);
        if listed {
            self.load_field_list().await;
        }
        if saved.is_some() {
            self.load_field_group(self.field_group.choice());
            self.field_group.restore_expansion(saved);
            self.group_reloaded(Kind::Field, self.field_group.state());
        }
    }

    pub async fn reload_budget_period(
        &mut self,
        old: Option<&BudgetPeriodData>,
        new: Option<&BudgetPeriodData>,
    ) {
        // the period order leads the budget order
        if old.is_some() != new.is_some() || renamed(old, new) {
            self.budget_order_changed();
        }
        self.count_changed(old, new);

        let (listed, saved) =
            begin(&mut self.budget_period_list, &mut self.budget_period_group, old, new);
        if listed {
            self.load_budget_period_list().await;
        }
        if saved.is_some() {
            self.load_budget_period_group(self.budget_period_group.choice());
            self.budget_period_group.restore_expansion(saved);
            self.group_reloaded(Kind::BudgetPeriod, self.budget_period_group.state());
        }
    }

    pub async fn reload_budget(&mut self, old: Option<&BudgetData>, new: Option<&BudgetData>) {
        let [old_ids, new_ids] = refs(old, new, |d| vec![d.period_id]);
        let touched = reload_used(
            &mut self.budget_period_list,
            &mut self.budget_period_group,
            &old_ids,
            &new_ids,
        );
        self.touched(Kind::BudgetPeriod, touched);

        let [old_ids, new_ids] = refs(old, new, |d| vec![d.category_id]);
        let touched = reload_used(
            &mut self.category_list,
            &mut self.category_group,
            &old_ids,
            &new_ids,
        );
        self.touched(Kind::Category, touched);
        self.count_changed(old, new);

        self.budget_order.unload();
        let (listed, saved) = begin(&mut self.budget_list, &mut self.budget_group, old, new);
        if listed {
            self.load_budget_list().await;
        }
        if saved.is_some() {
            self.load_budget_group(self.budget_group.choice());
            self.budget_group.restore_expansion(saved);
            self.group_reloaded(Kind::Budget, self.budget_group.state());
        }
    }

    pub async fn reload_report(&mut self, old: Option<&ReportData>, new: Option<&ReportData>) {
        self.count_changed(old, new);

        let (listed, saved) = begin(&mut self.report_list, &mut self.report_group, old, new);
        if listed {
            self.load_report_list().await;
        }
        if saved.is_some() {
            self.load_report_group(self.report_group.choice());
            self.report_group.restore_expansion(saved);
            self.group_reloaded(Kind::Report, self.report_group.state());
        }
    }

    pub async fn reload_scheduled(
        &mut self,
        old: Option<&ScheduledData>,
        new: Option<&ScheduledData>,
    ) {
        let [old_ids, new_ids] = refs(old, new, |d| vec![d.account_id, d.to_account_id]);
        let touched = reload_used(&mut self.account_list, &mut self.account_group, &old_ids, &new_ids);
        self.touched(Kind::Account, touched);

        let [old_ids, new_ids] = refs(old, new, |d| vec![d.payee_id]);
        let touched = reload_used(&mut self.payee_list, &mut self.payee_group, &old_ids, &new_ids);
        self.touched(Kind::Payee, touched);

        let [old_ids, new_ids] = refs(old, new, |d| vec![d.category_id]);
        let touched = reload_used(
            &mut self.category_list,
            &mut self.category_group,
            &old_ids,
            &new_ids,
        );
        self.touched(Kind::Category, touched);

        let [old_ids, new_ids] = refs(old, new, |d| d.tag_id.clone());
        let touched = reload_used(&mut self.tag_list, &mut self.tag_group, &old_ids, &new_ids);
        self.touched(Kind::Tag, touched);

        let [old_ids, new_ids] = refs(old, new, |d| {
            d.field_value.iter().map(|v| v.field_id).collect()
        });
        let touched = reload_used(&mut self.field_list, &mut self.field_group, &old_ids, &new_ids);
        self.touched(Kind::Field, touched);

        self.count_changed(old, new);
        self.owner_deleted(old, new);

        let (listed, saved) = begin(&mut self.scheduled_list, &mut self.scheduled_group, old, new);
        if listed {
            self.load_scheduled_list().await;
        }
        if saved.is_some() {
            self.load_scheduled_group(self.scheduled_group.choice());
            self.scheduled_group.restore_expansion(saved);
            self.group_reloaded(Kind::Scheduled, self.scheduled_group.state());
        }
    }

    /// Refreshes what depends on one settings value after it was written.
    pub async fn reload_info(&mut self, key: InfoKey) {
        match key {
            InfoKey::BaseCurrencyId => {
                let touched = drop_used(&mut self.currency_list, &mut self.currency_group);
                self.touched(Kind::Currency, touched);
            }
            InfoKey::DefaultAccountId => {
                let touched = drop_used(&mut self.account_list, &mut self.account_group);
                self.touched(Kind::Account, touched);
            }
            InfoKey::CategoryDelimiter => {
                self.category_path.unload();
                let unloaded = unload_if(&mut self.payee_group, PayeeChoice::Category);
                self.group_unloaded(Kind::Payee, unloaded);
                let unloaded = unload_if(&mut self.budget_group, BudgetChoice::Category);
                self.group_unloaded(Kind::Budget, unloaded);
                let unloaded = unload_if(&mut self.scheduled_group, ScheduledChoice::Category);
                self.group_unloaded(Kind::Scheduled, unloaded);
            }
        }
        self.unload_info();
        self.load_info().await;
        if key == InfoKey::CategoryDelimiter && self.category_list.data.state().is_ready() {
            self.evaluate_category();
        }
        debug!(%key, "Info reloaded");
    }

    /// Reloads after `old` was replaced by `new`. `None` on one side stands
    /// for an insert or a delete.
    pub async fn reload(&mut self, old: Option<&Record>, new: Option<&Record>) {
        let kind = match (old, new) {
            (Some(old), Some(new)) if old.kind() != new.kind() => {
                warn!(old = %old.kind(), new = %new.kind(), "Reload across kinds ignored");
                return;
            }
            (Some(record), _) | (None, Some(record)) => record.kind(),
            (None, None) => return,
        };
        fn pick<D: DataRecord>(record: Option<&Record>) -> Option<&D> {
            record.and_then(D::from_record)
        }
        let id = new.or(old).map(Record::id).unwrap_or_default();
        debug!(%kind, %id, "Reloading");
        match kind {
            Kind::Currency => self.reload_currency(pick(old), pick(new)).await,
            Kind::Account => self.reload_account(pick(old), pick(new)).await,
            Kind::Asset => self.reload_asset(pick(old), pick(new)).await,
            Kind::Stock => self.reload_stock(pick(old), pick(new)).await,
            Kind::Category => self.reload_category(pick(old), pick(new)).await,
            Kind::Payee => self.reload_payee(pick(old), pick(new)).await,
            Kind::Tag => self.reload_tag(pick(old), pick(new)).await,
            Kind::Field => self.reload_field(pick(old), pick(new)).await,
            Kind::Attachment => self.reload_attachment(pick(old), pick(new)).await,
            Kind::BudgetPeriod => self.reload_budget_period(pick(old), pick(new)).await,
            Kind::Budget => self.reload_budget(pick(old), pick(new)).await,
            Kind::Report => self.reload_report(pick(old), pick(new)).await,
            Kind::Scheduled => self.reload_scheduled(pick(old), pick(new)).await,
            Kind::Transaction => self.reload_transaction(pick(old), pick(new)),
        }
    }
}
