//! Checks run before a record is written or deleted.
//!
//! Checks that depend on other tables read the cached lists, which must be
//! loaded. Uniqueness is checked against the backend.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{info, warn};

use super::ViewModel;
use super::load::Load;
use crate::core::{
    AccountData, AssetData, AttachmentData, BudgetData, BudgetPeriodData, CategoryData,
    CurrencyData, DataId, FieldData, Kind, PayeeData, Record, RefType, ReportData, ScheduledData,
    StockData, TagData, TransactionData,
};
use crate::store::{StoreError, Table};

/// Reason a mutation was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The user can fix the input.
    Invalid(String),
    /// The view-model or the store is not in a state that allows the check.
    Internal(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Invalid(msg) => f.write_str(msg),
            ValidationError::Internal(msg) => write!(f, "* {msg}"),
        }
    }
}

impl std::error::Error for ValidationError {}

fn invalid(msg: impl Into<String>) -> ValidationError {
    ValidationError::Invalid(msg.into())
}

fn internal(msg: impl Into<String>) -> ValidationError {
    ValidationError::Internal(msg.into())
}

fn entity(kind: Kind) -> String {
    kind.as_str().to_lowercase()
}

/// `Budget period` for [`Kind::BudgetPeriod`].
fn title(kind: Kind) -> String {
    let entity = entity(kind);
    let mut chars = entity.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => entity,
    }
}

fn loaded<V: Default>(load: &Load<V>) -> Result<&V, ValidationError> {
    load.ready_value()
        .ok_or_else(|| internal(format!("{} is not loaded", load.name())))
}

fn require_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(invalid("Name is empty"));
    }
    Ok(())
}

/// Names are compared without regard to case.
fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Resolves a required reference against a loaded name map.
fn require_ref(
    id: DataId,
    names: &Load<HashMap<DataId, String>>,
    kind: Kind,
) -> Result<(), ValidationError> {
    if id.is_void() {
        return Err(invalid(format!("No {} is selected", entity(kind))));
    }
    if !loaded(names)?.contains_key(&id) {
        return Err(internal(format!("Unknown {} #{id}", entity(kind))));
    }
    Ok(())
}

fn read_failed<D: Table>(error: StoreError) -> ValidationError {
    warn!(kind = %D::KIND, %error, "Validation query failed");
    internal(format!("Cannot read {} table", entity(D::KIND)))
}

impl ViewModel {
    /// Whether a record other than `data` satisfies `same`.
    fn clashes<D: Table>(
        &self,
        data: &D,
        same: impl Fn(&D) -> bool,
    ) -> Result<bool, ValidationError> {
        let ids = D::repository(self.backend().as_ref())
            .select_id(&same)
            .map_err(read_failed::<D>)?;
        Ok(ids.iter().any(|&id| id != data.id()))
    }

    /// Fails when a record other than `data` satisfies `same`.
    fn check_unique<D: Table>(
        &self,
        data: &D,
        same: impl Fn(&D) -> bool,
    ) -> Result<(), ValidationError> {
        if self.clashes(data, same)? {
            return Err(invalid(format!("{} {} already exists", title(D::KIND), data.name())));
        }
        Ok(())
    }

    /// Inserts `data` when its id is void, otherwise updates it.
    fn store<D: Table>(&self, data: &mut D) -> Result<(), ValidationError> {
        let repository = D::repository(self.backend().as_ref());
        if data.id().is_void() {
            repository.insert(data).map_err(|error| {
                warn!(kind = %D::KIND, %error, "Insert failed");
                internal(format!("Cannot create new {}", entity(D::KIND)))
            })?;
            info!(kind = %D::KIND, id = %data.id(), "Record created");
        } else {
            repository.update(data).map_err(|error| {
                warn!(kind = %D::KIND, id = %data.id(), %error, "Update failed");
                internal(format!("Cannot update {} #{}", entity(D::KIND), data.id()))
            })?;
            info!(kind = %D::KIND, id = %data.id(), "Record updated");
        }
        Ok(())
    }

    /// Deletes `data` and its attachments. A record in `used` is refused.
    fn delete_checked<D: Table>(
        &self,
        data: &D,
        used: Option<&Load<HashSet<DataId>>>,
    ) -> Result<(), ValidationError> {
        if let Some(used) = used {
            if loaded(used)?.contains(&data.id()) {
                return Err(invalid(format!("{} {} is used", title(D::KIND), data.name())));
            }
        }
        if let Some(ref_type) = D::REF_TYPE {
            let count = self
                .backend()
                .delete_attachments(ref_type, data.id())
                .map_err(|error| {
                    warn!(kind = %D::KIND, id = %data.id(), %error, "Attachment delete failed");
                    internal(format!(
                        "Cannot delete attachments of {} #{}",
                        entity(D::KIND),
                        data.id()
                    ))
                })?;
            if count > 0 {
                info!(kind = %D::KIND, id = %data.id(), count, "Attachments deleted");
            }
        }
        D::repository(self.backend().as_ref())
            .delete(data.id())
            .map_err(|error| {
                warn!(kind = %D::KIND, id = %data.id(), %error, "Delete failed");
                internal(format!("Cannot delete {} #{}", entity(D::KIND), data.id()))
            })?;
        info!(kind = %D::KIND, id = %data.id(), "Record deleted");
        Ok(())
    }

    pub fn update_currency(&self, data: &mut CurrencyData) -> Result<(), ValidationError> {
        require_name(&data.name)?;
        if data.symbol.trim().is_empty() {
            return Err(invalid("Symbol is empty"));
        }
        self.check_unique(data, |d| same_name(&d.name, &data.name))?;
        if self.clashes(data, |d| same_name(&d.symbol, &data.symbol))? {
            return Err(invalid(format!("Currency symbol {} already exists", data.symbol)));
        }
        self.store(data)
    }

    pub fn delete_currency(&self, data: &CurrencyData) -> Result<(), ValidationError> {
        self.delete_checked(data, Some(&self.currency_list.used))
    }

    pub fn update_account(&self, data: &mut AccountData) -> Result<(), ValidationError> {
        require_name(&data.name)?;
        require_ref(data.currency_id, &self.currency_list.name, Kind::Currency)?;
        self.check_unique(data, |d| same_name(&d.name, &data.name))?;
        self.store(data)
    }

    pub fn delete_account(&self, data: &AccountData) -> Result<(), ValidationError> {
        self.delete_checked(data, Some(&self.account_list.used))
    }

    pub fn update_asset(&self, data: &mut AssetData) -> Result<(), ValidationError> {
        require_name(&data.name)?;
        require_ref(data.currency_id, &self.currency_list.name, Kind::Currency)?;
        self.check_unique(data, |d| same_name(&d.name, &data.name))?;
        self.store(data)
    }

    pub fn delete_asset(&self, data: &AssetData) -> Result<(), ValidationError> {
        self.delete_checked(data, Some(&self.asset_list.used))
    }

    pub fn update_stock(&self, data: &mut StockData) -> Result<(), ValidationError> {
        require_name(&data.name)?;
        require_ref(data.account_id, &self.account_list.name, Kind::Account)?;
        self.check_unique(data, |d| {
            d.account_id == data.account_id && same_name(&d.name, &data.name)
        })?;
        self.store(data)
    }

    pub fn delete_stock(&self, data: &StockData) -> Result<(), ValidationError> {
        self.delete_checked(data, Some(&self.stock_list.used))
    }

    pub fn update_category(&self, data: &mut CategoryData) -> Result<(), ValidationError> {
        require_name(&data.name)?;
        if let Some(parent_id) = data.parent_id.non_void() {
            let categories = loaded(&self.category_list.data)?;
            if !categories.contains_key(&parent_id) {
                return Err(internal(format!("Unknown category #{parent_id}")));
            }
            if parent_id == data.id {
                return Err(invalid(format!(
                    "Category {} cannot be its own parent",
                    data.name
                )));
            }
            if !data.id.is_void() && self.is_subcategory(parent_id, data.id, categories) {
                return Err(invalid(format!(
                    "Category {} cannot move under its own subcategory",
                    data.name
                )));
            }
        }
        self.check_unique(data, |d| {
            d.parent_id == data.parent_id && same_name(&d.name, &data.name)
        })?;
        self.store(data)
    }

    /// Whether `id` lies below `ancestor`, using the tree when it is ready
    /// and the parent chain otherwise.
    fn is_subcategory(
        &self,
        id: DataId,
        ancestor: DataId,
        categories: &HashMap<DataId, CategoryData>,
    ) -> bool {
        if let Some(tree) = self.category_tree.ready_value() {
            if tree.index.contains_key(&id) && tree.index.contains_key(&ancestor) {
                return tree.is_descendant(id, ancestor);
            }
        }
        let mut seen = HashSet::new();
        let mut cursor = id;
        while let Some(category) = categories.get(&cursor) {
            if cursor == ancestor {
                return true;
            }
            if !seen.insert(cursor) {
                break;
            }
            cursor = category.parent_id;
        }
        false
    }

    pub fn delete_category(&self, data: &CategoryData) -> Result<(), ValidationError> {
        let categories = loaded(&self.category_list.data)?;
        if categories.values().any(|d| d.parent_id == data.id) {
            return Err(invalid(format!("Category {} has subcategories", data.name)));
        }
        self.delete_checked(data, Some(&self.category_list.used))
    }

    pub fn update_payee(&self, data: &mut PayeeData) -> Result<(), ValidationError> {
        require_name(&data.name)?;
        if let Some(category_id) = data.category_id.non_void() {
            if !loaded(&self.category_list.data)?.contains_key(&category_id) {
                return Err(internal(format!("Unknown category #{category_id}")));
            }
        }
        self.check_unique(data, |d| same_name(&d.name, &data.name))?;
        self.store(data)
    }

    pub fn delete_payee(&self, data: &PayeeData) -> Result<(), ValidationError> {
        self.delete_checked(data, Some(&self.payee_list.used))
    }

    pub fn update_tag(&self, data: &mut TagData) -> Result<(), ValidationError> {
        require_name(&data.name)?;
        self.check_unique(data, |d| same_name(&d.name, &data.name))?;
        self.store(data)
    }

    pub fn delete_tag(&self, data: &TagData) -> Result<(), ValidationError> {
        self.delete_checked(data, Some(&self.tag_list.used))
    }

    pub fn update_attachment(&self, data: &mut AttachmentData) -> Result<(), ValidationError> {
        if data.filename.trim().is_empty() {
            return Err(invalid("Filename is empty"));
        }
        self.store(data)
    }

    pub fn delete_attachment(&self, data: &AttachmentData) -> Result<(), ValidationError> {
        self.delete_checked(data, None)
    }

    pub fn update_transaction(&self, data: &mut TransactionData) -> Result<(), ValidationError> {
        if data.account_id.is_void() {
            return Err(invalid("No account is selected"));
        }
        self.store(data)
    }

    pub fn delete_transaction(&self, data: &TransactionData) -> Result<(), ValidationError> {
        self.delete_checked(data, None)
    }

    pub fn update_field(&self, data: &mut FieldData) -> Result<(), ValidationError> {
        if data.description.trim().is_empty() {
            return Err(invalid("Description is empty"));
        }
        if !matches!(data.ref_type, RefType::Transaction | RefType::Scheduled) {
            return Err(invalid(format!("Fields cannot be defined for {}", data.ref_type)));
        }
        self.store(data)
    }

    pub fn delete_field(&self, data: &FieldData) -> Result<(), ValidationError> {
        self.delete_checked(data, Some(&self.field_list.used))
    }

    pub fn update_budget_period(&self, data: &mut BudgetPeriodData) -> Result<(), ValidationError> {
        require_name(&data.name)?;
        self.check_unique(data, |d| same_name(&d.name, &data.name))?;
        self.store(data)
    }

    pub fn delete_budget_period(&self, data: &BudgetPeriodData) -> Result<(), ValidationError> {
        self.delete_checked(data, Some(&self.budget_period_list.used))
    }

    pub fn update_budget(&self, data: &mut BudgetData) -> Result<(), ValidationError> {
        require_ref(data.period_id, &self.budget_period_list.name, Kind::BudgetPeriod)?;
        if data.category_id.is_void() {
            return Err(invalid("No category is selected"));
        }
        if !loaded(&self.category_list.data)?.contains_key(&data.category_id) {
            return Err(internal(format!("Unknown category #{}", data.category_id)));
        }
        // one budget per period and category
        if self.clashes(data, |d| {
            d.period_id == data.period_id && d.category_id == data.category_id
        })? {
            return Err(invalid("Budget key (period, category) already exists"));
        }
        self.store(data)
    }

    pub fn delete_budget(&self, data: &BudgetData) -> Result<(), ValidationError> {
        self.delete_checked(data, Some(&self.budget_list.used))
    }

    pub fn update_report(&self, data: &mut ReportData) -> Result<(), ValidationError> {
        require_name(&data.name)?;
        self.check_unique(data, |d| same_name(&d.name, &data.name))?;
        self.store(data)
    }

    pub fn delete_report(&self, data: &ReportData) -> Result<(), ValidationError> {
        self.delete_checked(data, Some(&self.report_list.used))
    }

    pub fn update_scheduled(&self, data: &mut ScheduledData) -> Result<(), ValidationError> {
        if data.account_id.is_void() {
            return Err(invalid("No account is selected"));
        }
        self.store(data)
    }

    pub fn delete_scheduled(&self, data: &ScheduledData) -> Result<(), ValidationError> {
        self.delete_checked(data, None)
    }

    /// Validates and writes `record`; a void id inserts and receives the
    /// new id.
    pub fn update(&self, record: &mut Record) -> Result<(), ValidationError> {
        match record {
            Record::Currency(d) => self.update_currency(d),
            Record::Account(d) => self.update_account(d),
            Record::Asset(d) => self.update_asset(d),
            Record::Stock(d) => self.update_stock(d),
            Record::Category(d) => self.update_category(d),
            Record::Payee(d) => self.update_payee(d),
            Record::Tag(d) => self.update_tag(d),
            Record::Field(d) => self.update_field(d),
            Record::Attachment(d) => self.update_attachment(d),
            Record::BudgetPeriod(d) => self.update_budget_period(d),
            Record::Budget(d) => self.update_budget(d),
            Record::Report(d) => self.update_report(d),
            Record::Scheduled(d) => self.update_scheduled(d),
            Record::Transaction(d) => self.update_transaction(d),
        }
    }

    pub fn delete(&self, record: &Record) -> Result<(), ValidationError> {
        match record {
            Record::Currency(d) => self.delete_currency(d),
            Record::Account(d) => self.delete_account(d),
            Record::Asset(d) => self.delete_asset(d),
            Record::Stock(d) => self.delete_stock(d),
            Record::Category(d) => self.delete_category(d),
            Record::Payee(d) => self.delete_payee(d),
            Record::Tag(d) => self.delete_tag(d),
            Record::Field(d) => self.delete_field(d),
            Record::Attachment(d) => self.delete_attachment(d),
            Record::BudgetPeriod(d) => self.delete_budget_period(d),
            Record::Budget(d) => self.delete_budget(d),
            Record::Report(d) => self.delete_report(d),
            Record::Scheduled(d) => self.delete_scheduled(d),
            Record::Transaction(d) => self.delete_transaction(d),
        }
    }
}
