//! Query surface the view-model reads from and writes through.

pub mod memory;

use std::collections::{HashMap, HashSet};

use crate::core::{
    AccountData, AssetData, AttachmentData, BudgetData, BudgetPeriodData, CategoryData,
    CurrencyData, DataId, DataRecord, FieldData, InfoKey, Kind, PayeeData, Record, RefType,
    ReportData, ScheduledData, StockData, TagData, TransactionData,
};

pub use memory::MemoryStore;

/// Errors reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The table cannot be read or written at the moment.
    Unavailable(Kind),
    /// No record with the given id exists.
    NotFound(Kind, DataId),
    /// A lock guarding the store was poisoned.
    Poisoned,
    /// Reading or writing the snapshot file failed.
    Io(String),
    /// The snapshot file could not be parsed or produced.
    Format(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(kind) => write!(f, "{kind} table is unavailable"),
            StoreError::NotFound(kind, id) => write!(f, "{kind} #{id} not found"),
            StoreError::Poisoned => write!(f, "store lock poisoned"),
            StoreError::Io(msg) => write!(f, "i/o error: {msg}"),
            StoreError::Format(msg) => write!(f, "format error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Per-table queries and mutations.
pub trait Repository<D: DataRecord>: Send + Sync {
    /// All records keyed by id.
    fn select_data(&self) -> Result<HashMap<DataId, D>, StoreError>;
    /// All ids ordered by [`DataRecord::sort_key`], then by id.
    fn select_order(&self) -> Result<Vec<DataId>, StoreError>;
    /// Ids referenced by foreign keys of other tables.
    fn select_used(&self) -> Result<HashSet<DataId>, StoreError>;
    fn count(&self) -> Result<usize, StoreError>;
    fn select_id(&self, predicate: &dyn Fn(&D) -> bool) -> Result<Vec<DataId>, StoreError>;
    /// Stores a new record and writes the generated id back into `data`.
    fn insert(&self, data: &mut D) -> Result<(), StoreError>;
    fn update(&self, data: &D) -> Result<(), StoreError>;
    fn delete(&self, id: DataId) -> Result<(), StoreError>;

    fn select_name(&self) -> Result<HashMap<DataId, String>, StoreError> {
        Ok(self
            .select_data()?
            .into_iter()
            .map(|(id, data)| (id, data.name().to_string()))
            .collect())
    }
}

/// A database handle shared by every fetch of the view-model.
pub trait Backend: Send + Sync {
    fn currencies(&self) -> &dyn Repository<CurrencyData>;
    fn accounts(&self) -> &dyn Repository<AccountData>;
    fn assets(&self) -> &dyn Repository<AssetData>;
    fn stocks(&self) -> &dyn Repository<StockData>;
    fn categories(&self) -> &dyn Repository<CategoryData>;
    fn payees(&self) -> &dyn Repository<PayeeData>;
    fn tags(&self) -> &dyn Repository<TagData>;
    fn fields(&self) -> &dyn Repository<FieldData>;
    fn attachments(&self) -> &dyn Repository<AttachmentData>;
    fn budget_periods(&self) -> &dyn Repository<BudgetPeriodData>;
    fn budgets(&self) -> &dyn Repository<BudgetData>;
    fn reports(&self) -> &dyn Repository<ReportData>;
    fn scheduled(&self) -> &dyn Repository<ScheduledData>;
    fn transactions(&self) -> &dyn Repository<TransactionData>;

    fn info(&self, key: InfoKey) -> Result<Option<String>, StoreError>;
    /// Sets or, with `None`, removes a settings value.
    fn set_info(&self, key: InfoKey, value: Option<&str>) -> Result<(), StoreError>;

    /// Attachments of every owner of the given type, keyed by owner id.
    fn attachment_map(
        &self,
        ref_type: RefType,
    ) -> Result<HashMap<DataId, Vec<AttachmentData>>, StoreError> {
        let mut map: HashMap<DataId, Vec<AttachmentData>> = HashMap::new();
        let order = self.attachments().select_order()?;
        let mut data = self.attachments().select_data()?;
        for id in order {
            if let Some(att) = data.remove(&id) {
                if att.ref_type == ref_type {
                    map.entry(att.ref_id).or_default().push(att);
                }
            }
        }
        Ok(map)
    }

    /// Deletes every attachment of one owner and returns how many were removed.
    fn delete_attachments(&self, ref_type: RefType, ref_id: DataId) -> Result<usize, StoreError> {
        let ids = self
            .attachments()
            .select_id(&|att| att.ref_type == ref_type && att.ref_id == ref_id)?;
        for id in &ids {
            self.attachments().delete(*id)?;
        }
        Ok(ids.len())
    }
}

/// Resolves the repository of a record type on any backend.
pub trait Table: DataRecord {
    fn repository(backend: &dyn Backend) -> &dyn Repository<Self>;
}

macro_rules! table {
    ($data:ty, $accessor:ident) => {
        impl Table for $data {
            fn repository(backend: &dyn Backend) -> &dyn Repository<Self> {
                backend.$accessor()
            }
        }
    };
}

table!(CurrencyData, currencies);
table!(AccountData, accounts);
table!(AssetData, assets);
table!(StockData, stocks);
table!(CategoryData, categories);
table!(PayeeData, payees);
table!(TagData, tags);
table!(FieldData, fields);
table!(AttachmentData, attachments);
table!(BudgetPeriodData, budget_periods);
table!(BudgetData, budgets);
table!(ReportData, reports);
table!(ScheduledData, scheduled);
table!(TransactionData, transactions);

/// Reads one record of any kind.
pub fn find_record(
    backend: &dyn Backend,
    kind: Kind,
    id: DataId,
) -> Result<Option<Record>, StoreError> {
    fn find<D: Table>(backend: &dyn Backend, id: DataId) -> Result<Option<Record>, StoreError> {
        Ok(D::repository(backend)
            .select_data()?
            .remove(&id)
            .map(D::into_record))
    }
    match kind {
        Kind::Currency => find::<CurrencyData>(backend, id),
        Kind::Account => find::<AccountData>(backend, id),
        Kind::Asset => find::<AssetData>(backend, id),
        Kind::Stock => find::<StockData>(backend, id),
        Kind::Category => find::<CategoryData>(backend, id),
        Kind::Payee => find::<PayeeData>(backend, id),
        Kind::Tag => find::<TagData>(backend, id),
        Kind::Field => find::<FieldData>(backend, id),
        Kind::Attachment => find::<AttachmentData>(backend, id),
        Kind::BudgetPeriod => find::<BudgetPeriodData>(backend, id),
        Kind::Budget => find::<BudgetData>(backend, id),
        Kind::Report => find::<ReportData>(backend, id),
        Kind::Scheduled => find::<ScheduledData>(backend, id),
        Kind::Transaction => find::<TransactionData>(backend, id),
    }
}
