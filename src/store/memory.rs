//! In-memory [`Backend`] with JSON snapshots, a call journal and per-table
//! failure injection.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Backend, Repository, StoreError, Table};
use crate::core::{
    AccountData, AssetData, AttachmentData, BudgetData, BudgetPeriodData, CategoryData,
    CurrencyData, DataId, FieldData, InfoKey, Kind, PayeeData, ReportData, ScheduledData,
    StockData, TagData, TransactionData,
};

/// Operation recorded in the store journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    SelectData,
    SelectOrder,
    SelectUsed,
    Count,
    SelectId,
    Insert,
    Update,
    Delete,
}

/// One journal entry. Failed calls are recorded too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub kind: Kind,
    pub op: Op,
    pub id: DataId,
}

/// Serializable contents of a [`MemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tables {
    currency: BTreeMap<DataId, CurrencyData>,
    account: BTreeMap<DataId, AccountData>,
    asset: BTreeMap<DataId, AssetData>,
    stock: BTreeMap<DataId, StockData>,
    category: BTreeMap<DataId, CategoryData>,
    payee: BTreeMap<DataId, PayeeData>,
    tag: BTreeMap<DataId, TagData>,
    field: BTreeMap<DataId, FieldData>,
    attachment: BTreeMap<DataId, AttachmentData>,
    budget_period: BTreeMap<DataId, BudgetPeriodData>,
    budget: BTreeMap<DataId, BudgetData>,
    report: BTreeMap<DataId, ReportData>,
    scheduled: BTreeMap<DataId, ScheduledData>,
    transaction: BTreeMap<DataId, TransactionData>,
    info: BTreeMap<InfoKey, String>,
}

impl Tables {
    fn info_id(&self, key: InfoKey) -> Option<DataId> {
        self.info
            .get(&key)
            .and_then(|v| v.parse::<DataId>().ok())
            .and_then(DataId::non_void)
    }
}

#[derive(Default)]
struct Inner {
    tables: Tables,
    journal: Vec<Access>,
    broken: HashSet<Kind>,
}

/// In-memory backend with optional JSON snapshot persistence.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a snapshot, or starts empty when `path` does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "Starting with an empty store");
            return Ok(Self::new());
        }
        let text = std::fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
        let tables: Tables =
            serde_json::from_str(&text).map_err(|e| StoreError::Format(e.to_string()))?;
        info!(path = %path.display(), "Opened store");
        Ok(Self {
            inner: Mutex::new(Inner {
                tables,
                ..Inner::default()
            }),
        })
    }

    /// Writes the current tables as a JSON snapshot.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let text = {
            let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
            serde_json::to_string_pretty(&inner.tables)
                .map_err(|e| StoreError::Format(e.to_string()))?
        };
        std::fs::write(path, text).map_err(|e| StoreError::Io(e.to_string()))?;
        debug!(path = %path.display(), "Saved store");
        Ok(())
    }

    /// Makes every call touching `kind` fail until [`MemoryStore::repair`].
    pub fn fail(&self, kind: Kind) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.broken.insert(kind);
        }
    }

    pub fn repair(&self, kind: Kind) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.broken.remove(&kind);
        }
    }

    /// Calls made so far, oldest first.
    pub fn journal(&self) -> Vec<Access> {
        self.inner
            .lock()
            .map(|inner| inner.journal.clone())
            .unwrap_or_default()
    }

    pub fn clear_journal(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.journal.clear();
        }
    }

    /// Number of journaled calls matching `kind` and `op`.
    pub fn calls(&self, kind: Kind, op: Op) -> usize {
        self.journal()
            .iter()
            .filter(|a| a.kind == kind && a.op == op)
            .count()
    }

    fn access<T>(
        &self,
        kind: Kind,
        op: Op,
        id: DataId,
        f: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        inner.journal.push(Access { kind, op, id });
        if inner.broken.contains(&kind) {
            debug!(%kind, ?op, "Rejected call on unavailable table");
            return Err(StoreError::Unavailable(kind));
        }
        f(&mut inner.tables)
    }
}

/// Record types with a table in [`Tables`].
pub trait Stored: Table {
    fn table(tables: &Tables) -> &BTreeMap<DataId, Self>;
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<DataId, Self>;

    fn used(_tables: &Tables) -> HashSet<DataId> {
        HashSet::new()
    }
}

fn non_void(ids: impl IntoIterator<Item = DataId>) -> HashSet<DataId> {
    ids.into_iter().filter(|id| !id.is_void()).collect()
}

macro_rules! stored {
    ($data:ty, $field:ident) => {
        stored!($data, $field, |_t| HashSet::new());
    };
    ($data:ty, $field:ident, |$t:ident| $used:expr) => {
        impl Stored for $data {
            fn table(tables: &Tables) -> &BTreeMap<DataId, Self> {
                &tables.$field
            }

            fn table_mut(tables: &mut Tables) -> &mut BTreeMap<DataId, Self> {
                &mut tables.$field
            }

            fn used($t: &Tables) -> HashSet<DataId> {
                $used
            }
        }
    };
}

stored!(CurrencyData, currency, |t| non_void(
    t.account
        .values()
        .map(|a| a.currency_id)
        .chain(t.asset.values().map(|a| a.currency_id))
        .chain(t.info_id(InfoKey::BaseCurrencyId))
));
stored!(AccountData, account, |t| non_void(
    t.transaction
        .values()
        .flat_map(|tx| [tx.account_id, tx.to_account_id])
        .chain(t.scheduled.values().flat_map(|s| [s.account_id, s.to_account_id]))
        .chain(t.stock.values().map(|s| s.account_id))
        .chain(t.info_id(InfoKey::DefaultAccountId))
));
stored!(AssetData, asset);
stored!(StockData, stock);
stored!(CategoryData, category, |t| non_void(
    t.payee
        .values()
        .map(|p| p.category_id)
        .chain(t.transaction.values().map(|tx| tx.category_id))
        .chain(t.scheduled.values().map(|s| s.category_id))
        .chain(t.budget.values().map(|b| b.category_id))
));
stored!(PayeeData, payee, |t| non_void(
    t.transaction
        .values()
        .map(|tx| tx.payee_id)
        .chain(t.scheduled.values().map(|s| s.payee_id))
));
stored!(TagData, tag, |t| non_void(
    t.transaction
        .values()
        .flat_map(|tx| tx.tag_id.iter().copied())
        .chain(t.scheduled.values().flat_map(|s| s.tag_id.iter().copied()))
));
stored!(FieldData, field, |t| non_void(
    t.transaction
        .values()
        .flat_map(|tx| tx.field_value.iter().map(|v| v.field_id))
        .chain(
            t.scheduled
                .values()
                .flat_map(|s| s.field_value.iter().map(|v| v.field_id))
        )
));
stored!(AttachmentData, attachment);
stored!(BudgetPeriodData, budget_period, |t| non_void(
    t.budget.values().map(|b| b.period_id)
));
stored!(BudgetData, budget);
stored!(ReportData, report);
stored!(ScheduledData, scheduled);
stored!(TransactionData, transaction);

impl<D: Stored> Repository<D> for MemoryStore {
    fn select_data(&self) -> Result<HashMap<DataId, D>, StoreError> {
        self.access(D::KIND, Op::SelectData, DataId::VOID, |t| {
            Ok(D::table(t).iter().map(|(id, d)| (*id, d.clone())).collect())
        })
    }

    fn select_order(&self) -> Result<Vec<DataId>, StoreError> {
        self.access(D::KIND, Op::SelectOrder, DataId::VOID, |t| {
            let mut rows: Vec<(String, DataId)> =
                D::table(t).values().map(|d| (d.sort_key(), d.id())).collect();
            rows.sort();
            Ok(rows.into_iter().map(|(_, id)| id).collect())
        })
    }

    fn select_used(&self) -> Result<HashSet<DataId>, StoreError> {
        self.access(D::KIND, Op::SelectUsed, DataId::VOID, |t| Ok(D::used(t)))
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.access(D::KIND, Op::Count, DataId::VOID, |t| Ok(D::table(t).len()))
    }

    fn select_id(&self, predicate: &dyn Fn(&D) -> bool) -> Result<Vec<DataId>, StoreError> {
        self.access(D::KIND, Op::SelectId, DataId::VOID, |t| {
            Ok(D::table(t)
                .values()
                .filter(|d| predicate(d))
                .map(|d| d.id())
                .collect())
        })
    }

    fn insert(&self, data: &mut D) -> Result<(), StoreError> {
        self.access(D::KIND, Op::Insert, data.id(), |t| {
            let table = D::table_mut(t);
            let next = table.keys().next_back().map_or(1, |id| id.value() + 1);
            data.set_id(DataId::new(next));
            table.insert(data.id(), data.clone());
            Ok(())
        })
    }

    fn update(&self, data: &D) -> Result<(), StoreError> {
        self.access(D::KIND, Op::Update, data.id(), |t| {
            match D::table_mut(t).get_mut(&data.id()) {
                Some(row) => {
                    *row = data.clone();
                    Ok(())
                }
                None => Err(StoreError::NotFound(D::KIND, data.id())),
            }
        })
    }

    fn delete(&self, id: DataId) -> Result<(), StoreError> {
        self.access(D::KIND, Op::Delete, id, |t| {
            D::table_mut(t)
                .remove(&id)
                .map(|_| ())
                .ok_or(StoreError::NotFound(D::KIND, id))
        })
    }
}

impl Backend for MemoryStore {
    fn currencies(&self) -> &dyn Repository<CurrencyData> {
        self
    }

    fn accounts(&self) -> &dyn Repository<AccountData> {
        self
    }

    fn assets(&self) -> &dyn Repository<AssetData> {
        self
    }

    fn stocks(&self) -> &dyn Repository<StockData> {
        self
    }

    fn categories(&self) -> &dyn Repository<CategoryData> {
        self
    }

    fn payees(&self) -> &dyn Repository<PayeeData> {
        self
    }

    fn tags(&self) -> &dyn Repository<TagData> {
        self
    }

    fn fields(&self) -> &dyn Repository<FieldData> {
        self
    }

    fn attachments(&self) -> &dyn Repository<AttachmentData> {
        self
    }

    fn budget_periods(&self) -> &dyn Repository<BudgetPeriodData> {
        self
    }

    fn budgets(&self) -> &dyn Repository<BudgetData> {
        self
    }

    fn reports(&self) -> &dyn Repository<ReportData> {
        self
    }

    fn scheduled(&self) -> &dyn Repository<ScheduledData> {
        self
    }

    fn transactions(&self) -> &dyn Repository<TransactionData> {
        self
    }

    fn info(&self, key: InfoKey) -> Result<Option<String>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.tables.info.get(&key).cloned())
    }

    fn set_info(&self, key: InfoKey, value: Option<&str>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        match value {
            Some(value) => inner.tables.info.insert(key, value.to_string()),
            None => inner.tables.info.remove(&key),
        };
        Ok(())
    }
}
