//! Sectioning of list order into named, expandable groups.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

use tracing::debug;

use super::load::LoadState;
use super::{Notice, ViewModel};
use crate::core::{
    AccountStatus, AccountType, AssetStatus, AssetType, CurrencyType, DataId, FieldType, Kind,
    RefType, RepeatAuto, Search, SearchArea, TransactionStatus, UnknownVariant, named_enum,
};

/// Grouping dimension selectable for one entity.
pub trait GroupChoice:
    Copy + Eq + Default + Debug + Display + FromStr<Err = UnknownVariant> + Send + 'static
{
    fn choices() -> &'static [Self];
    fn as_str(self) -> &'static str;
    /// Grouping by membership in the used set.
    fn is_used(self) -> bool;
    /// Grouping by a key value; groups are identified by that value.
    fn is_keyed(self) -> bool {
        false
    }
    /// Empty groups stay hidden while no search is active.
    fn hides_empty(self) -> bool {
        self.is_keyed()
    }
}

macro_rules! group_choice {
    (
        $(#[$meta:meta])*
        $name:ident { $( $variant:ident => $text:literal ),+ $(,)? }
        default $default:ident
        used [$($used:ident)?]
        keyed [$($keyed:ident),*]
        hides [$($hides:ident),*]
    ) => {
        named_enum! {
            $(#[$meta])*
            pub enum $name: "group choice" {
                $( $variant => $text ),+
            }
            default $default
        }

        impl GroupChoice for $name {
            fn choices() -> &'static [Self] {
                $name::ALL
            }

            fn as_str(self) -> &'static str {
                $name::as_str(self)
            }

            fn is_used(self) -> bool {
                false $(|| self == $name::$used)?
            }

            fn is_keyed(self) -> bool {
                false $(|| self == $name::$keyed)*
            }

            fn hides_empty(self) -> bool {
                self.is_keyed() $(|| self == $name::$hides)*
            }
        }
    };
    (
        $(#[$meta:meta])*
        $name:ident { $( $variant:ident => $text:literal ),+ $(,)? }
        used [$($used:ident)?]
        keyed [$($keyed:ident),*]
        hides [$($hides:ident),*]
    ) => {
        group_choice! {
            $(#[$meta])*
            $name { $( $variant => $text ),+ }
            default All
            used [$($used)?]
            keyed [$($keyed),*]
            hides [$($hides),*]
        }
    };
}

group_choice! {
    CurrencyChoice { All => "All", Used => "Used", Type => "Type" }
    used [Used]
    keyed []
    hides [Type]
}

group_choice! {
    AccountChoice {
        All => "All",
        Used => "Used",
        Favorite => "Favorite",
        Status => "Status",
        Type => "Type",
        Currency => "Currency",
        Attachment => "Attachment",
    }
    used [Used]
    keyed [Currency]
    hides [Type]
}

group_choice! {
    AssetChoice {
        All => "All",
        Used => "Used",
        Status => "Status",
        Type => "Type",
        Currency => "Currency",
        Attachment => "Attachment",
    }
    used [Used]
    keyed [Currency]
    hides [Type]
}

group_choice! {
    StockChoice { All => "All", Used => "Used", Account => "Account", Attachment => "Attachment" }
    used [Used]
    keyed [Account]
    hides []
}

group_choice! {
    CategoryChoice { All => "All", Used => "Used", Active => "Active" }
    used [Used]
    keyed []
    hides []
}

group_choice! {
    PayeeChoice {
        All => "All",
        Used => "Used",
        Active => "Active",
        Category => "Category",
        Attachment => "Attachment",
    }
    used [Used]
    keyed [Category]
    hides []
}

group_choice! {
    TagChoice { All => "All", Used => "Used", Active => "Active" }
    used [Used]
    keyed []
    hides []
}

group_choice! {
    FieldChoice { All => "All", Used => "Used", RefType => "Ref. Type", Type => "Field Type" }
    used [Used]
    keyed []
    hides [RefType, Type]
}

group_choice! {
    AttachmentChoice { All => "All", RefType => "Ref Type" }
    used []
    keyed []
    hides [RefType]
}

group_choice! {
    BudgetPeriodChoice { All => "All", Used => "Used" }
    used [Used]
    keyed []
    hides []
}

group_choice! {
    BudgetChoice { Period => "Period", Category => "Category", Active => "Active" }
    default Period
    used []
    keyed [Period, Category]
    hides []
}

group_choice! {
    ReportChoice { All => "All", Active => "Active", Group => "Group" }
    used []
    keyed [Group]
    hides []
}

group_choice! {
    ScheduledChoice {
        All => "All",
        Auto => "Auto",
        Last => "Last",
        Status => "Status",
        Account => "Account",
        Category => "Category",
        Tag => "Tag",
        Attachment => "Attachment",
    }
    used []
    keyed [Account, Category]
    hides [Auto, Status]
}

/// One section of a grouped list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub name: Option<String>,
    pub data_id: Vec<DataId>,
    pub is_visible: bool,
    pub is_expanded: bool,
}

impl GroupEntry {
    fn new(name: impl Into<String>, data_id: Vec<DataId>, is_visible: bool, is_expanded: bool) -> Self {
        Self {
            name: Some(name.into()),
            data_id,
            is_visible,
            is_expanded,
        }
    }
}

/// What a group of a keyed choice stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// A referenced record; void for records without the reference.
    Id(DataId),
    Name(String),
}

impl From<DataId> for GroupKey {
    fn from(id: DataId) -> Self {
        GroupKey::Id(id)
    }
}

/// Expansion flags saved across a regroup.
#[derive(Debug, Clone)]
pub(crate) struct SavedExpansion {
    expanded: Vec<bool>,
    key_index: HashMap<GroupKey, usize>,
}

/// Grouping of one entity's list.
#[derive(Debug, Clone, Default)]
pub struct GroupState<C> {
    pub(crate) choice: C,
    pub(crate) state: LoadState,
    pub(crate) value: Vec<GroupEntry>,
    /// Key of every group, for keyed choices.
    pub(crate) keys: Vec<GroupKey>,
}

impl<C: GroupChoice> GroupState<C> {
    pub fn choice(&self) -> C {
        self.choice
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn value(&self) -> &[GroupEntry] {
        &self.value
    }

    pub fn ready_value(&self) -> Option<&[GroupEntry]> {
        self.state.is_ready().then_some(self.value.as_slice())
    }

    pub fn keys(&self) -> &[GroupKey] {
        &self.keys
    }

    pub fn unload(&mut self) -> bool {
        if !self.state.unloading() {
            return false;
        }
        self.value.clear();
        self.keys.clear();
        self.state.unloaded();
        true
    }

    pub fn set_expanded(&mut self, g: usize, is_expanded: bool) -> bool {
        match self.value.get_mut(g) {
            Some(entry) if self.state.is_ready() => {
                entry.is_expanded = is_expanded;
                true
            }
            _ => false,
        }
    }

    pub fn set_visible(&mut self, g: usize, is_visible: bool) -> bool {
        match self.value.get_mut(g) {
            Some(entry) if self.state.is_ready() => {
                entry.is_visible = is_visible;
                true
            }
            _ => false,
        }
    }

    fn finish(&mut self, choice: C, (value, keys): Grouped) {
        self.choice = choice;
        self.value = value;
        self.keys = keys;
        self.state.loaded(true);
    }

    pub(crate) fn save_expansion(&self) -> Option<SavedExpansion> {
        let value = self.ready_value()?;
        Some(SavedExpansion {
            expanded: value.iter().map(|g| g.is_expanded).collect(),
            key_index: self.keys.iter().cloned().enumerate().map(|(i, k)| (k, i)).collect(),
        })
    }

    /// Copies saved flags onto the regrouped entries: by group key for
    /// keyed choices, otherwise by position when the group count is unchanged.
    pub(crate) fn restore_expansion(&mut self, saved: Option<SavedExpansion>) {
        let Some(saved) = saved else { return };
        if !self.state.is_ready() {
            return;
        }
        if self.choice.is_keyed() {
            for (g, key) in self.keys.iter().enumerate() {
                if let Some(&i) = saved.key_index.get(key) {
                    self.value[g].is_expanded = saved.expanded[i];
                }
            }
        } else if self.value.len() == saved.expanded.len() {
            for (entry, &is_expanded) in self.value.iter_mut().zip(&saved.expanded) {
                entry.is_expanded = is_expanded;
            }
        }
    }

    /// Recomputes visibility for `search`; `matches` tests one record.
    pub(crate) fn apply_search(
        &mut self,
        search: &Search,
        expand: bool,
        mut matches: impl FnMut(DataId) -> bool,
    ) {
        if !self.state.is_ready() {
            return;
        }
        let hides_empty = self.choice.hides_empty();
        for entry in &mut self.value {
            let is_visible = if search.is_empty() {
                !hides_empty || !entry.data_id.is_empty()
            } else {
                entry.data_id.iter().any(|&id| matches(id))
            };
            entry.is_visible = is_visible;
            if (expand || !search.is_empty()) && is_visible {
                entry.is_expanded = true;
            }
        }
    }
}

/// Splits `order` by `key`, keeping the relative order inside each part.
/// Ids for which `key` yields `None` are left out.
pub fn partition<K: Eq + Hash>(
    order: &[DataId],
    key: impl Fn(DataId) -> Option<K>,
) -> HashMap<K, Vec<DataId>> {
    let mut parts: HashMap<K, Vec<DataId>> = HashMap::new();
    for &id in order {
        match key(id) {
            Some(k) => parts.entry(k).or_default().push(id),
            None => debug!(%id, "Ordered id has no data"),
        }
    }
    parts
}

type Grouped = (Vec<GroupEntry>, Vec<GroupKey>);

fn group_all(order: &[DataId]) -> Grouped {
    (vec![GroupEntry::new("All", order.to_vec(), true, true)], Vec::new())
}

/// Two groups, the `true` one expanded and the other collapsed.
fn group_flag(order: &[DataId], names: (&str, &str), key: impl Fn(DataId) -> Option<bool>) -> Grouped {
    let mut parts = partition(order, key);
    let entries = vec![
        GroupEntry::new(names.0, parts.remove(&true).unwrap_or_default(), true, true),
        GroupEntry::new(names.1, parts.remove(&false).unwrap_or_default(), true, false),
    ];
    (entries, Vec::new())
}

/// One group per enum value, in declaration order.
fn group_enum<K: Copy + Eq + Hash + Display>(
    order: &[DataId],
    values: &[K],
    hides_empty: bool,
    key: impl Fn(DataId) -> Option<K>,
) -> Grouped {
    let mut parts = partition(order, key);
    let entries = values
        .iter()
        .map(|value| {
            let ids = parts.remove(value).unwrap_or_default();
            let shown = !hides_empty || !ids.is_empty();
            GroupEntry::new(value.to_string(), ids, shown, shown)
        })
        .collect();
    (entries, Vec::new())
}

/// One group per referenced id, sorted by the referenced display name.
fn group_keyed(
    order: &[DataId],
    names: &HashMap<DataId, String>,
    key: impl Fn(DataId) -> Option<DataId>,
) -> Grouped {
    let parts = partition(order, key);
    let mut keys: Vec<(String, DataId)> = parts
        .keys()
        .map(|&k| {
            let name = match names.get(&k) {
                Some(name) => name.clone(),
                None if k.is_void() => "(none)".to_string(),
                None => format!("#{k}"),
            };
            (name, k)
        })
        .collect();
    keys.sort();
    let mut parts = parts;
    let entries = keys
        .iter()
        .map(|(name, k)| {
            let ids = parts.remove(k).unwrap_or_default();
            let shown = !ids.is_empty();
            GroupEntry::new(name.clone(), ids, shown, true)
        })
        .collect();
    (entries, keys.into_iter().map(|(_, k)| GroupKey::Id(k)).collect())
}

/// One group per referenced id in the order of `key_order`, led by the
/// group of records without a reference. Ids missing from `key_order`
/// follow as `#id`.
fn group_ordered(
    order: &[DataId],
    key_order: &[DataId],
    names: &HashMap<DataId, String>,
    key: impl Fn(DataId) -> Option<DataId>,
) -> Grouped {
    let mut parts = partition(order, key);
    let mut keys = vec![DataId::VOID];
    keys.extend(key_order.iter().filter(|k| !k.is_void() && parts.contains_key(*k)));
    let mut unknown: Vec<DataId> = parts
        .keys()
        .filter(|k| !k.is_void() && !key_order.contains(*k))
        .copied()
        .collect();
    unknown.sort();
    keys.extend(unknown);
    let entries = keys
        .iter()
        .map(|k| {
            let name = match names.get(k) {
                Some(name) => name.clone(),
                None if k.is_void() => "(none)".to_string(),
                None => format!("#{k}"),
            };
            let ids = parts.remove(k).unwrap_or_default();
            let shown = !ids.is_empty();
            GroupEntry::new(name, ids, shown, true)
        })
        .collect();
    (entries, keys.into_iter().map(GroupKey::Id).collect())
}

/// One group per distinct text value, sorted; the empty value is `(none)`.
fn group_named(order: &[DataId], key: impl Fn(DataId) -> Option<String>) -> Grouped {
    let mut parts = partition(order, key);
    let mut keys: Vec<String> = parts.keys().cloned().collect();
    keys.sort();
    let entries = keys
        .iter()
        .map(|k| {
            let name = if k.is_empty() { "(none)" } else { k.as_str() };
            let ids = parts.remove(k).unwrap_or_default();
            let shown = !ids.is_empty();
            GroupEntry::new(name, ids, shown, true)
        })
        .collect();
    (entries, keys.into_iter().map(GroupKey::Name).collect())
}

fn attachment_texts<'a>(
    att: &'a HashMap<DataId, Vec<crate::core::AttachmentData>>,
    id: DataId,
) -> Vec<&'a str> {
    att.get(&id)
        .into_iter()
        .flatten()
        .flat_map(|a| [a.description.as_str(), a.filename.as_str()])
        .collect()
}

impl ViewModel {
    fn group_loaded(&self, kind: Kind, choice: impl Display) {
        debug!(%kind, %choice, "Group ready");
        self.notify(Notice::Group(kind, LoadState::Ready));
    }

    pub fn load_currency_group(&mut self, choice: CurrencyChoice) {
        let (Some(data), Some(used), Some(order)) = (
            self.currency_list.data.ready_value(),
            self.currency_list.used.ready_value(),
            self.currency_list.order.ready_value(),
        ) else {
            return;
        };
        if !self.currency_group.state.loading() {
            return;
        }
        let grouped = match choice {
            CurrencyChoice::All => group_all(order),
            CurrencyChoice::Used => {
                group_flag(order, ("Used", "Other"), |id| Some(used.contains(&id)))
            }
            CurrencyChoice::Type => group_enum(order, CurrencyType::ALL, true, |id| {
                data.get(&id).map(|d| d.kind)
            }),
        };
        self.currency_group.finish(choice, grouped);
        self.group_loaded(Kind::Currency, choice);
    }

    pub fn search_currency_group(&mut self, search: &Search, expand: bool) {
        let Some(data) = self.currency_list.data.ready_value() else {
            return;
        };
        self.currency_group.apply_search(search, expand, |id| {
            let Some(d) = data.get(&id) else { return false };
            search.matches(|area| match area {
                SearchArea::Name => vec![d.name.as_str()],
                SearchArea::Other => vec![d.symbol.as_str()],
                _ => vec![],
            })
        });
    }

    pub fn load_account_group(&mut self, choice: AccountChoice) {
        let (Some(data), Some(used), Some(order), Some(att), Some(currency_name)) = (
            self.account_list.data.ready_value(),
            self.account_list.used.ready_value(),
            self.account_list.order.ready_value(),
            self.account_list.att.ready_value(),
            self.currency_list.name.ready_value(),
        ) else {
            return;
        };
        if !self.account_group.state.loading() {
            return;
        }
        let grouped = match choice {
            AccountChoice::All => group_all(order),
            AccountChoice::Used => {
                group_flag(order, ("Used", "Other"), |id| Some(used.contains(&id)))
            }
            AccountChoice::Favorite => group_flag(order, ("Favorite", "Other"), |id| {
                data.get(&id).map(|d| d.favorite)
            }),
            AccountChoice::Status => group_enum(order, AccountStatus::ALL, false, |id| {
                data.get(&id).map(|d| d.status)
            }),
            AccountChoice::Type => group_enum(order, AccountType::ALL, true, |id| {
                data.get(&id).map(|d| d.kind)
            }),
            AccountChoice::Currency => group_keyed(order, currency_name, |id| {
                data.get(&id).map(|d| d.currency_id)
            }),
            AccountChoice::Attachment => group_flag(order, ("With Attachment", "Other"), |id| {
                Some(att.get(&id).is_some_and(|a| !a.is_empty()))
            }),
        };
        self.account_group.finish(choice, grouped);
        self.group_loaded(Kind::Account, choice);
    }

    pub fn search_account_group(&mut self, search: &Search, expand: bool) {
        let (Some(data), Some(att)) = (
            self.account_list.data.ready_value(),
            self.account_list.att.ready_value(),
        ) else {
            return;
        };
        let currency_name = self.currency_list.name.ready_value();
        self.account_group.apply_search(search, expand, |id| {
            let Some(d) = data.get(&id) else { return false };
            search.matches(|area| match area {
                SearchArea::Name => vec![d.name.as_str()],
                SearchArea::Currency => currency_name
                    .and_then(|names| names.get(&d.currency_id))
                    .map(String::as_str)
                    .into_iter()
                    .collect(),
                SearchArea::Notes => vec![d.notes.as_str()],
                SearchArea::Attachment => attachment_texts(att, id),
                SearchArea::Other => vec![
                    d.num.as_str(),
                    d.held_at.as_str(),
                    d.website.as_str(),
                    d.contact_info.as_str(),
                    d.access_info.as_str(),
                ],
            })
        });
    }

    pub fn load_asset_group(&mut self, choice: AssetChoice) {
        let (Some(data), Some(used), Some(order), Some(att), Some(currency_name)) = (
            self.asset_list.data.ready_value(),
            self.asset_list.used.ready_value(),
            self.asset_list.order.ready_value(),
            self.asset_list.att.ready_value(),
            self.currency_list.name.ready_value(),
        ) else {
            return;
        };
        if !self.asset_group.state.loading() {
            return;
        }
        let grouped = match choice {
            AssetChoice::All => group_all(order),
            AssetChoice::Used => {
                group_flag(order, ("Used", "Other"), |id| Some(used.contains(&id)))
            }
            AssetChoice::Status => group_enum(order, AssetStatus::ALL, false, |id| {
                data.get(&id).map(|d| d.status)
            }),
            AssetChoice::Type => group_enum(order, AssetType::ALL, true, |id| {
                data.get(&id).map(|d| d.kind)
            }),
            AssetChoice::Currency => group_keyed(order, currency_name, |id| {
                data.get(&id).map(|d| d.currency_id)
            }),
            AssetChoice::Attachment => group_flag(order, ("With Attachment", "Other"), |id| {
                Some(att.get(&id).is_some_and(|a| !a.is_empty()))
            }),
        };
        self.asset_group.finish(choice, grouped);
        self.group_loaded(Kind::Asset, choice);
    }

    pub fn search_asset_group(&mut self, search: &Search, expand: bool) {
        let (Some(data), Some(att)) = (
            self.asset_list.data.ready_value(),
            self.asset_list.att.ready_value(),
        ) else {
            return;
        };
        let currency_name = self.currency_list.name.ready_value();
        self.asset_group.apply_search(search, expand, |id| {
            let Some(d) = data.get(&id) else { return false };
            search.matches(|area| match area {
                SearchArea::Name => vec![d.name.as_str()],
                SearchArea::Currency => currency_name
                    .and_then(|names| names.get(&d.currency_id))
                    .map(String::as_str)
                    .into_iter()
                    .collect(),
                SearchArea::Notes => vec![d.notes.as_str()],
                SearchArea::Attachment => attachment_texts(att, id),
                SearchArea::Other => vec![d.kind.as_str()],
            })
        });
    }

    pub fn load_stock_group(&mut self, choice: StockChoice) {
        let (Some(data), Some(used), Some(order), Some(att), Some(account_name)) = (
            self.stock_list.data.ready_value(),
            self.stock_list.used.ready_value(),
            self.stock_list.order.ready_value(),
            self.stock_list.att.ready_value(),
            self.account_list.name.ready_value(),
        ) else {
            return;
        };
        if !self.stock_group.state.loading() {
            return;
        }
        let grouped = match choice {
            StockChoice::All => group_all(order),
            StockChoice::Used => {
                group_flag(order, ("Used", "Other"), |id| Some(used.contains(&id)))
            }
            StockChoice::Account => group_keyed(order, account_name, |id| {
                data.get(&id).map(|d| d.account_id)
            }),
            StockChoice::Attachment => group_flag(order, ("With Attachment", "Other"), |id| {
                Some(att.get(&id).is_some_and(|a| !a.is_empty()))
            }),
        };
        self.stock_group.finish(choice, grouped);
        self.group_loaded(Kind::Stock, choice);
    }

    pub fn search_stock_group(&mut self, search: &Search, expand: bool) {
        let (Some(data), Some(att)) = (
            self.stock_list.data.ready_value(),
            self.stock_list.att.ready_value(),
        ) else {
            return;
        };
        let account_name = self.account_list.name.ready_value();
        self.stock_group.apply_search(search, expand, |id| {
            let Some(d) = data.get(&id) else { return false };
            search.matches(|area| match area {
                SearchArea::Name => vec![d.name.as_str()],
                SearchArea::Notes => vec![d.notes.as_str()],
                SearchArea::Attachment => attachment_texts(att, id),
                SearchArea::Other => {
                    let mut texts = vec![d.symbol.as_str()];
                    texts.extend(
                        account_name
                            .and_then(|names| names.get(&d.account_id))
                            .map(String::as_str),
                    );
                    texts
                }
                SearchArea::Currency => vec![],
            })
        });
    }

    pub fn load_category_group(&mut self, choice: CategoryChoice) {
        let (Some(data), Some(used), Some(tree)) = (
            self.category_list.data.ready_value(),
            self.category_list.used.ready_value(),
            self.category_tree.ready_value(),
        ) else {
            return;
        };
        if !self.category_group.state.loading() {
            return;
        }
        // categories are listed in tree order
        let order = tree.order();
        let grouped = match choice {
            CategoryChoice::All => group_all(&order),
            CategoryChoice::Used => {
                group_flag(&order, ("Used", "Other"), |id| Some(used.contains(&id)))
            }
            CategoryChoice::Active => {
                group_flag(&order, ("Active", "Other"), |id| data.get(&id).map(|d| d.active))
            }
        };
        self.category_group.finish(choice, grouped);
        self.group_loaded(Kind::Category, choice);
    }

    pub fn search_category_group(&mut self, search: &Search, expand: bool) {
        let Some(data) = self.category_list.data.ready_value() else {
            return;
        };
        let path = self.category_path.ready_value();
        self.category_group.apply_search(search, expand, |id| {
            let Some(d) = data.get(&id) else { return false };
            search.matches(|area| match area {
                SearchArea::Name => vec![d.name.as_str()],
                SearchArea::Other => path
                    .and_then(|path| path.get(&id))
                    .map(String::as_str)
                    .into_iter()
                    .collect(),
                _ => vec![],
            })
        });
    }

    pub fn load_payee_group(&mut self, choice: PayeeChoice) {
        let (Some(data), Some(used), Some(order), Some(att), Some(path)) = (
            self.payee_list.data.ready_value(),
            self.payee_list.used.ready_value(),
            self.payee_list.order.ready_value(),
            self.payee_list.att.ready_value(),
            self.category_path.ready_value(),
        ) else {
            return;
        };
        if !self.payee_group.state.loading() {
            return;
        }
        let grouped = match choice {
            PayeeChoice::All => group_all(order),
            PayeeChoice::Used => {
                group_flag(order, ("Used", "Other"), |id| Some(used.contains(&id)))
            }
            PayeeChoice::Active => {
                group_flag(order, ("Active", "Other"), |id| data.get(&id).map(|d| d.active))
            }
            PayeeChoice::Category => {
                group_keyed(order, path, |id| data.get(&id).map(|d| d.category_id))
            }
            PayeeChoice::Attachment => group_flag(order, ("With Attachment", "Other"), |id| {
                Some(att.get(&id).is_some_and(|a| !a.is_empty()))
            }),
        };
        self.payee_group.finish(choice, grouped);
        self.group_loaded(Kind::Payee, choice);
    }

    pub fn search_payee_group(&mut self, search: &Search, expand: bool) {
        let (Some(data), Some(att)) = (
            self.payee_list.data.ready_value(),
            self.payee_list.att.ready_value(),
        ) else {
            return;
        };
        let path = self.category_path.ready_value();
        self.payee_group.apply_search(search, expand, |id| {
            let Some(d) = data.get(&id) else { return false };
            search.matches(|area| match area {
                SearchArea::Name => vec![d.name.as_str()],
                SearchArea::Notes => vec![d.notes.as_str()],
                SearchArea::Attachment => attachment_texts(att, id),
                SearchArea::Other => {
                    let mut texts = vec![d.number.as_str(), d.website.as_str(), d.pattern.as_str()];
                    texts.extend(
                        path.and_then(|path| path.get(&d.category_id))
                            .map(String::as_str),
                    );
                    texts
                }
                SearchArea::Currency => vec![],
            })
        });
    }

    pub fn load_tag_group(&mut self, choice: TagChoice) {
        let (Some(data), Some(used), Some(order)) = (
            self.tag_list.data.ready_value(),
            self.tag_list.used.ready_value(),
            self.tag_list.order.ready_value(),
        ) else {
            return;
        };
        if !self.tag_group.state.loading() {
            return;
        }
        let grouped = match choice {
            TagChoice::All => group_all(order),
            TagChoice::Used => {
                group_flag(order, ("Used", "Other"), |id| Some(used.contains(&id)))
            }
            TagChoice::Active => {
                group_flag(order, ("Active", "Other"), |id| data.get(&id).map(|d| d.active))
            }
        };
        self.tag_group.finish(choice, grouped);
        self.group_loaded(Kind::Tag, choice);
    }

    pub fn search_tag_group(&mut self, search: &Search, expand: bool) {
        let Some(data) = self.tag_list.data.ready_value() else {
            return;
        };
        self.tag_group.apply_search(search, expand, |id| {
            let Some(d) = data.get(&id) else { return false };
            search.matches(|area| match area {
                SearchArea::Name => vec![d.name.as_str()],
                _ => vec![],
            })
        });
    }

    pub fn load_attachment_group(&mut self, choice: AttachmentChoice) {
        let (Some(data), Some(order)) = (
            self.attachment_list.data.ready_value(),
            self.attachment_list.order.ready_value(),
        ) else {
            return;
        };
        if !self.attachment_group.state.loading() {
            return;
        }
        let grouped = match choice {
            AttachmentChoice::All => group_all(order),
            AttachmentChoice::RefType => group_enum(order, RefType::ALL, true, |id| {
                data.get(&id).map(|d| d.ref_type)
            }),
        };
        self.attachment_group.finish(choice, grouped);
        self.group_loaded(Kind::Attachment, choice);
    }

    pub fn search_attachment_group(&mut self, search: &Search, expand: bool) {
        let Some(data) = self.attachment_list.data.ready_value() else {
            return;
        };
        self.attachment_group.apply_search(search, expand, |id| {
            let Some(d) = data.get(&id) else { return false };
            search.matches(|area| match area {
                SearchArea::Name => vec![d.filename.as_str()],
                SearchArea::Notes => vec![d.description.as_str()],
                SearchArea::Other => vec![d.ref_type.as_str()],
                _ => vec![],
            })
        });
    }

    pub fn load_field_group(&mut self, choice: FieldChoice) {
        let (Some(data), Some(used), Some(order)) = (
            self.field_list.data.ready_value(),
            self.field_list.used.ready_value(),
            self.field_list.order.ready_value(),
        ) else {
            return;
        };
        if !self.field_group.state.loading() {
            return;
        }
        let grouped = match choice {
            FieldChoice::All => group_all(order),
            FieldChoice::Used => {
                group_flag(order, ("Used", "Other"), |id| Some(used.contains(&id)))
            }
            FieldChoice::RefType => group_enum(
                order,
                &[RefType::Transaction, RefType::Scheduled],
                true,
                |id| data.get(&id).map(|d| d.ref_type),
            ),
            FieldChoice::Type => group_enum(order, FieldType::ALL, true, |id| {
                data.get(&id).map(|d| d.kind)
            }),
        };
        self.field_group.finish(choice, grouped);
        self.group_loaded(Kind::Field, choice);
    }

    pub fn search_field_group(&mut self, search: &Search, expand: bool) {
        let Some(data) = self.field_list.data.ready_value() else {
            return;
        };
        self.field_group.apply_search(search, expand, |id| {
            let Some(d) = data.get(&id) else { return false };
            search.matches(|area| match area {
                SearchArea::Name => vec![d.description.as_str()],
                SearchArea::Other => vec![d.properties.as_str()],
                _ => vec![],
            })
        });
    }

    pub fn load_budget_period_group(&mut self, choice: BudgetPeriodChoice) {
        let (Some(used), Some(order)) = (
            self.budget_period_list.used.ready_value(),
            self.budget_period_list.order.ready_value(),
        ) else {
            return;
        };
        if !self.budget_period_group.state.loading() {
            return;
        }
        let grouped = match choice {
            BudgetPeriodChoice::All => group_all(order),
            BudgetPeriodChoice::Used => {
                group_flag(order, ("Used", "Other"), |id| Some(used.contains(&id)))
            }
        };
        self.budget_period_group.finish(choice, grouped);
        self.group_loaded(Kind::BudgetPeriod, choice);
    }

    pub fn search_budget_period_group(&mut self, search: &Search, expand: bool) {
        let Some(data) = self.budget_period_list.data.ready_value() else {
            return;
        };
        self.budget_period_group.apply_search(search, expand, |id| {
            let Some(d) = data.get(&id) else { return false };
            search.matches(|area| match area {
                SearchArea::Name => vec![d.name.as_str()],
                _ => vec![],
            })
        });
    }

    /// Budgets are listed by period, then by category tree position.
    pub fn load_budget_group(&mut self, choice: BudgetChoice) {
        let (
            Some(data),
            Some(order),
            Some(period_name),
            Some(period_order),
            Some(path),
            Some(tree),
        ) = (
            self.budget_list.data.ready_value(),
            self.budget_order.ready_value(),
            self.budget_period_list.name.ready_value(),
            self.budget_period_list.order.ready_value(),
            self.category_path.ready_value(),
            self.category_tree.ready_value(),
        ) else {
            return;
        };
        if !self.budget_group.state.loading() {
            return;
        }
        let grouped = match choice {
            BudgetChoice::Period => group_ordered(order, period_order, period_name, |id| {
                data.get(&id).map(|d| d.period_id)
            }),
            BudgetChoice::Category => group_ordered(order, &tree.order(), path, |id| {
                data.get(&id).map(|d| d.category_id)
            }),
            BudgetChoice::Active => {
                group_flag(order, ("Active", "Other"), |id| data.get(&id).map(|d| d.active))
            }
        };
        self.budget_group.finish(choice, grouped);
        self.group_loaded(Kind::Budget, choice);
    }

    pub fn search_budget_group(&mut self, search: &Search, expand: bool) {
        let Some(data) = self.budget_list.data.ready_value() else {
            return;
        };
        let period_name = self.budget_period_list.name.ready_value();
        let path = self.category_path.ready_value();
        self.budget_group.apply_search(search, expand, |id| {
            let Some(d) = data.get(&id) else { return false };
            search.matches(|area| match area {
                SearchArea::Name => period_name
                    .and_then(|names| names.get(&d.period_id))
                    .map(String::as_str)
                    .into_iter()
                    .collect(),
                SearchArea::Notes => vec![d.notes.as_str()],
                SearchArea::Other => path
                    .and_then(|path| path.get(&d.category_id))
                    .map(String::as_str)
                    .into_iter()
                    .collect(),
                _ => vec![],
            })
        });
    }

    pub fn load_report_group(&mut self, choice: ReportChoice) {
        let (Some(data), Some(order)) = (
            self.report_list.data.ready_value(),
            self.report_list.order.ready_value(),
        ) else {
            return;
        };
        if !self.report_group.state.loading() {
            return;
        }
        let grouped = match choice {
            ReportChoice::All => group_all(order),
            ReportChoice::Active => {
                group_flag(order, ("Active", "Other"), |id| data.get(&id).map(|d| d.active))
            }
            ReportChoice::Group => {
                group_named(order, |id| data.get(&id).map(|d| d.group_name.clone()))
            }
        };
        self.report_group.finish(choice, grouped);
        self.group_loaded(Kind::Report, choice);
    }

    pub fn search_report_group(&mut self, search: &Search, expand: bool) {
        let Some(data) = self.report_list.data.ready_value() else {
            return;
        };
        self.report_group.apply_search(search, expand, |id| {
            let Some(d) = data.get(&id) else { return false };
            search.matches(|area| match area {
                SearchArea::Name => vec![d.name.as_str()],
                SearchArea::Notes => vec![d.description.as_str()],
                SearchArea::Other => vec![
                    d.group_name.as_str(),
                    d.sql_content.as_str(),
                    d.lua_content.as_str(),
                    d.template_content.as_str(),
                ],
                _ => vec![],
            })
        });
    }

    pub fn load_scheduled_group(&mut self, choice: ScheduledChoice) {
        let (
            Some(data),
            Some(order),
            Some(att),
            Some(account_name),
            Some(account_order),
            Some(path),
            Some(tree),
        ) = (
            self.scheduled_list.data.ready_value(),
            self.scheduled_list.order.ready_value(),
            self.scheduled_list.att.ready_value(),
            self.account_list.name.ready_value(),
            self.account_list.order.ready_value(),
            self.category_path.ready_value(),
            self.category_tree.ready_value(),
        ) else {
            return;
        };
        if !self.scheduled_group.state.loading() {
            return;
        }
        let grouped = match choice {
            ScheduledChoice::All => group_all(order),
            ScheduledChoice::Auto => group_enum(order, RepeatAuto::ALL, true, |id| {
                data.get(&id).map(|d| d.repeat_auto)
            }),
            ScheduledChoice::Last => group_flag(order, ("Last", "Other"), |id| {
                data.get(&id).map(|d| d.repeat_num == 1)
            }),
            ScheduledChoice::Status => group_enum(order, TransactionStatus::ALL, true, |id| {
                data.get(&id).map(|d| d.status)
            }),
            ScheduledChoice::Account => group_ordered(order, account_order, account_name, |id| {
                data.get(&id).map(|d| d.account_id)
            }),
            ScheduledChoice::Category => group_ordered(order, &tree.order(), path, |id| {
                data.get(&id).map(|d| d.category_id)
            }),
            ScheduledChoice::Tag => group_flag(order, ("With Tag", "Other"), |id| {
                data.get(&id).map(|d| !d.tag_id.is_empty())
            }),
            ScheduledChoice::Attachment => group_flag(order, ("With Attachment", "Other"), |id| {
                Some(att.get(&id).is_some_and(|a| !a.is_empty()))
            }),
        };
        self.scheduled_group.finish(choice, grouped);
        self.group_loaded(Kind::Scheduled, choice);
    }

    pub fn search_scheduled_group(&mut self, search: &Search, expand: bool) {
        let (Some(data), Some(att)) = (
            self.scheduled_list.data.ready_value(),
            self.scheduled_list.att.ready_value(),
        ) else {
            return;
        };
        let account_name = self.account_list.name.ready_value();
        let payee_name = self.payee_list.name.ready_value();
        let path = self.category_path.ready_value();
        self.scheduled_group.apply_search(search, expand, |id| {
            let Some(d) = data.get(&id) else { return false };
            search.matches(|area| match area {
                SearchArea::Name => payee_name
                    .and_then(|names| names.get(&d.payee_id))
                    .map(String::as_str)
                    .into_iter()
                    .collect(),
                SearchArea::Notes => vec![d.notes.as_str()],
                SearchArea::Attachment => attachment_texts(att, id),
                SearchArea::Other => {
                    let mut texts = vec![d.number.as_str()];
                    texts.extend(
                        account_name
                            .and_then(|names| names.get(&d.account_id))
                            .map(String::as_str),
                    );
                    texts.extend(
                        path.and_then(|path| path.get(&d.category_id))
                            .map(String::as_str),
                    );
                    texts
                }
                SearchArea::Currency => vec![],
            })
        });
    }

    /// Groups the list of `kind` by the choice named `choice`, or by the
    /// current choice when `None`.
    pub fn load_group(&mut self, kind: Kind, choice: Option<&str>) -> Result<(), UnknownVariant> {
        fn pick<C: GroupChoice>(current: C, choice: Option<&str>) -> Result<C, UnknownVariant> {
            choice.map_or(Ok(current), str::parse)
        }
        match kind {
            Kind::Currency => {
                let choice = pick(self.currency_group.choice, choice)?;
                self.load_currency_group(choice);
            }
            Kind::Account => {
                let choice = pick(self.account_group.choice, choice)?;
                self.load_account_group(choice);
            }
            Kind::Asset => {
                let choice = pick(self.asset_group.choice, choice)?;
                self.load_asset_group(choice);
            }
            Kind::Stock => {
                let choice = pick(self.stock_group.choice, choice)?;
                self.load_stock_group(choice);
            }
            Kind::Category => {
                let choice = pick(self.category_group.choice, choice)?;
                self.load_category_group(choice);
            }
            Kind::Payee => {
                let choice = pick(self.payee_group.choice, choice)?;
                self.load_payee_group(choice);
            }
            Kind::Tag => {
                let choice = pick(self.tag_group.choice, choice)?;
                self.load_tag_group(choice);
            }
            Kind::Field => {
                let choice = pick(self.field_group.choice, choice)?;
                self.load_field_group(choice);
            }
            Kind::Attachment => {
                let choice = pick(self.attachment_group.choice, choice)?;
                self.load_attachment_group(choice);
            }
            Kind::BudgetPeriod => {
                let choice = pick(self.budget_period_group.choice, choice)?;
                self.load_budget_period_group(choice);
            }
            Kind::Budget => {
                let choice = pick(self.budget_group.choice, choice)?;
                self.load_budget_group(choice);
            }
            Kind::Report => {
                let choice = pick(self.report_group.choice, choice)?;
                self.load_report_group(choice);
            }
            Kind::Scheduled => {
                let choice = pick(self.scheduled_group.choice, choice)?;
                self.load_scheduled_group(choice);
            }
            Kind::Transaction => {}
        }
        Ok(())
    }

    pub fn unload_group(&mut self, kind: Kind) {
        let unloaded = match kind {
            Kind::Currency => self.currency_group.unload(),
            Kind::Account => self.account_group.unload(),
            Kind::Asset => self.asset_group.unload(),
            Kind::Stock => self.stock_group.unload(),
            Kind::Category => self.category_group.unload(),
            Kind::Payee => self.payee_group.unload(),
            Kind::Tag => self.tag_group.unload(),
            Kind::Field => self.field_group.unload(),
            Kind::Attachment => self.attachment_group.unload(),
            Kind::BudgetPeriod => self.budget_period_group.unload(),
            Kind::Budget => self.budget_group.unload(),
            Kind::Report => self.report_group.unload(),
            Kind::Scheduled => self.scheduled_group.unload(),
            Kind::Transaction => false,
        };
        if unloaded {
            self.notify(Notice::Group(kind, LoadState::Idle));
        }
    }

    pub fn search_group(&mut self, kind: Kind, search: &Search, expand: bool) {
        match kind {
            Kind::Currency => self.search_currency_group(search, expand),
            Kind::Account => self.search_account_group(search, expand),
            Kind::Asset => self.search_asset_group(search, expand),
            Kind::Stock => self.search_stock_group(search, expand),
            Kind::Category => self.search_category_group(search, expand),
            Kind::Payee => self.search_payee_group(search, expand),
            Kind::Tag => self.search_tag_group(search, expand),
            Kind::Field => self.search_field_group(search, expand),
            Kind::Attachment => self.search_attachment_group(search, expand),
            Kind::BudgetPeriod => self.search_budget_period_group(search, expand),
            Kind::Budget => self.search_budget_group(search, expand),
            Kind::Report => self.search_report_group(search, expand),
            Kind::Scheduled => self.search_scheduled_group(search, expand),
            Kind::Transaction => {}
        }
    }

    /// Current choice name and ready entries of the group of `kind`.
    pub fn group(&self, kind: Kind) -> Option<(String, &[GroupEntry])> {
        fn view<C: GroupChoice>(group: &GroupState<C>) -> Option<(String, &[GroupEntry])> {
            group.ready_value().map(|v| (group.choice.to_string(), v))
        }
        match kind {
            Kind::Currency => view(&self.currency_group),
            Kind::Account => view(&self.account_group),
            Kind::Asset => view(&self.asset_group),
            Kind::Stock => view(&self.stock_group),
            Kind::Category => view(&self.category_group),
            Kind::Payee => view(&self.payee_group),
            Kind::Tag => view(&self.tag_group),
            Kind::Field => view(&self.field_group),
            Kind::Attachment => view(&self.attachment_group),
            Kind::BudgetPeriod => view(&self.budget_period_group),
            Kind::Budget => view(&self.budget_group),
            Kind::Report => view(&self.report_group),
            Kind::Scheduled => view(&self.scheduled_group),
            Kind::Transaction => None,
        }
    }

    /// Flips the expansion flag of group `g` of `kind`.
    pub fn toggle_expanded(&mut self, kind: Kind, g: usize) -> bool {
        fn toggle<C: GroupChoice>(group: &mut GroupState<C>, g: usize) -> bool {
            let Some(is_expanded) = group.value.get(g).map(|e| e.is_expanded) else {
                return false;
            };
            group.set_expanded(g, !is_expanded)
        }
        match kind {
            Kind::Currency => toggle(&mut self.currency_group, g),
            Kind::Account => toggle(&mut self.account_group, g),
            Kind::Asset => toggle(&mut self.asset_group, g),
            Kind::Stock => toggle(&mut self.stock_group, g),
            Kind::Category => toggle(&mut self.category_group, g),
            Kind::Payee => toggle(&mut self.payee_group, g),
            Kind::Tag => toggle(&mut self.tag_group, g),
            Kind::Field => toggle(&mut self.field_group, g),
            Kind::Attachment => toggle(&mut self.attachment_group, g),
            Kind::BudgetPeriod => toggle(&mut self.budget_period_group, g),
            Kind::Budget => toggle(&mut self.budget_group, g),
            Kind::Report => toggle(&mut self.report_group, g),
            Kind::Scheduled => toggle(&mut self.scheduled_group, g),
            Kind::Transaction => false,
        }
    }

    /// Names of the choices available for `kind`.
    pub fn group_choices(kind: Kind) -> Vec<&'static str> {
        fn names<C: GroupChoice>() -> Vec<&'static str> {
            C::choices().iter().map(|&c| GroupChoice::as_str(c)).collect()
        }
        match kind {
            Kind::Currency => names::<CurrencyChoice>(),
            Kind::Account => names::<AccountChoice>(),
            Kind::Asset => names::<AssetChoice>(),
            Kind::Stock => names::<StockChoice>(),
            Kind::Category => names::<CategoryChoice>(),
            Kind::Payee => names::<PayeeChoice>(),
            Kind::Tag => names::<TagChoice>(),
            Kind::Field => names::<FieldChoice>(),
            Kind::Attachment => names::<AttachmentChoice>(),
            Kind::BudgetPeriod => names::<BudgetPeriodChoice>(),
            Kind::Budget => names::<BudgetChoice>(),
            Kind::Report => names::<ReportChoice>(),
            Kind::Scheduled => names::<ScheduledChoice>(),
            Kind::Transaction => Vec::new(),
        }
    }
}
