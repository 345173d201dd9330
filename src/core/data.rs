//! Record types stored in the ledger database.

use std::fmt::Debug;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{DataId, Kind, RefType, named_enum};

named_enum! {
    pub enum CurrencyType: "currency type" {
        Fiat => "Fiat",
        Crypto => "Crypto",
    }
    default Fiat
}

named_enum! {
    pub enum AccountType: "account type" {
        Checking => "Checking",
        CreditCard => "Credit Card",
        Cash => "Cash",
        Loan => "Loan",
        Term => "Term",
        Asset => "Asset",
        Shares => "Shares",
        Investment => "Investment",
    }
    default Checking
}

named_enum! {
    pub enum AccountStatus: "account status" {
        Open => "Open",
        Closed => "Closed",
    }
    default Open
}

named_enum! {
    pub enum AssetType: "asset type" {
        Property => "Property",
        Automobile => "Automobile",
        HouseholdObject => "Household Object",
        Art => "Art",
        Jewellery => "Jewellery",
        Cash => "Cash",
        Other => "Other",
    }
    default Property
}

named_enum! {
    pub enum AssetStatus: "asset status" {
        Open => "Open",
        Closed => "Closed",
    }
    default Open
}

named_enum! {
    pub enum TransactionStatus: "transaction status" {
        Unreconciled => "Unreconciled",
        Reconciled => "Reconciled",
        Void => "Void",
        FollowUp => "Follow Up",
        Duplicate => "Duplicate",
    }
    default Unreconciled
}

named_enum! {
    /// How often a budget amount recurs within its period.
    pub enum BudgetFrequency: "budget frequency" {
        Never => "None",
        Weekly => "Weekly",
        Fortnightly => "Fortnightly",
        Monthly => "Monthly",
        BiMonthly => "Every 2 Months",
        Quarterly => "Quarterly",
        HalfYearly => "Half-Yearly",
        Yearly => "Yearly",
        Daily => "Daily",
    }
    default Never
}

named_enum! {
    pub enum FieldType: "field type" {
        String => "String",
        Integer => "Integer",
        Decimal => "Decimal",
        Boolean => "Boolean",
        Date => "Date",
        Time => "Time",
        SingleChoice => "Single Choice",
        MultiChoice => "Multi Choice",
    }
    default String
}

named_enum! {
    /// Whether a due scheduled transaction is entered without asking.
    pub enum RepeatAuto: "repeat mode" {
        Off => "None",
        Manual => "Manual",
        Silent => "Silent",
    }
    default Off
}

named_enum! {
    pub enum RepeatType: "repeat type" {
        Once => "Once",
        Weekly => "Weekly",
        Fortnightly => "Fortnightly",
        Monthly => "Monthly",
        BiMonthly => "Every 2 Months",
        Quarterly => "Quarterly",
        HalfYearly => "Half-Yearly",
        Yearly => "Yearly",
        FourMonths => "Every 4 Months",
        FourWeeks => "Every 4 Weeks",
        Daily => "Daily",
        InDays => "In (x) Days",
        InMonths => "In (x) Months",
        EveryDays => "Every (x) Days",
        EveryMonths => "Every (x) Months",
        MonthlyLastDay => "Monthly (last day)",
        MonthlyLastBusinessDay => "Monthly (last business day)",
    }
    default Once
}

/// Common surface of every stored record.
pub trait DataRecord: Clone + Debug + PartialEq + Send + Sync + 'static {
    const KIND: Kind;
    /// Owner type used when attachments refer to this record.
    const REF_TYPE: Option<RefType> = None;

    fn id(&self) -> DataId;
    fn set_id(&mut self, id: DataId);
    /// Display name used for uniqueness checks and messages.
    fn name(&self) -> &str;
    /// Key the table is ordered by, ties broken by id.
    fn sort_key(&self) -> String {
        self.name().to_string()
    }
    fn from_record(record: &Record) -> Option<&Self>;
    fn into_record(self) -> Record;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyData {
    pub id: DataId,
    pub name: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: CurrencyType,
    pub scale: i64,
    pub base_conv_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountData {
    pub id: DataId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AccountType,
    pub status: AccountStatus,
    pub favorite: bool,
    pub currency_id: DataId,
    pub num: String,
    pub held_at: String,
    pub website: String,
    pub contact_info: String,
    pub access_info: String,
    pub notes: String,
    pub initial_bal: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetData {
    pub id: DataId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AssetType,
    pub status: AssetStatus,
    pub currency_id: DataId,
    pub value: f64,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockData {
    pub id: DataId,
    pub account_id: DataId,
    pub name: String,
    pub symbol: String,
    pub num_shares: f64,
    pub purchase_price: f64,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryData {
    pub id: DataId,
    pub name: String,
    pub active: bool,
    pub parent_id: DataId,
}

impl Default for CategoryData {
    fn default() -> Self {
        Self {
            id: DataId::VOID,
            name: String::new(),
            active: true,
            parent_id: DataId::VOID,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayeeData {
    pub id: DataId,
    pub name: String,
    pub category_id: DataId,
    pub number: String,
    pub website: String,
    pub notes: String,
    pub active: bool,
    pub pattern: String,
}

impl Default for PayeeData {
    fn default() -> Self {
        Self {
            id: DataId::VOID,
            name: String::new(),
            category_id: DataId::VOID,
            number: String::new(),
            website: String::new(),
            notes: String::new(),
            active: true,
            pattern: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagData {
    pub id: DataId,
    pub name: String,
    pub active: bool,
}

impl Default for TagData {
    fn default() -> Self {
        Self {
            id: DataId::VOID,
            name: String::new(),
            active: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentData {
    pub id: DataId,
    pub ref_type: RefType,
    pub ref_id: DataId,
    pub description: String,
    pub filename: String,
}

/// Value of a custom field on a transaction or scheduled transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldValueData {
    pub field_id: DataId,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionData {
    pub id: DataId,
    pub account_id: DataId,
    pub to_account_id: DataId,
    pub payee_id: DataId,
    pub category_id: DataId,
    pub tag_id: Vec<DataId>,
    pub field_value: Vec<FieldValueData>,
    pub amount: f64,
    pub date: Option<NaiveDate>,
    pub notes: String,
}

/// A recurring transaction, entered when its date comes due.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduledData {
    pub id: DataId,
    pub account_id: DataId,
    pub to_account_id: DataId,
    pub payee_id: DataId,
    pub category_id: DataId,
    pub tag_id: Vec<DataId>,
    pub field_value: Vec<FieldValueData>,
    pub status: TransactionStatus,
    pub amount: f64,
    pub number: String,
    pub notes: String,
    /// Date of the next occurrence.
    pub date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub repeat_auto: RepeatAuto,
    pub repeat_type: RepeatType,
    /// Occurrences left; 1 marks the last one.
    pub repeat_num: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetPeriodData {
    pub id: DataId,
    pub name: String,
}

/// Planned flow for one category within one budget period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetData {
    pub id: DataId,
    pub period_id: DataId,
    pub category_id: DataId,
    pub frequency: BudgetFrequency,
    pub flow: f64,
    pub notes: String,
    pub active: bool,
}

impl Default for BudgetData {
    fn default() -> Self {
        Self {
            id: DataId::VOID,
            period_id: DataId::VOID,
            category_id: DataId::VOID,
            frequency: BudgetFrequency::default(),
            flow: 0.0,
            notes: String::new(),
            active: true,
        }
    }
}

/// Definition of a custom field attached to transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldData {
    pub id: DataId,
    pub ref_type: RefType,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub properties: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportData {
    pub id: DataId,
    pub name: String,
    pub group_name: String,
    pub active: bool,
    pub sql_content: String,
    pub lua_content: String,
    pub template_content: String,
    pub description: String,
}

impl Default for ReportData {
    fn default() -> Self {
        Self {
            id: DataId::VOID,
            name: String::new(),
            group_name: String::new(),
            active: true,
            sql_content: String::new(),
            lua_content: String::new(),
            template_content: String::new(),
            description: String::new(),
        }
    }
}

/// A record of any kind, tagged by its kind name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Record {
    Currency(CurrencyData),
    Account(AccountData),
    Asset(AssetData),
    Stock(StockData),
    Category(CategoryData),
    Payee(PayeeData),
    Tag(TagData),
    Field(FieldData),
    Attachment(AttachmentData),
    BudgetPeriod(BudgetPeriodData),
    Budget(BudgetData),
    Report(ReportData),
    Scheduled(ScheduledData),
    Transaction(TransactionData),
}

macro_rules! data_record {
    ($data:ident, $variant:ident, $ref_type:expr, |$d:ident| $name:expr) => {
        data_record!($data, $variant, $ref_type, |$d| $name, |d| d.name().to_string());
    };
    ($data:ident, $variant:ident, $ref_type:expr, |$d:ident| $name:expr, |$o:ident| $order:expr) => {
        impl DataRecord for $data {
            const KIND: Kind = Kind::$variant;
            const REF_TYPE: Option<RefType> = $ref_type;

            fn id(&self) -> DataId {
                self.id
            }

            fn set_id(&mut self, id: DataId) {
                self.id = id;
            }

            fn name(&self) -> &str {
                let $d = self;
                $name
            }

            fn sort_key(&self) -> String {
                let $o = self;
                $order
            }

            fn from_record(record: &Record) -> Option<&Self> {
                match record {
                    Record::$variant(data) => Some(data),
                    _ => None,
                }
            }

            fn into_record(self) -> Record {
                Record::$variant(self)
            }
        }
    };
}

data_record!(CurrencyData, Currency, None, |d| &d.name);
data_record!(AccountData, Account, Some(RefType::Account), |d| &d.name);
data_record!(AssetData, Asset, Some(RefType::Asset), |d| &d.name);
data_record!(StockData, Stock, Some(RefType::Stock), |d| &d.name);
data_record!(CategoryData, Category, None, |d| &d.name);
data_record!(PayeeData, Payee, Some(RefType::Payee), |d| &d.name);
data_record!(TagData, Tag, None, |d| &d.name);
data_record!(AttachmentData, Attachment, None, |d| &d.filename);
data_record!(TransactionData, Transaction, Some(RefType::Transaction), |d| &d.notes);
data_record!(FieldData, Field, None, |d| &d.description, |d| format!(
    "{}\u{0}{}",
    d.description, d.ref_type
));
data_record!(BudgetPeriodData, BudgetPeriod, None, |d| &d.name);
data_record!(BudgetData, Budget, None, |_d| "", |_d| String::new());
data_record!(ReportData, Report, None, |d| &d.name);
// undated rows sort first
data_record!(ScheduledData, Scheduled, Some(RefType::Scheduled), |d| &d.notes, |d| d
    .date
    .map(|date| date.format("%Y-%m-%d").to_string())
    .unwrap_or_default());

impl Record {
    pub fn kind(&self) -> Kind {
        match self {
            Record::Currency(_) => Kind::Currency,
            Record::Account(_) => Kind::Account,
            Record::Asset(_) => Kind::Asset,
            Record::Stock(_) => Kind::Stock,
            Record::Category(_) => Kind::Category,
            Record::Payee(_) => Kind::Payee,
            Record::Tag(_) => Kind::Tag,
            Record::Field(_) => Kind::Field,
            Record::Attachment(_) => Kind::Attachment,
            Record::BudgetPeriod(_) => Kind::BudgetPeriod,
            Record::Budget(_) => Kind::Budget,
            Record::Report(_) => Kind::Report,
            Record::Scheduled(_) => Kind::Scheduled,
            Record::Transaction(_) => Kind::Transaction,
        }
    }

    pub fn id(&self) -> DataId {
        match self {
            Record::Currency(d) => d.id,
            Record::Account(d) => d.id,
            Record::Asset(d) => d.id,
            Record::Stock(d) => d.id,
            Record::Category(d) => d.id,
            Record::Payee(d) => d.id,
            Record::Tag(d) => d.id,
            Record::Field(d) => d.id,
            Record::Attachment(d) => d.id,
            Record::BudgetPeriod(d) => d.id,
            Record::Budget(d) => d.id,
            Record::Report(d) => d.id,
            Record::Scheduled(d) => d.id,
            Record::Transaction(d) => d.id,
        }
    }
}
