use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ledger_view::config::{Config, ConfigError};
use ledger_view::core::{
    AttachmentData, BudgetData, BudgetFrequency, BudgetPeriodData, CategoryData, DataId,
    DataRecord, InfoKey, Kind, PayeeData, Record, RefType, RepeatType, ScheduledData, Search,
    SearchArea, TagData, TransactionData, UnknownVariant,
};
use ledger_view::store::{Backend, MemoryStore, StoreError, Table, find_record};
use ledger_view::view_model::{ListAggregate, ValidationError, ViewModel};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ledger-view", about = "Browse and edit a ledger through cached views")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Store snapshot, overriding the configured one
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a store with sample records
    Init,
    /// Show the grouped list of one kind
    List {
        kind: Kind,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long = "area")]
        areas: Vec<SearchArea>,
    },
    /// Show the category hierarchy
    Tree,
    /// Insert or update a record given as JSON
    Put { json: String },
    /// Delete a record
    Delete { kind: Kind, id: DataId },
    /// Read or write a settings value
    Info { key: InfoKey, value: Option<String> },
    /// Show record counts
    Manage,
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Store(StoreError),
    Validation(ValidationError),
    InvalidRecord(String),
    UnknownChoice(UnknownVariant),
    NotFound(Kind, DataId),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "{e}"),
            CliError::Store(e) => write!(f, "store error: {e}"),
            CliError::Validation(e) => write!(f, "{e}"),
            CliError::InvalidRecord(msg) => write!(f, "invalid record: {msg}"),
            CliError::UnknownChoice(e) => write!(f, "{e}"),
            CliError::NotFound(kind, id) => write!(f, "{kind} #{id} not found"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<ValidationError> for CliError {
    fn from(e: ValidationError) -> Self {
        CliError::Validation(e)
    }
}

impl From<UnknownVariant> for CliError {
    fn from(e: UnknownVariant) -> Self {
        CliError::UnknownChoice(e)
    }
}

/// Reads the given config file, or `config.toml` when it exists.
fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => Config::load(path),
        None if Path::new("config.toml").exists() => Config::load("config.toml"),
        None => Ok(Config::default()),
    }
}

fn init_logging(cfg: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut cfg = load_config(cli.config.as_deref())?;
    if let Some(store) = cli.store {
        cfg.store = store;
    }
    init_logging(&cfg);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli.command, cfg))?;
    Ok(())
}

async fn run(command: Commands, cfg: Config) -> Result<(), CliError> {
    if matches!(command, Commands::Init) {
        let store = MemoryStore::new();
        seed(&store)?;
        store.save(&cfg.store)?;
        println!("Sample ledger written to {}", cfg.store.display());
        return Ok(());
    }

    let store = Arc::new(MemoryStore::open(&cfg.store)?);
    let backend: Arc<dyn Backend> = store.clone();
    let mut vm = ViewModel::new(backend, cfg.preference.clone());

    match command {
        Commands::Init => {}
        Commands::List {
            kind,
            group,
            search,
            areas,
        } => {
            vm.load_list(kind).await;
            vm.load_group(kind, group.as_deref())?;
            let mut query = Search::new(search.unwrap_or_default());
            if !areas.is_empty() {
                query = query.with_areas(areas);
            }
            vm.search_group(kind, &query, false);
            print_groups(&vm, kind);
        }
        Commands::Tree => {
            vm.load_category_list().await;
            let (Some(tree), Some(data)) = (
                vm.category_tree().ready_value(),
                vm.category_list().data().ready_value(),
            ) else {
                return Err(StoreError::Unavailable(Kind::Category).into());
            };
            for node in &tree.node {
                let name = data.get(&node.data_id).map_or("", |d| d.name.as_str());
                println!("{}{name}", "  ".repeat(node.level));
            }
        }
        Commands::Put { json } => {
            let mut record: Record =
                serde_json::from_str(&json).map_err(|e| CliError::InvalidRecord(e.to_string()))?;
            vm.load_list(record.kind()).await;
            let old = match record.id().non_void() {
                Some(id) => Some(
                    find_record(vm.backend().as_ref(), record.kind(), id)?
                        .ok_or(CliError::NotFound(record.kind(), id))?,
                ),
                None => None,
            };
            vm.update(&mut record)?;
            vm.reload(old.as_ref(), Some(&record)).await;
            store.save(&cfg.store)?;
            println!("{} #{}", record.kind(), record.id());
        }
        Commands::Delete { kind, id } => {
            vm.load_list(kind).await;
            let record = find_record(vm.backend().as_ref(), kind, id)?
                .ok_or(CliError::NotFound(kind, id))?;
            vm.delete(&record)?;
            vm.reload(Some(&record), None).await;
            store.save(&cfg.store)?;
            println!("Deleted {kind} #{id}");
        }
        Commands::Info { key, value } => {
            if let Some(value) = value {
                let value = Some(value.as_str()).filter(|v| !v.is_empty());
                vm.backend().set_info(key, value)?;
                vm.reload_info(key).await;
                store.save(&cfg.store)?;
            }
            vm.load_info().await;
            println!("{key} = {}", vm.backend().info(key)?.unwrap_or_default());
        }
        Commands::Manage => {
            vm.load_manage().await;
            for (kind, count) in vm.counts() {
                println!("{kind:<12} {count}");
            }
        }
    }
    Ok(())
}

fn names<D: Table>(list: &ListAggregate<D>) -> HashMap<DataId, String> {
    list.data()
        .value()
        .iter()
        .map(|(id, d)| (*id, d.name().to_string()))
        .collect()
}

fn print_groups(vm: &ViewModel, kind: Kind) {
    let labels = match kind {
        Kind::Currency => names(vm.currency_list()),
        Kind::Account => names(vm.account_list()),
        Kind::Asset => names(vm.asset_list()),
        Kind::Stock => names(vm.stock_list()),
        Kind::Category => vm.category_path().value().clone(),
        Kind::Payee => names(vm.payee_list()),
        Kind::Tag => names(vm.tag_list()),
        Kind::Field => names(vm.field_list()),
        Kind::Attachment => names(vm.attachment_list()),
        Kind::BudgetPeriod => names(vm.budget_period_list()),
        Kind::Budget => {
            let path = vm.category_path().value();
            vm.budget_list()
                .data()
                .value()
                .iter()
                .map(|(id, d)| (*id, path.get(&d.category_id).cloned().unwrap_or_default()))
                .collect()
        }
        Kind::Report => names(vm.report_list()),
        Kind::Scheduled => names(vm.scheduled_list()),
        Kind::Transaction => HashMap::new(),
    };
    let Some((choice, groups)) = vm.group(kind) else {
        println!("{kind} list is {:?}", vm.list_state(kind));
        return;
    };
    println!("{kind} by {choice}");
    for group in groups.iter().filter(|g| g.is_visible) {
        let marker = if group.is_expanded { '-' } else { '+' };
        let name = group.name.as_deref().unwrap_or("");
        println!("{marker} {name} ({})", group.data_id.len());
        if group.is_expanded {
            for id in &group.data_id {
                let label = labels.get(id).map_or("", String::as_str);
                println!("    #{id} {label}");
            }
        }
    }
}

/// Writes a small household ledger.
fn seed(store: &MemoryStore) -> Result<(), StoreError> {
    let pref = ledger_view::config::Preference::default();

    let mut usd = pref.new_currency();
    usd.name = "US Dollar".into();
    usd.symbol = "USD".into();
    store.currencies().insert(&mut usd)?;
    let mut eur = pref.new_currency();
    eur.name = "Euro".into();
    eur.symbol = "EUR".into();
    store.currencies().insert(&mut eur)?;
    store.set_info(InfoKey::BaseCurrencyId, Some(&usd.id.to_string()))?;

    let mut checking = pref.new_account();
    checking.name = "Checking".into();
    checking.currency_id = usd.id;
    checking.favorite = true;
    store.accounts().insert(&mut checking)?;
    let mut travel = pref.new_account();
    travel.name = "Travel Cash".into();
    travel.currency_id = eur.id;
    store.accounts().insert(&mut travel)?;

    let mut bills = CategoryData {
        name: "Bills".into(),
        ..CategoryData::default()
    };
    store.categories().insert(&mut bills)?;
    let mut power = CategoryData {
        name: "Electricity".into(),
        parent_id: bills.id,
        ..CategoryData::default()
    };
    store.categories().insert(&mut power)?;
    let mut food = CategoryData {
        name: "Food".into(),
        ..CategoryData::default()
    };
    store.categories().insert(&mut food)?;

    let mut utility = PayeeData {
        name: "City Power".into(),
        category_id: power.id,
        ..PayeeData::default()
    };
    store.payees().insert(&mut utility)?;
    let mut grocer = PayeeData {
        name: "Corner Grocer".into(),
        category_id: food.id,
        ..PayeeData::default()
    };
    store.payees().insert(&mut grocer)?;

    let mut monthly = TagData {
        name: "monthly".into(),
        ..TagData::default()
    };
    store.tags().insert(&mut monthly)?;

    let mut bill = TransactionData {
        account_id: checking.id,
        payee_id: utility.id,
        category_id: power.id,
        tag_id: vec![monthly.id],
        amount: 82.40,
        date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1),
        notes: "March power bill".into(),
        ..TransactionData::default()
    };
    store.transactions().insert(&mut bill)?;

    let mut receipt = AttachmentData {
        ref_type: RefType::Payee,
        ref_id: utility.id,
        description: "Contract".into(),
        filename: "city-power-contract.pdf".into(),
        ..AttachmentData::default()
    };
    store.attachments().insert(&mut receipt)?;

    let mut year = BudgetPeriodData {
        name: "2024".into(),
        ..BudgetPeriodData::default()
    };
    store.budget_periods().insert(&mut year)?;
    for (category_id, flow) in [(power.id, -90.0), (food.id, -400.0)] {
        let mut budget = BudgetData {
            period_id: year.id,
            category_id,
            frequency: BudgetFrequency::Monthly,
            flow,
            ..BudgetData::default()
        };
        store.budgets().insert(&mut budget)?;
    }

    let mut power_bill = ScheduledData {
        account_id: checking.id,
        payee_id: utility.id,
        category_id: power.id,
        amount: 82.40,
        date: chrono::NaiveDate::from_ymd_opt(2024, 4, 1),
        due_date: chrono::NaiveDate::from_ymd_opt(2024, 4, 1),
        repeat_type: RepeatType::Monthly,
        notes: "Power bill".into(),
        ..ScheduledData::default()
    };
    store.scheduled().insert(&mut power_bill)?;

    info!("Sample ledger seeded");
    Ok(())
}
