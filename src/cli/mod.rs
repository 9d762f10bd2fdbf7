pub mod batches;
pub mod config;
pub mod decode;
pub mod export;
pub mod ingest;
pub mod init;
pub mod report;
pub mod status;
pub mod transactions;

use std::str::FromStr;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;

use crate::account::AccountField;
use crate::db::{get_connection, DB_FILE};
use crate::error::{IngestError, Result};
use crate::reports::TransactionFilter;
use crate::settings::get_data_dir;

/// Open the configured database, which must already exist.
pub(crate) fn open_db() -> Result<Connection> {
    let db_path = get_data_dir().join(DB_FILE);
    if !db_path.exists() {
        return Err(IngestError::Settings(format!(
            "Database not found at {}. Run `auxiliar init` to set up.",
            db_path.display()
        )));
    }
    get_connection(&db_path)
}

#[derive(Parser)]
#[command(
    name = "auxiliar",
    version,
    about = "Load accounting ledger reports (auxiliares contables) into a queryable database."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for auxiliar data (default: ~/Documents/auxiliar)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Load one or more ledger workbooks as a single batch.
    Ingest {
        /// Workbook files (.xlsx, .xls, .xlsb, .ods)
        #[arg(required = true)]
        files: Vec<String>,
        /// User recorded on the batch
        #[arg(long)]
        user: Option<String>,
        /// Files read in parallel
        #[arg(long)]
        workers: Option<usize>,
        /// Rows per database transaction
        #[arg(long = "batch-size")]
        batch_size: Option<usize>,
    },
    /// Inspect and purge ingestion batches.
    Batches {
        #[command(subcommand)]
        command: BatchesCommands,
    },
    /// Query loaded transactions.
    Transactions {
        #[command(flatten)]
        filters: FilterArgs,
        /// Rows per page
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Summary reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Export transactions to CSV.
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        /// Output path (default: <data_dir>/exports/auxiliar-YYYYMMDD-HHMMSS.csv)
        #[arg(long)]
        output: Option<String>,
        /// Maximum rows to export (capped at 100000)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Split an account code into its budgetary components.
    Decode {
        /// Account code, separators allowed (e.g. 1.1.1.2.0-01-...)
        code: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show current database and summary statistics.
    Status,
    /// Show or change settings.
    Config {
        /// Default number of files read in parallel
        #[arg(long)]
        workers: Option<usize>,
        /// Default rows per database transaction
        #[arg(long = "batch-size")]
        batch_size: Option<usize>,
        /// Default user recorded on batches
        #[arg(long)]
        user: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum BatchesCommands {
    /// List recent batches.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one batch with its file outcomes.
    Show {
        /// Batch id (full uuid)
        batch_id: String,
    },
    /// Delete a batch and its transactions, or every batch with --all.
    Purge {
        /// Batch id (full uuid)
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        batch_id: Option<String>,
        /// Delete every batch and transaction
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Totals, recent batches and transactions per month.
    Stats,
    /// Distinct dependency codes.
    Dependencies,
    /// Distinct values of one account component.
    Values {
        /// Component name, e.g. gender, cost_center, budget_line_item
        field: String,
    },
    /// Transactions and debits by gender and by resource type.
    Distributions,
    /// Last closing balance per account.
    Balances {
        /// Limit to one batch
        #[arg(long)]
        batch: Option<String>,
    },
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Account code prefix
    #[arg(long)]
    pub account: Option<String>,
    /// Dependency code
    #[arg(long)]
    pub dependency: Option<String>,
    /// Earliest transaction date: YYYY-MM-DD
    #[arg(long = "from")]
    pub from_date: Option<String>,
    /// Latest transaction date: YYYY-MM-DD
    #[arg(long = "to")]
    pub to_date: Option<String>,
    /// Voucher number substring
    #[arg(long)]
    pub reference: Option<String>,
    /// Batch id
    #[arg(long)]
    pub batch: Option<String>,
    /// Account component, e.g. budget_line_item=5111 (repeatable)
    #[arg(long = "component", value_name = "FIELD=VALUE")]
    pub components: Vec<String>,
    /// Account name substring
    #[arg(long = "account-name")]
    pub account_name: Option<String>,
    /// Beneficiary substring
    #[arg(long)]
    pub beneficiary: Option<String>,
    /// Description substring
    #[arg(long)]
    pub description: Option<String>,
    /// Payment order substring
    #[arg(long = "payment-order")]
    pub payment_order: Option<String>,
}

fn parse_iso_date(flag: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| IngestError::Other(format!("{flag} expects YYYY-MM-DD, got '{raw}'")))
}

impl FilterArgs {
    pub fn to_filter(&self) -> Result<TransactionFilter> {
        let mut components = Vec::new();
        for raw in &self.components {
            let (field, value) = raw
                .split_once('=')
                .ok_or_else(|| IngestError::Other(format!("--component expects FIELD=VALUE, got '{raw}'")))?;
            components.push((AccountField::from_str(field)?, value.trim().to_string()));
        }
        Ok(TransactionFilter {
            account_prefix: self.account.clone(),
            dependency: self.dependency.clone(),
            from_date: self.from_date.as_deref().map(|d| parse_iso_date("--from", d)).transpose()?,
            to_date: self.to_date.as_deref().map(|d| parse_iso_date("--to", d)).transpose()?,
            reference: self.reference.clone(),
            batch_id: self.batch.clone(),
            components,
            account_name: self.account_name.clone(),
            beneficiary: self.beneficiary.clone(),
            description: self.description.clone(),
            payment_order: self.payment_order.clone(),
            limit: None,
            offset: 0,
        })
    }
}
