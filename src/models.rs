use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::account::AccountComponents;
use crate::error::IngestError;

/// One ledger line as printed, before any numeric interpretation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTransaction {
    pub account_code: String,
    pub account_name: String,
    /// `DD/MM/YYYY` when recognizable, otherwise the original text.
    pub date: String,
    /// Voucher ("póliza") number.
    pub reference_number: String,
    pub beneficiary: String,
    pub description: String,
    pub payment_order: String,
    pub opening_amount: String,
    pub debit_amount: String,
    pub credit_amount: String,
    pub closing_amount: String,
    pub source_file: String,
}

/// A fully normalized ledger line, as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: Option<i64>,
    pub batch_id: String,
    pub source_file: String,
    pub account_code: String,
    pub account_name: String,
    pub components: AccountComponents,
    pub date_text: String,
    pub date: Option<NaiveDate>,
    pub reference_number: String,
    pub beneficiary: String,
    pub description: String,
    pub payment_order: String,
    pub opening: Decimal,
    pub debit: Decimal,
    pub credit: Decimal,
    pub closing: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Running,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(IngestError::Other(format!("Unknown batch status: {other}"))),
        }
    }
}

/// One ingestion run ("lote").
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionBatch {
    pub batch_id: String,
    pub files: Vec<String>,
    pub user: String,
    pub status: BatchStatus,
    pub record_count: usize,
    pub message: Option<String>,
    pub created_at: Option<String>,
}

impl IngestionBatch {
    pub fn start(batch_id: &str, user: &str, files: Vec<String>) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            files,
            user: user.to_string(),
            status: BatchStatus::Running,
            record_count: 0,
            message: None,
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Read and yielded transactions.
    Loaded,
    /// Opened, but no sheet yielded a transaction.
    Empty,
    /// Could not be opened at all.
    Unreadable,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Empty => "empty",
            Self::Unreadable => "unreadable",
        }
    }
}

impl FromStr for FileStatus {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loaded" => Ok(Self::Loaded),
            "empty" => Ok(Self::Empty),
            "unreadable" => Ok(Self::Unreadable),
            other => Err(IngestError::Other(format!("Unknown file status: {other}"))),
        }
    }
}

/// Provenance of one input file within a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub filename: String,
    pub checksum: String,
    pub status: FileStatus,
    pub record_count: usize,
    pub detail: String,
}
