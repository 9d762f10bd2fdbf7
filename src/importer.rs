use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::account::{decode, validate, AccountComponents, CodeIssue};
use crate::balance;
use crate::db::Store;
use crate::error::{IngestError, Result};
use crate::grid::{self, RawGrid};
use crate::models::{BatchStatus, FileOutcome, FileStatus, IngestionBatch, RawTransaction, Transaction};
use crate::normalize::{parse_date_dmy, to_amount};
use crate::progress::{scale, ProgressReporter};
use crate::reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestConfig {
    /// Upper bound on files read at the same time.
    pub max_parallel_readers: usize,
    /// Rows per storage transaction.
    pub persistence_batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_parallel_readers: 4,
            persistence_batch_size: 1000,
        }
    }
}

/// An uploaded file: original name plus its raw bytes.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub batch_id: String,
    pub record_count: usize,
    pub loaded_files: Vec<String>,
    pub failed_files: Vec<String>,
    pub invalid_dates: usize,
    /// Amounts too large to store, recorded as zero.
    pub out_of_range_amounts: usize,
}

/// Turns file bytes into sheets. [`grid::open_workbook`] in production.
pub type Opener = fn(Vec<u8>) -> Result<Vec<RawGrid>>;

// ---------------------------------------------------------------------------
// Per-file reads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FileRead {
    pub outcome: FileOutcome,
    pub transactions: Vec<RawTransaction>,
}

pub fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Read every sheet of one file and concatenate the results in sheet order.
pub fn read_grids(name: &str, checksum: String, grids: &[RawGrid]) -> FileRead {
    let mut transactions = Vec::new();
    let mut failures = Vec::new();
    for grid in grids {
        let sheet = reader::read(grid, name);
        let d = &sheet.diagnostics;
        tracing::debug!(
            file = %name,
            sheet = %grid.name,
            header_row = ?d.header_row,
            data_start = ?d.data_start,
            sections = d.sections,
            rejected = d.rejected_rows,
            records = sheet.transactions.len(),
            "sheet read"
        );
        if let Some(failure) = &sheet.diagnostics.failure {
            failures.push(format!("{}: {failure}", grid.name));
        }
        transactions.extend(sheet.transactions);
    }

    let (status, detail) = if transactions.is_empty() {
        let detail = if failures.is_empty() {
            "workbook has no sheets".to_string()
        } else {
            failures.join("; ")
        };
        tracing::warn!(file = %name, %detail, "no transactions extracted");
        (FileStatus::Empty, detail)
    } else {
        tracing::info!(file = %name, records = transactions.len(), "file read");
        (FileStatus::Loaded, String::new())
    };

    FileRead {
        outcome: FileOutcome {
            filename: name.to_string(),
            checksum,
            status,
            record_count: transactions.len(),
            detail,
        },
        transactions,
    }
}

fn unreadable(name: &str, checksum: String, detail: String) -> FileRead {
    tracing::warn!(file = %name, %detail, "file could not be opened");
    FileRead {
        outcome: FileOutcome {
            filename: name.to_string(),
            checksum,
            status: FileStatus::Unreadable,
            record_count: 0,
            detail,
        },
        transactions: Vec::new(),
    }
}

fn read_file(file: SourceFile, open: Opener) -> FileRead {
    let checksum = compute_checksum(&file.bytes);
    match open(file.bytes) {
        Ok(grids) => read_grids(&file.name, checksum, &grids),
        Err(e) => unreadable(&file.name, checksum, e.to_string()),
    }
}

/// Read all files on a bounded pool of blocking threads. Results come back
/// in submission order whatever order the reads finish in.
async fn read_all(
    files: Vec<SourceFile>,
    workers: usize,
    open: Opener,
    progress: &mut ProgressReporter,
) -> Result<Vec<FileRead>> {
    let total = files.len();
    let semaphore = Arc::new(Semaphore::new(workers.min(total).max(1)));
    let mut set = JoinSet::new();

    for (idx, file) in files.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let name = file.name.clone();
            let read = match semaphore.acquire_owned().await {
                Ok(permit) => {
                    let task = tokio::task::spawn_blocking(move || {
                        let _permit = permit;
                        read_file(file, open)
                    });
                    match task.await {
                        Ok(read) => read,
                        Err(e) => unreadable(&name, String::new(), format!("reader crashed: {e}")),
                    }
                }
                Err(e) => unreadable(&name, String::new(), e.to_string()),
            };
            (idx, read)
        });
    }

    let mut slots: Vec<Option<FileRead>> = vec![None; total];
    let mut done = 0;
    while let Some(joined) = set.join_next().await {
        let (idx, read) = joined?;
        done += 1;
        progress.report(
            scale(5, 30, done, total),
            format!("Read {} ({done}/{total})", read.outcome.filename),
        );
        slots[idx] = Some(read);
    }
    Ok(slots.into_iter().flatten().collect())
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// A ledger line with its account code split into components.
struct DecodedLine {
    raw: RawTransaction,
    components: AccountComponents,
}

fn decode_lines(raw: Vec<RawTransaction>) -> Vec<DecodedLine> {
    raw.into_iter()
        .map(|raw| DecodedLine {
            components: decode(&raw.account_code),
            raw,
        })
        .collect()
}

/// Parse one amount column; amounts too large to store as cents become zero
/// and are counted.
fn amount(raw: &str, line: &RawTransaction, column: &str, out_of_range: &mut usize) -> Decimal {
    to_amount(raw).unwrap_or_else(|| {
        *out_of_range += 1;
        tracing::warn!(
            file = %line.source_file,
            account = %line.account_code,
            date = %line.date,
            column,
            value = %raw.trim(),
            "amount out of range, stored as zero"
        );
        Decimal::ZERO
    })
}

fn to_transaction(line: DecodedLine, batch_id: &str, out_of_range: &mut usize) -> Transaction {
    let raw = &line.raw;
    let opening = amount(&raw.opening_amount, raw, "opening", out_of_range);
    let debit = amount(&raw.debit_amount, raw, "debit", out_of_range);
    let credit = amount(&raw.credit_amount, raw, "credit", out_of_range);
    let closing = amount(&raw.closing_amount, raw, "closing", out_of_range);
    let raw = line.raw;
    Transaction {
        id: None,
        batch_id: batch_id.to_string(),
        source_file: raw.source_file,
        components: line.components,
        account_code: raw.account_code,
        account_name: raw.account_name,
        date: None,
        date_text: raw.date,
        reference_number: raw.reference_number,
        beneficiary: raw.beneficiary,
        description: raw.description,
        payment_order: raw.payment_order,
        opening,
        debit,
        credit,
        closing,
    }
}

fn warn_on_codes(raw: &[RawTransaction]) {
    let mut seen = HashSet::new();
    for r in raw {
        if !seen.insert(r.account_code.as_str()) {
            continue;
        }
        match validate(&r.account_code) {
            Some(CodeIssue::TooLong(n)) => {
                tracing::warn!(code = %r.account_code, significant = n, "account code truncated")
            }
            Some(CodeIssue::Empty) => tracing::warn!(file = %r.source_file, "empty account code"),
            None => {}
        }
    }
}

// ---------------------------------------------------------------------------
// process
// ---------------------------------------------------------------------------

/// Ingest a set of ledger workbooks as one batch.
pub async fn process<S: Store>(
    store: &mut S,
    files: Vec<SourceFile>,
    user: &str,
    config: &IngestConfig,
    progress: &mut ProgressReporter,
) -> Result<IngestSummary> {
    process_with(store, files, user, config, progress, grid::open_workbook).await
}

/// Records persisted so far, for the failure message.
#[derive(Debug, Default)]
struct Saved {
    count: usize,
    total: usize,
}

/// Like [`process`], with the workbook opener supplied by the caller.
///
/// Once the batch row exists every error path finalizes it as failed, so a
/// batch never stays `running` after this returns.
pub async fn process_with<S: Store>(
    store: &mut S,
    files: Vec<SourceFile>,
    user: &str,
    config: &IngestConfig,
    progress: &mut ProgressReporter,
    open: Opener,
) -> Result<IngestSummary> {
    let batch_id = Uuid::new_v4().to_string();
    let file_count = files.len();
    let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
    store.create_batch(&IngestionBatch::start(&batch_id, user, names))?;
    progress.report(5, format!("Batch {batch_id} started with {file_count} file(s)"));

    let mut saved = Saved::default();
    let result = run_batch(store, &batch_id, files, config, progress, open, &mut saved).await;
    if let Err(err) = &result {
        let message = if saved.total > 0 {
            format!("Failed after saving {} of {} records: {err}", saved.count, saved.total)
        } else {
            err.to_string()
        };
        tracing::error!(batch = %batch_id, "{message}");
        if let Err(finish_err) = store.finish_batch(&batch_id, BatchStatus::Failed, saved.count, &message) {
            tracing::error!(batch = %batch_id, error = %finish_err, "could not mark batch as failed");
        }
    }
    result
}

async fn run_batch<S: Store>(
    store: &mut S,
    batch_id: &str,
    files: Vec<SourceFile>,
    config: &IngestConfig,
    progress: &mut ProgressReporter,
    open: Opener,
    saved: &mut Saved,
) -> Result<IngestSummary> {
    let reads = read_all(files, config.max_parallel_readers, open, progress).await?;
    let outcomes: Vec<FileOutcome> = reads.iter().map(|r| r.outcome.clone()).collect();
    store.record_file_outcomes(batch_id, &outcomes)?;

    let (loaded, failed): (Vec<&FileOutcome>, Vec<&FileOutcome>) =
        outcomes.iter().partition(|o| o.status == FileStatus::Loaded);
    let loaded_files: Vec<String> = loaded.iter().map(|o| o.filename.clone()).collect();
    let failed_files: Vec<String> = failed.iter().map(|o| o.filename.clone()).collect();

    if loaded_files.is_empty() {
        return Err(IngestError::NoFilesProcessed {
            failed: failed_files,
        });
    }

    let raw: Vec<RawTransaction> = reads.into_iter().flat_map(|r| r.transactions).collect();
    progress.report(30, format!("Merged {} records from {} file(s)", raw.len(), loaded_files.len()));

    warn_on_codes(&raw);
    let lines = decode_lines(raw);
    progress.report(40, "Decoded account codes");

    let mut out_of_range_amounts = 0;
    let mut records: Vec<Transaction> = lines
        .into_iter()
        .map(|line| to_transaction(line, batch_id, &mut out_of_range_amounts))
        .collect();
    progress.report(50, "Normalized amounts");

    let accounts = balance::apply(&mut records)?;
    progress.report(65, format!("Computed running balances for {accounts} account(s)"));

    let mut invalid_dates = 0;
    for record in records.iter_mut() {
        record.date = parse_date_dmy(&record.date_text);
        if record.date.is_none() {
            invalid_dates += 1;
        }
    }
    if invalid_dates > 0 {
        tracing::warn!(batch = %batch_id, invalid_dates, "dates could not be parsed");
    }
    progress.report(75, "Parsed dates");

    saved.total = records.len();
    let chunk_size = config.persistence_batch_size.max(1);
    for chunk in records.chunks(chunk_size) {
        saved.count += store.insert_transactions(chunk)?;
        tracing::debug!(batch = %batch_id, saved = saved.count, total = saved.total, "chunk committed");
        progress.report(
            scale(80, 95, saved.count, saved.total),
            format!("Saved {}/{} records", saved.count, saved.total),
        );
    }

    let total = saved.total;
    let mut message = format!("Processed {total} records from {} file(s)", loaded_files.len());
    if !failed_files.is_empty() {
        message.push_str(&format!("; failed files: {}", failed_files.join(", ")));
    }
    if out_of_range_amounts > 0 {
        message.push_str(&format!("; {out_of_range_amounts} amount(s) out of range stored as zero"));
    }
    store.finish_batch(batch_id, BatchStatus::Completed, total, &message)?;
    progress.report(100, message);

    Ok(IngestSummary {
        batch_id: batch_id.to_string(),
        record_count: total,
        loaded_files,
        failed_files,
        invalid_dates,
        out_of_range_amounts,
    })
}
