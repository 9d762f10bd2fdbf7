use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;

use crate::account::AccountComponents;
use crate::batches;
use crate::error::{IngestError, Result};
use crate::models::{BatchStatus, FileOutcome, IngestionBatch, Transaction};
use crate::normalize::{from_cents, to_cents};

pub const DB_FILE: &str = "auxiliar.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS batches (
    id INTEGER PRIMARY KEY,
    batch_id TEXT NOT NULL UNIQUE,
    user TEXT,
    files TEXT NOT NULL,
    record_count INTEGER DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'running',
    message TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    finished_at TEXT
);

CREATE TABLE IF NOT EXISTS batch_files (
    id INTEGER PRIMARY KEY,
    batch_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    checksum TEXT,
    status TEXT NOT NULL,
    record_count INTEGER DEFAULT 0,
    detail TEXT,
    FOREIGN KEY (batch_id) REFERENCES batches(batch_id)
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    batch_id TEXT NOT NULL,
    source_file TEXT NOT NULL,
    loaded_at TEXT DEFAULT (datetime('now')),
    account_code TEXT NOT NULL,
    account_name TEXT,
    gender TEXT,
    group_code TEXT,
    heading TEXT,
    account TEXT,
    subaccount TEXT,
    dependency TEXT,
    responsible_unit TEXT,
    cost_center TEXT,
    budget_project TEXT,
    source TEXT,
    subsource TEXT,
    resource_type TEXT,
    budget_line_item TEXT,
    transaction_date TEXT,
    date_text TEXT,
    reference_number TEXT,
    beneficiary TEXT,
    description TEXT,
    payment_order TEXT,
    opening_cents INTEGER NOT NULL DEFAULT 0,
    debit_cents INTEGER NOT NULL DEFAULT 0,
    credit_cents INTEGER NOT NULL DEFAULT 0,
    closing_cents INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (batch_id) REFERENCES batches(batch_id)
);

CREATE INDEX IF NOT EXISTS idx_txn_account_date ON transactions (account_code, transaction_date);
CREATE INDEX IF NOT EXISTS idx_txn_dependency_date ON transactions (dependency, transaction_date);
CREATE INDEX IF NOT EXISTS idx_txn_batch_account ON transactions (batch_id, account_code);
CREATE INDEX IF NOT EXISTS idx_batch_files_checksum ON batch_files (checksum);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Store: what the ingestion pipeline needs from persistence
// ---------------------------------------------------------------------------

pub trait Store {
    fn create_batch(&mut self, batch: &IngestionBatch) -> Result<()>;

    fn record_file_outcomes(&mut self, batch_id: &str, outcomes: &[FileOutcome]) -> Result<()>;

    /// Insert one chunk atomically: either every row lands or none does.
    fn insert_transactions(&mut self, chunk: &[Transaction]) -> Result<usize>;

    fn finish_batch(
        &mut self,
        batch_id: &str,
        status: BatchStatus,
        record_count: usize,
        message: &str,
    ) -> Result<()>;
}

const INSERT_TRANSACTION: &str = "INSERT INTO transactions (
    batch_id, source_file, account_code, account_name,
    gender, group_code, heading, account, subaccount, dependency, responsible_unit,
    cost_center, budget_project, source, subsource, resource_type, budget_line_item,
    transaction_date, date_text, reference_number, beneficiary, description, payment_order,
    opening_cents, debit_cents, credit_cents, closing_cents
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)";

fn cents(t: &Transaction, value: Decimal) -> Result<i64> {
    to_cents(value).ok_or_else(|| IngestError::AmountOutOfRange(t.account_code.clone()))
}

impl Store for Connection {
    fn create_batch(&mut self, batch: &IngestionBatch) -> Result<()> {
        batches::create_batch(self, batch)
    }

    fn record_file_outcomes(&mut self, batch_id: &str, outcomes: &[FileOutcome]) -> Result<()> {
        batches::record_file_outcomes(self, batch_id, outcomes)
    }

    fn insert_transactions(&mut self, chunk: &[Transaction]) -> Result<usize> {
        let tx = self.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_TRANSACTION)?;
            for t in chunk {
                let c = &t.components;
                stmt.execute(rusqlite::params![
                    t.batch_id,
                    t.source_file,
                    t.account_code,
                    t.account_name,
                    c.gender,
                    c.group,
                    c.heading,
                    c.account,
                    c.subaccount,
                    c.dependency,
                    c.responsible_unit,
                    c.cost_center,
                    c.budget_project,
                    c.source,
                    c.subsource,
                    c.resource_type,
                    c.budget_line_item,
                    t.date.map(|d| d.format("%Y-%m-%d").to_string()),
                    t.date_text,
                    t.reference_number,
                    t.beneficiary,
                    t.description,
                    t.payment_order,
                    cents(t, t.opening)?,
                    cents(t, t.debit)?,
                    cents(t, t.credit)?,
                    cents(t, t.closing)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(chunk.len())
    }

    fn finish_batch(
        &mut self,
        batch_id: &str,
        status: BatchStatus,
        record_count: usize,
        message: &str,
    ) -> Result<()> {
        batches::finish_batch(self, batch_id, status, record_count, message)
    }
}

// ---------------------------------------------------------------------------
// Reading transactions back
// ---------------------------------------------------------------------------

pub const TRANSACTION_COLUMNS: &str = "t.id, t.batch_id, t.source_file, t.account_code, t.account_name, \
    t.gender, t.group_code, t.heading, t.account, t.subaccount, t.dependency, t.responsible_unit, \
    t.cost_center, t.budget_project, t.source, t.subsource, t.resource_type, t.budget_line_item, \
    t.transaction_date, t.date_text, t.reference_number, t.beneficiary, t.description, t.payment_order, \
    t.opening_cents, t.debit_cents, t.credit_cents, t.closing_cents";

fn text(row: &Row, idx: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

/// Map a row selected with [`TRANSACTION_COLUMNS`].
pub fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    let date: Option<String> = row.get(18)?;
    Ok(Transaction {
        id: Some(row.get(0)?),
        batch_id: row.get(1)?,
        source_file: row.get(2)?,
        account_code: row.get(3)?,
        account_name: text(row, 4)?,
        components: AccountComponents {
            gender: text(row, 5)?,
            group: text(row, 6)?,
            heading: text(row, 7)?,
            account: text(row, 8)?,
            subaccount: text(row, 9)?,
            dependency: text(row, 10)?,
            responsible_unit: text(row, 11)?,
            cost_center: text(row, 12)?,
            budget_project: text(row, 13)?,
            source: text(row, 14)?,
            subsource: text(row, 15)?,
            resource_type: text(row, 16)?,
            budget_line_item: text(row, 17)?,
        },
        date: date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        date_text: text(row, 19)?,
        reference_number: text(row, 20)?,
        beneficiary: text(row, 21)?,
        description: text(row, 22)?,
        payment_order: text(row, 23)?,
        opening: from_cents(row.get(24)?),
        debit: from_cents(row.get(25)?),
        credit: from_cents(row.get(26)?),
        closing: from_cents(row.get(27)?),
    })
}
