use std::io::Write;

use chrono::NaiveDate;
use rusqlite::types::ToSql;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::account::AccountField;
use crate::batches::list_batches;
use crate::db::{transaction_from_row, TRANSACTION_COLUMNS};
use crate::error::Result;
use crate::models::{IngestionBatch, Transaction};
use crate::normalize::{from_cents, to_decimal_string};

pub const EXPORT_LIMIT: usize = 100_000;

// ---------------------------------------------------------------------------
// Transaction filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Matches codes starting with this text.
    pub account_prefix: Option<String>,
    pub dependency: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    /// Substring of the voucher number.
    pub reference: Option<String>,
    pub batch_id: Option<String>,
    /// Exact match on decoded account components.
    pub components: Vec<(AccountField, String)>,
    pub account_name: Option<String>,
    pub beneficiary: Option<String>,
    pub description: Option<String>,
    pub payment_order: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl TransactionFilter {
    fn where_clause(&self) -> (String, Vec<String>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();
        let mut push = |clause: &str, value: String| {
            params.push(value);
            clauses.push(clause.replace('?', &format!("?{}", params.len())));
        };

        if let Some(prefix) = &self.account_prefix {
            push("t.account_code LIKE ?", format!("{prefix}%"));
        }
        if let Some(dep) = &self.dependency {
            push("t.dependency = ?", dep.clone());
        }
        if let Some(from) = self.from_date {
            push("t.transaction_date >= ?", from.format("%Y-%m-%d").to_string());
        }
        if let Some(to) = self.to_date {
            push("t.transaction_date <= ?", to.format("%Y-%m-%d").to_string());
        }
        if let Some(reference) = &self.reference {
            push("t.reference_number LIKE ?", format!("%{reference}%"));
        }
        if let Some(batch) = &self.batch_id {
            push("t.batch_id = ?", batch.clone());
        }
        for (field, value) in &self.components {
            push(&format!("t.{} = ?", field.column()), value.clone());
        }
        let text_filters = [
            ("account_name", &self.account_name),
            ("beneficiary", &self.beneficiary),
            ("description", &self.description),
            ("payment_order", &self.payment_order),
        ];
        for (column, value) in text_filters {
            if let Some(value) = value {
                push(&format!("t.{column} LIKE ?"), format!("%{value}%"));
            }
        }

        if clauses.is_empty() {
            (String::new(), params)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), params)
        }
    }
}

fn query_with(
    conn: &Connection,
    filter: &TransactionFilter,
    order: &str,
    limit: Option<usize>,
) -> Result<Vec<Transaction>> {
    let (clause, params) = filter.where_clause();
    // SQLite reads a negative LIMIT as "no limit".
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    let sql = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions t {clause} ORDER BY {order} LIMIT {limit} OFFSET {}",
        filter.offset
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_values: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
    let rows = stmt.query_map(param_values.as_slice(), transaction_from_row)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Newest transactions first.
pub fn query_transactions(conn: &Connection, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
    query_with(conn, filter, "t.transaction_date DESC, t.id DESC", filter.limit)
}

/// Rows matching the filter, ignoring paging.
pub fn count_transactions(conn: &Connection, filter: &TransactionFilter) -> Result<usize> {
    let (clause, params) = filter.where_clause();
    let sql = format!("SELECT COUNT(*) FROM transactions t {clause}");
    let param_values: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
    let count: i64 = conn.query_row(&sql, param_values.as_slice(), |row| row.get(0))?;
    Ok(count.max(0) as usize)
}

/// Distinct non-empty values of one account component, sorted.
pub fn distinct_values(conn: &Connection, field: AccountField) -> Result<Vec<String>> {
    let column = field.column();
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT {column} FROM transactions
         WHERE {column} IS NOT NULL AND {column} != ''
         ORDER BY {column}"
    ))?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

pub struct MonthCount {
    /// `YYYY-MM`
    pub month: String,
    pub count: usize,
}

pub struct DashboardStats {
    pub total_transactions: usize,
    pub total_accounts: usize,
    pub total_dependencies: usize,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
    pub recent_batches: Vec<IngestionBatch>,
    pub by_month: Vec<MonthCount>,
}

pub fn dashboard_stats(conn: &Connection) -> Result<DashboardStats> {
    let (total, accounts, dependencies, debits, credits): (i64, i64, i64, i64, i64) = conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT account_code),
                COUNT(DISTINCT NULLIF(dependency, '')),
                COALESCE(SUM(debit_cents), 0), COALESCE(SUM(credit_cents), 0)
         FROM transactions",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
    )?;

    let mut stmt = conn.prepare(
        "SELECT substr(transaction_date, 1, 7) AS month, COUNT(*) FROM transactions
         WHERE transaction_date IS NOT NULL
         GROUP BY month ORDER BY month",
    )?;
    let by_month = stmt
        .query_map([], |row| {
            let count: i64 = row.get(1)?;
            Ok(MonthCount {
                month: row.get(0)?,
                count: count as usize,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(DashboardStats {
        total_transactions: total as usize,
        total_accounts: accounts as usize,
        total_dependencies: dependencies as usize,
        total_debits: from_cents(debits),
        total_credits: from_cents(credits),
        recent_batches: list_batches(conn, 5)?,
        by_month,
    })
}

// ---------------------------------------------------------------------------
// Account balances
// ---------------------------------------------------------------------------

pub struct AccountBalance {
    pub account_code: String,
    pub account_name: String,
    pub transactions: usize,
    /// Closing balance of the last row loaded for the account.
    pub closing: Decimal,
}

pub fn account_balances(conn: &Connection, batch_id: Option<&str>) -> Result<Vec<AccountBalance>> {
    let scope = if batch_id.is_some() { "WHERE batch_id = ?1" } else { "" };
    let sql = format!(
        "SELECT t.account_code, t.account_name, c.n, t.closing_cents
         FROM transactions t
         JOIN (SELECT account_code, MAX(id) AS last_id, COUNT(*) AS n
               FROM transactions {scope} GROUP BY account_code) c ON t.id = c.last_id
         ORDER BY t.account_code"
    );
    let mut stmt = conn.prepare(&sql)?;
    let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<AccountBalance> {
        let n: i64 = row.get(2)?;
        Ok(AccountBalance {
            account_code: row.get(0)?,
            account_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            transactions: n as usize,
            closing: from_cents(row.get(3)?),
        })
    };
    let rows = match batch_id {
        Some(id) => stmt.query_map([id], map)?.collect::<std::result::Result<Vec<_>, _>>()?,
        None => stmt.query_map([], map)?.collect::<std::result::Result<Vec<_>, _>>()?,
    };
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Distributions
// ---------------------------------------------------------------------------

pub struct DistributionRow {
    /// Component value; empty when the code had none.
    pub value: String,
    pub count: usize,
    pub total_debits: Decimal,
}

pub struct Distributions {
    pub by_gender: Vec<DistributionRow>,
    pub by_resource_type: Vec<DistributionRow>,
}

/// Transaction count and debit total per value of one account component.
pub fn distribution(conn: &Connection, field: AccountField) -> Result<Vec<DistributionRow>> {
    let column = field.column();
    let mut stmt = conn.prepare(&format!(
        "SELECT COALESCE({column}, ''), COUNT(*), COALESCE(SUM(debit_cents), 0)
         FROM transactions GROUP BY 1 ORDER BY 1"
    ))?;
    let rows = stmt.query_map([], |row| {
        let count: i64 = row.get(1)?;
        Ok(DistributionRow {
            value: row.get(0)?,
            count: count as usize,
            total_debits: from_cents(row.get(2)?),
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn distributions(conn: &Connection) -> Result<Distributions> {
    Ok(Distributions {
        by_gender: distribution(conn, AccountField::Gender)?,
        by_resource_type: distribution(conn, AccountField::ResourceType)?,
    })
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ExportRow {
    pub batch_id: String,
    pub source_file: String,
    pub account_code: String,
    pub account_name: String,
    pub gender: String,
    pub group: String,
    pub heading: String,
    pub account: String,
    pub subaccount: String,
    pub dependency: String,
    pub responsible_unit: String,
    pub cost_center: String,
    pub budget_project: String,
    pub source: String,
    pub subsource: String,
    pub resource_type: String,
    pub budget_line_item: String,
    pub date: String,
    pub reference_number: String,
    pub beneficiary: String,
    pub description: String,
    pub payment_order: String,
    pub opening: String,
    pub debit: String,
    pub credit: String,
    pub closing: String,
}

impl From<Transaction> for ExportRow {
    fn from(t: Transaction) -> Self {
        let c = t.components;
        Self {
            batch_id: t.batch_id,
            source_file: t.source_file,
            account_code: t.account_code,
            account_name: t.account_name,
            gender: c.gender,
            group: c.group,
            heading: c.heading,
            account: c.account,
            subaccount: c.subaccount,
            dependency: c.dependency,
            responsible_unit: c.responsible_unit,
            cost_center: c.cost_center,
            budget_project: c.budget_project,
            source: c.source,
            subsource: c.subsource,
            resource_type: c.resource_type,
            budget_line_item: c.budget_line_item,
            date: t.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or(t.date_text),
            reference_number: t.reference_number,
            beneficiary: t.beneficiary,
            description: t.description,
            payment_order: t.payment_order,
            opening: to_decimal_string(t.opening),
            debit: to_decimal_string(t.debit),
            credit: to_decimal_string(t.credit),
            closing: to_decimal_string(t.closing),
        }
    }
}

/// Write matching transactions as CSV, oldest first. Returns rows written.
pub fn export_csv<W: Write>(conn: &Connection, filter: &TransactionFilter, out: W) -> Result<usize> {
    let limit = filter.limit.unwrap_or(EXPORT_LIMIT).min(EXPORT_LIMIT);
    let rows = query_with(
        conn,
        filter,
        "t.transaction_date, t.account_code, t.id",
        Some(limit),
    )?;
    let count = rows.len();
    let mut wtr = csv::Writer::from_writer(out);
    for t in rows {
        wtr.serialize(ExportRow::from(t))?;
    }
    wtr.flush()?;
    tracing::info!(rows = count, "exported transactions");
    Ok(count)
}
