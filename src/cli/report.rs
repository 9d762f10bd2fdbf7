use std::str::FromStr;

use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::account::AccountField;
use crate::error::Result;
use crate::fmt::{money, short_id};
use crate::reports::{self, DistributionRow};

pub fn stats() -> Result<()> {
    let conn = super::open_db()?;
    let stats = reports::dashboard_stats(&conn)?;

    println!("Transactions:  {}", stats.total_transactions);
    println!("Accounts:      {}", stats.total_accounts);
    println!("Dependencies:  {}", stats.total_dependencies);
    println!("Debits:        {}", money(stats.total_debits));
    println!("Credits:       {}", money(stats.total_credits));

    if !stats.by_month.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Month", "Transactions"]);
        for m in &stats.by_month {
            table.add_row(vec![
                Cell::new(&m.month),
                Cell::new(m.count).set_alignment(CellAlignment::Right),
            ]);
        }
        println!();
        println!("{}", "By month".bold());
        println!("{table}");
    }

    if !stats.recent_batches.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Batch", "Created", "Status", "Records"]);
        for b in &stats.recent_batches {
            table.add_row(vec![
                Cell::new(short_id(&b.batch_id)),
                Cell::new(b.created_at.as_deref().unwrap_or("")),
                Cell::new(b.status),
                Cell::new(b.record_count).set_alignment(CellAlignment::Right),
            ]);
        }
        println!();
        println!("{}", "Recent batches".bold());
        println!("{table}");
    }
    Ok(())
}

pub fn values(field: &str) -> Result<()> {
    let field = AccountField::from_str(field)?;
    let conn = super::open_db()?;
    let values = reports::distinct_values(&conn, field)?;
    if values.is_empty() {
        println!("No values found for {}.", field.key());
    }
    for v in values {
        println!("{v}");
    }
    Ok(())
}

fn distribution_table(title: &str, rows: &[DistributionRow]) {
    let mut table = Table::new();
    table.set_header(vec![title, "Transactions", "Debits"]);
    for r in rows {
        let value = if r.value.is_empty() { "(none)" } else { r.value.as_str() };
        table.add_row(vec![
            Cell::new(value),
            Cell::new(r.count).set_alignment(CellAlignment::Right),
            Cell::new(money(r.total_debits)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{}", title.bold());
    println!("{table}");
}

pub fn distributions() -> Result<()> {
    let conn = super::open_db()?;
    let d = reports::distributions(&conn)?;
    if d.by_gender.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }
    distribution_table("Gender", &d.by_gender);
    println!();
    distribution_table("Resource type", &d.by_resource_type);
    Ok(())
}

pub fn balances(batch: Option<&str>) -> Result<()> {
    let conn = super::open_db()?;
    let rows = reports::account_balances(&conn, batch)?;
    if rows.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Account", "Name", "Transactions", "Closing balance"]);
    for r in &rows {
        let closing = money(r.closing);
        let closing = if r.closing.is_sign_negative() && !r.closing.is_zero() {
            Cell::new(closing.red())
        } else {
            Cell::new(closing)
        };
        table.add_row(vec![
            Cell::new(&r.account_code),
            Cell::new(&r.account_name),
            Cell::new(r.transactions).set_alignment(CellAlignment::Right),
            closing.set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
    Ok(())
}
