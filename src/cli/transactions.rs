use comfy_table::{Cell, CellAlignment, Table};

use super::FilterArgs;
use crate::error::Result;
use crate::fmt::money;
use crate::reports::{count_transactions, query_transactions};

pub fn run(filters: &FilterArgs, limit: usize, page: usize) -> Result<()> {
    let conn = super::open_db()?;
    let mut filter = filters.to_filter()?;
    let limit = limit.max(1);
    filter.limit = Some(limit);
    filter.offset = (page.max(1) - 1) * limit;

    let total = count_transactions(&conn, &filter)?;
    let rows = query_transactions(&conn, &filter)?;
    if rows.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Date", "Account", "Voucher", "Beneficiary", "Description", "Debit", "Credit", "Balance",
    ]);
    for t in &rows {
        let date = t
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| t.date_text.clone());
        table.add_row(vec![
            Cell::new(date),
            Cell::new(&t.account_code),
            Cell::new(&t.reference_number),
            Cell::new(&t.beneficiary),
            Cell::new(&t.description),
            Cell::new(money(t.debit)).set_alignment(CellAlignment::Right),
            Cell::new(money(t.credit)).set_alignment(CellAlignment::Right),
            Cell::new(money(t.closing)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");

    let pages = total.div_ceil(limit);
    println!("{} of {total} transactions (page {} of {pages})", rows.len(), page.max(1));
    Ok(())
}
