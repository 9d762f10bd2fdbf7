use thiserror::Error;

use crate::classifier::{parse_row, Section};
use crate::grid::RawGrid;
use crate::models::RawTransaction;
use crate::normalize::normalize_text;

/// Only this many leading rows are searched for the column header.
pub const HEADER_SCAN_ROWS: usize = 20;

const ACCOUNT_MARKER: &str = "CUENTA CONTABLE:";
const OPENING_MARKER: &str = "SALDO INICIAL CUENTA";
const TOTAL_MARKERS: &[&str] = &["saldo acumulado", "saldo final cuenta"];
const SUBHEADER_MARKERS: &[&str] = &["beneficiario", "descripcion", "no."];

/// Why a sheet produced no transactions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadFailure {
    #[error("sheet has only {0} row(s)")]
    TooFewRows(usize),
    #[error("no header row within the first {HEADER_SCAN_ROWS} rows")]
    HeaderNotFound,
    #[error("no transaction rows found")]
    NoTransactions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub header_row: Option<usize>,
    pub data_start: Option<usize>,
    /// Number of "CUENTA CONTABLE:" sections opened.
    pub sections: usize,
    /// Candidate rows inside a section that did not parse as transactions.
    pub rejected_rows: usize,
    pub failure: Option<ReadFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct SheetRead {
    pub transactions: Vec<RawTransaction>,
    pub diagnostics: Diagnostics,
}

impl SheetRead {
    fn failed(mut diagnostics: Diagnostics, failure: ReadFailure) -> Self {
        diagnostics.failure = Some(failure);
        Self {
            transactions: Vec::new(),
            diagnostics,
        }
    }
}

/// Mutable parse state while walking one sheet.
#[derive(Debug, Default)]
struct SectionContext {
    account_code: Option<String>,
    account_name: Option<String>,
    opening_balance: Option<String>,
}

fn row_text(row: &[String]) -> String {
    row.join(" ")
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

/// The first row among the leading rows that names the date column together
/// with the voucher or balance columns.
pub fn detect_header_row(grid: &RawGrid) -> Option<usize> {
    grid.rows().take(HEADER_SCAN_ROWS).position(|row| {
        let text = normalize_text(&row_text(row));
        text.contains("fecha") && (text.contains("poliza") || text.contains("saldo"))
    })
}

/// Split `"CUENTA CONTABLE: <code> - <name>"` into code and name.
pub fn parse_account_line(line: &str) -> (String, String) {
    let Some((_, rest)) = line.split_once(':') else {
        return (String::new(), String::new());
    };
    let rest = rest.trim();
    match rest.split_once(" - ") {
        Some((code, name)) => (code.trim().to_string(), name.trim().to_string()),
        None => (rest.to_string(), String::new()),
    }
}

fn is_amount_like(value: &str) -> bool {
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    value
        .chars()
        .filter(|c| !matches!(c, ',' | '.' | '-'))
        .all(|c| c.is_ascii_digit())
}

/// First numeric-looking cell of a "SALDO INICIAL CUENTA" row.
pub fn extract_opening_balance(row: &[String]) -> Option<String> {
    row.iter()
        .map(|c| c.trim())
        .find(|c| !c.is_empty() && is_amount_like(c))
        .map(str::to_string)
}

/// Walk one sheet of an accounting ledger report and recover its
/// transaction lines.
///
/// The layout interleaves account banners, opening-balance lines, running
/// totals and detail lines with no fixed column count, so each row is
/// classified by its textual markers while the active account section is
/// carried forward. The read never fails: when nothing can be extracted
/// the reason is recorded in the diagnostics.
pub fn read(grid: &RawGrid, source_file: &str) -> SheetRead {
    let mut diagnostics = Diagnostics::default();

    if grid.len() < 2 {
        return SheetRead::failed(diagnostics, ReadFailure::TooFewRows(grid.len()));
    }

    let Some(header_row) = detect_header_row(grid) else {
        return SheetRead::failed(diagnostics, ReadFailure::HeaderNotFound);
    };
    diagnostics.header_row = Some(header_row);

    let mut start = header_row + 1;
    if let Some(next) = grid.row(start) {
        let text = normalize_text(&row_text(next));
        if SUBHEADER_MARKERS.iter().any(|m| text.contains(m)) {
            start += 1;
        }
    }
    diagnostics.data_start = Some(start);

    let mut ctx = SectionContext::default();
    let mut transactions = Vec::new();

    for (idx, row) in grid.rows().enumerate().skip(start) {
        let first = row.first().map(|c| c.trim()).unwrap_or_default();

        if first.to_uppercase().contains(ACCOUNT_MARKER) {
            let (code, name) = parse_account_line(first);
            tracing::debug!(sheet = %grid.name, row = idx, account = %code, "account section");
            ctx.account_code = Some(code);
            ctx.account_name = Some(name);
            ctx.opening_balance = None;
            diagnostics.sections += 1;
            continue;
        }

        let text = row_text(row);
        if ctx.account_code.is_some() && text.to_uppercase().contains(OPENING_MARKER) {
            if let Some(opening) = extract_opening_balance(row) {
                ctx.opening_balance = Some(opening);
            }
            continue;
        }

        if is_blank(row) {
            continue;
        }
        let lower = text.to_lowercase();
        if TOTAL_MARKERS.iter().any(|m| lower.contains(m)) {
            continue;
        }

        let Some(account_code) = ctx.account_code.as_deref() else {
            continue;
        };
        let section = Section {
            account_code,
            account_name: ctx.account_name.as_deref().unwrap_or_default(),
            opening_balance: ctx.opening_balance.as_deref(),
        };
        match parse_row(row, section, source_file) {
            Some(t) => transactions.push(t),
            None => {
                diagnostics.rejected_rows += 1;
                tracing::debug!(sheet = %grid.name, row = idx, "row is not a transaction");
            }
        }
    }

    if transactions.is_empty() {
        return SheetRead::failed(diagnostics, ReadFailure::NoTransactions);
    }
    SheetRead {
        transactions,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &[&str] = &["Fecha", "Poliza", "Beneficiario", "Descripcion", "Saldo Inicial", "Cargos", "Abonos", "Saldo Final"];

    fn ledger(body: &[&[&str]]) -> RawGrid {
        let mut rows: Vec<&[&str]> = Vec::new();
        rows.push(&["AUXILIAR CONTABLE"]);
        rows.push(&["Del 01/01/2024 al 31/01/2024"]);
        rows.push(HEADER);
        rows.extend_from_slice(body);
        RawGrid::from_rows("Hoja1", &rows)
    }

    #[test]
    fn test_detect_header_row() {
        let grid = ledger(&[]);
        assert_eq!(detect_header_row(&grid), Some(2));

        let grid = RawGrid::from_rows("h", &[&["x"], &["FECHA", "PÓLIZA"]]);
        assert_eq!(detect_header_row(&grid), Some(1));

        let grid = RawGrid::from_rows("h", &[&["Fecha", "Concepto"], &["Fecha", "Saldo"]]);
        assert_eq!(detect_header_row(&grid), Some(1));
    }

    #[test]
    fn test_header_beyond_scan_window_is_a_soft_failure() {
        let noise: &[&str] = &["noise"];
        let mut rows: Vec<&[&str]> = vec![noise; 20];
        rows.push(HEADER);
        rows.push(&["CUENTA CONTABLE: 1112 - Caja"]);
        rows.push(&["15/01/2024", "D-1", "x", "1.00", "2.00"]);
        let grid = RawGrid::from_rows("h", &rows);
        let sheet = read(&grid, "a.xlsx");
        assert!(sheet.transactions.is_empty());
        assert_eq!(sheet.diagnostics.failure, Some(ReadFailure::HeaderNotFound));
    }

    #[test]
    fn test_too_few_rows() {
        let grid = RawGrid::from_rows("h", &[HEADER]);
        let sheet = read(&grid, "a.xlsx");
        assert_eq!(sheet.diagnostics.failure, Some(ReadFailure::TooFewRows(1)));
    }

    #[test]
    fn test_parse_account_line() {
        assert_eq!(
            parse_account_line("CUENTA CONTABLE: 1112001 - Caja General"),
            ("1112001".to_string(), "Caja General".to_string())
        );
        assert_eq!(
            parse_account_line("Cuenta Contable: 1112001"),
            ("1112001".to_string(), String::new())
        );
        assert_eq!(
            parse_account_line("CUENTA CONTABLE: 1-2 - Bancos - Cuenta 2"),
            ("1-2".to_string(), "Bancos - Cuenta 2".to_string())
        );
    }

    #[test]
    fn test_extract_opening_balance() {
        let row: Vec<String> = ["SALDO INICIAL CUENTA", "", "1,000.00", "5"].iter().map(|s| s.to_string()).collect();
        assert_eq!(extract_opening_balance(&row).as_deref(), Some("1,000.00"));
        let row: Vec<String> = ["SALDO INICIAL CUENTA", "-"].iter().map(|s| s.to_string()).collect();
        assert_eq!(extract_opening_balance(&row), None);
    }

    #[test]
    fn test_read_single_section() {
        let grid = ledger(&[
            &["CUENTA CONTABLE: 1112001 - Caja"],
            &["SALDO INICIAL CUENTA", "", "", "", "1,000.00"],
            &["15/01/2024", "D-1", "ACME", "Compra", "500.00", "0.00", "1,500.00"],
            &["16/01/2024", "E-2", "Retiro", "200.00", "1,300.00"],
            &["", "SALDO FINAL CUENTA", "", "", "", "500.00", "200.00", "1,300.00"],
        ]);
        let sheet = read(&grid, "caja.xlsx");
        assert_eq!(sheet.diagnostics.failure, None);
        assert_eq!(sheet.diagnostics.sections, 1);
        assert_eq!(sheet.transactions.len(), 2);

        let first = &sheet.transactions[0];
        assert_eq!(first.account_code, "1112001");
        assert_eq!(first.account_name, "Caja");
        assert_eq!(first.opening_amount, "1,000.00");
        assert_eq!(first.debit_amount, "500.00");
        assert_eq!(first.beneficiary, "ACME");

        let second = &sheet.transactions[1];
        assert_eq!(second.debit_amount, "");
        assert_eq!(second.credit_amount, "200.00");
        assert_eq!(second.date, "16/01/2024");
    }

    #[test]
    fn test_read_skips_subheader_row() {
        let grid = RawGrid::from_rows(
            "h",
            &[
                &["Fecha", "Saldo"],
                &["No.", "Beneficiario"],
                &["CUENTA CONTABLE: 1 - A"],
                &["15/01/2024", "", "x", "1.00", "2.00"],
            ],
        );
        let sheet = read(&grid, "a");
        assert_eq!(sheet.diagnostics.data_start, Some(2));
        assert_eq!(sheet.transactions.len(), 1);
    }

    #[test]
    fn test_read_drops_rows_before_first_account() {
        let grid = ledger(&[
            &["14/01/2024", "X-0", "orphan", "9.00", "9.00"],
            &["CUENTA CONTABLE: 2 - B"],
            &["15/01/2024", "X-1", "kept", "1.00", "2.00"],
        ]);
        let sheet = read(&grid, "a");
        assert_eq!(sheet.transactions.len(), 1);
        assert_eq!(sheet.transactions[0].description, "kept");
    }

    #[test]
    fn test_new_section_resets_opening_balance() {
        let grid = ledger(&[
            &["CUENTA CONTABLE: 1 - A"],
            &["SALDO INICIAL CUENTA", "100.00"],
            &["15/01/2024", "", "a", "5.00", "95.00"],
            &["CUENTA CONTABLE: 2 - B"],
            &["15/01/2024", "", "b", "5.00", "95.00"],
        ]);
        let sheet = read(&grid, "a");
        assert_eq!(sheet.diagnostics.sections, 2);
        assert_eq!(sheet.transactions[0].opening_amount, "100.00");
        assert_eq!(sheet.transactions[1].account_code, "2");
        assert_eq!(sheet.transactions[1].opening_amount, "");
    }

    #[test]
    fn test_opening_line_without_amount_keeps_previous_balance() {
        let grid = ledger(&[
            &["CUENTA CONTABLE: 1 - A"],
            &["SALDO INICIAL CUENTA", "100.00"],
            &["SALDO INICIAL CUENTA", "sin saldo"],
            &["15/01/2024", "", "a", "5.00", "95.00"],
        ]);
        let sheet = read(&grid, "a");
        assert_eq!(sheet.transactions.len(), 1);
        assert_eq!(sheet.transactions[0].opening_amount, "100.00");
    }

    #[test]
    fn test_running_total_rows_are_skipped() {
        let grid = ledger(&[
            &["CUENTA CONTABLE: 1 - A"],
            &["15/01/2024", "", "a", "5.00", "95.00"],
            &["15-01-2024", "Saldo acumulado", "", "5.00", "95.00"],
        ]);
        let sheet = read(&grid, "a");
        assert_eq!(sheet.transactions.len(), 1);
        assert_eq!(sheet.diagnostics.rejected_rows, 0);
    }

    #[test]
    fn test_no_transactions_is_a_soft_failure() {
        let grid = ledger(&[&["CUENTA CONTABLE: 1 - A"], &["Sin movimientos"]]);
        let sheet = read(&grid, "a");
        assert!(sheet.transactions.is_empty());
        assert_eq!(sheet.diagnostics.failure, Some(ReadFailure::NoTransactions));
        assert_eq!(sheet.diagnostics.rejected_rows, 1);
    }
}
