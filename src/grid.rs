use std::io::Cursor;

use calamine::{Data, Range, Reader};

use crate::error::Result;
use crate::normalize::excel_serial_to_datetime;

/// A sheet flattened to text cells. Row and column 0 are spreadsheet row 1
/// and column A, whatever the used range of the sheet is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGrid {
    pub name: String,
    rows: Vec<Vec<String>>,
}

impl RawGrid {
    pub fn new(name: &str, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.to_string(),
            rows,
        }
    }

    /// Build a grid from string literals; empty strings are blank cells.
    #[cfg(test)]
    pub fn from_rows(name: &str, rows: &[&[&str]]) -> Self {
        Self::new(
            name,
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    pub fn from_range(name: &str, range: &Range<Data>) -> Self {
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));
        let mut rows: Vec<Vec<String>> = vec![Vec::new(); row_offset];
        for row in range.rows() {
            let mut cells = vec![String::new(); col_offset];
            cells.extend(row.iter().map(cell_text));
            rows.push(cells);
        }
        Self::new(name, rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, idx: usize) -> Option<&[String]> {
        self.rows.get(idx).map(|r| r.as_slice())
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(|r| r.as_slice())
    }
}

/// Render a typed spreadsheet cell the way a text export would show it.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// Open a workbook held in memory and flatten every sheet, in workbook order.
pub fn open_workbook(bytes: Vec<u8>) -> Result<Vec<RawGrid>> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let mut grids = Vec::new();
    for (name, range) in workbook.worksheets() {
        grids.push(RawGrid::from_range(&name, &range));
    }
    Ok(grids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_text_numbers() {
        assert_eq!(cell_text(&Data::Float(1000.0)), "1000");
        assert_eq!(cell_text(&Data::Float(1500.5)), "1500.5");
        assert_eq!(cell_text(&Data::Int(42)), "42");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String(" Caja ".to_string())), " Caja ");
    }

    #[test]
    fn test_from_range_keeps_absolute_positions() {
        let mut range = Range::new((2, 1), (3, 2));
        range.set_value((2, 1), Data::String("Fecha".to_string()));
        range.set_value((3, 2), Data::Float(12.5));
        let grid = RawGrid::from_range("Hoja1", &range);
        assert_eq!(grid.len(), 4);
        assert!(grid.row(0).unwrap().is_empty());
        assert_eq!(grid.row(2).unwrap(), &["", "Fecha", ""]);
        assert_eq!(grid.row(3).unwrap(), &["", "", "12.5"]);
    }

    #[test]
    fn test_typed_cells_read_as_ledger_rows() {
        use calamine::{ExcelDateTime, ExcelDateTimeType};

        let mut range = Range::new((0, 0), (3, 5));
        range.set_value((0, 0), Data::String("Fecha".to_string()));
        range.set_value((0, 1), Data::String("Póliza".to_string()));
        range.set_value((1, 0), Data::String("CUENTA CONTABLE: 5111 - Papeleria".to_string()));
        range.set_value((2, 0), Data::String("SALDO INICIAL CUENTA".to_string()));
        range.set_value((2, 3), Data::Float(20000.0));
        let serial = ExcelDateTime::new(45306.0, ExcelDateTimeType::DateTime, false);
        range.set_value((3, 0), Data::DateTime(serial));
        range.set_value((3, 2), Data::String("Compra".to_string()));
        range.set_value((3, 3), Data::Float(15000.0));
        range.set_value((3, 4), Data::Float(0.0));
        range.set_value((3, 5), Data::Float(35000.0));

        let grid = RawGrid::from_range("Hoja1", &range);
        let sheet = crate::reader::read(&grid, "libro.xlsx");
        assert_eq!(sheet.transactions.len(), 1);
        let t = &sheet.transactions[0];
        assert_eq!(t.date, "15/01/2024");
        assert_eq!(t.opening_amount, "20000");
        assert_eq!(t.debit_amount, "15000");
        assert_eq!(t.credit_amount, "0");
        assert_eq!(t.closing_amount, "35000");
        assert_eq!(t.payment_order, "");
    }

    #[test]
    fn test_open_workbook_reads_xlsx() {
        let bytes = include_bytes!("../tests/fixtures/ledger.xlsx").to_vec();
        let grids = open_workbook(bytes).unwrap();
        assert_eq!(grids.len(), 1);
        let grid = &grids[0];
        assert_eq!(grid.name, "Hoja1");
        assert_eq!(grid.row(5).unwrap()[0], "2024-01-15 00:00:00");
        assert_eq!(grid.row(5).unwrap()[4], "12000");

        let sheet = crate::reader::read(grid, "ledger.xlsx");
        assert_eq!(sheet.diagnostics.header_row, Some(2));
        assert_eq!(sheet.transactions.len(), 2);

        let first = &sheet.transactions[0];
        assert_eq!(first.account_code, "1112001AB030410525111");
        assert_eq!(first.date, "15/01/2024");
        assert_eq!(first.beneficiary, "ACME");
        assert_eq!(first.opening_amount, "1000");
        assert_eq!(first.debit_amount, "12000");
        assert_eq!(first.credit_amount, "0");
        assert_eq!(first.closing_amount, "13000");

        let second = &sheet.transactions[1];
        assert_eq!(second.date, "16/01/2024");
        assert_eq!(second.description, "Retiro");
        assert_eq!(second.payment_order, "4521");
        assert_eq!(second.credit_amount, "250.75");
        assert_eq!(second.closing_amount, "12750.25");
    }

    #[test]
    fn test_open_workbook_rejects_garbage() {
        assert!(open_workbook(b"definitely not a spreadsheet".to_vec()).is_err());
    }
}
