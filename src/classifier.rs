use crate::models::RawTransaction;
use crate::normalize::{format_dmy, is_date_like};

/// First column inspected for descriptive and monetary content.
const FIRST_DETAIL_COL: usize = 2;
/// Columns at or past this index are never inspected.
const DETAIL_COL_LIMIT: usize = 15;
/// Payment orders are short integers; larger whole numbers are amounts.
const PAYMENT_ORDER_LIMIT: f64 = 10_000.0;

/// What a single detail cell of a transaction row holds.
#[derive(Debug, Clone, PartialEq)]
pub enum CellKind {
    Empty,
    Text(String),
    /// Numeric without a thousands separator or decimal point.
    PlainNumber { text: String, value: f64 },
    /// Numeric with a thousands separator or decimal point, or a literal `0`.
    Monetary(String),
}

pub fn classify_cell(raw: &str) -> CellKind {
    let text = raw.trim();
    if text.is_empty() {
        return CellKind::Empty;
    }
    let cleaned: String = text.chars().filter(|c| *c != ',' && *c != ' ').collect();
    let value = match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => return CellKind::Text(text.to_string()),
    };
    if text.contains(',') || text.contains('.') || text == "0" {
        CellKind::Monetary(text.to_string())
    } else {
        CellKind::PlainNumber {
            text: text.to_string(),
            value,
        }
    }
}

/// Detail cells of one row, bucketed by role.
#[derive(Debug, Default, PartialEq)]
pub struct DetailColumns {
    pub text: Vec<String>,
    pub payment_order: Option<String>,
    pub monetary: Vec<String>,
}

pub fn partition(cells: &[CellKind]) -> DetailColumns {
    let mut cols = DetailColumns::default();
    for cell in cells {
        match cell {
            CellKind::Empty => {}
            CellKind::Text(t) => cols.text.push(t.clone()),
            CellKind::Monetary(t) => cols.monetary.push(t.clone()),
            CellKind::PlainNumber { text, value } => {
                let is_reference = cols.payment_order.is_none()
                    && *value != 0.0
                    && value.fract() == 0.0
                    && value.abs() < PAYMENT_ORDER_LIMIT;
                if is_reference {
                    cols.payment_order = Some(text.clone());
                } else {
                    cols.monetary.push(text.clone());
                }
            }
        }
    }
    cols
}

/// The (opening, debit, credit, closing) slots recovered from the numeric
/// columns actually present on the row.
pub fn monetary_slots(monetary: &[String], section_opening: Option<&str>) -> Option<[String; 4]> {
    let opening = section_opening.unwrap_or_default().to_string();
    match monetary {
        [o, d, c, f, ..] => Some([o.clone(), d.clone(), c.clone(), f.clone()]),
        [d, c, f] => Some([opening, d.clone(), c.clone(), f.clone()]),
        [c, f] => Some([opening, String::new(), c.clone(), f.clone()]),
        _ => None,
    }
}

fn text_fields(text: &[String]) -> (String, String) {
    match text {
        [] => (String::new(), String::new()),
        [only] => (String::new(), only.clone()),
        [first, rest @ ..] => (first.clone(), rest.join(" ")),
    }
}

/// Section state the reader carries into each row.
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    pub account_code: &'a str,
    pub account_name: &'a str,
    pub opening_balance: Option<&'a str>,
}

/// Decode one transaction line, or `None` if the row does not have the
/// shape of one.
pub fn parse_row(row: &[String], section: Section<'_>, source_file: &str) -> Option<RawTransaction> {
    let date_raw = row.first()?.trim();
    if !is_date_like(date_raw) {
        return None;
    }
    let date = format_dmy(date_raw).unwrap_or_else(|| date_raw.to_string());

    let reference_number = row.get(1).map(|c| c.trim().to_string()).unwrap_or_default();

    let end = row.len().min(DETAIL_COL_LIMIT);
    let cells: Vec<CellKind> = row
        .get(FIRST_DETAIL_COL..end)
        .unwrap_or_default()
        .iter()
        .map(|c| classify_cell(c))
        .collect();
    let cols = partition(&cells);
    if cols.monetary.len() < 2 {
        return None;
    }

    let (beneficiary, description) = text_fields(&cols.text);
    let [opening_amount, debit_amount, credit_amount, closing_amount] =
        monetary_slots(&cols.monetary, section.opening_balance)?;

    Some(RawTransaction {
        account_code: section.account_code.to_string(),
        account_name: section.account_name.to_string(),
        date,
        reference_number,
        beneficiary,
        description,
        payment_order: cols.payment_order.unwrap_or_default(),
        opening_amount,
        debit_amount,
        credit_amount,
        closing_amount,
        source_file: source_file.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn section(opening: Option<&str>) -> Section<'_> {
        Section {
            account_code: "1112001",
            account_name: "Caja",
            opening_balance: opening,
        }
    }

    #[test]
    fn test_classify_cell() {
        assert_eq!(classify_cell("   "), CellKind::Empty);
        assert_eq!(classify_cell(" PROVEEDOR SA "), CellKind::Text("PROVEEDOR SA".into()));
        assert_eq!(classify_cell("1,000"), CellKind::Monetary("1,000".into()));
        assert_eq!(classify_cell("12.5"), CellKind::Monetary("12.5".into()));
        assert_eq!(classify_cell("0"), CellKind::Monetary("0".into()));
        assert_eq!(
            classify_cell("4521"),
            CellKind::PlainNumber {
                text: "4521".into(),
                value: 4521.0
            }
        );
        assert_eq!(classify_cell("1 000"), CellKind::PlainNumber { text: "1 000".into(), value: 1000.0 });
        assert_eq!(classify_cell("NaN"), CellKind::Text("NaN".into()));
        assert_eq!(classify_cell("12-A"), CellKind::Text("12-A".into()));
    }

    #[test]
    fn test_partition_takes_first_integer_as_payment_order() {
        let cells = vec![
            classify_cell("PROVEEDOR"),
            classify_cell("4521"),
            classify_cell("777"),
            classify_cell("1,000.00"),
        ];
        let cols = partition(&cells);
        assert_eq!(cols.text, vec!["PROVEEDOR"]);
        assert_eq!(cols.payment_order.as_deref(), Some("4521"));
        assert_eq!(cols.monetary, vec!["777", "1,000.00"]);
    }

    #[test]
    fn test_partition_zero_is_never_payment_order() {
        let cells = vec![classify_cell("-0"), classify_cell("15")];
        let cols = partition(&cells);
        assert_eq!(cols.payment_order.as_deref(), Some("15"));
        assert_eq!(cols.monetary, vec!["-0"]);
    }

    #[test]
    fn test_large_whole_numbers_stay_monetary() {
        let cells = vec![classify_cell("50000"), classify_cell("9999"), classify_cell("12000")];
        let cols = partition(&cells);
        assert_eq!(cols.payment_order.as_deref(), Some("9999"));
        assert_eq!(cols.monetary, vec!["50000", "12000"]);

        let r = row(&["15/01/2024", "X", "a", "50000", "0", "50000"]);
        let t = parse_row(&r, section(None), "a.xlsx").unwrap();
        assert_eq!(t.payment_order, "");
        assert_eq!(t.debit_amount, "50000");
        assert_eq!(t.credit_amount, "0");
        assert_eq!(t.closing_amount, "50000");
    }

    #[test]
    fn test_parse_row_four_monetary_columns() {
        let r = row(&["15/01/2024", "D-1", "ACME", "Pago de luz", "100.00", "50.00", "0.00", "150.00"]);
        let t = parse_row(&r, section(Some("999.00")), "a.xlsx").unwrap();
        assert_eq!(t.opening_amount, "100.00");
        assert_eq!(t.debit_amount, "50.00");
        assert_eq!(t.credit_amount, "0.00");
        assert_eq!(t.closing_amount, "150.00");
        assert_eq!(t.beneficiary, "ACME");
        assert_eq!(t.description, "Pago de luz");
        assert_eq!(t.reference_number, "D-1");
        assert_eq!(t.source_file, "a.xlsx");
    }

    #[test]
    fn test_parse_row_three_monetary_columns_use_section_opening() {
        let r = row(&["15/01/2024", "D-1", "Compra", "500.00", "0.00", "1,500.00"]);
        let t = parse_row(&r, section(Some("1,000.00")), "a.xlsx").unwrap();
        assert_eq!(t.opening_amount, "1,000.00");
        assert_eq!(t.debit_amount, "500.00");
        assert_eq!(t.credit_amount, "0.00");
        assert_eq!(t.closing_amount, "1,500.00");
        assert_eq!(t.beneficiary, "");
        assert_eq!(t.description, "Compra");
    }

    #[test]
    fn test_parse_row_two_monetary_columns_are_credit_and_closing() {
        let r = row(&["15/01/2024", "E-7", "Retiro", "200.00", "1,300.00"]);
        let t = parse_row(&r, section(Some("1,500.00")), "a.xlsx").unwrap();
        assert_eq!(t.opening_amount, "1,500.00");
        assert_eq!(t.debit_amount, "");
        assert_eq!(t.credit_amount, "200.00");
        assert_eq!(t.closing_amount, "1,300.00");

        let t = parse_row(&r, section(None), "a.xlsx").unwrap();
        assert_eq!(t.opening_amount, "");
    }

    #[test]
    fn test_parse_row_extracts_payment_order_and_joins_description() {
        let r = row(&["15/01/2024", "P-9", "JUAN PEREZ", "4521", "Viaticos", "marzo", "300.00", "700.00"]);
        let t = parse_row(&r, section(None), "a.xlsx").unwrap();
        assert_eq!(t.beneficiary, "JUAN PEREZ");
        assert_eq!(t.description, "Viaticos marzo");
        assert_eq!(t.payment_order, "4521");
        assert_eq!(t.credit_amount, "300.00");
        assert_eq!(t.closing_amount, "700.00");
    }

    #[test]
    fn test_parse_row_reformats_dates() {
        let r = row(&["2024-03-07 00:00:00", "", "x", "1.00", "2.00"]);
        let t = parse_row(&r, section(None), "a.xlsx").unwrap();
        assert_eq!(t.date, "07/03/2024");

        let r = row(&["99/99/9999", "", "x", "1.00", "2.00"]);
        let t = parse_row(&r, section(None), "a.xlsx").unwrap();
        assert_eq!(t.date, "99/99/9999");
    }

    #[test]
    fn test_parse_row_rejects_non_transactions() {
        let s = section(None);
        assert!(parse_row(&row(&["Total", "", "x", "1.00", "2.00"]), s, "a").is_none());
        assert!(parse_row(&row(&["15/01/2024", "", "x", "1.00"]), s, "a").is_none());
        assert!(parse_row(&row(&["15/01/2024"]), s, "a").is_none());
        assert!(parse_row(&row(&[]), s, "a").is_none());
    }

    #[test]
    fn test_parse_row_ignores_columns_past_limit() {
        let mut cells = vec!["15/01/2024", "", "x", "1.00"];
        cells.extend(std::iter::repeat("").take(11));
        cells.push("2.00");
        assert_eq!(cells.len(), 16);
        assert!(parse_row(&row(&cells), section(None), "a").is_none());
    }
}
