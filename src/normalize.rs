use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Best-effort conversion of ledger text to a decimal. Everything except
/// digits, `.` and `-` is dropped; whatever does not parse becomes zero.
pub fn to_decimal(raw: &str) -> Decimal {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    Decimal::from_str(&cleaned).unwrap_or(Decimal::ZERO)
}

/// Round to cents, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Render with exactly two fractional digits.
pub fn to_decimal_string(value: Decimal) -> String {
    format!("{:.2}", round_money(value))
}

/// Whole cents, or `None` when the amount does not fit the storage column.
pub fn to_cents(value: Decimal) -> Option<i64> {
    round_money(value).checked_mul(Decimal::ONE_HUNDRED)?.to_i64()
}

/// [`to_decimal`] restricted to amounts that can be stored as cents.
pub fn to_amount(raw: &str) -> Option<Decimal> {
    let value = to_decimal(raw);
    to_cents(value).map(|_| value)
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Lower-case, fold Spanish accents and collapse whitespace, for marker
/// matching.
pub fn normalize_text(raw: &str) -> String {
    let folded: String = raw
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

const YEAR_FIRST_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];
// Day-first: the ledgers are printed in DD/MM/YYYY.
const DAY_FIRST_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];
const SHORT_YEAR_FORMATS: &[&str] = &["%d/%m/%y", "%d-%m-%y", "%d.%m.%y"];

/// Pick the format family from the digit groups. chrono's `%Y` takes any
/// number of digits, so the year group width decides between `%Y` and `%y`.
fn date_formats(raw: &str) -> Option<&'static [&'static str]> {
    let groups: Vec<usize> = raw
        .split(|c: char| !c.is_ascii_digit())
        .filter(|g| !g.is_empty())
        .map(str::len)
        .collect();
    match groups.as_slice() {
        [4, _, _] => Some(YEAR_FIRST_FORMATS),
        [_, _, 4] => Some(DAY_FIRST_FORMATS),
        [_, _, 2] => Some(SHORT_YEAR_FORMATS),
        _ => None,
    }
}

/// Parse the date shapes found in the first column of a ledger row.
pub fn parse_ledger_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.len() > 10 && raw.as_bytes()[..4].iter().all(u8::is_ascii_digit) {
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(dt.date());
            }
        }
    }
    date_formats(raw)?
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// A first-column value that looks like a date: it carries a date separator
/// or parses as one.
pub fn is_date_like(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.is_empty() {
        return false;
    }
    raw.contains('/') || raw.contains('-') || parse_ledger_date(raw).is_some()
}

/// Reformat to `DD/MM/YYYY`, or `None` if the text is not a recognizable date.
pub fn format_dmy(raw: &str) -> Option<String> {
    parse_ledger_date(raw).map(|d| d.format("%d/%m/%Y").to_string())
}

/// Strict `DD/MM/YYYY` parse used before persisting.
pub fn parse_date_dmy(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%d/%m/%Y").ok()
}

pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    base.checked_add_signed(chrono::Duration::milliseconds(millis))
}
