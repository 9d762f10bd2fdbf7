use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::error::{IngestError, Result};
use crate::models::Transaction;
use crate::normalize::{round_money, to_cents};

/// Chain running balances per account code, in the order given.
///
/// The first row of each account keeps its own opening balance; every later
/// row opens at the previous row's closing balance. Closing balances are
/// always recomputed as `opening + debit - credit`, and must stay within
/// the range that can be stored as cents.
pub fn apply(records: &mut [Transaction]) -> Result<usize> {
    let mut last_closing: HashMap<String, Decimal> = HashMap::new();
    for record in records.iter_mut() {
        let opening = match last_closing.get(&record.account_code) {
            Some(prev) => *prev,
            None => round_money(record.opening),
        };
        let closing = opening
            .checked_add(record.debit)
            .and_then(|v| v.checked_sub(record.credit))
            .map(round_money)
            .filter(|v| to_cents(*v).is_some())
            .ok_or_else(|| IngestError::AmountOutOfRange(record.account_code.clone()))?;
        record.opening = opening;
        record.closing = closing;
        last_closing.insert(record.account_code.clone(), closing);
    }
    Ok(last_closing.len())
}
