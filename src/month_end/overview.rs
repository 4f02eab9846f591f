use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::core::{EngineError, InvoiceStatus, YearMonth};
use crate::store::{InvoiceFilter, InvoiceStore};

/// Invoice totals for one issue month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthOverview {
    /// Service-local month the invoices were issued in.
    pub month: YearMonth,
    pub pending: usize,
    pub completed: usize,
    pub count: usize,
    /// Sum of balances, rounded to whole units.
    pub total_balance: Decimal,
    /// Nothing pending and at least one invoice completed.
    pub is_closed: bool,
}

/// Every month with live recurring invoices, newest first.
pub async fn month_overview<S: InvoiceStore>(store: &S) -> Result<Vec<MonthOverview>, EngineError> {
    let invoices = store.find_invoices(&InvoiceFilter::recurring()).await?;

    let mut months: BTreeMap<YearMonth, (usize, usize, Decimal)> = BTreeMap::new();
    for invoice in &invoices {
        let entry = months
            .entry(YearMonth::of_instant(invoice.created_at))
            .or_insert((0, 0, Decimal::ZERO));
        match invoice.status {
            InvoiceStatus::Pending => entry.0 += 1,
            InvoiceStatus::Completed => entry.1 += 1,
        }
        entry.2 += invoice.balance;
    }

    Ok(months
        .into_iter()
        .rev()
        .map(|(month, (pending, completed, balance))| MonthOverview {
            month,
            pending,
            completed,
            count: pending + completed,
            total_balance: balance.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
            is_closed: pending == 0 && completed > 0,
        })
        .collect())
}
