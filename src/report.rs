//! Uniform result object handed back to whoever triggered a run.
//!
//! Every batch operation converts into a [`RunReport`]: a success flag, the
//! blocked state of invoice runs, named counts and a one-line message. The
//! report serializes as camelCase JSON.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::invoicing::{ExistingInvoices, InvoiceRunOutcome};
use crate::jobs::JobRunSummary;
use crate::month_end::{CloseSummary, RevertSummary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub success: bool,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_count: Option<u64>,
    pub created: usize,
    /// Skip counters by reason.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub skipped: BTreeMap<&'static str, usize>,
    /// Further counts specific to the operation.
    #[serde(flatten)]
    pub counts: BTreeMap<&'static str, u64>,
    pub message: String,
}

impl RunReport {
    fn success(created: usize, message: String) -> Self {
        Self {
            success: true,
            blocked: false,
            existing_count: None,
            created,
            skipped: BTreeMap::new(),
            counts: BTreeMap::new(),
            message,
        }
    }

    /// Report for a run that failed with an error.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(0, message.into())
        }
    }

    fn count(mut self, name: &'static str, value: impl TryInto<u64>) -> Self {
        self.counts.insert(name, value.try_into().unwrap_or(u64::MAX));
        self
    }
}

impl From<&JobRunSummary> for RunReport {
    fn from(summary: &JobRunSummary) -> Self {
        let target = summary
            .target_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        let message = match summary.same_day_date {
            Some(today) => format!(
                "Generated {} jobs for {}, {} of them same-day for {} (schedule {})",
                summary.generated, target, summary.immediate, today, summary.schedule_id
            ),
            None => format!(
                "Generated {} jobs for {} (schedule {})",
                summary.generated, target, summary.schedule_id
            ),
        };
        let mut report = Self::success(summary.generated, message)
        .count("scheduleId", summary.schedule_id)
        .count("duplicates", summary.duplicates)
        .count("immediate", summary.immediate);
        report.skipped = BTreeMap::from([
            ("customers", summary.customers_skipped),
            ("inactive", summary.vehicles_inactive),
            ("notStarted", summary.not_started),
            ("notDue", summary.not_due),
        ]);
        report
    }
}

impl From<&InvoiceRunOutcome> for RunReport {
    fn from(outcome: &InvoiceRunOutcome) -> Self {
        match outcome {
            InvoiceRunOutcome::Blocked {
                billing_month,
                existing_count,
            } => Self {
                success: false,
                blocked: true,
                existing_count: Some(*existing_count),
                ..Self::success(
                    0,
                    format!(
                        "Invoices for {billing_month} already exist ({existing_count}); run blocked"
                    ),
                )
            },
            InvoiceRunOutcome::Completed(summary) => {
                let mut report = Self::success(
                    summary.created,
                    format!(
                        "Created {} {} invoices for {} dated {} (total {})",
                        summary.created,
                        summary.mode,
                        summary.billing_month,
                        summary.invoice_date,
                        summary.total_charged
                    ),
                );
                if summary.billed_into_carried > 0 {
                    report = report.count("billedIntoCarried", summary.billed_into_carried);
                }
                report.skipped = BTreeMap::from([
                    ("inactive", summary.skipped_inactive),
                    ("zeroAmount", summary.skipped_zero_amount),
                    ("noWashes", summary.skipped_no_washes),
                ]);
                report
            }
        }
    }
}

impl From<&ExistingInvoices> for RunReport {
    fn from(existing: &ExistingInvoices) -> Self {
        let message = if existing.exists {
            format!(
                "{} invoices already exist for {}",
                existing.count, existing.billing_month
            )
        } else {
            format!("No invoices exist for {}", existing.billing_month)
        };
        Self {
            blocked: existing.exists,
            existing_count: Some(existing.count),
            ..Self::success(0, message)
        }
    }
}

impl From<&CloseSummary> for RunReport {
    fn from(summary: &CloseSummary) -> Self {
        let month = summary
            .month
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string());
        let message = match summary.batch_id {
            Some(batch) => format!(
                "Closed {} invoices of {} in batch {}, carried {}",
                summary.closed, month, batch, summary.carried_total
            ),
            None => format!("Nothing to close for {month}"),
        };
        let mut report = Self::success(summary.next_created, message)
            .count("closed", summary.closed)
            .count("updated", summary.next_updated)
            .count("failed", summary.failed);
        if let Some(batch) = summary.batch_id {
            report = report.count("batchId", batch);
        }
        report.success = summary.failed == 0;
        report
    }
}

impl From<&RevertSummary> for RunReport {
    fn from(summary: &RevertSummary) -> Self {
        let message = if summary.batches.is_empty() {
            "No closure batches to revert".to_string()
        } else {
            format!(
                "Reverted batches {:?}: {} reopened, {} deleted, {} adjusted",
                summary.batches, summary.reopened, summary.deleted, summary.adjusted
            )
        };
        let mut report = Self::success(0, message)
            .count("reopened", summary.reopened)
            .count("deleted", summary.deleted)
            .count("adjusted", summary.adjusted)
            .count("conflicts", summary.conflicts)
            .count("failed", summary.failed);
        report.success = summary.failed == 0 && summary.conflicts == 0;
        report
    }
}
