//! Month-end closing and its inverse.
//!
//! Closing a month settles every pending invoice issued in it: the invoice
//! is marked completed with a zero balance, and whatever was still owed is
//! carried into the vehicle's invoice for the following month (updating it
//! when it exists, creating it otherwise).
//!
//! Every close allocates a batch id from the `closures` counter and stamps
//! each invoice it touches with a [`ClosureStamp`]. Reverting works only
//! from those stamps, so invoices created or edited by hand afterwards are
//! never mistaken for closure output.

mod overview;

pub use overview::{MonthOverview, month_overview};

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::core::{
    CLOSURES_COUNTER, ClosureKind, ClosureStamp, EngineError, Invoice, InvoiceBuilder,
    InvoiceMode, InvoiceStatus, PAYMENTS_COUNTER, YearMonth, round2, service_date,
};
use crate::store::{CounterService, InvoiceFilter, InvoiceStore, PeriodMatch};

/// Counts from one month-end close.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSummary {
    pub month: Option<YearMonth>,
    /// Closure batch id; absent when there was nothing to close.
    pub batch_id: Option<u64>,
    pub closed: usize,
    /// Next-month invoices created to carry a balance.
    pub next_created: usize,
    /// Existing next-month invoices that received a carried balance.
    pub next_updated: usize,
    /// Invoices that could not be processed.
    pub failed: usize,
    pub carried_total: Decimal,
}

/// Counts from reverting one or more closure batches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertSummary {
    pub batches: Vec<u64>,
    /// Closed invoices set back to pending.
    pub reopened: usize,
    /// Carry-forward invoices soft-deleted.
    pub deleted: usize,
    /// Next-month invoices whose carried balance was taken back out.
    pub adjusted: usize,
    /// Invoices that changed after the close; their batch was left intact.
    pub conflicts: usize,
    pub failed: usize,
}

impl RevertSummary {
    fn absorb(&mut self, other: RevertSummary) {
        self.batches.extend(other.batches);
        self.reopened += other.reopened;
        self.deleted += other.deleted;
        self.adjusted += other.adjusted;
        self.conflicts += other.conflicts;
        self.failed += other.failed;
    }
}

/// Where a closed invoice's balance went.
enum Carry {
    Created,
    Applied,
}

/// Closes and reopens months.
pub struct MonthEndCloser<S> {
    store: S,
    actor: String,
}

impl<S> MonthEndCloser<S>
where
    S: InvoiceStore + CounterService,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            actor: "Cron Scheduler".to_string(),
        }
    }

    /// Actor recorded on every touched invoice.
    pub fn performed_by(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub async fn overview(&self) -> Result<Vec<MonthOverview>, EngineError> {
        month_overview(&self.store).await
    }

    /// Close every pending invoice issued in `month`.
    ///
    /// Invoices are processed one at a time; a failure is logged, counted
    /// and does not stop the batch.
    pub async fn close(
        &self,
        month: YearMonth,
        now: DateTime<Utc>,
    ) -> Result<CloseSummary, EngineError> {
        let pending = self
            .store
            .find_invoices(
                &InvoiceFilter::recurring()
                    .status(InvoiceStatus::Pending)
                    .created_in(month.window()),
            )
            .await?;

        let mut summary = CloseSummary {
            month: Some(month),
            ..CloseSummary::default()
        };
        if pending.is_empty() {
            info!("Month-end close {}: no pending invoices", month);
            return Ok(summary);
        }

        let batch_id = self.store.next_id(CLOSURES_COUNTER).await?;
        summary.batch_id = Some(batch_id);
        info!(
            "Month-end close {}: batch {} over {} pending invoices",
            month,
            batch_id,
            pending.len()
        );

        for invoice in pending {
            let id = invoice.id;
            let carried = round2(invoice.balance);
            match self.close_one(batch_id, invoice, now).await {
                Ok(carry) => {
                    summary.closed += 1;
                    summary.carried_total += carried;
                    match carry {
                        Carry::Created => summary.next_created += 1,
                        Carry::Applied => summary.next_updated += 1,
                    }
                }
                Err(e) => {
                    warn!("Month-end close: invoice {} failed: {}", id, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Month-end close {} done: {} closed, {} next-month created, {} updated, {} failed",
            month, summary.closed, summary.next_created, summary.next_updated, summary.failed
        );
        Ok(summary)
    }

    async fn close_one(
        &self,
        batch_id: u64,
        mut invoice: Invoice,
        now: DateTime<Utc>,
    ) -> Result<Carry, EngineError> {
        // Legacy balances may carry float noise.
        let carried = round2(invoice.balance);

        invoice.status = InvoiceStatus::Completed;
        invoice.balance = Decimal::ZERO;
        invoice.collected_date = Some(now);
        invoice.append_note(&format!(
            "Closed by month-end on {} - carried forward: {}",
            service_date(now),
            carried
        ));
        invoice.updated_at = now;
        invoice.updated_by = Some(self.actor.clone());
        invoice.closures.push(ClosureStamp {
            batch_id,
            kind: ClosureKind::Closed,
            amount: carried,
        });
        self.store.update_invoice(&invoice).await?;
        debug!("Closed invoice {} carrying {}", invoice.id, carried);

        let next_month = invoice.effective_billing_month().next();
        let next = self
            .store
            .find_invoices(
                &InvoiceFilter::recurring()
                    .vehicle_of(&invoice.customer, &invoice.vehicle.id)
                    .period(PeriodMatch::BilledFor {
                        month: next_month,
                        legacy_window: next_month.next().window(),
                    }),
            )
            .await?
            .into_iter()
            .find(|other| other.id != invoice.id);

        let stamp = |kind| ClosureStamp {
            batch_id,
            kind,
            amount: carried,
        };

        match next {
            Some(mut next) => {
                next.old_balance += carried;
                next.recompute();
                next.updated_at = now;
                next.updated_by = Some(self.actor.clone());
                next.closures.push(stamp(ClosureKind::CarryApplied));
                self.store.update_invoice(&next).await?;
                debug!("Carried {} into invoice {}", carried, next.id);
                Ok(Carry::Applied)
            }
            None => {
                let id = self.store.next_id(PAYMENTS_COUNTER).await?;
                let mut builder = InvoiceBuilder::new(
                    id,
                    &invoice.customer,
                    invoice.vehicle.clone(),
                    next_month.invoice_date(),
                )
                .building(invoice.building.as_deref())
                .location(invoice.location.as_deref())
                .worker(invoice.worker.as_deref())
                .charge(invoice.amount_charged)
                .old_balance(carried)
                .billing_month(next_month)
                .note(format!("Carried forward from invoice {}", invoice.id))
                .closure(stamp(ClosureKind::CarryCreated))
                .created_by(&self.actor)
                .updated_at(now);
                // A per-wash charge only holds for the month it counted.
                if invoice.invoice_mode == Some(InvoiceMode::FullSubscription) {
                    builder = builder.mode(InvoiceMode::FullSubscription);
                }
                let created = builder.build()?;
                self.store.insert_invoice(created).await?;
                debug!("Created invoice {} carrying {}", id, carried);
                Ok(Carry::Created)
            }
        }
    }

    /// Revert every closure batch that closed invoices issued in `month`,
    /// newest batch first.
    pub async fn revert(
        &self,
        month: YearMonth,
        now: DateTime<Utc>,
    ) -> Result<RevertSummary, EngineError> {
        let closed = self
            .store
            .find_invoices(
                &InvoiceFilter::recurring()
                    .status(InvoiceStatus::Completed)
                    .created_in(month.window()),
            )
            .await?;

        let batches: BTreeSet<u64> = closed
            .iter()
            .flat_map(|inv| inv.closures.iter())
            .filter(|s| s.kind == ClosureKind::Closed)
            .map(|s| s.batch_id)
            .collect();

        let mut summary = RevertSummary::default();
        if batches.is_empty() {
            info!("Month-end revert {}: no closure batches found", month);
            return Ok(summary);
        }

        for batch_id in batches.into_iter().rev() {
            summary.absorb(self.revert_batch(batch_id, now).await?);
        }
        Ok(summary)
    }

    /// Undo one closure batch.
    ///
    /// If any invoice the batch touched has since moved on (a carry-forward
    /// invoice was paid or closed, or a closed invoice was reopened by
    /// hand), nothing in the batch is changed and the conflicts are
    /// reported.
    pub async fn revert_batch(
        &self,
        batch_id: u64,
        now: DateTime<Utc>,
    ) -> Result<RevertSummary, EngineError> {
        let touched = self
            .store
            .find_invoices(&InvoiceFilter::recurring().closure_batch(batch_id))
            .await?;

        let mut summary = RevertSummary {
            batches: vec![batch_id],
            ..RevertSummary::default()
        };

        let conflicts: Vec<u64> = touched
            .iter()
            .filter(|inv| {
                inv.stamps_for(batch_id)
                    .any(|stamp| has_moved_on(inv, stamp.kind))
            })
            .map(|inv| inv.id)
            .collect();
        if !conflicts.is_empty() {
            warn!(
                "Closure batch {} not reverted: invoices {:?} changed after the close",
                batch_id, conflicts
            );
            summary.conflicts = conflicts.len();
            return Ok(summary);
        }

        info!("Reverting closure batch {} ({} invoices)", batch_id, touched.len());
        for invoice in touched {
            let id = invoice.id;
            match self.revert_one(batch_id, invoice, now).await {
                Ok(kind) => match kind {
                    ClosureKind::Closed => summary.reopened += 1,
                    ClosureKind::CarryCreated => summary.deleted += 1,
                    ClosureKind::CarryApplied => summary.adjusted += 1,
                },
                Err(e) => {
                    warn!("Revert of batch {}: invoice {} failed: {}", batch_id, id, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Closure batch {} reverted: {} reopened, {} deleted, {} adjusted, {} failed",
            batch_id, summary.reopened, summary.deleted, summary.adjusted, summary.failed
        );
        Ok(summary)
    }

    async fn revert_one(
        &self,
        batch_id: u64,
        mut invoice: Invoice,
        now: DateTime<Utc>,
    ) -> Result<ClosureKind, EngineError> {
        let stamps: Vec<ClosureStamp> = invoice.stamps_for(batch_id).cloned().collect();
        let Some(kind) = stamps.first().map(|s| s.kind) else {
            return Err(EngineError::Validation(format!(
                "invoice {} carries no stamp of batch {}",
                invoice.id, batch_id
            )));
        };

        invoice.updated_at = now;
        invoice.updated_by = Some(self.actor.clone());

        for stamp in &stamps {
            match stamp.kind {
                ClosureKind::CarryCreated => {
                    invoice.is_deleted = true;
                    invoice.deleted_by = Some(self.actor.clone());
                    invoice.deleted_at = Some(now);
                }
                ClosureKind::CarryApplied => {
                    invoice.old_balance -= stamp.amount;
                    invoice.recompute();
                }
                ClosureKind::Closed => {
                    invoice.status = InvoiceStatus::Pending;
                    invoice.balance = stamp.amount;
                    invoice.collected_date = None;
                    invoice.append_note(&format!(
                        "Reopened by month-end revert on {}",
                        service_date(now)
                    ));
                }
            }
        }

        // Deleted carry-forward invoices keep their stamps as an audit trail.
        if !invoice.is_deleted {
            invoice.closures.retain(|s| s.batch_id != batch_id);
        }
        self.store.update_invoice(&invoice).await?;
        Ok(kind)
    }
}

/// Whether an invoice changed after the close in a way a revert would clobber.
fn has_moved_on(invoice: &Invoice, kind: ClosureKind) -> bool {
    match kind {
        ClosureKind::Closed => invoice.status != InvoiceStatus::Completed,
        ClosureKind::CarryCreated => {
            invoice.status == InvoiceStatus::Completed || invoice.amount_paid > Decimal::ZERO
        }
        ClosureKind::CarryApplied => invoice.status == InvoiceStatus::Completed,
    }
}
