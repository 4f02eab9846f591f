//! Monthly invoice generation.
//!
//! One run bills one calendar month for every active vehicle, in one of
//! two pricing modes:
//!
//! - **full subscription**: the vehicle's monthly amount;
//! - **per wash**: completed washes at `monthly amount / expected washes`,
//!   where expected washes counts the due days of the month (Monday to
//!   Saturday for daily schedules).
//!
//! Each invoice carries the balance of the vehicle's previous invoice
//! forward as its old balance. When a month-end close already created a
//! carry-forward invoice for the vehicle and month, the charge is billed
//! into it instead. A month that already has invoices is never billed
//! again: the run stops before writing and reports itself blocked.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::core::{
    BillingPeriodResolver, ClosureKind, Customer, EngineError, Invoice, InvoiceBuilder,
    InvoiceMode, PAYMENTS_COUNTER, PeriodSource, ResolvedPeriod, StoreError, Vehicle,
    VehicleStatus, YearMonth, ensure_valid, round2, service_date,
};
use crate::schedule::ScheduleEvaluator;
use crate::store::{CounterService, CustomerFilter, CustomerStore, InvoiceFilter, InvoiceStore, JobStore};

/// Counts from a completed invoice run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRunSummary {
    pub billing_month: YearMonth,
    pub source: PeriodSource,
    pub mode: InvoiceMode,
    /// Issue date of the generated invoices (service-local).
    pub invoice_date: NaiveDate,
    pub created: usize,
    /// Carry-forward invoices from a month-end close that received the
    /// month's charge.
    pub billed_into_carried: usize,
    pub skipped_inactive: usize,
    pub skipped_zero_amount: usize,
    pub skipped_no_washes: usize,
    /// Sum of `amount_charged` over the created and carried invoices.
    pub total_charged: Decimal,
}

impl InvoiceRunSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_inactive + self.skipped_zero_amount + self.skipped_no_washes
    }
}

/// Result of an invoice run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceRunOutcome {
    /// The month already has invoices; nothing was written.
    Blocked {
        billing_month: YearMonth,
        existing_count: u64,
    },
    Completed(InvoiceRunSummary),
}

impl InvoiceRunOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    pub fn summary(&self) -> Option<&InvoiceRunSummary> {
        match self {
            Self::Completed(summary) => Some(summary),
            Self::Blocked { .. } => None,
        }
    }
}

/// Answer of the read-only duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingInvoices {
    pub billing_month: YearMonth,
    pub exists: bool,
    pub count: u64,
}

/// Generates the monthly invoices.
pub struct InvoiceGenerator<S> {
    store: S,
    evaluator: ScheduleEvaluator,
    created_by: String,
}

impl<S> InvoiceGenerator<S>
where
    S: CustomerStore + JobStore + InvoiceStore + CounterService,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            evaluator: ScheduleEvaluator::billing(),
            created_by: "Cron Scheduler".to_string(),
        }
    }

    /// Actor recorded as `created_by` on generated invoices.
    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }

    /// Run from raw trigger parameters.
    ///
    /// Without a requested month, bills the month before `now`. An unknown
    /// `mode` fails before the store is touched.
    pub async fn run_at(
        &self,
        now: DateTime<Utc>,
        requested: Option<YearMonth>,
        mode: &str,
    ) -> Result<InvoiceRunOutcome, EngineError> {
        let mode: InvoiceMode = mode.parse()?;
        let period = BillingPeriodResolver::at(now).resolve(requested);
        self.run(period, mode).await
    }

    pub async fn run(
        &self,
        period: ResolvedPeriod,
        mode: InvoiceMode,
    ) -> Result<InvoiceRunOutcome, EngineError> {
        let month = period.month;
        info!("Invoice run for {} ({}, {:?})", month, mode, period.source);

        let existing = self.check_existing(month).await?;
        if existing.exists {
            warn!(
                "Invoice run for {} blocked: {} invoices already exist",
                month, existing.count
            );
            return Ok(InvoiceRunOutcome::Blocked {
                billing_month: month,
                existing_count: existing.count,
            });
        }

        let customers = self.store.customers(&CustomerFilter::all()).await?;
        let completed = match mode {
            InvoiceMode::PerWash => self.completed_washes(month).await?,
            InvoiceMode::FullSubscription => HashMap::new(),
        };

        let invoice_date = month.invoice_date();
        let mut summary = InvoiceRunSummary {
            billing_month: month,
            source: period.source,
            mode,
            invoice_date: service_date(invoice_date),
            created: 0,
            billed_into_carried: 0,
            skipped_inactive: 0,
            skipped_zero_amount: 0,
            skipped_no_washes: 0,
            total_charged: Decimal::ZERO,
        };
        let mut carried: HashMap<(String, String), Invoice> = self
            .store
            .find_invoices(&InvoiceFilter::carried_into(month))
            .await?
            .into_iter()
            .map(|inv| ((inv.customer.clone(), inv.vehicle.id.clone()), inv))
            .collect();
        let mut invoices = Vec::new();
        let mut folded = Vec::new();

        for customer in &customers {
            for vehicle in &customer.vehicles {
                if vehicle.status == VehicleStatus::Inactive {
                    summary.skipped_inactive += 1;
                    continue;
                }

                let key = (customer.id.clone(), vehicle.id.clone());
                let charge = match mode {
                    InvoiceMode::FullSubscription => {
                        if vehicle.monthly_amount.is_zero() {
                            debug!("Vehicle {} has no monthly amount", vehicle.id);
                            summary.skipped_zero_amount += 1;
                            continue;
                        }
                        Charge::Subscription(vehicle.monthly_amount)
                    }
                    InvoiceMode::PerWash => {
                        let done = completed.get(&key).copied().unwrap_or(0);
                        if done == 0 {
                            debug!("Vehicle {} has no completed washes in {}", vehicle.id, month);
                            summary.skipped_no_washes += 1;
                            continue;
                        }
                        self.per_wash_charge(vehicle, month, done)?
                    }
                };

                match carried.remove(&key) {
                    Some(carry) => {
                        let invoice = self.bill_into(carry, month, mode, invoice_date, charge)?;
                        summary.total_charged += invoice.amount_charged;
                        folded.push(invoice);
                    }
                    None => {
                        let invoice = self
                            .invoice(customer, vehicle, month, mode, invoice_date, charge)
                            .await?;
                        summary.total_charged += invoice.amount_charged;
                        invoices.push(invoice);
                    }
                }
            }
        }

        if invoices.is_empty() && folded.is_empty() {
            info!("No invoices to create for {}", month);
            return Ok(InvoiceRunOutcome::Completed(summary));
        }

        let count = invoices.len();
        if count > 0 {
            match self.store.insert_invoices(invoices).await {
                Ok(()) => {}
                Err(StoreError::Duplicate { key, .. }) => {
                    // Another run won the race for this month.
                    warn!("Invoice run for {} lost to a concurrent run ({})", month, key);
                    let existing = self.check_existing(month).await?;
                    return Ok(InvoiceRunOutcome::Blocked {
                        billing_month: month,
                        existing_count: existing.count.max(1),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
        summary.created = count;

        for invoice in &folded {
            self.store.update_invoice(invoice).await?;
            debug!("Billed {} into carry-forward invoice {}", month, invoice.id);
        }
        summary.billed_into_carried = folded.len();

        info!(
            "Invoice run for {}: {} created, {} carried billed, {} skipped, {} charged",
            month,
            summary.created,
            summary.billed_into_carried,
            summary.skipped(),
            summary.total_charged
        );
        Ok(InvoiceRunOutcome::Completed(summary))
    }

    /// Count live recurring invoices already billed for `month`, including
    /// legacy records issued inside the month.
    pub async fn check_existing(&self, month: YearMonth) -> Result<ExistingInvoices, EngineError> {
        let count = self
            .store
            .count_invoices(&InvoiceFilter::billed_for(month))
            .await?;
        Ok(ExistingInvoices {
            billing_month: month,
            exists: count > 0,
            count,
        })
    }

    async fn completed_washes(
        &self,
        month: YearMonth,
    ) -> Result<HashMap<(String, String), u32>, EngineError> {
        let jobs = self.store.completed_jobs(&month.window()).await?;
        let mut counts: HashMap<(String, String), u32> = HashMap::new();
        for job in jobs {
            *counts.entry((job.customer, job.vehicle)).or_default() += 1;
        }
        debug!("{} vehicles completed washes in {}", counts.len(), month);
        Ok(counts)
    }

    fn per_wash_charge(
        &self,
        vehicle: &Vehicle,
        month: YearMonth,
        completed: u32,
    ) -> Result<Charge, EngineError> {
        let expected = self
            .evaluator
            .count_due_days(vehicle, month.first_day(), month.last_day());
        let rate = if expected > 0 {
            vehicle
                .monthly_amount
                .checked_div(Decimal::from(expected))
                .ok_or_else(|| {
                    EngineError::Arithmetic(format!("per-wash rate overflow for {}", vehicle.id))
                })?
        } else {
            vehicle.monthly_amount
        };
        let amount = Decimal::from(completed)
            .checked_mul(rate)
            .map(round2)
            .ok_or_else(|| {
                EngineError::Arithmetic(format!("per-wash charge overflow for {}", vehicle.id))
            })?;

        Ok(Charge::PerWash {
            amount,
            completed,
            expected,
            rate,
        })
    }

    async fn invoice(
        &self,
        customer: &Customer,
        vehicle: &Vehicle,
        month: YearMonth,
        mode: InvoiceMode,
        invoice_date: DateTime<Utc>,
        charge: Charge,
    ) -> Result<Invoice, EngineError> {
        let old_balance = self
            .store
            .last_invoice(&customer.id, &vehicle.id)
            .await?
            .map(|last| round2(last.balance))
            .unwrap_or(Decimal::ZERO);
        let id = self.store.next_id(PAYMENTS_COUNTER).await?;

        let mut builder = InvoiceBuilder::new(id, &customer.id, vehicle.snapshot(), invoice_date)
            .building(customer.building_ref())
            .location(customer.location.as_deref())
            .worker(vehicle.assigned_worker())
            .billing_month(month)
            .mode(mode)
            .old_balance(old_balance)
            .created_by(&self.created_by);

        builder = match charge {
            Charge::Subscription(amount) => builder.charge(amount),
            Charge::PerWash {
                amount,
                completed,
                expected,
                rate,
            } => builder
                .charge(amount)
                .per_wash(completed, expected, rate),
        };

        builder.build()
    }

    /// Put `month`'s charge on the carry-forward invoice a month-end close
    /// created for it. The carried amount stays as the old balance, and the
    /// closure stamp becomes an applied carry so a revert only takes the
    /// carried amount back out.
    fn bill_into(
        &self,
        mut carry: Invoice,
        month: YearMonth,
        mode: InvoiceMode,
        invoice_date: DateTime<Utc>,
        charge: Charge,
    ) -> Result<Invoice, EngineError> {
        let (amount, washes) = match charge {
            Charge::Subscription(amount) => (amount, None),
            Charge::PerWash {
                amount,
                completed,
                expected,
                rate,
            } => (amount, Some((completed, expected, rate))),
        };
        carry.amount_charged = amount;
        carry.invoice_mode = Some(mode);
        carry.completed_washes = washes.map(|(completed, _, _)| completed);
        carry.expected_washes = washes.map(|(_, expected, _)| expected);
        carry.per_wash_rate = washes.map(|(_, _, rate)| rate);
        carry.recompute();
        for stamp in &mut carry.closures {
            if stamp.kind == ClosureKind::CarryCreated {
                stamp.kind = ClosureKind::CarryApplied;
            }
        }
        carry.append_note(&format!("Billed for {} by the invoice run", month));
        carry.updated_at = carry.updated_at.max(invoice_date);
        carry.updated_by = Some(self.created_by.clone());

        ensure_valid(&carry)?;
        Ok(carry)
    }
}

enum Charge {
    Subscription(Decimal),
    PerWash {
        amount: Decimal,
        completed: u32,
        expected: u32,
        rate: Decimal,
    },
}
