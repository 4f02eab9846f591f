use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::EngineError;
use super::period::YearMonth;
use super::types::*;
use super::validation;

/// Builder for constructing consistent invoices.
///
/// Totals are always derived: `total = charge + old balance` and
/// `balance = total - paid`.
///
/// ```
/// use rust_decimal_macros::dec;
/// use washcycle::core::*;
///
/// let march = YearMonth::new(2026, 3).unwrap();
/// let vehicle = VehicleSnapshot { id: "v1".into(), registration_no: None, parking_no: None };
/// let invoice = InvoiceBuilder::new(1, "c1", vehicle, march.invoice_date())
///     .billing_month(march)
///     .charge(dec!(100))
///     .old_balance(dec!(40))
///     .build()
///     .unwrap();
///
/// assert_eq!(invoice.total_amount, dec!(140));
/// assert_eq!(invoice.balance, dec!(140));
/// ```
pub struct InvoiceBuilder {
    id: u64,
    customer: String,
    vehicle: VehicleSnapshot,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    building: Option<String>,
    location: Option<String>,
    worker: Option<String>,
    amount_charged: Decimal,
    old_balance: Decimal,
    amount_paid: Decimal,
    billing_month: Option<YearMonth>,
    invoice_mode: Option<InvoiceMode>,
    completed_washes: Option<u32>,
    expected_washes: Option<u32>,
    per_wash_rate: Option<Decimal>,
    notes: Option<String>,
    closures: Vec<ClosureStamp>,
    created_by: String,
}

impl InvoiceBuilder {
    pub fn new(
        id: u64,
        customer: impl Into<String>,
        vehicle: VehicleSnapshot,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer: customer.into(),
            vehicle,
            created_at,
            updated_at: None,
            building: None,
            location: None,
            worker: None,
            amount_charged: Decimal::ZERO,
            old_balance: Decimal::ZERO,
            amount_paid: Decimal::ZERO,
            billing_month: None,
            invoice_mode: None,
            completed_washes: None,
            expected_washes: None,
            per_wash_rate: None,
            notes: None,
            closures: Vec::new(),
            created_by: "Cron Scheduler".to_string(),
        }
    }

    pub fn building(mut self, building: Option<&str>) -> Self {
        self.building = building.map(str::to_string);
        self
    }

    pub fn location(mut self, location: Option<&str>) -> Self {
        self.location = location.map(str::to_string);
        self
    }

    /// Assigned worker; empty values are dropped.
    pub fn worker(mut self, worker: Option<&str>) -> Self {
        self.worker = worker
            .filter(|w| !w.trim().is_empty())
            .map(str::to_string);
        self
    }

    pub fn charge(mut self, amount: Decimal) -> Self {
        self.amount_charged = amount;
        self
    }

    pub fn old_balance(mut self, amount: Decimal) -> Self {
        self.old_balance = amount;
        self
    }

    pub fn amount_paid(mut self, amount: Decimal) -> Self {
        self.amount_paid = amount;
        self
    }

    pub fn billing_month(mut self, month: YearMonth) -> Self {
        self.billing_month = Some(month);
        self
    }

    pub fn mode(mut self, mode: InvoiceMode) -> Self {
        self.invoice_mode = Some(mode);
        self
    }

    /// Record the per-wash inputs the charge was computed from.
    pub fn per_wash(mut self, completed: u32, expected: u32, rate: Decimal) -> Self {
        self.completed_washes = Some(completed);
        self.expected_washes = Some(expected);
        self.per_wash_rate = Some(rate);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes = Some(note.into());
        self
    }

    pub fn closure(mut self, stamp: ClosureStamp) -> Self {
        self.closures.push(stamp);
        self
    }

    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }

    /// Write timestamp; defaults to the issue date.
    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Build the invoice, deriving totals and running validation.
    /// Returns all validation errors (not just the first).
    pub fn build(self) -> Result<Invoice, EngineError> {
        let invoice = self.assemble();
        validation::ensure_valid(&invoice)?;
        Ok(invoice)
    }

    fn assemble(self) -> Invoice {
        let mut invoice = Invoice {
            id: self.id,
            customer: self.customer,
            vehicle: self.vehicle,
            building: self.building,
            location: self.location,
            worker: self.worker,
            amount_charged: self.amount_charged,
            old_balance: self.old_balance,
            total_amount: Decimal::ZERO,
            amount_paid: self.amount_paid,
            balance: Decimal::ZERO,
            status: InvoiceStatus::Pending,
            settled: InvoiceStatus::Pending,
            billing_month: self.billing_month,
            created_at: self.created_at,
            updated_at: self.updated_at.unwrap_or(self.created_at),
            invoice_mode: self.invoice_mode,
            completed_washes: self.completed_washes,
            expected_washes: self.expected_washes,
            per_wash_rate: self.per_wash_rate,
            collected_date: None,
            notes: self.notes,
            onewash: false,
            closures: self.closures,
            created_by: self.created_by,
            updated_by: None,
            is_deleted: false,
            deleted_by: None,
            deleted_at: None,
        };
        invoice.recompute();
        invoice
    }
}
