use crate::core::{ClosureKind, Customer, Invoice, InvoiceStatus, MonthWindow, YearMonth};

/// Which customers a generator run reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomerFilter {
    /// Only customers with a non-empty building reference.
    pub with_building: bool,
}

impl CustomerFilter {
    /// Every non-deleted customer.
    pub fn all() -> Self {
        Self::default()
    }

    /// Non-deleted customers that reference a building.
    pub fn with_building() -> Self {
        Self {
            with_building: true,
        }
    }

    pub fn matches(&self, customer: &Customer) -> bool {
        !customer.is_deleted && (!self.with_building || customer.building_ref().is_some())
    }
}

/// Which month an invoice belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodMatch {
    /// Issue date inside the window.
    CreatedIn(MonthWindow),
    /// Carries the billing-month key, or (legacy records without a key)
    /// was issued inside `legacy_window`.
    BilledFor {
        month: YearMonth,
        legacy_window: MonthWindow,
    },
}

impl PeriodMatch {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        match self {
            Self::CreatedIn(window) => window.contains(invoice.created_at),
            Self::BilledFor {
                month,
                legacy_window,
            } => match invoice.billing_month {
                Some(key) => key == *month,
                None => legacy_window.contains(invoice.created_at),
            },
        }
    }
}

/// Invoice query.
///
/// `None` fields match anything. The defaults select live recurring
/// invoices: not deleted and not in the one-wash family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceFilter {
    pub deleted: Option<bool>,
    pub onewash: Option<bool>,
    pub status: Option<InvoiceStatus>,
    pub customer: Option<String>,
    pub vehicle: Option<String>,
    pub period: Option<PeriodMatch>,
    /// Touched by this closure batch.
    pub closure_batch: Option<u64>,
    /// Created by a month-end close to carry a balance, and not yet billed.
    pub carry_created: Option<bool>,
}

impl Default for InvoiceFilter {
    fn default() -> Self {
        Self {
            deleted: Some(false),
            onewash: Some(false),
            status: None,
            customer: None,
            vehicle: None,
            period: None,
            closure_batch: None,
            carry_created: None,
        }
    }
}

impl InvoiceFilter {
    /// Live recurring invoices.
    pub fn recurring() -> Self {
        Self::default()
    }

    /// Duplicate-guard query for a billing month.
    ///
    /// Legacy records without a billing-month key are attributed to the
    /// month their issue date falls in. Carry-forward invoices a close
    /// created for the month do not count: the run bills into them.
    pub fn billed_for(month: YearMonth) -> Self {
        Self {
            period: Some(PeriodMatch::BilledFor {
                month,
                legacy_window: month.window(),
            }),
            carry_created: Some(false),
            ..Self::default()
        }
    }

    /// Carry-forward invoices a close created for `month`.
    pub fn carried_into(month: YearMonth) -> Self {
        Self {
            carry_created: Some(true),
            ..Self::billed_for(month)
        }
    }

    pub fn status(mut self, status: InvoiceStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn created_in(mut self, window: MonthWindow) -> Self {
        self.period = Some(PeriodMatch::CreatedIn(window));
        self
    }

    pub fn period(mut self, period: PeriodMatch) -> Self {
        self.period = Some(period);
        self
    }

    pub fn vehicle_of(mut self, customer: &str, vehicle: &str) -> Self {
        self.customer = Some(customer.to_string());
        self.vehicle = Some(vehicle.to_string());
        self
    }

    /// Match both live and deleted invoices.
    pub fn including_deleted(mut self) -> Self {
        self.deleted = None;
        self
    }

    pub fn closure_batch(mut self, batch_id: u64) -> Self {
        self.closure_batch = Some(batch_id);
        self
    }

    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.deleted.is_none_or(|d| invoice.is_deleted == d)
            && self.onewash.is_none_or(|o| invoice.onewash == o)
            && self.status.is_none_or(|s| invoice.status == s)
            && self
                .customer
                .as_deref()
                .is_none_or(|c| invoice.customer == c)
            && self
                .vehicle
                .as_deref()
                .is_none_or(|v| invoice.vehicle.id == v)
            && self.period.is_none_or(|p| p.matches(invoice))
            && self
                .closure_batch
                .is_none_or(|b| invoice.closures.iter().any(|s| s.batch_id == b))
            && self.carry_created.is_none_or(|c| {
                invoice
                    .closures
                    .iter()
                    .any(|s| s.kind == ClosureKind::CarryCreated)
                    == c
            })
    }
}
