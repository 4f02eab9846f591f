use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::period::YearMonth;
use crate::schedule::WeekdaySet;

/// A subscribed vehicle, embedded in its [`Customer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    #[serde(default)]
    pub registration_no: Option<String>,
    #[serde(default)]
    pub parking_no: Option<String>,
    #[serde(default)]
    pub schedule_type: ScheduleType,
    /// Weekdays the vehicle is washed on; only meaningful for weekly schedules.
    #[serde(default)]
    pub schedule_days: WeekdaySet,
    #[serde(default)]
    pub status: VehicleStatus,
    /// First day of service (service-local day granularity).
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, alias = "deactivateDate")]
    pub deactivate_date: Option<DateTime<Utc>>,
    /// Subscription price per calendar month.
    #[serde(default, alias = "amount")]
    pub monthly_amount: Decimal,
    /// Assigned washer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
}

impl Vehicle {
    /// Worker reference, treating empty strings as unassigned.
    pub fn assigned_worker(&self) -> Option<&str> {
        non_empty(self.worker.as_deref())
    }

    /// Snapshot of the identifying fields, as printed on an invoice.
    pub fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot {
            id: self.id.clone(),
            registration_no: self.registration_no.clone(),
            parking_no: self.parking_no.clone(),
        }
    }
}

/// Recurrence of a vehicle's washes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    #[default]
    Daily,
    Weekly,
    #[serde(alias = "one_time", alias = "one-time")]
    Onetime,
}

/// Vehicle subscription status (stored as 1 = active, 2 = inactive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum VehicleStatus {
    #[default]
    Active,
    Inactive,
}

impl TryFrom<u8> for VehicleStatus {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Active),
            2 => Ok(Self::Inactive),
            other => Err(EngineError::Validation(format!(
                "unknown vehicle status code {other}"
            ))),
        }
    }
}

impl From<VehicleStatus> for u8 {
    fn from(value: VehicleStatus) -> Self {
        match value {
            VehicleStatus::Active => 1,
            VehicleStatus::Inactive => 2,
        }
    }
}

/// A customer and their vehicles. Owned by the CRUD side of the product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    /// Building reference; may be missing, empty or dangling.
    #[serde(default)]
    pub building: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
    #[serde(default, alias = "isDeleted")]
    pub is_deleted: bool,
}

impl Customer {
    /// Building reference, treating empty strings as absent.
    pub fn building_ref(&self) -> Option<&str> {
        non_empty(self.building.as_deref())
    }

    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if name.trim().is_empty() {
            "N/A".to_string()
        } else {
            name
        }
    }
}

/// A residential building customers are serviced at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Schedule vehicles here for today instead of tomorrow.
    #[serde(default, alias = "scheduleToday")]
    pub schedule_today: bool,
}

/// Lifecycle of a scheduled wash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Completed,
}

/// One scheduled wash of one vehicle on one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Batch id shared by every job created in one generator run.
    pub schedule_id: u64,
    pub customer: String,
    pub vehicle: String,
    pub building: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Service-local day the wash is due.
    pub assigned_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub completed_date: Option<DateTime<Utc>>,
    pub created_by: String,
    /// Scheduled for the same day because the building asked for it.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub immediate: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Payment state of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Completed,
}

/// How an invoice's charge was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceMode {
    /// Charge the vehicle's monthly amount.
    #[default]
    FullSubscription,
    /// Charge completed washes at `monthly amount / expected washes`.
    PerWash,
}

impl InvoiceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullSubscription => "full_subscription",
            Self::PerWash => "per_wash",
        }
    }
}

impl fmt::Display for InvoiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "full_subscription" => Ok(Self::FullSubscription),
            "per_wash" => Ok(Self::PerWash),
            other => Err(EngineError::Validation(format!(
                "unknown invoice mode '{other}' (expected full_subscription or per_wash)"
            ))),
        }
    }
}

/// Vehicle identity as it was when the invoice was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub id: String,
    #[serde(default)]
    pub registration_no: Option<String>,
    #[serde(default)]
    pub parking_no: Option<String>,
}

/// What a month-end close did to an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureKind {
    /// The invoice was closed; `amount` is its balance before closing.
    Closed,
    /// The invoice was created to carry `amount` forward.
    CarryCreated,
    /// `amount` was added to the invoice's old balance.
    CarryApplied,
}

/// Marker left on every invoice touched by one month-end close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureStamp {
    pub batch_id: u64,
    pub kind: ClosureKind,
    pub amount: Decimal,
}

/// A monthly invoice (payment record) for one vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Sequential id from the `payments` counter.
    pub id: u64,
    pub customer: String,
    pub vehicle: VehicleSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    pub amount_charged: Decimal,
    pub old_balance: Decimal,
    /// `amount_charged + old_balance`.
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    /// `total_amount - amount_paid`.
    pub balance: Decimal,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub settled: InvoiceStatus,
    /// Month of service; absent on legacy records.
    #[serde(default)]
    pub billing_month: Option<YearMonth>,
    /// Issue date: the 1st of the month after the billing month.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub invoice_mode: Option<InvoiceMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_washes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_washes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_wash_rate: Option<Decimal>,
    #[serde(default)]
    pub collected_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    /// One-off wash invoices live in the same collection but a separate family.
    #[serde(default)]
    pub onewash: bool,
    #[serde(default)]
    pub closures: Vec<ClosureStamp>,
    pub created_by: String,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub deleted_by: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Recompute `total_amount` and `balance` from their parts.
    pub fn recompute(&mut self) {
        self.total_amount = self.amount_charged + self.old_balance;
        self.balance = self.total_amount - self.amount_paid;
    }

    /// Append a note, separated from earlier notes by `" | "`.
    pub fn append_note(&mut self, note: &str) {
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.is_empty() => format!("{existing} | {note}"),
            _ => note.to_string(),
        });
    }

    /// Stamps left by one closure batch.
    pub fn stamps_for(&self, batch_id: u64) -> impl Iterator<Item = &ClosureStamp> {
        self.closures.iter().filter(move |s| s.batch_id == batch_id)
    }

    /// Billing month of the invoice, falling back to the month before its
    /// issue date for legacy records.
    pub fn effective_billing_month(&self) -> YearMonth {
        self.billing_month
            .unwrap_or_else(|| YearMonth::of_instant(self.created_at).prev())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
