//! Store collaborator traits.
//!
//! The engine never talks to a database directly. Customers, buildings,
//! jobs, invoices and counters are reached through these traits, so any
//! backend (a document store, SQL, or the in-memory store used in tests)
//! can be plugged in.
//!
//! # Implementing the traits
//!
//! Return `Err` only for infrastructure failures: connectivity, timeouts,
//! schema violations. Absent records are `Ok(None)` or empty vectors.
//! Implementations should enforce two uniqueness constraints and report
//! violations as [`StoreError::Duplicate`]:
//!
//! - invoices: `(customer, vehicle, billing_month)` among non-deleted,
//!   non-onewash invoices that carry a billing month;
//! - jobs: `(customer, vehicle, assigned_date)` among non-deleted jobs.

mod filter;

pub use filter::{CustomerFilter, InvoiceFilter, PeriodMatch};

use crate::core::{Building, Customer, Invoice, Job, MonthWindow, StoreError};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Read access to customers and their embedded vehicles.
#[allow(async_fn_in_trait)]
pub trait CustomerStore: Send + Sync {
    /// Non-deleted customers matching `filter`.
    async fn customers(&self, filter: &CustomerFilter) -> StoreResult<Vec<Customer>>;
}

/// Read access to buildings.
#[allow(async_fn_in_trait)]
pub trait BuildingStore: Send + Sync {
    /// Fetch a building by id.
    ///
    /// # Returns
    /// - `Ok(Some(building))` - Building found
    /// - `Ok(None)` - Dangling reference (not an error)
    async fn building(&self, id: &str) -> StoreResult<Option<Building>>;
}

/// Outcome of a bulk job insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobInsertReport {
    pub inserted: usize,
    /// Rows skipped because a job for the same vehicle and day already existed.
    pub duplicates: usize,
}

/// Job persistence.
#[allow(async_fn_in_trait)]
pub trait JobStore: Send + Sync {
    /// Insert jobs in one write. Rows that collide with an existing job for
    /// the same customer, vehicle and day are skipped and counted.
    async fn insert_jobs(&self, jobs: Vec<Job>) -> StoreResult<JobInsertReport>;

    /// Non-deleted completed jobs whose completion falls in `window`.
    async fn completed_jobs(&self, window: &MonthWindow) -> StoreResult<Vec<Job>>;
}

/// Invoice persistence.
#[allow(async_fn_in_trait)]
pub trait InvoiceStore: Send + Sync {
    async fn count_invoices(&self, filter: &InvoiceFilter) -> StoreResult<u64>;

    /// Invoices matching `filter`, in insertion order.
    async fn find_invoices(&self, filter: &InvoiceFilter) -> StoreResult<Vec<Invoice>>;

    /// Most recently inserted non-deleted, non-onewash invoice for a vehicle.
    async fn last_invoice(&self, customer: &str, vehicle: &str) -> StoreResult<Option<Invoice>>;

    /// Insert invoices in one all-or-nothing write.
    ///
    /// # Errors
    /// Returns [`StoreError::Duplicate`] if any invoice collides with an
    /// existing one (or another in the batch); nothing is written then.
    async fn insert_invoices(&self, invoices: Vec<Invoice>) -> StoreResult<()>;

    async fn insert_invoice(&self, invoice: Invoice) -> StoreResult<()> {
        self.insert_invoices(vec![invoice]).await
    }

    /// Replace a stored invoice (matched by id).
    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<()>;
}

/// Named monotonic counters.
#[allow(async_fn_in_trait)]
pub trait CounterService: Send + Sync {
    /// Allocate the next value of `counter`. Values are never reused.
    async fn next_id(&self, counter: &str) -> StoreResult<u64>;
}
