//! In-memory store (thread-safe, async).
//!
//! Implements every store trait over plain collections, enforcing the
//! invoice and job uniqueness constraints. The whole store can be dumped to
//! and restored from a JSON snapshot, which is what the command-line
//! binary runs against.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::{
    Building, Customer, Invoice, Job, JobStatus, MonthWindow, Sequence, StoreError, YearMonth,
};
use crate::store::{
    BuildingStore, CounterService, CustomerFilter, CustomerStore, InvoiceFilter, InvoiceStore,
    JobInsertReport, JobStore, StoreResult,
};

/// Serialized form of a [`MemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub buildings: Vec<Building>,
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    /// Last issued value per counter.
    #[serde(default)]
    pub counters: BTreeMap<String, u64>,
}

type InvoiceKey = (String, String, YearMonth);
type JobKey = (String, String, NaiveDate);

fn invoice_key(invoice: &Invoice) -> Option<InvoiceKey> {
    if invoice.is_deleted || invoice.onewash {
        return None;
    }
    invoice
        .billing_month
        .map(|month| (invoice.customer.clone(), invoice.vehicle.id.clone(), month))
}

fn job_key(job: &Job) -> Option<JobKey> {
    (!job.is_deleted).then(|| (job.customer.clone(), job.vehicle.clone(), job.assigned_date))
}

fn duplicate_invoice(key: &InvoiceKey) -> StoreError {
    StoreError::Duplicate {
        collection: "invoices",
        key: format!("{}/{}/{}", key.0, key.1, key.2),
    }
}

#[derive(Default)]
struct Inner {
    customers: RwLock<Vec<Customer>>,
    buildings: DashMap<String, Building>,
    jobs: RwLock<Vec<Job>>,
    invoices: RwLock<Vec<Invoice>>,
    counters: DashMap<String, Sequence>,
}

/// Thread-safe in-memory store.
///
/// Cloning is cheap; clones share the same data.
///
/// # Example
///
/// ```
/// use washcycle::memstore::MemoryStore;
/// use washcycle::store::CounterService;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// assert_eq!(store.next_id("payments").await?, 1);
/// assert_eq!(store.next_id("payments").await?, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let buildings = snapshot
            .buildings
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();
        let counters = snapshot
            .counters
            .into_iter()
            .map(|(name, current)| (name, Sequence::starting_at(current.saturating_add(1))))
            .collect();

        Self {
            inner: Arc::new(Inner {
                customers: RwLock::new(snapshot.customers),
                buildings,
                jobs: RwLock::new(snapshot.jobs),
                invoices: RwLock::new(snapshot.invoices),
                counters,
            }),
        }
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> Snapshot {
        let mut buildings: Vec<Building> = self
            .inner
            .buildings
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        buildings.sort_by(|a, b| a.id.cmp(&b.id));

        Snapshot {
            customers: self.inner.customers.read().await.clone(),
            buildings,
            jobs: self.inner.jobs.read().await.clone(),
            invoices: self.inner.invoices.read().await.clone(),
            counters: self
                .inner
                .counters
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().current()))
                .collect(),
        }
    }

    /// Load a JSON snapshot file. A missing file yields an empty store.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("Snapshot {} not found, starting empty", path.display());
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Snapshot(format!("read {}: {e}", path.display())))?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Snapshot(format!("parse {}: {e}", path.display())))?;
        debug!(
            "Loaded snapshot {}: {} customers, {} jobs, {} invoices",
            path.display(),
            snapshot.customers.len(),
            snapshot.jobs.len(),
            snapshot.invoices.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current contents to a JSON snapshot file.
    pub async fn save(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.snapshot().await)
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| StoreError::Snapshot(format!("create {}: {e}", dir.display())))?;
        }
        std::fs::write(path, json)
            .map_err(|e| StoreError::Snapshot(format!("write {}: {e}", path.display())))?;
        debug!("Saved snapshot {}", path.display());
        Ok(())
    }

    pub async fn add_customer(&self, customer: Customer) {
        self.inner.customers.write().await.push(customer);
    }

    pub fn add_building(&self, building: Building) {
        self.inner.buildings.insert(building.id.clone(), building);
    }

    /// Every stored job, deleted ones included, in insertion order.
    pub async fn jobs(&self) -> Vec<Job> {
        self.inner.jobs.read().await.clone()
    }

    /// Every stored invoice, deleted ones included, in insertion order.
    pub async fn invoices(&self) -> Vec<Invoice> {
        self.inner.invoices.read().await.clone()
    }

    pub async fn invoice(&self, id: u64) -> Option<Invoice> {
        self.inner
            .invoices
            .read()
            .await
            .iter()
            .find(|inv| inv.id == id)
            .cloned()
    }
}

impl CustomerStore for MemoryStore {
    async fn customers(&self, filter: &CustomerFilter) -> StoreResult<Vec<Customer>> {
        Ok(self
            .inner
            .customers
            .read()
            .await
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }
}

impl BuildingStore for MemoryStore {
    async fn building(&self, id: &str) -> StoreResult<Option<Building>> {
        Ok(self.inner.buildings.get(id).map(|entry| entry.value().clone()))
    }
}

impl JobStore for MemoryStore {
    async fn insert_jobs(&self, jobs: Vec<Job>) -> StoreResult<JobInsertReport> {
        let mut stored = self.inner.jobs.write().await;
        let mut taken: HashSet<JobKey> = stored.iter().filter_map(job_key).collect();
        let mut report = JobInsertReport::default();

        for job in jobs {
            if let Some(key) = job_key(&job) {
                if !taken.insert(key) {
                    debug!(
                        "Skipping duplicate job for vehicle {} on {}",
                        job.vehicle, job.assigned_date
                    );
                    report.duplicates += 1;
                    continue;
                }
            }
            stored.push(job);
            report.inserted += 1;
        }

        Ok(report)
    }

    async fn completed_jobs(&self, window: &MonthWindow) -> StoreResult<Vec<Job>> {
        Ok(self
            .inner
            .jobs
            .read()
            .await
            .iter()
            .filter(|job| {
                !job.is_deleted
                    && job.status == JobStatus::Completed
                    && job.completed_date.is_some_and(|at| window.contains(at))
            })
            .cloned()
            .collect())
    }
}

impl InvoiceStore for MemoryStore {
    async fn count_invoices(&self, filter: &InvoiceFilter) -> StoreResult<u64> {
        let invoices = self.inner.invoices.read().await;
        Ok(invoices.iter().filter(|inv| filter.matches(inv)).count() as u64)
    }

    async fn find_invoices(&self, filter: &InvoiceFilter) -> StoreResult<Vec<Invoice>> {
        Ok(self
            .inner
            .invoices
            .read()
            .await
            .iter()
            .filter(|inv| filter.matches(inv))
            .cloned()
            .collect())
    }

    async fn last_invoice(&self, customer: &str, vehicle: &str) -> StoreResult<Option<Invoice>> {
        Ok(self
            .inner
            .invoices
            .read()
            .await
            .iter()
            .rev()
            .find(|inv| {
                !inv.is_deleted
                    && !inv.onewash
                    && inv.customer == customer
                    && inv.vehicle.id == vehicle
            })
            .cloned())
    }

    async fn insert_invoices(&self, invoices: Vec<Invoice>) -> StoreResult<()> {
        let mut stored = self.inner.invoices.write().await;
        let mut taken: HashSet<InvoiceKey> = stored.iter().filter_map(invoice_key).collect();
        let mut ids: HashSet<u64> = stored.iter().map(|inv| inv.id).collect();

        // Check the whole batch before writing anything.
        for invoice in &invoices {
            if !ids.insert(invoice.id) {
                return Err(StoreError::Duplicate {
                    collection: "invoices",
                    key: format!("id {}", invoice.id),
                });
            }
            if let Some(key) = invoice_key(invoice) {
                if !taken.insert(key.clone()) {
                    return Err(duplicate_invoice(&key));
                }
            }
        }

        stored.extend(invoices);
        Ok(())
    }

    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut stored = self.inner.invoices.write().await;

        if let Some(key) = invoice_key(invoice) {
            let clash = stored
                .iter()
                .any(|other| other.id != invoice.id && invoice_key(other).as_ref() == Some(&key));
            if clash {
                return Err(duplicate_invoice(&key));
            }
        }

        let slot = stored
            .iter_mut()
            .find(|inv| inv.id == invoice.id)
            .ok_or_else(|| StoreError::NotFound {
                collection: "invoices",
                id: invoice.id.to_string(),
            })?;
        *slot = invoice.clone();
        Ok(())
    }
}

impl CounterService for MemoryStore {
    async fn next_id(&self, counter: &str) -> StoreResult<u64> {
        let mut sequence = self.inner.counters.entry(counter.to_string()).or_default();
        sequence
            .next_value()
            .map_err(|e| StoreError::Unavailable(format!("counter {counter}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InvoiceBuilder, VehicleSnapshot};
    use rust_decimal_macros::dec;

    fn march() -> YearMonth {
        YearMonth::new(2026, 3).unwrap()
    }

    fn invoice(id: u64, vehicle: &str) -> Invoice {
        let snapshot = VehicleSnapshot {
            id: vehicle.into(),
            registration_no: None,
            parking_no: None,
        };
        InvoiceBuilder::new(id, "c1", snapshot, march().invoice_date())
            .billing_month(march())
            .charge(dec!(100))
            .build()
            .unwrap()
    }

    fn job(vehicle: &str, day: u32) -> Job {
        Job {
            schedule_id: 1,
            customer: "c1".into(),
            vehicle: vehicle.into(),
            building: "b1".into(),
            location: None,
            assigned_date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            worker: None,
            status: JobStatus::Pending,
            completed_date: None,
            created_by: "Cron Scheduler".into(),
            immediate: false,
            is_deleted: false,
        }
    }

    #[tokio::test]
    async fn bulk_invoice_insert_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.insert_invoices(vec![invoice(1, "v1")]).await.unwrap();

        let err = store
            .insert_invoices(vec![invoice(2, "v2"), invoice(3, "v1")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { collection: "invoices", .. }));
        assert_eq!(store.invoices().await.len(), 1);
    }

    #[tokio::test]
    async fn deleted_invoices_release_their_key() {
        let store = MemoryStore::new();
        let mut first = invoice(1, "v1");
        first.is_deleted = true;
        store.insert_invoices(vec![first]).await.unwrap();
        store.insert_invoices(vec![invoice(2, "v1")]).await.unwrap();
        assert_eq!(store.invoices().await.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_jobs_are_skipped() {
        let store = MemoryStore::new();
        let report = store
            .insert_jobs(vec![job("v1", 2), job("v1", 2), job("v2", 2)])
            .await
            .unwrap();
        assert_eq!(report, JobInsertReport { inserted: 2, duplicates: 1 });

        let rerun = store.insert_jobs(vec![job("v1", 2)]).await.unwrap();
        assert_eq!(rerun, JobInsertReport { inserted: 0, duplicates: 1 });
    }

    #[tokio::test]
    async fn last_invoice_uses_insertion_order() {
        let store = MemoryStore::new();
        let mut older = invoice(1, "v1");
        older.billing_month = Some(march().prev());
        let mut onewash = invoice(3, "v1");
        onewash.onewash = true;
        store
            .insert_invoices(vec![older, invoice(2, "v1"), onewash])
            .await
            .unwrap();

        let last = store.last_invoice("c1", "v1").await.unwrap().unwrap();
        assert_eq!(last.id, 2);
        assert!(store.last_invoice("c1", "v9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_requires_existing_record() {
        let store = MemoryStore::new();
        let err = store.update_invoice(&invoice(9, "v1")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn snapshot_preserves_counters() {
        let store = MemoryStore::new();
        store.next_id("payments").await.unwrap();
        store.next_id("payments").await.unwrap();
        store.insert_invoices(vec![invoice(2, "v1")]).await.unwrap();

        let restored = MemoryStore::from_snapshot(store.snapshot().await);
        assert_eq!(restored.next_id("payments").await.unwrap(), 3);
        assert_eq!(restored.next_id("scheduler").await.unwrap(), 1);
        assert_eq!(restored.invoices().await.len(), 1);
    }
}
