//! Batch runs against a store that fails some writes.

#![cfg(feature = "memory-store")]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use common::*;
use rust_decimal_macros::dec;
use washcycle::core::*;
use washcycle::invoicing::{InvoiceGenerator, InvoiceRunOutcome};
use washcycle::memstore::MemoryStore;
use washcycle::month_end::MonthEndCloser;
use washcycle::report::RunReport;
use washcycle::store::{
    BuildingStore, CounterService, CustomerFilter, CustomerStore, InvoiceFilter, InvoiceStore,
    JobInsertReport, JobStore, StoreResult,
};

/// Memory store that rejects updates of one invoice id, and can report
/// every invoice insert as a collision.
#[derive(Clone)]
struct FailingStore {
    inner: MemoryStore,
    /// Invoice id whose updates fail; 0 for none.
    rejected_update: Arc<AtomicU64>,
    colliding_inserts: Arc<AtomicBool>,
}

impl FailingStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            rejected_update: Arc::new(AtomicU64::new(0)),
            colliding_inserts: Arc::new(AtomicBool::new(false)),
        }
    }

    fn reject_updates_of(&self, id: u64) {
        self.rejected_update.store(id, Ordering::SeqCst);
    }

    fn collide_on_insert(&self) {
        self.colliding_inserts.store(true, Ordering::SeqCst);
    }
}

impl CustomerStore for FailingStore {
    async fn customers(&self, filter: &CustomerFilter) -> StoreResult<Vec<Customer>> {
        self.inner.customers(filter).await
    }
}

impl BuildingStore for FailingStore {
    async fn building(&self, id: &str) -> StoreResult<Option<Building>> {
        self.inner.building(id).await
    }
}

impl JobStore for FailingStore {
    async fn insert_jobs(&self, jobs: Vec<Job>) -> StoreResult<JobInsertReport> {
        self.inner.insert_jobs(jobs).await
    }

    async fn completed_jobs(&self, window: &MonthWindow) -> StoreResult<Vec<Job>> {
        self.inner.completed_jobs(window).await
    }
}

impl InvoiceStore for FailingStore {
    async fn count_invoices(&self, filter: &InvoiceFilter) -> StoreResult<u64> {
        self.inner.count_invoices(filter).await
    }

    async fn find_invoices(&self, filter: &InvoiceFilter) -> StoreResult<Vec<Invoice>> {
        self.inner.find_invoices(filter).await
    }

    async fn last_invoice(&self, customer: &str, vehicle: &str) -> StoreResult<Option<Invoice>> {
        self.inner.last_invoice(customer, vehicle).await
    }

    async fn insert_invoices(&self, invoices: Vec<Invoice>) -> StoreResult<()> {
        if self.colliding_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Duplicate {
                collection: "invoices",
                key: "written by another run".to_string(),
            });
        }
        self.inner.insert_invoices(invoices).await
    }

    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        if self.rejected_update.load(Ordering::SeqCst) == invoice.id {
            return Err(StoreError::Unavailable(format!(
                "write timeout on invoice {}",
                invoice.id
            )));
        }
        self.inner.update_invoice(invoice).await
    }
}

impl CounterService for FailingStore {
    async fn next_id(&self, counter: &str) -> StoreResult<u64> {
        self.inner.next_id(counter).await
    }
}

/// Two vehicles billed for March, invoices 1 and 2.
async fn billed_march() -> FailingStore {
    let store = FailingStore::new(
        store_with(vec![customer(
            "c1",
            "b1",
            vec![
                vehicle("v1", ScheduleType::Daily, dec!(100)),
                vehicle("v2", ScheduleType::Daily, dec!(50)),
            ],
        )])
        .await,
    );
    InvoiceGenerator::new(store.clone())
        .run_at(local(2026, 4, 1, 0, 5), None, "full_subscription")
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn close_counts_a_failed_invoice_and_keeps_going() {
    let store = billed_march().await;
    store.reject_updates_of(1);

    let summary = MonthEndCloser::new(store.clone())
        .close(ym(2026, 4), local(2026, 4, 30, 22, 0))
        .await
        .unwrap();

    assert_eq!(summary.batch_id, Some(1));
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.closed, 1);
    assert_eq!(summary.next_created, 1);
    assert_eq!(summary.carried_total, dec!(50));
    assert!(!RunReport::from(&summary).success);

    assert_eq!(store.inner.invoice(1).await.unwrap().status, InvoiceStatus::Pending);
    assert_eq!(store.inner.invoice(2).await.unwrap().status, InvoiceStatus::Completed);
}

#[tokio::test]
async fn revert_counts_a_failed_invoice_and_keeps_going() {
    let store = billed_march().await;
    let closer = MonthEndCloser::new(store.clone());
    closer
        .close(ym(2026, 4), local(2026, 4, 30, 22, 0))
        .await
        .unwrap();
    store.reject_updates_of(1);

    let summary = closer
        .revert(ym(2026, 4), local(2026, 5, 2, 9, 0))
        .await
        .unwrap();

    assert_eq!(summary.batches, vec![1]);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.reopened, 1);
    assert_eq!(summary.deleted, 2);
    assert!(!RunReport::from(&summary).success);

    assert_eq!(store.inner.invoice(1).await.unwrap().status, InvoiceStatus::Completed);
    assert_eq!(store.inner.invoice(2).await.unwrap().status, InvoiceStatus::Pending);
}

#[tokio::test]
async fn colliding_bulk_insert_reports_the_run_blocked() {
    let store = FailingStore::new(
        store_with(vec![customer(
            "c1",
            "b1",
            vec![vehicle("v1", ScheduleType::Daily, dec!(100))],
        )])
        .await,
    );
    store.collide_on_insert();

    let outcome = InvoiceGenerator::new(store.clone())
        .run_at(local(2026, 4, 1, 0, 5), None, "full_subscription")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        InvoiceRunOutcome::Blocked {
            billing_month: ym(2026, 3),
            existing_count: 1,
        }
    );
    assert!(RunReport::from(&outcome).blocked);
    assert!(store.inner.invoices().await.is_empty());
}
