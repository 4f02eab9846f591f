//! Job generator scenarios against the in-memory store.

#![cfg(feature = "memory-store")]

mod common;

use chrono::Weekday;
use common::*;
use rust_decimal_macros::dec;
use washcycle::core::*;
use washcycle::jobs::JobGenerator;
use washcycle::report::RunReport;
use washcycle::schedule::WeekdaySet;
use washcycle::store::{CustomerStore, CustomerFilter};

#[tokio::test]
async fn schedule_today_building_gets_same_day_job() {
    let store = store_with(vec![]).await;
    store.add_building(building("b2", true));
    store
        .add_customer(customer(
            "c1",
            "b2",
            vec![vehicle("v1", ScheduleType::Daily, dec!(100))],
        ))
        .await;

    // 2026-03-02 16:05 in Dubai.
    let summary = JobGenerator::new(store.clone())
        .run_at(local(2026, 3, 2, 16, 5))
        .await
        .unwrap();

    assert_eq!(summary.generated, 1);
    assert_eq!(summary.immediate, 1);
    assert_eq!(summary.same_day_date, Some(date(2026, 3, 2)));
    assert_eq!(summary.target_date, Some(date(2026, 3, 3)));
    let report = RunReport::from(&summary);
    assert_eq!(
        report.message,
        format!(
            "Generated 1 jobs for 2026-03-03, 1 of them same-day for 2026-03-02 (schedule {})",
            summary.schedule_id
        )
    );
    let jobs = store.jobs().await;
    assert_eq!(jobs[0].assigned_date, date(2026, 3, 2));
    assert!(jobs[0].immediate);
    assert_eq!(jobs[0].building, "b2");
}

#[tokio::test]
async fn regular_building_gets_tomorrow() {
    let store = store_with(vec![customer(
        "c1",
        "b1",
        vec![vehicle("v1", ScheduleType::Daily, dec!(100))],
    )])
    .await;

    let summary = JobGenerator::new(store.clone())
        .run_at(local(2026, 3, 2, 16, 5))
        .await
        .unwrap();

    assert_eq!(summary.target_date, Some(date(2026, 3, 3)));
    assert_eq!(summary.same_day_date, None);
    assert!(!serde_json::to_string(&summary).unwrap().contains("sameDayDate"));
    let jobs = store.jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].assigned_date, date(2026, 3, 3));
    assert!(!jobs[0].immediate);
    assert_eq!(jobs[0].status, JobStatus::Pending);
    assert_eq!(jobs[0].schedule_id, summary.schedule_id);
}

#[tokio::test]
async fn vehicle_deactivated_yesterday_gets_no_job() {
    let mut gone = vehicle("v1", ScheduleType::Daily, dec!(100));
    gone.status = VehicleStatus::Inactive;
    gone.deactivate_date = Some(local(2026, 3, 2, 9, 0));
    let mut leaving = vehicle("v2", ScheduleType::Daily, dec!(100));
    leaving.status = VehicleStatus::Inactive;
    leaving.deactivate_date = Some(local(2026, 3, 10, 9, 0));

    let store = store_with(vec![customer("c1", "b1", vec![gone, leaving])]).await;
    let summary = JobGenerator::new(store.clone())
        .run_for_date(date(2026, 3, 3))
        .await
        .unwrap();

    assert_eq!(summary.vehicles_inactive, 1);
    assert_eq!(summary.generated, 1);
    assert_eq!(store.jobs().await[0].vehicle, "v2");
}

#[tokio::test]
async fn rerun_for_same_day_inserts_nothing_new() {
    let store = store_with(vec![customer(
        "c1",
        "b1",
        vec![
            vehicle("v1", ScheduleType::Daily, dec!(100)),
            vehicle("v2", ScheduleType::Daily, dec!(100)),
        ],
    )])
    .await;
    let generator = JobGenerator::new(store.clone());

    let first = generator.run_for_date(date(2026, 3, 3)).await.unwrap();
    let second = generator.run_for_date(date(2026, 3, 3)).await.unwrap();

    assert_eq!(first.generated, 2);
    assert_eq!(second.generated, 0);
    assert_eq!(second.duplicates, 2);
    assert_ne!(first.schedule_id, second.schedule_id);
    assert_eq!(store.jobs().await.len(), 2);
}

#[tokio::test]
async fn unresolved_building_skips_customer_only() {
    let store = store_with(vec![
        customer("c1", "missing", vec![vehicle("v1", ScheduleType::Daily, dec!(100))]),
        customer("c2", "b1", vec![vehicle("v2", ScheduleType::Daily, dec!(100))]),
    ])
    .await;
    let mut homeless = customer("c3", "", vec![vehicle("v3", ScheduleType::Daily, dec!(100))]);
    homeless.building = None;
    store.add_customer(homeless).await;

    let summary = JobGenerator::new(store.clone())
        .run_for_date(date(2026, 3, 3))
        .await
        .unwrap();

    assert_eq!(summary.customers_skipped, 1);
    assert_eq!(summary.generated, 1);
    assert_eq!(store.jobs().await[0].customer, "c2");
    // Customers without a building are not read at all.
    let read = store.customers(&CustomerFilter::with_building()).await.unwrap();
    assert_eq!(read.len(), 2);
}

#[tokio::test]
async fn worker_is_copied_only_when_assigned() {
    let mut with_worker = vehicle("v1", ScheduleType::Daily, dec!(100));
    with_worker.worker = Some("w7".into());
    let mut blank_worker = vehicle("v2", ScheduleType::Daily, dec!(100));
    blank_worker.worker = Some(String::new());

    let store = store_with(vec![customer("c1", "b1", vec![with_worker, blank_worker])]).await;
    JobGenerator::new(store.clone())
        .created_by("Ops")
        .run_for_date(date(2026, 3, 3))
        .await
        .unwrap();

    let jobs = store.jobs().await;
    assert_eq!(jobs[0].worker.as_deref(), Some("w7"));
    assert_eq!(jobs[1].worker, None);
    assert!(jobs.iter().all(|j| j.created_by == "Ops"));
    assert!(!serde_json::to_string(&jobs[1]).unwrap().contains("worker"));
}

#[tokio::test]
async fn weekly_and_not_started_vehicles_are_counted() {
    // 2026-03-03 is a Tuesday.
    let mut weekly = vehicle("v1", ScheduleType::Weekly, dec!(100));
    weekly.schedule_days = WeekdaySet::from_days([Weekday::Mon, Weekday::Thu]);
    let mut future = vehicle("v2", ScheduleType::Daily, dec!(100));
    future.start_date = Some(local(2026, 3, 4, 0, 0));
    let onetime = vehicle("v3", ScheduleType::Onetime, dec!(100));

    let store = store_with(vec![customer("c1", "b1", vec![weekly, future, onetime])]).await;
    let summary = JobGenerator::new(store.clone())
        .run_for_date(date(2026, 3, 3))
        .await
        .unwrap();

    assert_eq!(summary.not_due, 2);
    assert_eq!(summary.not_started, 1);
    assert_eq!(summary.generated, 0);
    assert!(store.jobs().await.is_empty());
}

#[tokio::test]
async fn empty_run_still_allocates_schedule_id() {
    let store = store_with(vec![]).await;
    let generator = JobGenerator::new(store.clone());
    let first = generator.run_for_date(date(2026, 3, 3)).await.unwrap();
    let second = generator.run_for_date(date(2026, 3, 4)).await.unwrap();
    assert_eq!(first.generated, 0);
    assert_eq!(second.schedule_id, first.schedule_id + 1);
}
