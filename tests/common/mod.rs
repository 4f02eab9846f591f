//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use washcycle::core::*;
use washcycle::memstore::MemoryStore;
use washcycle::schedule::WeekdaySet;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn ym(y: i32, m: u32) -> YearMonth {
    YearMonth::new(y, m).unwrap()
}

/// Instant of a wall-clock time in the service time zone.
pub fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    SERVICE_TZ
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn vehicle(id: &str, schedule_type: ScheduleType, amount: Decimal) -> Vehicle {
    Vehicle {
        id: id.into(),
        registration_no: Some(format!("DXB {id}")),
        parking_no: Some("P1-07".into()),
        schedule_type,
        schedule_days: WeekdaySet::empty(),
        status: VehicleStatus::Active,
        start_date: None,
        deactivate_date: None,
        monthly_amount: amount,
        worker: None,
    }
}

pub fn customer(id: &str, building: &str, vehicles: Vec<Vehicle>) -> Customer {
    Customer {
        id: id.into(),
        first_name: Some("Test".into()),
        last_name: Some(id.to_uppercase()),
        mobile: None,
        building: Some(building.into()),
        location: Some("Marina".into()),
        vehicles,
        is_deleted: false,
    }
}

pub fn building(id: &str, schedule_today: bool) -> Building {
    Building {
        id: id.into(),
        name: Some(format!("Tower {id}")),
        schedule_today,
    }
}

pub fn completed_job(customer: &str, vehicle: &str, day: NaiveDate) -> Job {
    Job {
        schedule_id: 1,
        customer: customer.into(),
        vehicle: vehicle.into(),
        building: "b1".into(),
        location: None,
        assigned_date: day,
        worker: None,
        status: JobStatus::Completed,
        completed_date: Some(start_of_service_day(day) + chrono::Duration::hours(10)),
        created_by: "Cron Scheduler".into(),
        immediate: false,
        is_deleted: false,
    }
}

/// Store with one building and the given customers.
pub async fn store_with(customers: Vec<Customer>) -> MemoryStore {
    let store = MemoryStore::new();
    store.add_building(building("b1", false));
    for c in customers {
        store.add_customer(c).await;
    }
    store
}
