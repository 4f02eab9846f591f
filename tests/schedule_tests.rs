//! Property tests for the schedule evaluator.
//!
//! Run with: `cargo test --test schedule_tests`

#![cfg(feature = "memory-store")]

mod common;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use common::*;
use proptest::prelude::*;
use rust_decimal_macros::dec;
use washcycle::core::*;
use washcycle::schedule::{ScheduleEvaluator, WeekdaySet, count_due_days, is_due};

const WEEK: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0u64..3650).prop_map(|n| date(2022, 1, 1) + Days::new(n))
}

fn arb_days() -> impl Strategy<Value = Vec<Weekday>> {
    (1u8..128).prop_map(|bits| {
        WEEK.iter()
            .enumerate()
            .filter(|(i, _)| bits & (1 << i) != 0)
            .map(|(_, d)| *d)
            .collect()
    })
}

/// The stored shapes of a schedule-day list.
#[derive(Debug, Clone, Copy)]
enum Form {
    Abbreviations,
    FullNames,
    CommaList,
    DayValuePairs,
}

fn arb_form() -> impl Strategy<Value = Form> {
    prop_oneof![
        Just(Form::Abbreviations),
        Just(Form::FullNames),
        Just(Form::CommaList),
        Just(Form::DayValuePairs),
    ]
}

fn full_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

fn schedule_days_json(days: &[Weekday], form: Form) -> String {
    match form {
        Form::Abbreviations => {
            let items: Vec<String> = days.iter().map(|d| format!("\"{d}\"")).collect();
            format!("[{}]", items.join(","))
        }
        Form::FullNames => {
            let items: Vec<String> = days
                .iter()
                .map(|d| format!("\"{}\"", full_name(*d).to_lowercase()))
                .collect();
            format!("[{}]", items.join(","))
        }
        Form::CommaList => {
            let items: Vec<String> = days.iter().map(|d| d.to_string()).collect();
            format!("\"{}\"", items.join(", "))
        }
        Form::DayValuePairs => {
            let items: Vec<String> = days
                .iter()
                .map(|d| format!(r#"{{"day":"{d}","value":{}}}"#, d.num_days_from_sunday()))
                .collect();
            format!("[{}]", items.join(","))
        }
    }
}

fn weekly_vehicle(days_json: &str) -> Vehicle {
    serde_json::from_str(&format!(
        r#"{{"id":"v1","schedule_type":"weekly","schedule_days":{days_json},"monthly_amount":"200"}}"#
    ))
    .unwrap()
}

proptest! {
    /// A daily vehicle in its active window is due every day.
    #[test]
    fn daily_is_due_inside_window(day in arb_date(), lead in 0u64..400) {
        let mut v = vehicle("v1", ScheduleType::Daily, dec!(100));
        v.start_date = Some(start_of_service_day(day - Days::new(lead)));
        prop_assert!(is_due(&v, day));
    }

    /// Weekly schedules are due exactly on their listed weekdays, whatever
    /// shape the list was stored in.
    #[test]
    fn weekly_matches_listed_days(days in arb_days(), form in arb_form(), day in arb_date()) {
        let v = weekly_vehicle(&schedule_days_json(&days, form));
        prop_assert_eq!(v.schedule_days, WeekdaySet::from_days(days.iter().copied()));
        prop_assert_eq!(is_due(&v, day), days.contains(&day.weekday()));
    }

    /// Nothing is due before the start date.
    #[test]
    fn never_due_before_start(day in arb_date(), gap in 1u64..60) {
        let mut v = vehicle("v1", ScheduleType::Daily, dec!(100));
        v.start_date = Some(start_of_service_day(day + Days::new(gap)));
        prop_assert!(!is_due(&v, day));
        prop_assert!(is_due(&v, day + Days::new(gap)));
    }

    /// An inactive vehicle is never due on or after its deactivation date.
    #[test]
    fn never_due_after_deactivation(day in arb_date(), after in 0u64..60) {
        let mut v = vehicle("v1", ScheduleType::Daily, dec!(100));
        v.status = VehicleStatus::Inactive;
        v.deactivate_date = Some(start_of_service_day(day));
        prop_assert!(!is_due(&v, day + Days::new(after)));
        prop_assert!(is_due(&v, day - Days::new(1)));
    }

    /// The billing count is the day-by-day sum of billing due days.
    #[test]
    fn count_matches_day_by_day(days in arb_days(), start in arb_date(), len in 0u64..62) {
        let v = weekly_vehicle(&schedule_days_json(&days, Form::Abbreviations));
        let end = start + Days::new(len);
        let billing = ScheduleEvaluator::billing();
        let manual = start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| billing.is_due(&v, *d))
            .count() as u32;
        prop_assert_eq!(count_due_days(&v, start, end), manual);
    }
}

#[test]
fn onetime_is_never_due() {
    let v = vehicle("v1", ScheduleType::Onetime, dec!(50));
    assert!(date(2026, 3, 1).iter_days().take(14).all(|d| !is_due(&v, d)));
}

#[test]
fn weekly_without_days_is_never_due() {
    let v = weekly_vehicle("[]");
    assert_eq!(count_due_days(&v, date(2026, 3, 1), date(2026, 3, 31)), 0);
}

#[test]
fn daily_counts_differ_between_jobs_and_billing() {
    let v = vehicle("v1", ScheduleType::Daily, dec!(260));
    let (first, last) = (date(2026, 3, 1), date(2026, 3, 31));
    assert_eq!(ScheduleEvaluator::jobs().count_due_days(&v, first, last), 31);
    assert_eq!(ScheduleEvaluator::billing().count_due_days(&v, first, last), 26);
}

#[test]
fn start_date_uses_service_day() {
    // 22:00 UTC on March 9th is already March 10th in Dubai.
    let mut v = vehicle("v1", ScheduleType::Daily, dec!(100));
    v.start_date = Some(local(2026, 3, 10, 2, 0));
    assert!(!is_due(&v, date(2026, 3, 9)));
    assert!(is_due(&v, date(2026, 3, 10)));
}
