use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::days::WeekdaySet;
use crate::core::{ScheduleType, Vehicle, VehicleStatus, service_date};

/// Which days a `daily` schedule covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DailyRule {
    /// Every calendar day. Used when generating jobs.
    EveryDay,
    /// Monday through Saturday. Used for the per-wash expected-wash count.
    WorkingWeek,
}

/// Where `date` falls relative to a vehicle's active window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceWindow {
    Active,
    /// Before the vehicle's start date.
    NotStarted,
    /// Inactive, with a deactivation date on or before `date`.
    Deactivated,
}

/// Decides whether a vehicle is due for a wash on a service-local date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEvaluator {
    daily: DailyRule,
}

impl ScheduleEvaluator {
    pub const fn new(daily: DailyRule) -> Self {
        Self { daily }
    }

    /// Evaluator for job generation: `daily` means every day.
    pub const fn jobs() -> Self {
        Self::new(DailyRule::EveryDay)
    }

    /// Evaluator for per-wash billing: `daily` means Monday to Saturday.
    pub const fn billing() -> Self {
        Self::new(DailyRule::WorkingWeek)
    }

    /// Position of `date` relative to the vehicle's active window.
    ///
    /// An inactive vehicle without a deactivation date counts as already
    /// deactivated.
    pub fn window(&self, vehicle: &Vehicle, date: NaiveDate) -> ServiceWindow {
        if vehicle.status == VehicleStatus::Inactive {
            let deactivated_by = vehicle
                .deactivate_date
                .map(service_date)
                .is_none_or(|day| day <= date);
            if deactivated_by {
                return ServiceWindow::Deactivated;
            }
        }
        if vehicle
            .start_date
            .map(service_date)
            .is_some_and(|start| start > date)
        {
            return ServiceWindow::NotStarted;
        }
        ServiceWindow::Active
    }

    /// Whether the vehicle's recurrence alone selects `date`, ignoring the
    /// active window.
    pub fn matches_recurrence(&self, vehicle: &Vehicle, date: NaiveDate) -> bool {
        match vehicle.schedule_type {
            ScheduleType::Daily => match self.daily {
                DailyRule::EveryDay => true,
                DailyRule::WorkingWeek => WeekdaySet::working_week().contains(date.weekday()),
            },
            ScheduleType::Weekly => vehicle.schedule_days.contains(date.weekday()),
            // One-off washes are booked manually, never by the recurring engine.
            ScheduleType::Onetime => false,
        }
    }

    pub fn is_due(&self, vehicle: &Vehicle, date: NaiveDate) -> bool {
        self.window(vehicle, date) == ServiceWindow::Active
            && self.matches_recurrence(vehicle, date)
    }

    /// Number of due days in `[start, end]`, both inclusive.
    pub fn count_due_days(&self, vehicle: &Vehicle, start: NaiveDate, end: NaiveDate) -> u32 {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_due(vehicle, *d))
            .count() as u32
    }
}

/// Whether `vehicle` is due on `date`, with job-generation semantics.
pub fn is_due(vehicle: &Vehicle, date: NaiveDate) -> bool {
    ScheduleEvaluator::jobs().is_due(vehicle, date)
}

/// Due days in `[start, end]`, with per-wash billing semantics.
pub fn count_due_days(vehicle: &Vehicle, start: NaiveDate, end: NaiveDate) -> u32 {
    ScheduleEvaluator::billing().count_due_days(vehicle, start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::start_of_service_day;
    use chrono::Weekday;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn vehicle(schedule_type: ScheduleType, days: WeekdaySet) -> Vehicle {
        Vehicle {
            id: "v1".into(),
            registration_no: Some("D 12345".into()),
            parking_no: Some("B2-14".into()),
            schedule_type,
            schedule_days: days,
            status: VehicleStatus::Active,
            start_date: None,
            deactivate_date: None,
            monthly_amount: dec!(260),
            worker: None,
        }
    }

    #[test]
    fn daily_is_due_every_day_for_jobs() {
        let v = vehicle(ScheduleType::Daily, WeekdaySet::empty());
        // 2026-03-01 is a Sunday.
        assert_eq!(date(2026, 3, 1).weekday(), Weekday::Sun);
        assert!(is_due(&v, date(2026, 3, 1)));
        assert!(is_due(&v, date(2026, 3, 2)));
    }

    #[test]
    fn daily_skips_sunday_for_billing() {
        let v = vehicle(ScheduleType::Daily, WeekdaySet::empty());
        assert!(!ScheduleEvaluator::billing().is_due(&v, date(2026, 3, 1)));
        // March 2026: 31 days, 5 Sundays.
        assert_eq!(count_due_days(&v, date(2026, 3, 1), date(2026, 3, 31)), 26);
    }

    #[test]
    fn weekly_matches_schedule_days() {
        let v = vehicle(
            ScheduleType::Weekly,
            WeekdaySet::from_days([Weekday::Mon, Weekday::Thu]),
        );
        assert!(is_due(&v, date(2026, 3, 2)));
        assert!(!is_due(&v, date(2026, 3, 3)));
        assert!(is_due(&v, date(2026, 3, 5)));
        // Mondays and Thursdays in March 2026: 2,5,9,12,16,19,23,26,30.
        assert_eq!(count_due_days(&v, date(2026, 3, 1), date(2026, 3, 31)), 9);
    }

    #[test]
    fn weekly_without_days_is_never_due() {
        let v = vehicle(ScheduleType::Weekly, WeekdaySet::empty());
        assert_eq!(count_due_days(&v, date(2026, 3, 1), date(2026, 3, 31)), 0);
    }

    #[test]
    fn onetime_is_never_due() {
        let v = vehicle(ScheduleType::Onetime, WeekdaySet::empty());
        assert!(!is_due(&v, date(2026, 3, 2)));
    }

    #[test]
    fn not_due_before_start_date() {
        let mut v = vehicle(ScheduleType::Daily, WeekdaySet::empty());
        v.start_date = Some(start_of_service_day(date(2026, 3, 10)));
        assert_eq!(
            ScheduleEvaluator::jobs().window(&v, date(2026, 3, 9)),
            ServiceWindow::NotStarted
        );
        assert!(!is_due(&v, date(2026, 3, 9)));
        assert!(is_due(&v, date(2026, 3, 10)));
        // 10th..31st without Sundays (15, 22, 29).
        assert_eq!(count_due_days(&v, date(2026, 3, 1), date(2026, 3, 31)), 19);
    }

    #[test]
    fn start_date_uses_service_day() {
        let mut v = vehicle(ScheduleType::Daily, WeekdaySet::empty());
        // 10:00 on the 10th, Dubai time: still due on the 10th.
        v.start_date = Some(start_of_service_day(date(2026, 3, 10)) + chrono::Duration::hours(10));
        assert!(is_due(&v, date(2026, 3, 10)));
    }

    #[test]
    fn not_due_on_or_after_deactivation() {
        let mut v = vehicle(ScheduleType::Daily, WeekdaySet::empty());
        v.status = VehicleStatus::Inactive;
        v.deactivate_date = Some(start_of_service_day(date(2026, 3, 10)));
        assert!(is_due(&v, date(2026, 3, 9)));
        assert!(!is_due(&v, date(2026, 3, 10)));
        assert!(!is_due(&v, date(2026, 3, 11)));
    }

    #[test]
    fn inactive_without_date_is_deactivated() {
        let mut v = vehicle(ScheduleType::Daily, WeekdaySet::empty());
        v.status = VehicleStatus::Inactive;
        assert_eq!(
            ScheduleEvaluator::jobs().window(&v, date(2026, 3, 9)),
            ServiceWindow::Deactivated
        );
    }

    #[test]
    fn deactivate_date_ignored_while_active() {
        let mut v = vehicle(ScheduleType::Daily, WeekdaySet::empty());
        v.deactivate_date = Some(start_of_service_day(date(2026, 3, 1)));
        assert!(is_due(&v, date(2026, 3, 20)));
    }
}
