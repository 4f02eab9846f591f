//! Schedule evaluation: is a vehicle due on a given service-local day?
//!
//! ```
//! use chrono::NaiveDate;
//! use washcycle::schedule::{ScheduleEvaluator, WeekdaySet};
//! use washcycle::core::*;
//!
//! let vehicle: Vehicle = serde_json::from_str(
//!     r#"{"id":"v1","schedule_type":"weekly","schedule_days":"Mon, Thu","monthly_amount":"100"}"#,
//! ).unwrap();
//!
//! let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
//! assert!(ScheduleEvaluator::jobs().is_due(&vehicle, monday));
//! ```

mod days;
mod evaluator;

pub use days::{RawScheduleDays, ScheduleDay, WeekdaySet, parse_day_name, weekday_index};
pub use evaluator::{DailyRule, ScheduleEvaluator, ServiceWindow, count_due_days, is_due};
