//! Service-time-zone calendar helpers.
//!
//! Every day-of-week and month-boundary decision in the engine is made in
//! [`SERVICE_TZ`]. Timestamps are stored in UTC and converted on the way in.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::error::EngineError;

/// Time zone the service operates in.
pub const SERVICE_TZ: Tz = chrono_tz::Asia::Dubai;

/// Calendar date of `ts` in the service time zone.
pub fn service_date(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&SERVICE_TZ).date_naive()
}

/// UTC instant of service-local midnight at the start of `date`.
pub fn start_of_service_day(date: NaiveDate) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    match SERVICE_TZ.from_local_datetime(&local).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        // Asia/Dubai has no DST gaps; fall back to treating the value as UTC.
        None => Utc.from_utc_datetime(&local),
    }
}

/// A calendar month, keyed as `"YYYY-MM"`.
///
/// Used both as the billing-month key on invoices and as the target of
/// month-end operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Create from a year and a 1-based month (1 = January).
    pub fn new(year: i32, month: u32) -> Result<Self, EngineError> {
        if !(1..=12).contains(&month) {
            return Err(EngineError::Period(format!(
                "month {month} is out of range (1-12)"
            )));
        }
        if !(1..=9999).contains(&year) {
            return Err(EngineError::Period(format!(
                "year {year} is out of range (1-9999)"
            )));
        }
        Ok(Self { year, month })
    }

    /// Create from a year and a 0-based month index (0 = January).
    pub fn from_index(year: i32, month_index: u32) -> Result<Self, EngineError> {
        Self::new(year, month_index + 1)
    }

    /// Month containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Service-local month containing the instant `ts`.
    pub fn of_instant(ts: DateTime<Utc>) -> Self {
        Self::containing(service_date(ts))
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// 1-based month number.
    pub fn month(&self) -> u32 {
        self.month
    }

    /// 0-based month index.
    pub fn month_index(&self) -> u32 {
        self.month - 1
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        // Always valid: year and month are range-checked on construction.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn last_day(&self) -> NaiveDate {
        let first = self.first_day();
        self.next().first_day().pred_opt().unwrap_or(first)
    }

    /// Every calendar day of the month, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let last = self.last_day();
        self.first_day().iter_days().take_while(move |d| *d <= last)
    }

    /// The month as a half-open window of UTC instants.
    pub fn window(&self) -> MonthWindow {
        MonthWindow {
            start: start_of_service_day(self.first_day()),
            end: start_of_service_day(self.next().first_day()),
        }
    }

    /// Issue date of invoices billing this month: midnight on the 1st of
    /// the following month.
    pub fn invoice_date(&self) -> DateTime<Utc> {
        start_of_service_day(self.next().first_day())
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| EngineError::Period(format!("'{s}' is not in YYYY-MM form")))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| EngineError::Period(format!("invalid year in '{s}'")))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| EngineError::Period(format!("invalid month in '{s}'")))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// Half-open range `[start, end)` of UTC instants covering one service-local month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MonthWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Where a billing month came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodSource {
    /// Supplied by an operator.
    Explicit,
    /// Unattended run: the month before the run date.
    PreviousMonth,
}

/// A billing month together with how it was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPeriod {
    pub month: YearMonth,
    pub source: PeriodSource,
}

/// Chooses the billing month for an invoice run.
///
/// The monthly trigger fires on the 1st and bills the month that just
/// ended; operators may name any month explicitly.
#[derive(Debug, Clone, Copy)]
pub struct BillingPeriodResolver {
    now: DateTime<Utc>,
}

impl BillingPeriodResolver {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn resolve(&self, requested: Option<YearMonth>) -> ResolvedPeriod {
        match requested {
            Some(month) => ResolvedPeriod {
                month,
                source: PeriodSource::Explicit,
            },
            None => ResolvedPeriod {
                month: YearMonth::of_instant(self.now).prev(),
                source: PeriodSource::PreviousMonth,
            },
        }
    }
}
