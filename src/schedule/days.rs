//! Weekday sets and their tolerant ingestion.
//!
//! Schedule days arrive in several shapes: `"Mon"`, `"monday"`,
//! `"Mon, Wed, Fri"`, `{ "day": "Mon", "value": 1 }`, or a bare index.
//! They are normalized once into a [`WeekdaySet`] when a vehicle is read.

use std::fmt;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

const DAY_NAMES: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

/// Sunday-indexed weekday number (0 = Sunday, 6 = Saturday).
pub fn weekday_index(day: Weekday) -> u8 {
    day.num_days_from_sunday() as u8
}

fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Resolve a day name by case-insensitive prefix ("Mon", "tues", "Thursday").
///
/// The prefix must be at least two letters and name exactly one weekday.
pub fn parse_day_name(token: &str) -> Option<Weekday> {
    let token = token.trim().trim_end_matches('.').to_ascii_lowercase();
    if token.len() < 2 {
        return None;
    }
    let mut matches = DAY_NAMES
        .iter()
        .enumerate()
        .filter(|(_, name)| name.starts_with(&token));
    let (index, _) = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    weekday_from_index(index as u8)
}

/// One schedule-day entry as stored by the CRUD side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleDay {
    /// Sunday-indexed weekday number.
    Index(i64),
    /// A day name, abbreviation, or comma/space separated list of them.
    Text(String),
    /// `{ day, value }` pair; either half may be missing.
    Entry {
        #[serde(default)]
        day: Option<String>,
        #[serde(default)]
        value: Option<i64>,
    },
}

impl ScheduleDay {
    /// Add every weekday this entry names to `set`. Returns false if the
    /// entry named nothing recognizable.
    fn apply(&self, set: &mut WeekdaySet) -> bool {
        match self {
            Self::Index(value) => apply_index(*value, set),
            Self::Text(text) => apply_text(text, set),
            Self::Entry { day, value } => {
                // Match by numeric value and by name; either is enough.
                let by_value = value.is_some_and(|v| apply_index(v, set));
                let by_name = day.as_deref().is_some_and(|d| apply_text(d, set));
                by_value || by_name
            }
        }
    }
}

fn apply_index(value: i64, set: &mut WeekdaySet) -> bool {
    match u8::try_from(value).ok().and_then(weekday_from_index) {
        Some(day) => {
            set.insert(day);
            true
        }
        None => false,
    }
}

fn apply_text(text: &str, set: &mut WeekdaySet) -> bool {
    let mut any = false;
    for token in text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        if let Some(day) = parse_day_name(token) {
            set.insert(day);
            any = true;
        }
    }
    any
}

/// Raw schedule-day field: a list of entries or a single entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawScheduleDays {
    List(Vec<ScheduleDay>),
    Single(ScheduleDay),
    /// Explicit `null`.
    Null(()),
}

/// A set of weekdays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "RawScheduleDays", into = "Vec<ScheduleDay>")]
pub struct WeekdaySet {
    bits: u8,
}

impl WeekdaySet {
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Monday through Saturday.
    pub const fn working_week() -> Self {
        Self { bits: 0b0111_1110 }
    }

    pub fn every_day() -> Self {
        Self { bits: 0b0111_1111 }
    }

    pub fn from_days(days: impl IntoIterator<Item = Weekday>) -> Self {
        let mut set = Self::empty();
        for day in days {
            set.insert(day);
        }
        set
    }

    /// Normalize raw entries, ignoring (and logging) unrecognizable ones.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a ScheduleDay>) -> Self {
        let mut set = Self::empty();
        for entry in entries {
            if !entry.apply(&mut set) {
                warn!("Ignoring unrecognized schedule day {entry:?}");
            }
        }
        set
    }

    pub fn insert(&mut self, day: Weekday) {
        self.bits |= 1 << weekday_index(day);
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.bits & (1 << weekday_index(day)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Days in Sunday-first order.
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + use<> {
        let bits = self.bits;
        (0u8..7)
            .filter(move |i| bits & (1 << i) != 0)
            .filter_map(weekday_from_index)
    }
}

impl From<RawScheduleDays> for WeekdaySet {
    fn from(raw: RawScheduleDays) -> Self {
        match raw {
            RawScheduleDays::List(entries) => Self::from_entries(&entries),
            RawScheduleDays::Single(entry) => Self::from_entries([&entry]),
            RawScheduleDays::Null(()) => Self::empty(),
        }
    }
}

impl From<WeekdaySet> for Vec<ScheduleDay> {
    fn from(set: WeekdaySet) -> Self {
        set.iter()
            .map(|day| ScheduleDay::Entry {
                day: Some(day.to_string()),
                value: Some(i64::from(weekday_index(day))),
            })
            .collect()
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.iter().map(|d| d.to_string()).collect::<Vec<_>>();
        f.write_str(&names.join(", "))
    }
}
