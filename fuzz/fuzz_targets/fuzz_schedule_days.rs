#![no_main]

use chrono::NaiveDate;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must not panic: malformed day lists are dropped, not errors.
    let _ = serde_json::from_slice::<washcycle::schedule::WeekdaySet>(data);

    if let Ok(vehicle) = serde_json::from_slice::<washcycle::core::Vehicle>(data) {
        let Some(first) = NaiveDate::from_ymd_opt(2026, 3, 1) else {
            return;
        };
        let Some(last) = NaiveDate::from_ymd_opt(2026, 3, 31) else {
            return;
        };
        let due = washcycle::schedule::count_due_days(&vehicle, first, last);
        assert!(due <= 31);
    }
});
