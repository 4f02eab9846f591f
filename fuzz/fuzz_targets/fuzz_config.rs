#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Invalid configs are errors, never panics.
        let _ = washcycle::config::FileConfig::parse(s);
    }
});
