//! Fuzz target for change event and timestamp decoding.
//!
//! Arbitrary bytes must either decode or fail cleanly, never panic. Decoded
//! timestamps must format without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use live_table::{ChangeEvent, DynamicRow, Timestamp};

fuzz_target!(|data: &[u8]| {
    if let Ok(event) = serde_json::from_slice::<ChangeEvent<DynamicRow>>(data) {
        let _ = event.row_id();
        let _ = event.timestamp().to_string();
    }

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(ts) = Timestamp::parse_rfc3339(s) {
            let _ = ts.to_string();
        }
    }
});
