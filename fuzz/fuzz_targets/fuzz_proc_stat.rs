//! Fuzz target for the `/proc/[pid]/stat` and status parsers.
//!
//! Command names are attacker-controlled (any process can rename itself),
//! so the parsers must reject malformed content without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use procan_core::collect::{parse_proc_stat_content, parse_status_uid};

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        if let Ok(stat) = parse_proc_stat_content(content, 1) {
            let _ = stat.total_ticks();
        }
        let _ = parse_status_uid(content);
    }
});
