//! Fuzz target for the legacy `key: value` configuration parser.

#![no_main]

use libfuzzer_sys::fuzz_target;
use procan_config::legacy::parse_legacy;
use procan_config::validate_config;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        if let Ok(parsed) = parse_legacy(content) {
            assert!(parsed.config.exclusions.uids.len() <= procan_config::MAX_EXCLUSIONS);
            let _ = validate_config(&parsed.config);
        }
    }
});
