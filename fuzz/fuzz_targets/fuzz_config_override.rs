//! Fuzz target: build-time config override parser
//!
//! Feeds arbitrary bytes to `NodeConfig::from_json` / `from_override` and
//! verifies:
//! - No panics on malformed or hostile JSON
//! - Every accepted document passes `validate()`
//! - A rejected override always yields the default configuration
//!
//! cargo fuzz run fuzz_config_override

#![no_main]

use libfuzzer_sys::fuzz_target;
use shuntmeter::config::NodeConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    match NodeConfig::from_json(text) {
        Ok(config) => {
            assert!(config.validate().is_ok());
            assert!(config.interval_ms() > 0);
        }
        Err(_) => {
            let fallback = NodeConfig::from_override(Some(text));
            assert_eq!(fallback.interval_secs, NodeConfig::default().interval_secs);
        }
    }
});
