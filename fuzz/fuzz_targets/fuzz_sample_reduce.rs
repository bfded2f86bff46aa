//! Fuzz target: sample reduction and payload encoding
//!
//! Interprets the input as a burst of little-endian `f32` triples
//! (shunt mV, bus V, current A) and verifies:
//! - `SampleSet::reduce` never panics, including on NaN and infinities
//! - The set never holds more than `MAX_SAMPLES` entries
//! - Encoding the reduced reading never panics
//!
//! cargo fuzz run fuzz_sample_reduce

#![no_main]

use libfuzzer_sys::fuzz_target;
use shuntmeter::config::{CurrentCorrection, MAX_SAMPLES};
use shuntmeter::delivery::CycleResult;
use shuntmeter::sensors::{RawSample, SampleSet};

fn f32_at(chunk: &[u8], i: usize) -> f32 {
    f32::from_le_bytes([chunk[i], chunk[i + 1], chunk[i + 2], chunk[i + 3]])
}

fuzz_target!(|data: &[u8]| {
    let mut set = SampleSet::new();
    for chunk in data.chunks_exact(12) {
        set.push(RawSample {
            shunt_mv: f32_at(chunk, 0),
            bus_v: f32_at(chunk, 4),
            current_a: f32_at(chunk, 8),
        });
    }
    assert!(set.len() <= MAX_SAMPLES);

    let correction = CurrentCorrection::MicroampOffset { microamps: -10 };
    match set.reduce(&correction) {
        Some(reading) => {
            // Non-finite fields encode as null.
            let json = CycleResult { reading, battery: None }.to_json();
            assert!(json.is_ok());
        }
        None => assert!(set.is_empty()),
    }
});
