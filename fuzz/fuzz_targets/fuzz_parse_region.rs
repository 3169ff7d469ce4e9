//! Fuzz target for region lists and LD phase strings

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if input.len() > 1000 {
            return;
        }

        if let Ok(ranges) = ferro_gwas::region::GenomicRange::parse_list(input) {
            for range in &ranges {
                assert!(range.start <= range.end);
            }
        }
        let _ = ferro_gwas::ld::AllelePhase::parse(input);
    }
});
