//! Fuzz target for the GWAS-VCF data line parser
//!
//! Arbitrary text is parsed as a record line of a two-study file.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if input.len() > 4000 {
            return;
        }

        let studies = vec!["study-1".to_string(), "study-2".to_string()];
        let _ = ferro_gwas::vcf::parse_data_line(input, 1, &studies);
    }
});
