//! Variant identifier normalisation.
//!
//! Identifier side-indexes are keyed by the numeric part of dbSNP
//! identifiers, so `"rs121913529"` and `"121913529"` address the same key.
//! Identifiers that are not `rs` + digits (e.g. `"1:12345_A_G"`) have no key
//! and can only be found by range or by a full scan.
//!
//! # Example
//!
//! ```
//! use ferro_gwas::rsid::{format_rsid, rsid_key};
//!
//! assert_eq!(rsid_key("rs12565286"), Some(12565286));
//! assert_eq!(rsid_key("1:721290_G_C"), None);
//! assert_eq!(format_rsid(12565286), "rs12565286");
//! ```

/// Derive the numeric index key of an identifier.
///
/// Accepts `"rs<digits>"` or bare `"<digits>"`. Digits with a leading zero
/// have no key, so each key has exactly one spelling per form.
pub fn rsid_key(rsid: &str) -> Option<u64> {
    let digits = rsid.strip_prefix("rs").unwrap_or(rsid);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

/// Whether an identifier can be stored in an identifier index
pub fn is_indexable(rsid: &str) -> bool {
    rsid_key(rsid).is_some()
}

/// Format numeric rsID to string with "rs" prefix.
pub fn format_rsid(rsid_num: u64) -> String {
    format!("rs{}", rsid_num)
}

/// Whether two identifiers name the same variant.
///
/// Conforming identifiers are compared by key, anything else by string.
pub fn same_variant(a: &str, b: &str) -> bool {
    match (rsid_key(a), rsid_key(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
