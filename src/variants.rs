//! Position-sorted record sets and the ChromPos filter.
//!
//! A [`VariantSet`] keeps records grouped by chromosome (in order of first
//! appearance) and sorted by position within each chromosome, with one span
//! per chromosome. Range lookups binary-search the span, so each range costs
//! O(log n) plus the size of its output.

use std::collections::HashMap;
use std::ops::Range;

use tracing::warn;

use crate::error::GwasError;
use crate::region::GenomicRange;
use crate::vcf::VariantRecord;

/// Immutable, position-sorted collection of variant records
#[derive(Debug, Clone, Default)]
pub struct VariantSet {
    records: Vec<VariantRecord>,
    spans: HashMap<String, Range<usize>>,
    chrom_order: Vec<String>,
}

impl VariantSet {
    /// Build a set, sorting by (chromosome first appearance, position).
    ///
    /// The sort is stable, so records at the same position keep their
    /// input order.
    pub fn new(mut records: Vec<VariantRecord>) -> Self {
        let mut chrom_order: Vec<String> = Vec::new();
        let mut rank: HashMap<String, usize> = HashMap::new();
        for record in &records {
            if !rank.contains_key(&record.chrom) {
                rank.insert(record.chrom.clone(), chrom_order.len());
                chrom_order.push(record.chrom.clone());
            }
        }

        let sorted = records
            .windows(2)
            .all(|w| (rank[&w[0].chrom], w[0].pos) <= (rank[&w[1].chrom], w[1].pos));
        if !sorted {
            warn!("Records are not position-sorted; sorting {} records", records.len());
            records.sort_by_key(|r| (rank[&r.chrom], r.pos));
        }

        let mut spans: HashMap<String, Range<usize>> = HashMap::new();
        let mut start = 0;
        while start < records.len() {
            let chrom = &records[start].chrom;
            let end = start
                + records[start..]
                    .iter()
                    .take_while(|r| &r.chrom == chrom)
                    .count();
            spans.insert(chrom.clone(), start..end);
            start = end;
        }

        Self {
            records,
            spans,
            chrom_order,
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in order
    pub fn records(&self) -> &[VariantRecord] {
        &self.records
    }

    /// Consume the set, returning its records
    pub fn into_records(self) -> Vec<VariantRecord> {
        self.records
    }

    /// Chromosomes in order of appearance
    pub fn chromosomes(&self) -> &[String] {
        &self.chrom_order
    }

    /// Whether any record lies on `chrom`
    pub fn has_chromosome(&self, chrom: &str) -> bool {
        self.spans.contains_key(chrom)
    }

    /// Reject ranges whose chromosome uses the other naming convention
    /// (`chr1` against a source that says `1`, or the reverse).
    pub fn check_naming(&self, range: &GenomicRange) -> Result<(), GwasError> {
        if self.has_chromosome(&range.chrom) || self.is_empty() {
            return Ok(());
        }
        let alternative = match range.chrom.strip_prefix("chr") {
            Some(bare) => bare.to_string(),
            None => format!("chr{}", range.chrom),
        };
        if self.has_chromosome(&alternative) {
            return Err(GwasError::InvalidRange {
                msg: format!(
                    "chromosome '{}' does not match the source naming convention (found '{}')",
                    range.chrom, alternative
                ),
            });
        }
        Ok(())
    }

    /// Indices of records inside a single range
    fn range_indices(&self, range: &GenomicRange) -> Range<usize> {
        let Some(span) = self.spans.get(&range.chrom) else {
            return 0..0;
        };
        let slice = &self.records[span.clone()];
        let lo = slice.partition_point(|r| r.pos < range.start);
        let hi = slice.partition_point(|r| r.pos <= range.end);
        (span.start + lo)..(span.start + hi.max(lo))
    }

    /// Return all records inside any of `ranges`.
    ///
    /// Output keeps the set's order and contains each record once, even
    /// when ranges overlap.
    pub fn filter_ranges(&self, ranges: &[GenomicRange]) -> Result<VariantSet, GwasError> {
        for range in ranges {
            self.check_naming(range)?;
        }

        let mut hits: Vec<Range<usize>> = ranges
            .iter()
            .map(|r| self.range_indices(r))
            .filter(|r| !r.is_empty())
            .collect();
        hits.sort_by_key(|r| r.start);

        // Merge overlapping index ranges so nothing is emitted twice
        let mut merged: Vec<Range<usize>> = Vec::with_capacity(hits.len());
        for hit in hits {
            match merged.last_mut() {
                Some(last) if hit.start <= last.end => last.end = last.end.max(hit.end),
                _ => merged.push(hit),
            }
        }

        let records = merged
            .into_iter()
            .flat_map(|r| self.records[r].iter().cloned())
            .collect();
        Ok(VariantSet::new(records))
    }

    /// Records at exact loci (chrom, pos)
    pub fn filter_loci(&self, loci: &[(String, u64)]) -> Result<VariantSet, GwasError> {
        let ranges: Vec<GenomicRange> = loci
            .iter()
            .map(|(chrom, pos)| GenomicRange::point(chrom.clone(), *pos))
            .collect();
        self.filter_ranges(&ranges)
    }

    /// Keep records matching a predicate, preserving order
    pub fn retain<F>(&self, mut keep: F) -> VariantSet
    where
        F: FnMut(&VariantRecord) -> bool,
    {
        let records = self.records.iter().filter(|r| keep(r)).cloned().collect();
        VariantSet::new(records)
    }
}

impl FromIterator<VariantRecord> for VariantSet {
    fn from_iter<I: IntoIterator<Item = VariantRecord>>(iter: I) -> Self {
        VariantSet::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> VariantSet {
        VariantSet::new(vec![
            VariantRecord::new("1", 100, Some("rs1"), "A", "G"),
            VariantRecord::new("1", 200, Some("rs2"), "C", "T"),
            VariantRecord::new("1", 200, Some("rs3"), "C", "G"),
            VariantRecord::new("1", 350, Some("rs4"), "G", "A"),
            VariantRecord::new("2", 150, Some("rs5"), "T", "C"),
        ])
    }

    fn ids(set: &VariantSet) -> Vec<String> {
        set.records().iter().map(|r| r.display_id()).collect()
    }

    #[test]
    fn test_spans() {
        let s = set();
        assert_eq!(s.len(), 5);
        assert_eq!(s.chromosomes(), &["1".to_string(), "2".to_string()]);
        assert!(s.has_chromosome("2"));
        assert!(!s.has_chromosome("3"));
    }

    #[test]
    fn test_interval() {
        let s = set();
        let out = s
            .filter_ranges(&[GenomicRange::new("1", 150, 350).unwrap()])
            .unwrap();
        assert_eq!(ids(&out), vec!["rs2", "rs3", "rs4"]);
    }

    #[test]
    fn test_point_returns_all_records_at_locus() {
        let s = set();
        let out = s.filter_ranges(&[GenomicRange::point("1", 200)]).unwrap();
        assert_eq!(ids(&out), vec!["rs2", "rs3"]);
    }

    #[test]
    fn test_overlapping_ranges_no_duplicates() {
        let s = set();
        let out = s
            .filter_ranges(&[
                GenomicRange::new("1", 100, 250).unwrap(),
                GenomicRange::new("1", 150, 400).unwrap(),
                GenomicRange::point("2", 150),
            ])
            .unwrap();
        assert_eq!(ids(&out), vec!["rs1", "rs2", "rs3", "rs4", "rs5"]);
    }

    #[test]
    fn test_out_of_order_ranges_keep_set_order() {
        let s = set();
        let out = s
            .filter_ranges(&[GenomicRange::point("2", 150), GenomicRange::point("1", 100)])
            .unwrap();
        assert_eq!(ids(&out), vec!["rs1", "rs5"]);
    }

    #[test]
    fn test_unknown_chromosome_is_empty() {
        let s = set();
        let out = s.filter_ranges(&[GenomicRange::chromosome("7")]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_naming_mismatch_is_error() {
        let s = set();
        let err = s
            .filter_ranges(&[GenomicRange::chromosome("chr1")])
            .unwrap_err();
        assert!(matches!(err, GwasError::InvalidRange { .. }));
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let s = VariantSet::new(vec![
            VariantRecord::new("1", 300, Some("rs3"), "A", "G"),
            VariantRecord::new("1", 100, Some("rs1"), "A", "G"),
        ]);
        assert_eq!(ids(&s), vec!["rs1", "rs3"]);
    }

    #[test]
    fn test_filter_loci() {
        let s = set();
        let out = s
            .filter_loci(&[("1".to_string(), 350), ("2".to_string(), 150)])
            .unwrap();
        assert_eq!(ids(&out), vec!["rs4", "rs5"]);
    }

    #[test]
    fn test_retain() {
        let s = set();
        let out = s.retain(|r| r.effect == "G");
        assert_eq!(ids(&out), vec!["rs1", "rs3"]);
    }
}
