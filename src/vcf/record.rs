//! GWAS summary-statistics record representation
//!
//! A GWAS-VCF row carries one column per study; each row is flattened into
//! one [`VariantRecord`] per (study, alternate allele). Records sharing a
//! locus differ by study or allele.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ld::CorrelationSign;

/// Where a proxy-resolved record's data actually came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyProvenance {
    /// Identifier of the variant that supplied the statistics
    pub proxy_id: String,
    /// Squared correlation between the requested variant and the proxy
    pub r2: f64,
    /// Sign of the correlation
    pub sign: CorrelationSign,
}

/// A single association record for one variant in one study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    /// Chromosome name (e.g., "1", "chr1", "X")
    pub chrom: String,

    /// 1-based position
    pub pos: u64,

    /// Variant identifier (usually an rsID), None if "."
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Non-effect (reference) allele
    pub non_effect: String,

    /// Effect (alternate) allele the estimate is anchored to
    pub effect: String,

    /// Study identifier (the GWAS-VCF sample column)
    pub study: String,

    /// Effect size estimate
    pub es: Option<f64>,

    /// Standard error of the effect estimate
    pub se: Option<f64>,

    /// -log10 p-value
    pub lp: Option<f64>,

    /// Effect allele frequency
    pub af: Option<f64>,

    /// Sample size
    pub ss: Option<f64>,

    /// Set when the record was substituted by an LD proxy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyProvenance>,
}

/// Convert a p-value threshold to the -log10 scale used by `LP`
pub fn lp_threshold(pval: f64) -> f64 {
    -pval.log10()
}

impl VariantRecord {
    /// Create a record with no statistics
    pub fn new(
        chrom: impl Into<String>,
        pos: u64,
        id: Option<&str>,
        non_effect: impl Into<String>,
        effect: impl Into<String>,
    ) -> Self {
        Self {
            chrom: chrom.into(),
            pos,
            id: id.map(|s| s.to_string()),
            non_effect: non_effect.into(),
            effect: effect.into(),
            study: String::new(),
            es: None,
            se: None,
            lp: None,
            af: None,
            ss: None,
            proxy: None,
        }
    }

    /// Set the study identifier
    pub fn with_study(mut self, study: &str) -> Self {
        self.study = study.to_string();
        self
    }

    /// Set effect estimate, standard error and -log10 p
    pub fn with_stats(mut self, es: f64, se: f64, lp: f64) -> Self {
        self.es = Some(es);
        self.se = Some(se);
        self.lp = Some(lp);
        self
    }

    /// Set the effect allele frequency
    pub fn with_af(mut self, af: f64) -> Self {
        self.af = Some(af);
        self
    }

    /// Set the sample size
    pub fn with_ss(mut self, ss: f64) -> Self {
        self.ss = Some(ss);
        self
    }

    /// The p-value, if `LP` is present
    pub fn pval(&self) -> Option<f64> {
        self.lp.map(|lp| 10f64.powf(-lp))
    }

    /// Whether the record is at least as significant as `pval`.
    ///
    /// Records without `LP` never pass.
    pub fn passes_pval(&self, pval: f64) -> bool {
        let threshold = lp_threshold(pval);
        self.lp.is_some_and(|lp| lp >= threshold)
    }

    /// Whether the record's identifier matches `id`
    pub fn has_id(&self, id: &str) -> bool {
        self.id
            .as_deref()
            .is_some_and(|own| crate::rsid::same_variant(own, id))
    }

    /// Check if this is a SNV (single nucleotide variant)
    pub fn is_snv(&self) -> bool {
        self.non_effect.len() == 1 && self.effect.len() == 1 && self.non_effect != self.effect
    }

    /// Check if either allele spans more than one base
    pub fn is_indel(&self) -> bool {
        self.non_effect.len() != self.effect.len()
    }

    /// Identifier if present, otherwise `chrom:pos_ref_alt`
    pub fn display_id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!(
                "{}:{}_{}_{}",
                self.chrom, self.pos, self.non_effect, self.effect
            ),
        }
    }

    /// Swap effect and non-effect alleles, negating the estimate and
    /// complementing the frequency.
    pub fn flip(&mut self) {
        std::mem::swap(&mut self.effect, &mut self.non_effect);
        self.es = self.es.map(|es| -es);
        self.af = self.af.map(|af| 1.0 - af);
    }

    /// Whether two records describe the same locus and alleles
    pub fn same_site(&self, other: &VariantRecord) -> bool {
        self.chrom == other.chrom
            && self.pos == other.pos
            && self.non_effect == other.non_effect
            && self.effect == other.effect
    }
}

fn opt(value: Option<f64>) -> String {
    value.map_or(".".to_string(), |v| v.to_string())
}

impl fmt::Display for VariantRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom,
            self.pos,
            self.id.as_deref().unwrap_or("."),
            self.non_effect,
            self.effect,
            if self.study.is_empty() { "." } else { &self.study },
            opt(self.es),
            opt(self.se),
            opt(self.lp),
            opt(self.af),
            opt(self.ss),
        )?;
        if let Some(proxy) = &self.proxy {
            write!(f, "\t{}\t{}", proxy.proxy_id, proxy.r2)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VariantRecord {
        VariantRecord::new("1", 721290, Some("rs12565286"), "G", "C")
            .with_study("IEU-b-2")
            .with_stats(0.0016, 0.0147, 0.04)
            .with_af(0.0408)
            .with_ss(340001.0)
    }

    #[test]
    fn test_new_record() {
        let record = VariantRecord::new("1", 100, None, "A", "G");
        assert_eq!(record.chrom, "1");
        assert_eq!(record.pos, 100);
        assert!(record.id.is_none());
        assert!(record.es.is_none());
        assert!(record.proxy.is_none());
    }

    #[test]
    fn test_passes_pval() {
        let record = sample();
        // LP 0.04 => p ~ 0.912
        assert!(!record.passes_pval(0.05));
        assert!(record.passes_pval(0.95));

        let strong = VariantRecord::new("1", 1, None, "A", "G").with_stats(0.1, 0.01, 8.0);
        assert!(strong.passes_pval(5e-8));

        let missing = VariantRecord::new("1", 1, None, "A", "G");
        assert!(!missing.passes_pval(1.0));
    }

    #[test]
    fn test_pval() {
        let record = VariantRecord::new("1", 1, None, "A", "G").with_stats(0.0, 1.0, 2.0);
        let p = record.pval().unwrap();
        assert!((p - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_flip() {
        let mut record = sample();
        record.flip();
        assert_eq!(record.effect, "G");
        assert_eq!(record.non_effect, "C");
        assert_eq!(record.es, Some(-0.0016));
        assert!((record.af.unwrap() - 0.9592).abs() < 1e-12);
        assert_eq!(record.se, Some(0.0147));
    }

    #[test]
    fn test_has_id() {
        let record = sample();
        assert!(record.has_id("rs12565286"));
        assert!(record.has_id("12565286"));
        assert!(!record.has_id("rs1"));
    }

    #[test]
    fn test_variant_class() {
        assert!(sample().is_snv());
        let del = VariantRecord::new("1", 1, None, "AT", "A");
        assert!(del.is_indel());
        assert!(!del.is_snv());
    }

    #[test]
    fn test_display_id() {
        assert_eq!(sample().display_id(), "rs12565286");
        let anon = VariantRecord::new("2", 50, None, "C", "T");
        assert_eq!(anon.display_id(), "2:50_C_T");
    }

    #[test]
    fn test_display() {
        let s = format!("{}", sample());
        assert!(s.starts_with("1\t721290\trs12565286\tG\tC\tIEU-b-2"));
    }
}
