//! Linkage-disequilibrium reference.
//!
//! One capability, [`LdReference`], with interchangeable backends:
//! - [`PanelReference`]: live pairwise LD from a PLINK genotype panel
//! - [`TagDatabase`]: precomputed tag lists in SQLite
//! - [`InMemoryLdReference`]: fixed pairs, for tests and embedding
//!
//! All backends report tags per target in descending r², keeping the
//! order they were reported in among equal values.

mod memory;
mod panel;
mod tagdb;

pub use memory::InMemoryLdReference;
pub use panel::PanelReference;
pub use tagdb::TagDatabase;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GwasError;

/// Sign of the correlation between two variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationSign {
    Positive,
    Negative,
}

impl CorrelationSign {
    /// Sign of a correlation coefficient (zero counts as positive)
    pub fn of(r: f64) -> Self {
        if r < 0.0 {
            CorrelationSign::Negative
        } else {
            CorrelationSign::Positive
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, CorrelationSign::Negative)
    }
}

impl fmt::Display for CorrelationSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationSign::Positive => write!(f, "+"),
            CorrelationSign::Negative => write!(f, "-"),
        }
    }
}

/// In-phase alleles of a target/tag pair.
///
/// plink writes these as `A1B1/A2B2`: target allele A1 is carried on the
/// same haplotype as tag allele B1, and A2 with B2.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllelePhase {
    pub target_a1: String,
    pub tag_b1: String,
    pub target_a2: String,
    pub tag_b2: String,
}

impl AllelePhase {
    /// Parse `A1B1/A2B2`; anything other than two two-base haplotypes is
    /// rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let (first, second) = s.split_once('/')?;
        let split = |h: &str| -> Option<(String, String)> {
            let mut chars = h.chars();
            let a = chars.next()?;
            let b = chars.next()?;
            if chars.next().is_some() || !a.is_ascii_alphabetic() || !b.is_ascii_alphabetic() {
                return None;
            }
            Some((a.to_string(), b.to_string()))
        };
        let (target_a1, tag_b1) = split(first)?;
        let (target_a2, tag_b2) = split(second)?;
        Some(Self {
            target_a1,
            tag_b1,
            target_a2,
            tag_b2,
        })
    }

    /// The same phase seen from the tag's side
    pub fn mirrored(&self) -> Self {
        Self {
            target_a1: self.tag_b1.clone(),
            tag_b1: self.target_a1.clone(),
            target_a2: self.tag_b2.clone(),
            tag_b2: self.target_a2.clone(),
        }
    }

    /// Target allele in phase with a tag allele, if the tag allele is one
    /// of the pair
    pub fn target_allele_for(&self, tag_allele: &str) -> Option<&str> {
        if tag_allele == self.tag_b1 {
            Some(&self.target_a1)
        } else if tag_allele == self.tag_b2 {
            Some(&self.target_a2)
        } else {
            None
        }
    }
}

impl fmt::Display for AllelePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/{}{}",
            self.target_a1, self.tag_b1, self.target_a2, self.tag_b2
        )
    }
}

/// A variant correlated with a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LdTag {
    /// The variant being proxied
    pub target: String,
    /// The correlated variant
    pub tag: String,
    /// Signed correlation coefficient
    pub r: f64,
    /// Allele phasing, when the backend reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<AllelePhase>,
}

impl LdTag {
    pub fn new(target: impl Into<String>, tag: impl Into<String>, r: f64) -> Self {
        Self {
            target: target.into(),
            tag: tag.into(),
            r,
            phase: None,
        }
    }

    pub fn with_phase(mut self, phase: AllelePhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn r2(&self) -> f64 {
        self.r * self.r
    }

    pub fn sign(&self) -> CorrelationSign {
        CorrelationSign::of(self.r)
    }

    /// The same pair seen from the tag's side
    pub fn mirrored(&self) -> Self {
        Self {
            target: self.tag.clone(),
            tag: self.target.clone(),
            r: self.r,
            phase: self.phase.as_ref().map(AllelePhase::mirrored),
        }
    }
}

/// Alleles of a variant in the reference panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelAlleles {
    pub a1: String,
    pub a2: String,
}

/// Source of LD tags for proxy search
pub trait LdReference {
    /// Backend name used in logs
    fn name(&self) -> &str;

    /// Tags with r² >= `min_r2` for each target.
    ///
    /// Targets absent from the reference contribute nothing. Per target,
    /// tags come in descending r², reported order among ties.
    fn tags(&self, targets: &[String], min_r2: f64) -> Result<Vec<LdTag>, GwasError>;

    /// Panel alleles of a variant, if known
    fn alleles(&self, id: &str) -> Result<Option<PanelAlleles>, GwasError>;
}

/// Stable sort of tags into descending r²
pub(crate) fn sort_by_r2(tags: &mut [LdTag]) {
    tags.sort_by(|a, b| b.r2().total_cmp(&a.r2()));
}

/// Reject r² cutoffs outside [0, 1]
pub(crate) fn validate_min_r2(min_r2: f64) -> Result<(), GwasError> {
    if !(0.0..=1.0).contains(&min_r2) {
        return Err(GwasError::InvalidArgument {
            msg: format!("minimum r² {} is outside [0, 1]", min_r2),
        });
    }
    Ok(())
}
