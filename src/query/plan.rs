//! Filters, query plans and access paths.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GwasError;
use crate::region::GenomicRange;
use crate::rsid::rsid_key;
use crate::vcf::VariantRecord;

/// One selection criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    /// Records inside any of the ranges
    Region(Vec<GenomicRange>),
    /// Records whose identifier is one of these
    Ids(Vec<String>),
    /// Records with p <= the threshold
    Threshold(f64),
}

/// Kind of a [`Filter`], for logging and planning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Region,
    Identifier,
    Threshold,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKind::Region => write!(f, "region"),
            FilterKind::Identifier => write!(f, "identifier"),
            FilterKind::Threshold => write!(f, "threshold"),
        }
    }
}

impl Filter {
    pub fn kind(&self) -> FilterKind {
        match self {
            Filter::Region(_) => FilterKind::Region,
            Filter::Ids(_) => FilterKind::Identifier,
            Filter::Threshold(_) => FilterKind::Threshold,
        }
    }

    /// Whether a single record satisfies the filter
    pub fn matches(&self, record: &VariantRecord) -> bool {
        match self {
            Filter::Region(ranges) => ranges.iter().any(|r| r.contains(&record.chrom, record.pos)),
            Filter::Ids(ids) => ids.iter().any(|id| record.has_id(id)),
            Filter::Threshold(pval) => record.passes_pval(*pval),
        }
    }
}

/// Identifier set prepared for scanning
#[derive(Debug, Clone, Default)]
pub(crate) struct IdMatcher {
    keys: HashSet<u64>,
    others: HashSet<String>,
}

impl IdMatcher {
    pub(crate) fn new(ids: &[String]) -> Self {
        let mut matcher = Self::default();
        for id in ids {
            match rsid_key(id) {
                Some(key) => {
                    matcher.keys.insert(key);
                }
                None => {
                    matcher.others.insert(id.clone());
                }
            }
        }
        matcher
    }

    /// Whether some requested identifier has no numeric key
    pub(crate) fn has_unkeyed(&self) -> bool {
        !self.others.is_empty()
    }

    pub(crate) fn matches(&self, record: &VariantRecord) -> bool {
        let Some(id) = record.id.as_deref() else {
            return false;
        };
        match rsid_key(id) {
            Some(key) => self.keys.contains(&key),
            None => self.others.contains(id),
        }
    }
}

/// An ordered list of filters combined with AND.
///
/// Each step narrows the result of the previous one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub steps: Vec<Filter>,
}

impl QueryPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-filter plan
    pub fn single(filter: Filter) -> Self {
        Self {
            steps: vec![filter],
        }
    }

    /// Append a filter
    pub fn then(mut self, filter: Filter) -> Self {
        self.steps.push(filter);
        self
    }

    /// Append a region filter
    pub fn region(self, ranges: Vec<GenomicRange>) -> Self {
        self.then(Filter::Region(ranges))
    }

    /// Append an identifier filter
    pub fn ids<S: AsRef<str>>(self, ids: &[S]) -> Self {
        self.then(Filter::Ids(
            ids.iter().map(|s| s.as_ref().to_string()).collect(),
        ))
    }

    /// Append a significance filter
    pub fn threshold(self, pval: f64) -> Self {
        self.then(Filter::Threshold(pval))
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check arguments before any access path runs
    pub fn validate(&self) -> Result<(), GwasError> {
        for step in &self.steps {
            if let Filter::Threshold(pval) = step {
                crate::index::pval::validate_pval(*pval)?;
            }
        }
        Ok(())
    }
}

/// How a filter step was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessPath {
    /// Binary search over the position-sorted source
    ChromPos,
    /// SQLite identifier index then ChromPos
    IdentifierIndex,
    /// SQLite threshold index then ChromPos
    ThresholdIndex,
    /// Delegated external scan
    Accelerator,
    /// In-memory scan of every record
    FullScan,
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessPath::ChromPos => "chrom-pos",
            AccessPath::IdentifierIndex => "identifier-index",
            AccessPath::ThresholdIndex => "threshold-index",
            AccessPath::Accelerator => "accelerator",
            AccessPath::FullScan => "full-scan",
        };
        write!(f, "{}", s)
    }
}
