//! Genomic range requests.
//!
//! Ranges are written `chrom:start-end`, `chrom:pos` (a point) or `chrom`
//! (the whole chromosome). Bounds are 1-based and inclusive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GwasError;

/// A chromosome plus an optional inclusive position interval
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomicRange {
    /// Chromosome name, matching the source's naming convention
    pub chrom: String,
    /// First position (1-based, inclusive)
    pub start: u64,
    /// Last position (inclusive)
    pub end: u64,
}

impl GenomicRange {
    /// Create a range, validating `start <= end`
    pub fn new(chrom: impl Into<String>, start: u64, end: u64) -> Result<Self, GwasError> {
        let chrom = chrom.into();
        if chrom.is_empty() {
            return Err(GwasError::InvalidRange {
                msg: "empty chromosome name".to_string(),
            });
        }
        if start > end {
            return Err(GwasError::InvalidRange {
                msg: format!("{}:{}-{} has start > end", chrom, start, end),
            });
        }
        Ok(Self { chrom, start, end })
    }

    /// A single-position range
    pub fn point(chrom: impl Into<String>, pos: u64) -> Self {
        Self {
            chrom: chrom.into(),
            start: pos,
            end: pos,
        }
    }

    /// A range covering the whole chromosome
    pub fn chromosome(chrom: impl Into<String>) -> Self {
        Self {
            chrom: chrom.into(),
            start: 1,
            end: u64::MAX,
        }
    }

    /// Whether this is a point query
    pub fn is_point(&self) -> bool {
        self.start == self.end
    }

    /// Whether a locus falls inside the range
    pub fn contains(&self, chrom: &str, pos: u64) -> bool {
        self.chrom == chrom && pos >= self.start && pos <= self.end
    }

    /// Whether `other` lies entirely within this range
    pub fn covers(&self, other: &GenomicRange) -> bool {
        self.chrom == other.chrom && self.start <= other.start && other.end <= self.end
    }

    /// Parse a comma-separated list of ranges
    pub fn parse_list(s: &str) -> Result<Vec<Self>, GwasError> {
        s.split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(Self::from_str)
            .collect()
    }
}

impl FromStr for GenomicRange {
    type Err = GwasError;

    /// Parse `chrom`, `chrom:pos` or `chrom:start-end`
    ///
    /// # Examples
    ///
    /// ```
    /// use ferro_gwas::region::GenomicRange;
    ///
    /// let r: GenomicRange = "1:1097291-1099437".parse().unwrap();
    /// assert_eq!((r.start, r.end), (1097291, 1099437));
    ///
    /// let p: GenomicRange = "1:721290".parse().unwrap();
    /// assert!(p.is_point());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |msg: &str| GwasError::InvalidRange {
            msg: format!("'{}': {}", s, msg),
        };
        let parse_pos = |p: &str| -> Result<u64, GwasError> {
            let cleaned: String = p.chars().filter(|c| *c != ',' && *c != '_').collect();
            match cleaned.parse::<u64>() {
                Ok(0) => Err(invalid("positions are 1-based")),
                Ok(v) => Ok(v),
                Err(_) => Err(invalid("position is not a number")),
            }
        };

        let s_trim = s.trim();
        match s_trim.rsplit_once(':') {
            None => {
                if s_trim.is_empty() {
                    return Err(invalid("empty range"));
                }
                Ok(Self::chromosome(s_trim))
            }
            Some((chrom, interval)) => {
                if chrom.is_empty() {
                    return Err(invalid("missing chromosome"));
                }
                match interval.split_once('-') {
                    Some((start, end)) => {
                        Self::new(chrom, parse_pos(start)?, parse_pos(end)?)
                    }
                    None => Ok(Self::point(chrom, parse_pos(interval)?)),
                }
            }
        }
    }
}

impl fmt::Display for GenomicRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == 1 && self.end == u64::MAX {
            write!(f, "{}", self.chrom)
        } else if self.is_point() {
            write!(f, "{}:{}", self.chrom, self.start)
        } else {
            write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
        }
    }
}
