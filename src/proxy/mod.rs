//! LD proxy resolution.
//!
//! For each requested identifier the resolver moves through
//! [`ResolutionState`]s: `Present` when found directly, otherwise
//! `Searching` the LD reference for correlated tags, ending `Resolved` with
//! an aligned proxy record or `Unresolved` (dropped, not an error).
//!
//! # Example
//!
//! ```no_run
//! use ferro_gwas::ld::TagDatabase;
//! use ferro_gwas::proxy::{ProxyOptions, ProxyResolver};
//! use ferro_gwas::query::{GwasSource, QueryPlanner};
//!
//! let source = GwasSource::open("ieu-a-2.vcf.gz").unwrap();
//! let reference = TagDatabase::open("EUR.ldtags.db").unwrap();
//! let planner = QueryPlanner::in_memory();
//! let resolver = ProxyResolver::new(&planner, &reference, ProxyOptions::default());
//! let outcome = resolver.resolve(&source, &["rs4442317".to_string()]).unwrap();
//! for result in &outcome.results {
//!     println!("{} -> {:?}", result.requested, result.resolved);
//! }
//! ```

mod align;
mod resolver;

pub use align::{align_alleles, align_proxy};
pub use resolver::{ProxyOutcome, ProxyResolver, ProxySelector};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GwasError;
use crate::ld::CorrelationSign;
use crate::vcf::VariantRecord;

/// Whether directly present variants are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    /// Keep present variants; search proxies only for missing ones
    #[default]
    Yes,
    /// Search proxies for every variant, returning proxy records only
    Only,
}

impl FromStr for ProxyMode {
    type Err = GwasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yes" => Ok(ProxyMode::Yes),
            "only" => Ok(ProxyMode::Only),
            _ => Err(GwasError::InvalidArgument {
                msg: format!("unknown proxy mode '{}', expected yes or only", s),
            }),
        }
    }
}

impl fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyMode::Yes => write!(f, "yes"),
            ProxyMode::Only => write!(f, "only"),
        }
    }
}

/// Ordering among candidates with equal r²
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Keep the order the LD reference reported
    #[default]
    ReportedOrder,
    /// Lowest rs number first, then lexicographic
    Identifier,
}

impl FromStr for TieBreak {
    type Err = GwasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reported" | "reported-order" => Ok(TieBreak::ReportedOrder),
            "identifier" | "id" => Ok(TieBreak::Identifier),
            _ => Err(GwasError::InvalidArgument {
                msg: format!(
                    "unknown tie-break '{}', expected reported-order or identifier",
                    s
                ),
            }),
        }
    }
}

/// Resolution settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyOptions {
    pub mode: ProxyMode,
    /// Minimum r² between requested variant and proxy
    pub min_r2: f64,
    pub tie_break: TieBreak,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            mode: ProxyMode::Yes,
            min_r2: 0.6,
            tie_break: TieBreak::ReportedOrder,
        }
    }
}

impl ProxyOptions {
    pub fn with_mode(mut self, mode: ProxyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_min_r2(mut self, min_r2: f64) -> Self {
        self.min_r2 = min_r2;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }
}

/// Where a requested identifier ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionState {
    /// Found directly in the source
    Present,
    /// Looking for a proxy
    Searching,
    /// A proxy was found and aligned
    Resolved,
    /// No usable proxy
    Unresolved,
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionState::Present => "present",
            ResolutionState::Searching => "searching",
            ResolutionState::Resolved => "resolved",
            ResolutionState::Unresolved => "unresolved",
        };
        f.write_str(name)
    }
}

/// Outcome for one requested identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyResult {
    pub requested: String,
    pub state: ResolutionState,
    /// Identifier that supplied the data (the requested one when present)
    pub resolved: Option<String>,
    pub r2: Option<f64>,
    pub sign: Option<CorrelationSign>,
    /// Records for the requested variant, aligned when proxied
    pub records: Vec<VariantRecord>,
}

impl ProxyResult {
    pub(crate) fn present(requested: &str, records: Vec<VariantRecord>) -> Self {
        Self {
            requested: requested.to_string(),
            state: ResolutionState::Present,
            resolved: Some(requested.to_string()),
            r2: Some(1.0),
            sign: Some(CorrelationSign::Positive),
            records,
        }
    }

    pub(crate) fn unresolved(requested: &str) -> Self {
        Self {
            requested: requested.to_string(),
            state: ResolutionState::Unresolved,
            resolved: None,
            r2: None,
            sign: None,
            records: Vec::new(),
        }
    }

    /// Whether the identifier has records in the output
    pub fn has_records(&self) -> bool {
        matches!(
            self.state,
            ResolutionState::Present | ResolutionState::Resolved
        )
    }
}
