// Copyright (c) 2024-2025 Fulcrum Genomics LLC
// SPDX-License-Identifier: MIT

//! ferro-gwas: indexed queries over GWAS summary statistics
//!
//! Part of the ferro bioinformatics toolkit.
//!
//! Queries a GWAS-VCF by region, by variant identifier or by p-value
//! threshold, choosing between in-memory filtering, SQLite side indexes and
//! an external accelerator. Identifiers missing from the source can be
//! substituted by LD proxies from a genotype panel or a precomputed tag
//! database.
//!
//! # Example
//!
//! ```
//! use ferro_gwas::query::{GwasSource, QueryPlan, QueryPlanner};
//!
//! let vcf = "##fileformat=VCFv4.2\n\
//! ###FORMAT=<ID=ES,Number=A,Type=Float,Description=\"Effect size estimate\">\n\
//! ###FORMAT=<ID=LP,Number=A,Type=Float,Description=\"-log10 p-value\">\n\
//! #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tieu-a-2\n\
//! 1\t721290\trs12565286\tG\tC\t.\tPASS\t.\tES:LP\t0.0016:0.04\n\
//! 1\t1097291\trs9442372\tA\tG\t.\tPASS\t.\tES:LP\t-0.02:2.5\n";
//!
//! let source = GwasSource::parse(vcf).unwrap();
//! let planner = QueryPlanner::in_memory();
//!
//! let plan = QueryPlan::new().threshold(0.01);
//! let hits = planner.query(&source, &plan).unwrap();
//! assert_eq!(hits.len(), 1);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod external;
pub mod index;
pub mod ld;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod proxy;
pub mod query;
pub mod region;
pub mod rsid;
pub mod variants;
pub mod vcf;

// Re-export commonly used types
pub use config::FerroGwasConfig;
pub use error::{ErrorCode, GwasError};
pub use external::{Capabilities, ToolPaths};
pub use index::{IdentifierIndex, ThresholdIndex};
pub use ld::{InMemoryLdReference, LdReference, LdTag, PanelReference, TagDatabase};
pub use proxy::{ProxyMode, ProxyOptions, ProxyOutcome, ProxyResolver, ResolutionState};
pub use query::{AccessPath, Filter, GwasSource, QueryBudget, QueryPlan, QueryPlanner};
pub use region::GenomicRange;
pub use variants::VariantSet;
pub use vcf::VariantRecord;

/// Result type alias for ferro-gwas operations
pub type Result<T> = std::result::Result<T, GwasError>;
