//! Query planning over a GWAS-VCF source.
//!
//! A [`QueryPlan`] is an ordered list of [`Filter`]s combined with AND. The
//! [`QueryPlanner`] picks an [`AccessPath`] for each step, falling back
//! along the preference order when a path fails and was not pinned.
//!
//! # Example
//!
//! ```no_run
//! use ferro_gwas::query::{GwasSource, QueryPlan, QueryPlanner};
//! use ferro_gwas::region::GenomicRange;
//!
//! let source = GwasSource::open("ieu-a-2.vcf.gz").unwrap();
//! let plan = QueryPlan::new()
//!     .region(vec!["1:1097291-1099437".parse::<GenomicRange>().unwrap()])
//!     .threshold(0.05);
//! let records = QueryPlanner::in_memory().query(&source, &plan).unwrap();
//! println!("{} records", records.len());
//! ```

mod budget;
mod plan;
mod planner;
mod source;

pub use budget::{BudgetClock, QueryBudget};
pub use plan::{AccessPath, Filter, FilterKind, QueryPlan};
pub use planner::{QueryOutcome, QueryPlanner};
pub use source::GwasSource;
