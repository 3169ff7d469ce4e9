//! Parallel processing support for ferro-gwas
//!
//! Proxy selection for a batch of identifiers has no data dependency
//! between identifiers, so once LD tags and candidate records are fetched
//! the per-identifier work is spread over rayon's pool. Enable with the
//! `parallel` feature.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "parallel")]
//! # fn main() {
//! use ferro_gwas::parallel::ParallelConfig;
//!
//! // Limit proxy resolution to four worker threads
//! ParallelConfig::new().with_num_threads(4).install(|| {
//!     // resolver.resolve(&source, &ids)
//! }).unwrap();
//! # }
//! # #[cfg(not(feature = "parallel"))]
//! # fn main() {}
//! ```

use rayon::prelude::*;

use crate::error::GwasError;
use crate::proxy::{ProxyResult, ProxySelector};

/// Select proxies for many targets in parallel
///
/// Returns one result per target. Order is preserved.
pub fn select_proxies_parallel(selector: &ProxySelector, targets: &[String]) -> Vec<ProxyResult> {
    targets.par_iter().map(|t| selector.select(t)).collect()
}

/// Configuration for parallel processing
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    /// Number of threads (0 = use rayon default)
    pub num_threads: usize,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of threads
    pub fn with_num_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Run `op` inside a pool sized by this configuration
    pub fn install<R, F>(&self, op: F) -> Result<R, GwasError>
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        if self.num_threads == 0 {
            return Ok(op());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()
            .map_err(|e| GwasError::configuration(format!("thread pool: {}", e)))?;
        Ok(pool.install(op))
    }
}
