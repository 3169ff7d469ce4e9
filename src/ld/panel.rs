//! Live LD from a genotype panel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::GwasError;
use crate::external::{read_bim, CorrelationRequest, CorrelationTool, LdWindow};

use super::{sort_by_r2, validate_min_r2, LdReference, LdTag, PanelAlleles};

/// LD computed on demand over a PLINK fileset.
///
/// Each [`tags`](LdReference::tags) call runs the correlation tool once for
/// all targets present in the panel. Expensive; suited to small target sets.
#[derive(Debug)]
pub struct PanelReference<T> {
    bfile: PathBuf,
    tool: T,
    alleles: HashMap<String, PanelAlleles>,
    window: LdWindow,
}

impl<T: CorrelationTool> PanelReference<T> {
    /// Open a panel by fileset prefix (`<bfile>.bed/.bim/.fam`)
    pub fn open<P: AsRef<Path>>(bfile: P, tool: T) -> Result<Self, GwasError> {
        let bfile = bfile.as_ref().to_path_buf();
        let alleles = read_bim(&bfile)?
            .into_iter()
            .map(|r| (r.id, PanelAlleles { a1: r.a1, a2: r.a2 }))
            .collect::<HashMap<_, _>>();
        info!(
            "Opened LD panel {} ({} variants)",
            bfile.display(),
            alleles.len()
        );
        Ok(Self {
            bfile,
            tool,
            alleles,
            window: LdWindow::proxy_search(0.0),
        })
    }

    /// Threads passed to the correlation tool
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.window = self.window.with_threads(threads);
        self
    }

    /// Maximum pair distance in kb and in variants
    pub fn with_window(mut self, kb: u64, variants: u64) -> Self {
        self.window.kb = kb;
        self.window.variants = variants;
        self
    }

    /// Number of variants in the panel
    pub fn len(&self) -> usize {
        self.alleles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alleles.is_empty()
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    /// Whether `id` is genotyped in the panel
    pub fn contains(&self, id: &str) -> bool {
        self.alleles.contains_key(id)
    }
}

impl<T: CorrelationTool> LdReference for PanelReference<T> {
    fn name(&self) -> &str {
        "panel"
    }

    fn tags(&self, targets: &[String], min_r2: f64) -> Result<Vec<LdTag>, GwasError> {
        validate_min_r2(min_r2)?;
        let present: Vec<String> = targets
            .iter()
            .filter(|t| self.contains(t))
            .cloned()
            .collect();
        debug!(
            "{} of {} targets present in panel {}",
            present.len(),
            targets.len(),
            self.bfile.display()
        );
        if present.is_empty() {
            return Ok(Vec::new());
        }

        let request = CorrelationRequest {
            bfile: self.bfile.clone(),
            targets: Some(present.clone()),
            extract: None,
            window: LdWindow {
                min_r2,
                ..self.window.clone()
            },
        };
        let mut by_target: HashMap<String, Vec<LdTag>> = HashMap::new();
        for tag in self.tool.correlations(&request)? {
            if tag.target != tag.tag && tag.r2() >= min_r2 {
                by_target.entry(tag.target.clone()).or_default().push(tag);
            }
        }

        let mut out = Vec::new();
        for target in &present {
            if let Some(mut tags) = by_target.remove(target) {
                sort_by_r2(&mut tags);
                out.extend(tags);
            }
        }
        Ok(out)
    }

    fn alleles(&self, id: &str) -> Result<Option<PanelAlleles>, GwasError> {
        Ok(self.alleles.get(id).cloned())
    }
}
