//! Fixed in-memory LD reference.

use std::collections::HashMap;

use crate::error::GwasError;

use super::{sort_by_r2, validate_min_r2, LdReference, LdTag, PanelAlleles};

/// In-memory LD reference (for testing and embedding).
///
/// Pairs are stored as added; add both directions if lookups are needed
/// from either side.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLdReference {
    tags: HashMap<String, Vec<LdTag>>,
    alleles: HashMap<String, PanelAlleles>,
}

impl InMemoryLdReference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one directed pair
    pub fn add_tag(&mut self, tag: LdTag) {
        self.tags.entry(tag.target.clone()).or_default().push(tag);
    }

    /// Add a pair in both directions
    pub fn add_pair(&mut self, tag: LdTag) {
        self.add_tag(tag.mirrored());
        self.add_tag(tag);
    }

    /// Record panel alleles for a variant
    pub fn add_alleles(&mut self, id: impl Into<String>, a1: impl Into<String>, a2: impl Into<String>) {
        self.alleles.insert(
            id.into(),
            PanelAlleles {
                a1: a1.into(),
                a2: a2.into(),
            },
        );
    }

    /// Builder form of [`add_tag`](Self::add_tag)
    pub fn with_tag(mut self, tag: LdTag) -> Self {
        self.add_tag(tag);
        self
    }

    /// Builder form of [`add_alleles`](Self::add_alleles)
    pub fn with_alleles(mut self, id: &str, a1: &str, a2: &str) -> Self {
        self.add_alleles(id, a1, a2);
        self
    }
}

impl LdReference for InMemoryLdReference {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn tags(&self, targets: &[String], min_r2: f64) -> Result<Vec<LdTag>, GwasError> {
        validate_min_r2(min_r2)?;
        let mut out = Vec::new();
        for target in targets {
            let Some(tags) = self.tags.get(target) else {
                continue;
            };
            let mut kept: Vec<LdTag> = tags.iter().filter(|t| t.r2() >= min_r2).cloned().collect();
            sort_by_r2(&mut kept);
            out.extend(kept);
        }
        Ok(out)
    }

    fn alleles(&self, id: &str) -> Result<Option<PanelAlleles>, GwasError> {
        Ok(self.alleles.get(id).cloned())
    }
}
