//! Immutable handle on a loaded GWAS-VCF.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::GwasError;
use crate::variants::VariantSet;
use crate::vcf::{open_gwas_vcf, parse_gwas_vcf_str, GwasHeader, VariantRecord};

/// A GWAS-VCF loaded into a position-sorted [`VariantSet`]
#[derive(Debug, Clone)]
pub struct GwasSource {
    path: Option<PathBuf>,
    header: GwasHeader,
    variants: VariantSet,
}

impl GwasSource {
    /// Load a (possibly gzipped) GWAS-VCF file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GwasError> {
        let path = path.as_ref();
        let (header, records) = open_gwas_vcf(path)?.read_all()?;
        info!(
            "Loaded {} records for {} studies from {}",
            records.len(),
            header.study_count(),
            path.display()
        );
        Ok(Self {
            path: Some(path.to_path_buf()),
            header,
            variants: VariantSet::new(records),
        })
    }

    /// Parse GWAS-VCF text held in memory
    pub fn parse(content: &str) -> Result<Self, GwasError> {
        let (header, records) = parse_gwas_vcf_str(content)?.read_all()?;
        Ok(Self::from_records(header, records))
    }

    /// Wrap records that have no backing file
    pub fn from_records(header: GwasHeader, records: Vec<VariantRecord>) -> Self {
        Self {
            path: None,
            header,
            variants: VariantSet::new(records),
        }
    }

    /// File the records were read from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn header(&self) -> &GwasHeader {
        &self.header
    }

    pub fn variants(&self) -> &VariantSet {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
