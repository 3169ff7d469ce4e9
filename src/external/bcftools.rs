//! bcftools as a delegated scan.

use std::collections::HashSet;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::GwasError;
use crate::query::Filter;
use crate::rsid::{format_rsid, rsid_key};
use crate::vcf::{GwasVcfReader, VariantRecord};

use super::check_output;

/// A collaborator that scans the source file out of process.
///
/// Implementations return raw matching records; the planner re-applies the
/// filter in memory, so an accelerator may over-return but must not
/// under-return.
pub trait Accelerator {
    /// Tool name used in logs and errors
    fn name(&self) -> &str;

    /// Run one filter against the file at `source`
    fn query(&self, source: &Path, filter: &Filter) -> Result<Vec<VariantRecord>, GwasError>;
}

/// Every spelling of the requested identifiers that may appear in the
/// ID column: as given, `rs`-prefixed and bare numeric.
pub fn id_match_list(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for id in ids {
        let forms = match rsid_key(id) {
            Some(key) => vec![id.clone(), format_rsid(key), key.to_string()],
            None => vec![id.clone()],
        };
        for form in forms {
            if seen.insert(form.clone()) {
                out.push(form);
            }
        }
    }
    out
}

/// `bcftools view` wrapper
#[derive(Debug, Clone)]
pub struct Bcftools {
    binary: PathBuf,
}

impl Bcftools {
    /// Wrap the binary at `binary`
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Arguments for one filter; the returned temp file must outlive the call
    fn arguments(filter: &Filter) -> Result<(Vec<String>, Option<NamedTempFile>), GwasError> {
        match filter {
            Filter::Region(ranges) => {
                let regions: Vec<String> = ranges.iter().map(|r| r.to_string()).collect();
                Ok((vec!["-r".to_string(), regions.join(",")], None))
            }
            Filter::Ids(ids) => {
                let mut file = NamedTempFile::new()?;
                for id in id_match_list(ids) {
                    writeln!(file, "{}", id)?;
                }
                file.flush()?;
                // rows without an ID column value may carry the id in FORMAT/ID
                let expr = format!("ID=@{} || ID=\".\"", file.path().display());
                Ok((vec!["-i".to_string(), expr], Some(file)))
            }
            Filter::Threshold(pval) => {
                let expr = format!("FORMAT/LP>={}", crate::vcf::lp_threshold(*pval));
                Ok((vec!["-i".to_string(), expr], None))
            }
        }
    }
}

impl Accelerator for Bcftools {
    fn name(&self) -> &str {
        "bcftools"
    }

    fn query(&self, source: &Path, filter: &Filter) -> Result<Vec<VariantRecord>, GwasError> {
        let (args, _id_file) = Self::arguments(filter)?;
        debug!("Running {} view {:?} {}", self.binary.display(), args, source.display());

        let output = Command::new(&self.binary)
            .arg("view")
            .args(&args)
            .arg(source)
            .output()
            .map_err(|e| GwasError::delegation("bcftools", format!("failed to run: {}", e)))?;
        let stdout = check_output("bcftools", output)?;

        let reader = GwasVcfReader::new(BufReader::new(stdout.as_slice()))
            .map_err(|e| GwasError::delegation("bcftools", format!("malformed output: {}", e)))?;
        let (_, records) = reader
            .read_all()
            .map_err(|e| GwasError::delegation("bcftools", format!("malformed output: {}", e)))?;
        Ok(records)
    }
}
