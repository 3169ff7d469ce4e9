//! plink as the pairwise LD collaborator.
//!
//! Runs `plink --r in-phase with-freqs gz` and parses the resulting
//! `.ld.gz` table by column name (`SNP_A`, `SNP_B`, `R`, `PHASE`).

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use flate2::read::MultiGzDecoder;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::GwasError;
use crate::ld::{AllelePhase, LdTag};

use super::check_output;

/// Windowing and filtering passed to the correlation tool
#[derive(Debug, Clone, PartialEq)]
pub struct LdWindow {
    /// Maximum distance between pair members, in kb
    pub kb: u64,
    /// Maximum number of variants between pair members
    pub variants: u64,
    /// Pairs below this r² are not reported
    pub min_r2: f64,
    /// Worker threads for the tool
    pub threads: usize,
}

impl LdWindow {
    /// Window used for live proxy searches
    pub fn proxy_search(min_r2: f64) -> Self {
        Self {
            kb: 5000,
            variants: 5000,
            min_r2,
            threads: 1,
        }
    }

    /// Window used when precomputing a tag database.
    ///
    /// Pairs are bounded by a 1 Mb distance only; the variant count is
    /// effectively unlimited so dense regions keep all their tags.
    pub fn tag_build(min_r2: f64) -> Self {
        Self {
            kb: 1000,
            variants: 999_999,
            min_r2,
            threads: 1,
        }
    }

    /// Set the thread count
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }
}

/// One pairwise LD computation
#[derive(Debug, Clone)]
pub struct CorrelationRequest {
    /// PLINK fileset prefix
    pub bfile: PathBuf,
    /// Only report pairs whose first member is one of these
    pub targets: Option<Vec<String>>,
    /// Restrict the panel to these variants
    pub extract: Option<Vec<String>>,
    pub window: LdWindow,
}

/// A collaborator that computes pairwise LD over a genotype panel
pub trait CorrelationTool {
    /// Tool name used in logs and errors
    fn name(&self) -> &str;

    /// Pairs (target, tag) with their signed correlation and phase
    fn correlations(&self, request: &CorrelationRequest) -> Result<Vec<LdTag>, GwasError>;
}

/// plink 1.9 wrapper
#[derive(Debug, Clone)]
pub struct Plink {
    binary: PathBuf,
}

impl Plink {
    /// Wrap the binary at `binary`
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    fn write_list(dir: &Path, name: &str, ids: &[String]) -> Result<PathBuf, GwasError> {
        let path = dir.join(name);
        let mut file = File::create(&path)?;
        for id in ids {
            writeln!(file, "{}", id)?;
        }
        Ok(path)
    }
}

impl CorrelationTool for Plink {
    fn name(&self) -> &str {
        "plink"
    }

    fn correlations(&self, request: &CorrelationRequest) -> Result<Vec<LdTag>, GwasError> {
        let workdir = TempDir::new()?;
        let out = workdir.path().join("ld");
        let window = &request.window;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("--bfile")
            .arg(&request.bfile)
            .args(["--r", "in-phase", "with-freqs", "gz"])
            .arg("--ld-window-kb")
            .arg(window.kb.to_string())
            .arg("--ld-window")
            .arg(window.variants.to_string())
            .arg("--ld-window-r2")
            .arg(window.min_r2.to_string())
            .arg("--threads")
            .arg(window.threads.to_string())
            .arg("--out")
            .arg(&out);
        if let Some(targets) = &request.targets {
            cmd.arg("--ld-snp-list")
                .arg(Self::write_list(workdir.path(), "targets", targets)?);
        }
        if let Some(extract) = &request.extract {
            cmd.arg("--extract")
                .arg(Self::write_list(workdir.path(), "extract", extract)?);
        }

        debug!("Running {:?}", cmd);
        let output = cmd
            .output()
            .map_err(|e| GwasError::delegation("plink", format!("failed to run: {}", e)))?;
        check_output("plink", output)?;

        let table = workdir.path().join("ld.ld.gz");
        let file = File::open(&table).map_err(|e| {
            GwasError::delegation("plink", format!("missing output {}: {}", table.display(), e))
        })?;
        parse_ld_table(BufReader::new(MultiGzDecoder::new(file)))
    }
}

/// Parse a plink `--r in-phase` table.
///
/// Self pairs and rows with a malformed phase are dropped.
pub fn parse_ld_table<R: BufRead>(reader: R) -> Result<Vec<LdTag>, GwasError> {
    let malformed = |msg: String| GwasError::delegation("plink", msg);
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => return Ok(Vec::new()),
    };
    let columns: Vec<&str> = header.split_whitespace().collect();
    let column = |name: &str| columns.iter().position(|c| *c == name);
    let (snp_a, snp_b, r) = match (column("SNP_A"), column("SNP_B"), column("R")) {
        (Some(a), Some(b), Some(r)) => (a, b, r),
        _ => return Err(malformed(format!("unexpected LD table header: {}", header))),
    };
    let phase = column("PHASE");

    let mut tags = Vec::new();
    let mut dropped = 0usize;
    for (i, line) in lines.enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < columns.len() {
            return Err(malformed(format!(
                "LD table row {} has {} columns, expected {}",
                i + 2,
                fields.len(),
                columns.len()
            )));
        }
        let (target, tag) = (fields[snp_a], fields[snp_b]);
        if target == tag {
            continue;
        }
        let r_value: f64 = fields[r]
            .parse()
            .map_err(|_| malformed(format!("invalid R '{}' on row {}", fields[r], i + 2)))?;
        let allele_phase = match phase {
            Some(idx) => match AllelePhase::parse(fields[idx]) {
                Some(p) => Some(p),
                None => {
                    dropped += 1;
                    continue;
                }
            },
            None => None,
        };
        tags.push(LdTag {
            target: target.to_string(),
            tag: tag.to_string(),
            r: r_value,
            phase: allele_phase,
        });
    }

    if dropped > 0 {
        warn!("Dropped {} LD pairs with malformed phase", dropped);
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = " CHR_A BP_A SNP_A MAF_A CHR_B BP_B SNP_B PHASE MAF_B R
 1 100 rs1 0.2 1 100 rs1 AA/GG 0.2 1
 1 100 rs1 0.2 1 250 rs2 AC/GT 0.25 0.9
 1 100 rs1 0.2 1 300 rs3 AT/GC 0.3 -0.4
 1 100 rs1 0.2 1 400 rs4 ATT/G 0.3 0.5
";

    #[test]
    fn test_parse_ld_table() {
        let tags = parse_ld_table(TABLE.as_bytes()).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].tag, "rs2");
        assert!((tags[0].r - 0.9).abs() < 1e-12);
        let phase = tags[0].phase.as_ref().unwrap();
        assert_eq!(phase.target_a1, "A");
        assert_eq!(phase.tag_b1, "C");
        assert_eq!(phase.target_a2, "G");
        assert_eq!(phase.tag_b2, "T");
        assert!(tags[1].r < 0.0);
    }

    #[test]
    fn test_empty_table() {
        assert!(parse_ld_table("".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_columns() {
        let err = parse_ld_table("CHR_A BP_A\n1 2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, GwasError::Delegation { .. }));
    }

    #[test]
    fn test_table_without_phase() {
        let tags = parse_ld_table("SNP_A SNP_B R\nrs1 rs2 0.3\n".as_bytes()).unwrap();
        assert_eq!(tags.len(), 1);
        assert!(tags[0].phase.is_none());
    }

    #[test]
    fn test_window_presets() {
        let search = LdWindow::proxy_search(0.2);
        assert_eq!((search.kb, search.variants), (5000, 5000));
        let build = LdWindow::tag_build(0.2);
        assert_eq!((build.kb, build.variants), (1000, 999_999));
        assert_eq!(LdWindow::tag_build(0.2).with_threads(0).threads, 1);
    }
}
