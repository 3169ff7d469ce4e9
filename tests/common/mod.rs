//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::cell::Cell;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ferro_gwas::external::{
    id_match_list, parse_ld_table, Accelerator, CorrelationRequest, CorrelationTool,
};
use ferro_gwas::query::{Filter, GwasSource};
use ferro_gwas::{GwasError, LdTag, VariantRecord};

/// Records in the chromosome 1 fixture
pub const FIXTURE_RECORDS: usize = 92;
/// Records with p <= 0.05 in the fixture
pub const FIXTURE_SIGNIFICANT: usize = 7;

pub fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

pub fn gwas_path() -> PathBuf {
    data_dir().join("gwas_chr1.vcf")
}

/// PLINK fileset prefix of the reference panel fixture
pub fn panel_bfile() -> PathBuf {
    data_dir().join("panel")
}

pub fn load_source() -> GwasSource {
    GwasSource::open(gwas_path()).unwrap()
}

/// Correlation tool answering from a saved plink `--r in-phase` table
pub struct TableTool {
    table: PathBuf,
    calls: Cell<usize>,
}

impl TableTool {
    pub fn new() -> Self {
        Self {
            table: data_dir().join("panel.ld"),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl CorrelationTool for TableTool {
    fn name(&self) -> &str {
        "table"
    }

    fn correlations(&self, request: &CorrelationRequest) -> Result<Vec<LdTag>, GwasError> {
        self.calls.set(self.calls.get() + 1);
        let file = File::open(&self.table)?;
        let pairs = parse_ld_table(BufReader::new(file))?;

        let min_r2 = request.window.min_r2;
        let kept = |id: &str| {
            request
                .extract
                .as_ref()
                .map_or(true, |ids| ids.iter().any(|x| x == id))
        };

        let mut out = Vec::new();
        for pair in pairs {
            if pair.r2() < min_r2 || !kept(&pair.target) || !kept(&pair.tag) {
                continue;
            }
            match &request.targets {
                None => out.push(pair),
                Some(targets) => {
                    if targets.contains(&pair.target) {
                        out.push(pair.clone());
                    }
                    if targets.contains(&pair.tag) {
                        out.push(pair.mirrored());
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Accelerator that over-returns every record of the file
pub struct FullFileAccelerator;

impl Accelerator for FullFileAccelerator {
    fn name(&self) -> &str {
        "full-file"
    }

    fn query(&self, source: &Path, _filter: &Filter) -> Result<Vec<VariantRecord>, GwasError> {
        let (_, records) = ferro_gwas::vcf::open_gwas_vcf(source)?.read_all()?;
        Ok(records)
    }
}

/// Accelerator selecting rows the way `bcftools view -i 'ID=@list || ID="."'`
/// does: by the row ID column only, keeping rows without one
pub struct IdColumnAccelerator;

impl Accelerator for IdColumnAccelerator {
    fn name(&self) -> &str {
        "id-column"
    }

    fn query(&self, source: &Path, filter: &Filter) -> Result<Vec<VariantRecord>, GwasError> {
        let text = std::fs::read_to_string(source)?;
        let Filter::Ids(ids) = filter else {
            let (_, records) = ferro_gwas::vcf::parse_gwas_vcf_str(&text)?.read_all()?;
            return Ok(records);
        };
        let listed = id_match_list(ids);
        let kept: String = text
            .lines()
            .filter(|line| {
                line.starts_with('#')
                    || line
                        .split('\t')
                        .nth(2)
                        .is_some_and(|id| id == "." || listed.iter().any(|x| x == id))
            })
            .map(|line| format!("{}\n", line))
            .collect();
        let (_, records) = ferro_gwas::vcf::parse_gwas_vcf_str(&kept)?.read_all()?;
        Ok(records)
    }
}

/// Accelerator whose process always fails
pub struct BrokenAccelerator;

impl Accelerator for BrokenAccelerator {
    fn name(&self) -> &str {
        "broken"
    }

    fn query(&self, _source: &Path, _filter: &Filter) -> Result<Vec<VariantRecord>, GwasError> {
        Err(GwasError::delegation("broken", "exit status 1"))
    }
}
