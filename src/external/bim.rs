//! PLINK `.bim` variant tables.
//!
//! Six whitespace-separated columns: chromosome, identifier, genetic
//! distance (cM), position, allele 1, allele 2.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::GwasError;

/// One variant of a PLINK binary fileset
#[derive(Debug, Clone, PartialEq)]
pub struct BimRecord {
    pub chrom: String,
    pub id: String,
    pub cm: f64,
    pub pos: u64,
    /// Allele 1 (usually minor)
    pub a1: String,
    /// Allele 2 (usually major)
    pub a2: String,
}

impl BimRecord {
    /// Both alleles are single bases
    pub fn is_snv(&self) -> bool {
        self.a1.len() == 1 && self.a2.len() == 1
    }
}

/// `<bfile>.bim` for a fileset prefix
pub fn bim_path(bfile: &Path) -> PathBuf {
    let mut s: OsString = bfile.as_os_str().to_owned();
    s.push(".bim");
    PathBuf::from(s)
}

/// Read the `.bim` of a fileset prefix
pub fn read_bim(bfile: &Path) -> Result<Vec<BimRecord>, GwasError> {
    let path = bim_path(bfile);
    let file = File::open(&path).map_err(|e| GwasError::Io {
        msg: format!("Failed to open '{}': {}", path.display(), e),
    })?;

    let mut records = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_bim_line(&line, i + 1)?);
    }
    Ok(records)
}

fn parse_bim_line(line: &str, line_no: usize) -> Result<BimRecord, GwasError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(GwasError::Parse {
            line: line_no,
            msg: format!("expected 6 .bim columns, found {}", fields.len()),
        });
    }
    let number = |s: &str, what: &str| GwasError::Parse {
        line: line_no,
        msg: format!("invalid {} '{}'", what, s),
    };
    Ok(BimRecord {
        chrom: fields[0].to_string(),
        id: fields[1].to_string(),
        cm: fields[2].parse().map_err(|_| number(fields[2], "genetic distance"))?,
        pos: fields[3].parse().map_err(|_| number(fields[3], "position"))?,
        a1: fields[4].to_string(),
        a2: fields[5].to_string(),
    })
}
