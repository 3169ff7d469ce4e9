//! GWAS-VCF reading
//!
//! The header is parsed with noodles-vcf; data lines are split directly
//! because the per-study FORMAT columns (`ES:SE:LP:AF:SS:ID`) are all that
//! is needed from them.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use noodles_vcf as nvcf;
use serde::Serialize;

use crate::error::GwasError;

use super::record::VariantRecord;

/// FORMAT key for the effect size estimate
pub const FORMAT_ES: &str = "ES";
/// FORMAT key for the standard error
pub const FORMAT_SE: &str = "SE";
/// FORMAT key for the -log10 p-value
pub const FORMAT_LP: &str = "LP";
/// FORMAT key for the effect allele frequency
pub const FORMAT_AF: &str = "AF";
/// FORMAT key for the sample size
pub const FORMAT_SS: &str = "SS";
/// FORMAT key for the study-specific variant identifier
pub const FORMAT_ID: &str = "ID";

/// Description of one FORMAT field from the header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescription {
    /// FORMAT key (e.g., "ES")
    pub id: String,
    /// Free-text description from the `##FORMAT` line
    pub description: String,
}

/// Parsed GWAS-VCF header metadata
#[derive(Debug, Clone, Default, Serialize)]
pub struct GwasHeader {
    /// Study identifiers (the sample columns)
    pub studies: Vec<String>,
    /// Contigs defined in the header (##contig lines)
    pub contigs: Vec<String>,
    /// FORMAT field descriptions in header order
    pub fields: Vec<FieldDescription>,
    /// Meta-information lines (without the #CHROM line), kept for writing
    #[serde(skip)]
    pub meta_lines: Vec<String>,
}

impl GwasHeader {
    /// Parse header text (all `#` lines including `#CHROM`)
    pub fn parse(text: &str) -> Result<Self, GwasError> {
        let header: nvcf::Header = text.parse().map_err(|e| GwasError::Parse {
            line: 0,
            msg: format!("Failed to parse VCF header: {}", e),
        })?;

        let studies = header
            .sample_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let contigs = header.contigs().keys().map(|k| k.to_string()).collect();

        let fields = header
            .formats()
            .iter()
            .map(|(id, format)| FieldDescription {
                id: id.to_string(),
                description: format.description().to_string(),
            })
            .collect();

        let meta_lines = text
            .lines()
            .filter(|l| l.starts_with("##"))
            .map(|l| l.to_string())
            .collect();

        Ok(Self {
            studies,
            contigs,
            fields,
            meta_lines,
        })
    }

    /// Get the number of studies in the file
    pub fn study_count(&self) -> usize {
        self.studies.len()
    }

    /// Get the description of a FORMAT field
    pub fn field_description(&self, id: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.description.as_str())
    }
}

/// GWAS-VCF reader that yields one [`VariantRecord`] per study and allele
pub struct GwasVcfReader<R> {
    inner: R,
    header: GwasHeader,
    line_no: usize,
    pending_line: Option<String>,
    buffered: VecDeque<VariantRecord>,
    done: bool,
}

impl<R: BufRead> GwasVcfReader<R> {
    /// Create a reader, consuming the header
    pub fn new(mut inner: R) -> Result<Self, GwasError> {
        let mut text = String::new();
        let mut line_no = 0;
        let mut pending_line = None;

        loop {
            let mut line = String::new();
            let n = inner.read_line(&mut line).map_err(|e| GwasError::Io {
                msg: format!("Failed to read VCF header: {}", e),
            })?;
            if n == 0 {
                break;
            }
            line_no += 1;
            if line.starts_with('#') {
                text.push_str(line.trim_end_matches(['\r', '\n']));
                text.push('\n');
            } else {
                pending_line = Some(line);
                break;
            }
        }

        if text.is_empty() {
            return Err(GwasError::Parse {
                line: 1,
                msg: "Missing VCF header".to_string(),
            });
        }

        let header = GwasHeader::parse(&text)?;

        Ok(Self {
            inner,
            header,
            line_no,
            pending_line,
            buffered: VecDeque::new(),
            done: false,
        })
    }

    /// Get a reference to the parsed header
    pub fn header(&self) -> &GwasHeader {
        &self.header
    }

    fn next_line(&mut self) -> Result<Option<String>, GwasError> {
        if let Some(line) = self.pending_line.take() {
            return Ok(Some(line));
        }
        let mut line = String::new();
        let n = self.inner.read_line(&mut line).map_err(|e| GwasError::Io {
            msg: format!("Failed to read VCF line {}: {}", self.line_no + 1, e),
        })?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(line))
    }

    /// Read the next record
    pub fn read_record(&mut self) -> Result<Option<VariantRecord>, GwasError> {
        while self.buffered.is_empty() {
            let Some(line) = self.next_line()? else {
                return Ok(None);
            };
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }
            let records = parse_data_line(line, self.line_no, &self.header.studies)?;
            self.buffered.extend(records);
        }
        Ok(self.buffered.pop_front())
    }

    /// Read all remaining records
    pub fn read_all(mut self) -> Result<(GwasHeader, Vec<VariantRecord>), GwasError> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record()? {
            records.push(record);
        }
        Ok((self.header, records))
    }
}

impl<R: BufRead> Iterator for GwasVcfReader<R> {
    type Item = Result<VariantRecord, GwasError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Open a GWAS-VCF file, decompressing `.gz`/`.bgz` files
pub fn open_gwas_vcf<P: AsRef<Path>>(
    path: P,
) -> Result<GwasVcfReader<BufReader<Box<dyn Read>>>, GwasError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| GwasError::Io {
        msg: format!("Failed to open VCF file '{}': {}", path.display(), e),
    })?;

    let compressed = path
        .extension()
        .is_some_and(|ext| ext == "gz" || ext == "bgz");
    let inner: Box<dyn Read> = if compressed {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    GwasVcfReader::new(BufReader::new(inner))
}

/// Parse GWAS-VCF from a string
pub fn parse_gwas_vcf_str(content: &str) -> Result<GwasVcfReader<BufReader<&[u8]>>, GwasError> {
    GwasVcfReader::new(BufReader::new(content.as_bytes()))
}

/// Parse one data line into records (one per study and alternate allele)
pub fn parse_data_line(
    line: &str,
    line_no: usize,
    studies: &[String],
) -> Result<Vec<VariantRecord>, GwasError> {
    let err = |msg: String| GwasError::Parse { line: line_no, msg };

    // VCF field indices: CHROM(0), POS(1), ID(2), REF(3), ALT(4), QUAL(5), FILTER(6), INFO(7), FORMAT(8)
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 8 {
        return Err(err(format!(
            "expected at least 8 columns, found {}",
            fields.len()
        )));
    }
    if !studies.is_empty() && fields.len() < 9 + studies.len() {
        return Err(err(format!(
            "expected {} study columns, found {}",
            studies.len(),
            fields.len().saturating_sub(9)
        )));
    }

    let chrom = fields[0];
    let pos: u64 = fields[1]
        .parse()
        .map_err(|_| err(format!("invalid position '{}'", fields[1])))?;
    let row_id = match fields[2] {
        "" | "." => None,
        ids => ids.split(';').next().map(|s| s.to_string()),
    };
    let reference = fields[3];
    let alternates: Vec<&str> = fields[4].split(',').filter(|a| *a != ".").collect();

    let mut records = Vec::new();
    if alternates.is_empty() {
        return Ok(records);
    }

    if studies.is_empty() {
        for alt in &alternates {
            let mut record = VariantRecord::new(chrom, pos, None, reference, *alt);
            record.id = row_id.clone();
            records.push(record);
        }
        return Ok(records);
    }

    let format_keys: Vec<&str> = fields[8].split(':').collect();
    let key_index = |key: &str| format_keys.iter().position(|k| *k == key);
    let es_idx = key_index(FORMAT_ES);
    let se_idx = key_index(FORMAT_SE);
    let lp_idx = key_index(FORMAT_LP);
    let af_idx = key_index(FORMAT_AF);
    let ss_idx = key_index(FORMAT_SS);
    let id_idx = key_index(FORMAT_ID);

    for (s, study) in studies.iter().enumerate() {
        let values: Vec<&str> = fields[9 + s].split(':').collect();
        let value_at = |idx: Option<usize>| idx.and_then(|i| values.get(i).copied());

        let study_id = value_at(id_idx)
            .filter(|v| !v.is_empty() && *v != ".")
            .map(|v| v.to_string());

        for (a, alt) in alternates.iter().enumerate() {
            let number = |idx: Option<usize>, key: &str| -> Result<Option<f64>, GwasError> {
                allele_value(value_at(idx), a)
                    .map_err(|bad| err(format!("invalid {} value '{}'", key, bad)))
            };

            let mut record = VariantRecord::new(chrom, pos, None, reference, *alt);
            record.id = row_id.clone().or_else(|| study_id.clone());
            record.study = study.clone();
            record.es = number(es_idx, FORMAT_ES)?;
            record.se = number(se_idx, FORMAT_SE)?;
            record.lp = number(lp_idx, FORMAT_LP)?;
            record.af = number(af_idx, FORMAT_AF)?;
            record.ss = number(ss_idx, FORMAT_SS)?;
            records.push(record);
        }
    }

    Ok(records)
}

/// Pick the value for allele `a` from a Number=A list (or a single shared value)
fn allele_value(raw: Option<&str>, a: usize) -> Result<Option<f64>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let parts: Vec<&str> = raw.split(',').collect();
    let value = if parts.len() == 1 {
        parts[0]
    } else {
        match parts.get(a) {
            Some(v) => v,
            None => return Ok(None),
        }
    };
    match value {
        "" | "." => Ok(None),
        v => v.parse::<f64>().map(Some).map_err(|_| v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_GWAS_VCF: &str = "##fileformat=VCFv4.2
##FORMAT=<ID=ES,Number=A,Type=Float,Description=\"Effect size estimate relative to the alternative allele\">
##FORMAT=<ID=SE,Number=A,Type=Float,Description=\"Standard error of effect size estimate\">
##FORMAT=<ID=LP,Number=A,Type=Float,Description=\"-log10 p-value for effect estimate\">
##FORMAT=<ID=AF,Number=A,Type=Float,Description=\"Alternate allele frequency in the association study\">
##FORMAT=<ID=SS,Number=A,Type=Float,Description=\"Sample size used to estimate genetic effect\">
##FORMAT=<ID=ID,Number=1,Type=String,Description=\"Study variant identifier\">
##contig=<ID=1,length=249250621>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tstudy-a\tstudy-b
1\t721290\trs12565286\tG\tC\t.\tPASS\t.\tES:SE:LP:AF:SS:ID\t0.0016:0.0147:0.04:0.0408:340001:rs12565286\t-0.02:0.01:1.5:0.05:1000:rs12565286
1\t752566\t.\tG\tA,T\t.\tPASS\t.\tES:SE:LP:AF:SS:ID\t0.1,0.2:0.01,0.02:3,4:0.1,0.2:500:rs3094315\t.:.:.:.:.:.
";

    #[test]
    fn test_header_metadata() {
        let reader = parse_gwas_vcf_str(MINIMAL_GWAS_VCF).unwrap();
        let header = reader.header();
        assert_eq!(header.studies, vec!["study-a", "study-b"]);
        assert_eq!(header.contigs, vec!["1"]);
        assert_eq!(header.study_count(), 2);
        assert_eq!(
            header.field_description("LP"),
            Some("-log10 p-value for effect estimate")
        );
        assert!(header.meta_lines[0].starts_with("##fileformat"));
    }

    #[test]
    fn test_records_per_study() {
        let reader = parse_gwas_vcf_str(MINIMAL_GWAS_VCF).unwrap();
        let records: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        // 2 studies for the first row, 2 alleles x 2 studies for the second
        assert_eq!(records.len(), 6);

        let first = &records[0];
        assert_eq!(first.id.as_deref(), Some("rs12565286"));
        assert_eq!(first.study, "study-a");
        assert_eq!(first.es, Some(0.0016));
        assert_eq!(first.ss, Some(340001.0));

        let second = &records[1];
        assert_eq!(second.study, "study-b");
        assert_eq!(second.es, Some(-0.02));
    }

    #[test]
    fn test_multiallelic_split() {
        let reader = parse_gwas_vcf_str(MINIMAL_GWAS_VCF).unwrap();
        let records: Vec<_> = reader.filter_map(|r| r.ok()).collect();
        let t = records
            .iter()
            .find(|r| r.effect == "T" && r.study == "study-a")
            .unwrap();
        assert_eq!(t.es, Some(0.2));
        assert_eq!(t.lp, Some(4.0));
        // SS is shared across alleles
        assert_eq!(t.ss, Some(500.0));
        // Row ID is "." so the FORMAT ID is used
        assert_eq!(t.id.as_deref(), Some("rs3094315"));
    }

    #[test]
    fn test_missing_values_are_none() {
        let reader = parse_gwas_vcf_str(MINIMAL_GWAS_VCF).unwrap();
        let records: Vec<_> = reader.filter_map(|r| r.ok()).collect();
        let missing = records
            .iter()
            .find(|r| r.pos == 752566 && r.study == "study-b")
            .unwrap();
        assert!(missing.es.is_none());
        assert!(missing.lp.is_none());
        assert!(missing.id.is_none());
    }

    #[test]
    fn test_bad_position_is_parse_error() {
        let err = parse_data_line("1\tabc\trs1\tA\tG\t.\t.\t.", 12, &[]).unwrap_err();
        assert!(matches!(err, GwasError::Parse { line: 12, .. }));
    }

    #[test]
    fn test_bad_number_is_parse_error() {
        let studies = vec!["s".to_string()];
        let err = parse_data_line("1\t10\trs1\tA\tG\t.\t.\t.\tES\tabc", 3, &studies).unwrap_err();
        assert!(matches!(err, GwasError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_missing_study_columns() {
        let studies = vec!["a".to_string(), "b".to_string()];
        let err = parse_data_line("1\t10\trs1\tA\tG\t.\t.\t.\tES\t0.1", 5, &studies).unwrap_err();
        assert!(matches!(err, GwasError::Parse { .. }));
    }

    #[test]
    fn test_sites_only_line() {
        let records = parse_data_line("2\t50\trs9\tC\tT\t.\t.\t.", 1, &[]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.as_deref(), Some("rs9"));
        assert!(records[0].study.is_empty());
    }

    #[test]
    fn test_missing_header() {
        let result = parse_gwas_vcf_str("1\t10\trs1\tA\tG\t.\t.\t.\n");
        assert!(matches!(result, Err(GwasError::Parse { .. })));
    }
}
