//! Output formatting utilities for CLI operations

use std::io::{self, Write};
use std::str::FromStr;

use serde::Serialize;

use crate::error::GwasError;
use crate::proxy::{ProxyOutcome, ProxyResult, ResolutionState};
use crate::query::AccessPath;
use crate::vcf::{write_gwas_vcf, GwasHeader, VariantRecord};

/// Column header for text output
pub const TEXT_HEADER: &str = "#CHROM\tPOS\tID\tNEA\tEA\tSTUDY\tES\tSE\tLP\tAF\tSS";

/// Output format for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Tab-separated text (default)
    #[default]
    Text,
    /// JSON lines
    Json,
    /// GWAS-VCF
    Vcf,
}

impl FromStr for OutputFormat {
    type Err = std::convert::Infallible;

    /// Parse an output format from a string
    ///
    /// # Examples
    ///
    /// ```
    /// use ferro_gwas::cli::OutputFormat;
    /// use std::str::FromStr;
    ///
    /// assert!(matches!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json));
    /// assert!(matches!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text));
    /// assert!(matches!(OutputFormat::from_str("vcf").unwrap(), OutputFormat::Vcf));
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "vcf" => OutputFormat::Vcf,
            _ => OutputFormat::Text,
        })
    }
}

fn json_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writeln!(writer)
}

/// Write query results
///
/// # Examples
///
/// ```
/// use ferro_gwas::cli::{output_records, OutputFormat};
/// use ferro_gwas::vcf::{GwasHeader, VariantRecord};
/// use std::io::Cursor;
///
/// let record = VariantRecord::new("1", 721290, Some("rs12565286"), "G", "C");
/// let mut buffer = Cursor::new(Vec::new());
/// output_records(&mut buffer, &GwasHeader::default(), &[record], OutputFormat::Text).unwrap();
/// let result = String::from_utf8(buffer.into_inner()).unwrap();
/// assert!(result.contains("rs12565286"));
/// ```
pub fn output_records<W: Write>(
    writer: &mut W,
    header: &GwasHeader,
    records: &[VariantRecord],
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Vcf => write_gwas_vcf(writer, header, records),
        OutputFormat::Json => records.iter().try_for_each(|r| json_line(writer, r)),
        OutputFormat::Text => {
            let proxied = records.iter().any(|r| r.proxy.is_some());
            if proxied {
                writeln!(writer, "{}\tPROXY\tR2", TEXT_HEADER)?;
            } else {
                writeln!(writer, "{}", TEXT_HEADER)?;
            }
            for record in records {
                if proxied && record.proxy.is_none() {
                    writeln!(writer, "{}\t.\t.", record)?;
                } else {
                    writeln!(writer, "{}", record)?;
                }
            }
            Ok(())
        }
    }
}

/// Write the per-identifier summary of a proxy resolution
pub fn output_proxy_summary<W: Write>(
    writer: &mut W,
    outcome: &ProxyOutcome,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => outcome
            .results
            .iter()
            .try_for_each(|r| json_line(writer, &ProxySummaryLine::from(r))),
        OutputFormat::Text | OutputFormat::Vcf => {
            for result in &outcome.results {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{}",
                    result.requested,
                    result.state,
                    result.resolved.as_deref().unwrap_or("."),
                    result.r2.map_or(".".to_string(), |r2| format!("{:.4}", r2)),
                    result.sign.map_or(".".to_string(), |s| s.to_string()),
                )?;
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct ProxySummaryLine<'a> {
    requested: &'a str,
    state: ResolutionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    r2: Option<f64>,
    records: usize,
}

impl<'a> From<&'a ProxyResult> for ProxySummaryLine<'a> {
    fn from(result: &'a ProxyResult) -> Self {
        Self {
            requested: &result.requested,
            state: result.state,
            resolved: result.resolved.as_deref(),
            r2: result.r2,
            records: result.records.len(),
        }
    }
}

/// Write which access paths answered each plan step
pub fn output_paths<W: Write>(writer: &mut W, paths: &[AccessPath]) -> io::Result<()> {
    let names: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
    writeln!(writer, "access paths: {}", names.join(" -> "))
}

/// Write header metadata
pub fn output_header_info<W: Write>(
    writer: &mut W,
    header: &GwasHeader,
    records: usize,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Info<'a> {
                #[serde(flatten)]
                header: &'a GwasHeader,
                records: usize,
            }
            json_line(writer, &Info { header, records })
        }
        OutputFormat::Text | OutputFormat::Vcf => {
            writeln!(writer, "studies:\t{}", header.studies.join(","))?;
            writeln!(writer, "contigs:\t{}", header.contigs.len())?;
            writeln!(writer, "records:\t{}", records)?;
            for field in &header.fields {
                writeln!(writer, "FORMAT/{}:\t{}", field.id, field.description)?;
            }
            Ok(())
        }
    }
}

/// Write an error with its code
///
/// # Examples
///
/// ```
/// use ferro_gwas::cli::{output_error, OutputFormat};
/// use ferro_gwas::GwasError;
/// use std::io::Cursor;
///
/// let mut buffer = Cursor::new(Vec::new());
/// let error = GwasError::configuration("no plink");
/// output_error(&mut buffer, &error, OutputFormat::Text).unwrap();
/// let result = String::from_utf8(buffer.into_inner()).unwrap();
/// assert!(result.starts_with("ERROR [E4002]"));
/// ```
pub fn output_error<W: Write>(
    writer: &mut W,
    error: &GwasError,
    format: OutputFormat,
) -> io::Result<()> {
    let code = error.code().as_str();
    match format {
        OutputFormat::Json => {
            writeln!(
                writer,
                r#"{{"status": "error", "code": "{}", "error": {}}}"#,
                code,
                serde_json::to_string(&error.to_string())?
            )
        }
        OutputFormat::Text | OutputFormat::Vcf => {
            writeln!(writer, "ERROR [{}]: {}", code, error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ld::CorrelationSign;
    use crate::variants::VariantSet;
    use crate::vcf::ProxyProvenance;

    fn records() -> Vec<VariantRecord> {
        vec![
            VariantRecord::new("1", 100, Some("rs1"), "A", "G")
                .with_study("s1")
                .with_stats(0.1, 0.01, 3.0),
            VariantRecord::new("1", 200, None, "C", "T").with_study("s1"),
        ]
    }

    fn render<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(f: F) -> String {
        let mut buffer = Vec::new();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::from_str("other").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }

    #[test]
    fn test_text_records() {
        let out = render(|w| {
            output_records(w, &GwasHeader::default(), &records(), OutputFormat::Text)
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], TEXT_HEADER);
        assert!(lines[1].starts_with("1\t100\trs1\tA\tG\ts1\t0.1"));
        assert!(lines[2].starts_with("1\t200\t.\tC\tT"));
    }

    #[test]
    fn test_text_records_with_proxy_columns() {
        let mut rs = records();
        rs[0].proxy = Some(ProxyProvenance {
            proxy_id: "rs9".to_string(),
            r2: 0.8,
            sign: CorrelationSign::Positive,
        });
        let out = render(|w| output_records(w, &GwasHeader::default(), &rs, OutputFormat::Text));
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].ends_with("PROXY\tR2"));
        assert!(lines[1].ends_with("rs9\t0.8"));
        assert!(lines[2].ends_with("\t.\t."));
    }

    #[test]
    fn test_json_records() {
        let out = render(|w| {
            output_records(w, &GwasHeader::default(), &records(), OutputFormat::Json)
        });
        let first: serde_json::Value = serde_json::from_str(out.lines().next().unwrap()).unwrap();
        assert_eq!(first["id"], "rs1");
        assert_eq!(first["pos"], 100);
    }

    #[test]
    fn test_vcf_records() {
        let out = render(|w| output_records(w, &GwasHeader::default(), &records(), OutputFormat::Vcf));
        assert!(out.starts_with("##fileformat=VCFv4.2"));
        assert!(out.contains("#CHROM\tPOS"));
    }

    #[test]
    fn test_proxy_summary() {
        let outcome = ProxyOutcome {
            records: VariantSet::default(),
            results: vec![
                ProxyResult {
                    requested: "rs10".to_string(),
                    state: ResolutionState::Resolved,
                    resolved: Some("rs2".to_string()),
                    r2: Some(0.81),
                    sign: Some(CorrelationSign::Negative),
                    records: vec![],
                },
                ProxyResult::unresolved("rs11"),
            ],
        };
        let text = render(|w| output_proxy_summary(w, &outcome, OutputFormat::Text));
        assert_eq!(text, "rs10\tresolved\trs2\t0.8100\t-\nrs11\tunresolved\t.\t.\t.\n");

        let json = render(|w| output_proxy_summary(w, &outcome, OutputFormat::Json));
        let second: serde_json::Value = serde_json::from_str(json.lines().nth(1).unwrap()).unwrap();
        assert_eq!(second["state"], "unresolved");
        assert!(second.get("resolved").is_none());
    }

    #[test]
    fn test_output_error() {
        let error = GwasError::ThresholdExceeded {
            requested: 0.5,
            coverage: 0.01,
        };
        let text = render(|w| output_error(w, &error, OutputFormat::Text));
        assert!(text.starts_with("ERROR [E3002]"));
        let json = render(|w| output_error(w, &error, OutputFormat::Json));
        let value: serde_json::Value = serde_json::from_str(json.trim()).unwrap();
        assert_eq!(value["code"], "E3002");
    }

    #[test]
    fn test_header_info() {
        let header = GwasHeader {
            studies: vec!["ieu-a-2".to_string()],
            ..Default::default()
        };
        let text = render(|w| output_header_info(w, &header, 92, OutputFormat::Text));
        assert!(text.contains("studies:\tieu-a-2"));
        assert!(text.contains("records:\t92"));
    }
}
