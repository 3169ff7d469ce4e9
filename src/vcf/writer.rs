//! GWAS-VCF writing
//!
//! Records for the same site are regrouped into one row with a column per
//! study. Proxy-resolved records carry two extra FORMAT keys: `PR` (the
//! identifier that supplied the data) and `R2`.

use std::io::{self, Write};

use super::parser::GwasHeader;
use super::record::VariantRecord;

/// FORMAT key recording the proxy identifier
pub const FORMAT_PR: &str = "PR";
/// FORMAT key recording the proxy's squared correlation
pub const FORMAT_R2: &str = "R2";

const PROXY_FORMAT_LINES: [&str; 2] = [
    "##FORMAT=<ID=PR,Number=1,Type=String,Description=\"Identifier of the LD proxy that supplied this record\">",
    "##FORMAT=<ID=R2,Number=1,Type=Float,Description=\"Squared correlation between the requested variant and its proxy\">",
];

fn value(v: Option<f64>) -> String {
    v.map_or(".".to_string(), |x| x.to_string())
}

/// Write the header followed by all records
pub fn write_gwas_vcf<W: Write>(
    writer: &mut W,
    header: &GwasHeader,
    records: &[VariantRecord],
) -> io::Result<()> {
    let has_proxies = records.iter().any(|r| r.proxy.is_some());

    if header.meta_lines.is_empty() {
        writeln!(writer, "##fileformat=VCFv4.2")?;
    }
    for line in &header.meta_lines {
        writeln!(writer, "{}", line)?;
    }
    if has_proxies {
        for line in PROXY_FORMAT_LINES {
            if !header.meta_lines.iter().any(|l| l == line) {
                writeln!(writer, "{}", line)?;
            }
        }
    }

    let studies: Vec<String> = if header.studies.is_empty() {
        let mut seen: Vec<String> = Vec::new();
        for r in records {
            if !seen.contains(&r.study) {
                seen.push(r.study.clone());
            }
        }
        seen
    } else {
        header.studies.clone()
    };

    write!(writer, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT")?;
    for study in &studies {
        write!(writer, "\t{}", study)?;
    }
    writeln!(writer)?;

    let mut start = 0;
    while start < records.len() {
        let first = &records[start];
        let mut end = start + 1;
        while end < records.len()
            && records[end].same_site(first)
            && records[end].id == first.id
        {
            end += 1;
        }
        write_row(writer, &records[start..end], &studies)?;
        start = end;
    }

    Ok(())
}

fn write_row<W: Write>(
    writer: &mut W,
    group: &[VariantRecord],
    studies: &[String],
) -> io::Result<()> {
    let first = &group[0];
    let proxied = group.iter().any(|r| r.proxy.is_some());
    let format = if proxied {
        "ES:SE:LP:AF:SS:ID:PR:R2"
    } else {
        "ES:SE:LP:AF:SS:ID"
    };

    write!(
        writer,
        "{}\t{}\t{}\t{}\t{}\t.\tPASS\t.\t{}",
        first.chrom,
        first.pos,
        first.id.as_deref().unwrap_or("."),
        first.non_effect,
        first.effect,
        format
    )?;

    for study in studies {
        match group.iter().find(|r| &r.study == study) {
            Some(r) => {
                write!(
                    writer,
                    "\t{}:{}:{}:{}:{}:{}",
                    value(r.es),
                    value(r.se),
                    value(r.lp),
                    value(r.af),
                    value(r.ss),
                    r.id.as_deref().unwrap_or(".")
                )?;
                if proxied {
                    match &r.proxy {
                        Some(p) => write!(writer, ":{}:{}", p.proxy_id, p.r2)?,
                        None => write!(writer, ":.:.")?,
                    }
                }
            }
            None => {
                let missing = if proxied { ".:.:.:.:.:.:.:." } else { ".:.:.:.:.:." };
                write!(writer, "\t{}", missing)?;
            }
        }
    }
    writeln!(writer)
}
