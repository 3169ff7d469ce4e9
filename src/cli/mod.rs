//! CLI utilities for ferro-gwas
//!
//! This module provides testable functions used by the CLI binary.
//! Input handling and output rendering live here so they can be unit tested
//! without spawning the binary.

pub mod format;

use std::fs;
use std::path::Path;

use crate::error::GwasError;
use crate::region::GenomicRange;

// Re-export commonly used items
pub use format::{
    output_error, output_header_info, output_paths, output_proxy_summary, output_records,
    OutputFormat,
};

/// UTF-8 BOM (Byte Order Mark) constant
const UTF8_BOM: &str = "\u{feff}";

/// Strip UTF-8 BOM from the beginning of a string if present.
///
/// This is common when files are exported from Windows applications or Excel.
///
/// # Examples
///
/// ```
/// use ferro_gwas::cli::strip_bom;
///
/// assert_eq!(strip_bom("\u{feff}rs12565286"), "rs12565286");
/// assert_eq!(strip_bom("rs12565286"), "rs12565286");
/// ```
pub fn strip_bom(s: &str) -> &str {
    s.strip_prefix(UTF8_BOM).unwrap_or(s)
}

/// Strip inline comments from an input line.
///
/// Comments start with `#` and extend to the end of the line.
///
/// # Examples
///
/// ```
/// use ferro_gwas::cli::strip_inline_comment;
///
/// assert_eq!(strip_inline_comment("rs12565286  # lead SNP"), "rs12565286");
/// assert_eq!(strip_inline_comment("# header"), "");
/// ```
pub fn strip_inline_comment(s: &str) -> &str {
    match s.find('#') {
        Some(pos) => s[..pos].trim(),
        None => s.trim(),
    }
}

/// Process an input line: trim whitespace, strip BOM (for first line), and strip inline comments.
///
/// Returns None if the line is empty or a comment-only line.
pub fn process_input_line(line: &str, is_first_line: bool) -> Option<&str> {
    let line = line.trim();
    let line = if is_first_line { strip_bom(line) } else { line };
    let line = strip_inline_comment(line);

    if line.is_empty() {
        None
    } else {
        Some(line)
    }
}

/// Parse identifiers, one per line or whitespace separated
pub fn parse_id_list(content: &str) -> Vec<String> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| process_input_line(line, i == 0))
        .flat_map(|line| line.split_whitespace())
        .map(str::to_string)
        .collect()
}

/// Read an identifier file
pub fn read_id_file(path: &Path) -> Result<Vec<String>, GwasError> {
    let content = fs::read_to_string(path).map_err(|e| GwasError::Io {
        msg: format!("cannot read {}: {}", path.display(), e),
    })?;
    Ok(parse_id_list(&content))
}

/// Parse repeated `--region` values, each possibly comma separated
pub fn parse_regions<S: AsRef<str>>(values: &[S]) -> Result<Vec<GenomicRange>, GwasError> {
    let mut ranges = Vec::new();
    for value in values {
        ranges.extend(GenomicRange::parse_list(value.as_ref())?);
    }
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom("\u{feff}test"), "test");
        assert_eq!(strip_bom("test"), "test");
        assert_eq!(strip_bom(""), "");
    }

    #[test]
    fn test_process_input_line() {
        assert_eq!(process_input_line("rs1", false), Some("rs1"));
        assert_eq!(process_input_line("rs1  # note", false), Some("rs1"));
        assert_eq!(process_input_line("\u{feff}rs1", true), Some("rs1"));
        assert_eq!(process_input_line("   ", false), None);
        assert_eq!(process_input_line("# comment", false), None);
    }

    #[test]
    fn test_parse_id_list() {
        let ids = parse_id_list("\u{feff}rs1\n# header\nrs2 rs3\n\nrs4 # trailing\n");
        assert_eq!(ids, vec!["rs1", "rs2", "rs3", "rs4"]);
    }

    #[test]
    fn test_read_id_file() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "rs12565286\nrs4442317\n").unwrap();
        assert_eq!(read_id_file(file.path()).unwrap().len(), 2);
        assert!(read_id_file(Path::new("/nonexistent/ids.txt")).is_err());
    }

    #[test]
    fn test_parse_regions() {
        let ranges = parse_regions(&["1:100-200,1:300", "2"]).unwrap();
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[2].chrom, "2");
        assert!(parse_regions(&["1:200-100"]).is_err());
    }
}
