//! Sparse side-indexes over a GWAS-VCF.
//!
//! Both indexes are single-table SQLite databases mapping a key to
//! `(chrom, coord)`. Queries return loci; full records are then fetched from
//! the source with the ChromPos filter.
//!
//! - [`IdentifierIndex`]: numeric rsID key -> locus
//! - [`ThresholdIndex`]: -log10 p -> locus, for records at or below a
//!   build-time p-value cutoff only

pub mod pval;
pub mod rsid;

pub use pval::ThresholdIndex;
pub use rsid::IdentifierIndex;

use std::path::Path;

use crate::error::GwasError;

/// SQLite bound-parameter limit per statement is ~1000; stay well below it.
pub(crate) const LOOKUP_BATCH_SIZE: usize = 500;

/// Remove a stale index file so a rebuild starts from an empty database
pub(crate) fn remove_existing(path: &Path) -> Result<(), GwasError> {
    if path.exists() {
        std::fs::remove_file(path).map_err(|e| GwasError::Io {
            msg: format!("Failed to replace index '{}': {}", path.display(), e),
        })?;
    }
    Ok(())
}

/// Create the key/value metadata table shared by all side-indexes
pub(crate) fn create_meta_table(conn: &rusqlite::Connection) -> Result<(), GwasError> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);")?;
    Ok(())
}

/// Read one metadata value
pub(crate) fn read_meta(
    conn: &rusqlite::Connection,
    key: &str,
) -> Result<Option<String>, GwasError> {
    use rusqlite::OptionalExtension;

    let value = conn
        .query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
            row.get::<_, String>(0)
        })
        .optional()?;
    Ok(value)
}
