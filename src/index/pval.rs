//! Threshold side-index.
//!
//! Persisted as `pval_to_coord(pval REAL, chrom TEXT, coord INTEGER)` where
//! `pval` holds -log10 p, plus a `meta` table recording the build cutoff.
//! Only records at or below the cutoff are stored, so the index can answer
//! a query only when the requested threshold is at least as stringent.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, info};

use crate::error::GwasError;
use crate::variants::VariantSet;
use crate::vcf::{lp_threshold, VariantRecord};

use super::{create_meta_table, read_meta, remove_existing};

const META_MAXIMUM_PVAL: &str = "maximum_pval";
const META_ENTRIES: &str = "entries";

/// Reject p-values outside (0, 1]
pub(crate) fn validate_pval(pval: f64) -> Result<(), GwasError> {
    if pval.is_nan() || pval <= 0.0 || pval > 1.0 {
        return Err(GwasError::InvalidArgument {
            msg: format!("p-value threshold {} is outside (0, 1]", pval),
        });
    }
    Ok(())
}

/// Read-only significance -> locus index
pub struct ThresholdIndex {
    conn: Connection,
    path: PathBuf,
    maximum_pval: f64,
}

impl std::fmt::Debug for ThresholdIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdIndex")
            .field("path", &self.path)
            .field("maximum_pval", &self.maximum_pval)
            .finish()
    }
}

impl ThresholdIndex {
    /// Build an index of all records with p <= `maximum_pval`.
    ///
    /// An empty result is a [`GwasError::Build`] so that "nothing is that
    /// significant" and "the cutoff is wrong" are not confused later.
    pub fn build<'a, I, P>(records: I, maximum_pval: f64, path: P) -> Result<Self, GwasError>
    where
        I: IntoIterator<Item = &'a VariantRecord>,
        P: AsRef<Path>,
    {
        validate_pval(maximum_pval)?;
        let path = path.as_ref();

        // (lp bits, chrom, pos); lp is non-negative so bit order matches numeric order
        let mut entries: BTreeSet<(u64, String, u64)> = BTreeSet::new();
        for record in records {
            if !record.passes_pval(maximum_pval) {
                continue;
            }
            if let Some(lp) = record.lp {
                entries.insert((lp.to_bits(), record.chrom.clone(), record.pos));
            }
        }

        if entries.is_empty() {
            return Err(GwasError::build(format!(
                "no records with p <= {}; threshold index would be empty",
                maximum_pval
            )));
        }

        remove_existing(path)?;
        let mut conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE pval_to_coord (pval REAL NOT NULL, chrom TEXT NOT NULL, coord INTEGER NOT NULL);",
        )?;
        create_meta_table(&conn)?;

        let tx = conn.transaction()?;
        {
            let mut insert =
                tx.prepare("INSERT INTO pval_to_coord (pval, chrom, coord) VALUES (?1, ?2, ?3)")?;
            for (bits, chrom, pos) in &entries {
                insert.execute(params![f64::from_bits(*bits), chrom, *pos as i64])?;
            }
            let mut meta = tx.prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")?;
            meta.execute(params!["kind", "pval"])?;
            meta.execute(params![META_MAXIMUM_PVAL, maximum_pval.to_string()])?;
            meta.execute(params![META_ENTRIES, entries.len().to_string()])?;
        }
        tx.commit()?;
        conn.execute_batch("CREATE INDEX idx_pval ON pval_to_coord (pval);")?;

        info!(
            "Built threshold index {} (p <= {}, {} entries)",
            path.display(),
            maximum_pval,
            entries.len()
        );

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            maximum_pval,
        })
    }

    /// Open an existing index read-only.
    ///
    /// The build cutoff is read from the `meta` table; an index without it
    /// cannot prove completeness and is rejected.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GwasError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GwasError::configuration(format!(
                "threshold index not found: {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let maximum_pval = read_meta(&conn, META_MAXIMUM_PVAL)?
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| {
                GwasError::configuration(format!(
                    "{} does not record its maximum p-value",
                    path.display()
                ))
            })?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            maximum_pval,
        })
    }

    /// Path of the backing database
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Least stringent p-value the index can answer
    pub fn coverage(&self) -> f64 {
        self.maximum_pval
    }

    /// Whether a query at `pval` is within coverage
    pub fn covers(&self, pval: f64) -> bool {
        pval <= self.maximum_pval
    }

    /// Number of indexed loci
    pub fn len(&self) -> Result<usize, GwasError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pval_to_coord", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Whether the index holds no entries
    pub fn is_empty(&self) -> Result<bool, GwasError> {
        Ok(self.len()? == 0)
    }

    /// Loci with p <= `pval`
    pub fn lookup(&self, pval: f64) -> Result<Vec<(String, u64)>, GwasError> {
        validate_pval(pval)?;
        if !self.covers(pval) {
            return Err(GwasError::ThresholdExceeded {
                requested: pval,
                coverage: self.maximum_pval,
            });
        }

        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT chrom, coord FROM pval_to_coord WHERE pval >= ?1")?;
        let rows = stmt.query_map([lp_threshold(pval)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut loci = Vec::new();
        for row in rows {
            let (chrom, coord) = row?;
            loci.push((chrom, coord as u64));
        }

        debug!("Threshold index: p <= {} -> {} loci", pval, loci.len());
        Ok(loci)
    }

    /// Fetch full records with p <= `pval` from `source`.
    ///
    /// Other studies or alleles sharing a significant locus are filtered
    /// out again, so the result equals a full scan at the same threshold.
    pub fn query(&self, source: &VariantSet, pval: f64) -> Result<VariantSet, GwasError> {
        let loci = self.lookup(pval)?;
        let at_loci = source.filter_loci(&loci)?;
        Ok(at_loci.retain(|r| r.passes_pval(pval)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn records() -> Vec<VariantRecord> {
        vec![
            VariantRecord::new("1", 100, Some("rs1"), "A", "G").with_stats(0.1, 0.01, 9.0),
            VariantRecord::new("1", 200, Some("rs2"), "C", "T").with_stats(0.1, 0.05, 1.5),
            VariantRecord::new("1", 200, Some("rs3"), "C", "G").with_stats(0.1, 0.2, 0.1),
            VariantRecord::new("1", 300, Some("rs4"), "G", "A").with_stats(0.0, 0.2, 0.5),
            VariantRecord::new("1", 400, Some("rs5"), "T", "C"),
        ]
    }

    fn ids(set: &VariantSet) -> Vec<String> {
        set.records().iter().map(|r| r.display_id()).collect()
    }

    #[test]
    fn test_build_and_query_within_coverage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.pvalidx");
        let recs = records();
        let index = ThresholdIndex::build(&recs, 0.05, &path).unwrap();
        assert_eq!(index.len().unwrap(), 2);
        assert_eq!(index.coverage(), 0.05);

        let set = VariantSet::new(recs);
        let hits = index.query(&set, 0.05).unwrap();
        // rs3 shares the locus of rs2 but is not significant
        assert_eq!(ids(&hits), vec!["rs1", "rs2"]);

        let strict = index.query(&set, 1e-8).unwrap();
        assert_eq!(ids(&strict), vec!["rs1"]);
    }

    #[test]
    fn test_query_beyond_coverage_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.pvalidx");
        let recs = records();
        let index = ThresholdIndex::build(&recs, 0.05, &path).unwrap();
        let err = index.lookup(0.1).unwrap_err();
        assert_eq!(
            err,
            GwasError::ThresholdExceeded {
                requested: 0.1,
                coverage: 0.05
            }
        );
    }

    #[test]
    fn test_build_with_no_qualifying_records_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("none.pvalidx");
        let recs = records();
        let err = ThresholdIndex::build(&recs, 1e-20, &path).unwrap_err();
        assert!(matches!(err, GwasError::Build { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_pval_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.pvalidx");
        let recs = records();
        assert!(matches!(
            ThresholdIndex::build(&recs, 0.0, &path).unwrap_err(),
            GwasError::InvalidArgument { .. }
        ));
        assert!(validate_pval(1.5).is_err());
        assert!(validate_pval(f64::NAN).is_err());
        assert!(validate_pval(1.0).is_ok());
    }

    #[test]
    fn test_reopen_keeps_coverage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.pvalidx");
        let recs = records();
        ThresholdIndex::build(&recs, 0.05, &path).unwrap();

        let index = ThresholdIndex::open(&path).unwrap();
        assert_eq!(index.coverage(), 0.05);
        assert!(index.covers(0.01));
        assert!(!index.covers(0.5));
    }

    #[test]
    fn test_open_index_without_meta_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.pvalidx");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE pval_to_coord (pval REAL, chrom TEXT, coord INTEGER);
                 CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
            )
            .unwrap();
        }
        let err = ThresholdIndex::open(&path).unwrap_err();
        assert!(matches!(err, GwasError::Configuration { .. }));
    }
}
