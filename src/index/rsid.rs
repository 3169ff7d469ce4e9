//! Identifier side-index.
//!
//! Persisted as `rsid_to_coord(rsid INTEGER, chrom TEXT, coord INTEGER)`
//! with an index on `rsid`. Only identifiers with a numeric key (see
//! [`crate::rsid::rsid_key`]) are stored.
//!
//! # Example
//!
//! ```no_run
//! use ferro_gwas::index::IdentifierIndex;
//! use ferro_gwas::query::GwasSource;
//!
//! let source = GwasSource::open("data.vcf.gz").unwrap();
//! let index = IdentifierIndex::build(source.variants().records(), "data.vcf.gz.rsidx").unwrap();
//! let hits = index.query(source.variants(), &["rs4970383".to_string()]).unwrap();
//! println!("{} records", hits.len());
//! ```

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use tracing::{debug, info};

use crate::error::GwasError;
use crate::rsid::rsid_key;
use crate::variants::VariantSet;
use crate::vcf::VariantRecord;

use super::{create_meta_table, read_meta, remove_existing, LOOKUP_BATCH_SIZE};

/// Read-only identifier -> locus index
pub struct IdentifierIndex {
    conn: Connection,
    path: PathBuf,
}

impl std::fmt::Debug for IdentifierIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierIndex")
            .field("path", &self.path)
            .finish()
    }
}

/// Numeric key for SQLite's signed INTEGER column
fn sql_key(id: &str) -> Option<i64> {
    rsid_key(id).and_then(|k| i64::try_from(k).ok())
}

impl IdentifierIndex {
    /// Build an index over `records`, replacing any file at `path`.
    ///
    /// Fails with [`GwasError::Build`] when no record has a conforming
    /// identifier; no file is written in that case.
    pub fn build<'a, I, P>(records: I, path: P) -> Result<Self, GwasError>
    where
        I: IntoIterator<Item = &'a VariantRecord>,
        P: AsRef<Path>,
    {
        let path = path.as_ref();

        let mut entries: BTreeSet<(i64, String, u64)> = BTreeSet::new();
        let mut skipped = 0usize;
        for record in records {
            match record.id.as_deref().and_then(sql_key) {
                Some(key) => {
                    entries.insert((key, record.chrom.clone(), record.pos));
                }
                None => skipped += 1,
            }
        }

        if entries.is_empty() {
            return Err(GwasError::build(
                "no records with an rs identifier; identifier index would be empty",
            ));
        }

        remove_existing(path)?;
        let mut conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE rsid_to_coord (rsid INTEGER NOT NULL, chrom TEXT NOT NULL, coord INTEGER NOT NULL);",
        )?;
        create_meta_table(&conn)?;

        let tx = conn.transaction()?;
        {
            let mut insert =
                tx.prepare("INSERT INTO rsid_to_coord (rsid, chrom, coord) VALUES (?1, ?2, ?3)")?;
            for (key, chrom, pos) in &entries {
                insert.execute(params![key, chrom, *pos as i64])?;
            }
            let mut meta = tx.prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")?;
            meta.execute(params!["kind", "rsid"])?;
            meta.execute(params!["entries", entries.len().to_string()])?;
        }
        tx.commit()?;
        conn.execute_batch("CREATE INDEX idx_rsid ON rsid_to_coord (rsid);")?;

        info!(
            "Built identifier index {} ({} entries, {} records without rs identifiers)",
            path.display(),
            entries.len(),
            skipped
        );

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing index read-only
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GwasError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GwasError::configuration(format!(
                "identifier index not found: {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        match read_meta(&conn, "kind")?.as_deref() {
            Some("rsid") => {}
            other => {
                return Err(GwasError::configuration(format!(
                    "{} is not an identifier index (kind: {})",
                    path.display(),
                    other.unwrap_or("unknown")
                )))
            }
        }
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Path of the backing database
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored (key, locus) entries
    pub fn len(&self) -> Result<usize, GwasError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM rsid_to_coord", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Whether the index holds no entries
    pub fn is_empty(&self) -> Result<bool, GwasError> {
        Ok(self.len()? == 0)
    }

    /// Look up loci for identifiers.
    ///
    /// Identifiers that are absent or non-conforming are simply missing
    /// from the output. When none of them is indexed the result is
    /// [`GwasError::NotFound`].
    pub fn lookup(&self, ids: &[String]) -> Result<Vec<(String, u64)>, GwasError> {
        let keys: Vec<i64> = ids
            .iter()
            .filter_map(|id| sql_key(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut loci = Vec::new();
        for batch in keys.chunks(LOOKUP_BATCH_SIZE) {
            let placeholders: Vec<_> = (1..=batch.len()).map(|i| format!("?{}", i)).collect();
            let query = format!(
                "SELECT DISTINCT chrom, coord FROM rsid_to_coord WHERE rsid IN ({})",
                placeholders.join(", ")
            );
            let mut stmt = self.conn.prepare(&query)?;
            let rows = stmt.query_map(params_from_iter(batch.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (chrom, coord) = row?;
                loci.push((chrom, coord as u64));
            }
        }

        debug!("Identifier index: {} keys -> {} loci", keys.len(), loci.len());
        if loci.is_empty() {
            return Err(GwasError::NotFound { id: ids.join(",") });
        }
        Ok(loci)
    }

    /// Fetch full records for identifiers from `source`.
    ///
    /// Identifiers missing from the index give an empty set.
    pub fn query(&self, source: &VariantSet, ids: &[String]) -> Result<VariantSet, GwasError> {
        let loci = match self.lookup(ids) {
            Ok(loci) => loci,
            Err(e) if e.is_not_found() => return Ok(VariantSet::default()),
            Err(e) => return Err(e),
        };
        let wanted: HashSet<u64> = ids.iter().filter_map(|id| rsid_key(id)).collect();
        let at_loci = source.filter_loci(&loci)?;
        Ok(at_loci.retain(|r| {
            r.id
                .as_deref()
                .and_then(rsid_key)
                .is_some_and(|k| wanted.contains(&k))
        }))
    }
}
