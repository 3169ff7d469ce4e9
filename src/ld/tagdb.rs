//! Precomputed LD tag database.
//!
//! SQLite layout:
//! - `tags(SNP_A TEXT, SNP_B TEXT, R REAL, PHASE TEXT)` indexed on `SNP_A`,
//!   each pair stored in both directions with the phase mirrored
//! - `alleles(snp TEXT PRIMARY KEY, a1 TEXT, a2 TEXT)`
//! - `meta(key, value)` with the build `min_r2`
//!
//! # Example
//!
//! ```no_run
//! use ferro_gwas::external::{Capabilities, ToolPaths};
//! use ferro_gwas::ld::{LdReference, TagDatabase};
//!
//! let caps = Capabilities::detect(&ToolPaths::default());
//! let db = TagDatabase::build_with(&caps, "EUR", "EUR.ldtags.db", 0.2).unwrap();
//! let tags = db.tags(&["rs4442317".to_string()], 0.2).unwrap();
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::GwasError;
use crate::external::{read_bim, Capabilities, CorrelationRequest, CorrelationTool, LdWindow};
use crate::index::{create_meta_table, read_meta, remove_existing, LOOKUP_BATCH_SIZE};

use super::{validate_min_r2, AllelePhase, LdReference, LdTag, PanelAlleles};

const META_MIN_R2: &str = "min_r2";

/// Read-only precomputed tag lists
pub struct TagDatabase {
    conn: Connection,
    path: PathBuf,
    min_r2: f64,
}

impl std::fmt::Debug for TagDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagDatabase")
            .field("path", &self.path)
            .field("min_r2", &self.min_r2)
            .finish()
    }
}

impl TagDatabase {
    /// Build using the detected correlation tool.
    ///
    /// Without one the build is refused with a configuration error.
    pub fn build_with<B, P>(
        capabilities: &Capabilities,
        bfile: B,
        path: P,
        min_r2: f64,
    ) -> Result<Self, GwasError>
    where
        B: AsRef<Path>,
        P: AsRef<Path>,
    {
        let tool = capabilities.correlation_tool().ok_or_else(|| {
            GwasError::configuration(
                "plink is required to build an LD tag database but was not found",
            )
        })?;
        Self::build(&tool, bfile, path, min_r2)
    }

    /// Build a tag database from the fileset `bfile`.
    ///
    /// Indels and multi-base variants are excluded from tagging.
    pub fn build<T, B, P>(tool: &T, bfile: B, path: P, min_r2: f64) -> Result<Self, GwasError>
    where
        T: CorrelationTool + ?Sized,
        B: AsRef<Path>,
        P: AsRef<Path>,
    {
        validate_min_r2(min_r2)?;
        let bfile = bfile.as_ref();
        let path = path.as_ref();

        let panel = read_bim(bfile)?;
        let total = panel.len();
        let snvs: Vec<_> = panel.into_iter().filter(|r| r.is_snv()).collect();
        info!(
            "LD panel {}: {} variants, {} excluded as non-SNV",
            bfile.display(),
            total,
            total - snvs.len()
        );
        if snvs.is_empty() {
            return Err(GwasError::build(format!(
                "no SNVs in {}; nothing to tag",
                bfile.display()
            )));
        }

        let request = CorrelationRequest {
            bfile: bfile.to_path_buf(),
            targets: None,
            extract: Some(snvs.iter().map(|r| r.id.clone()).collect()),
            window: LdWindow::tag_build(min_r2),
        };
        let pairs: Vec<LdTag> = tool
            .correlations(&request)?
            .into_iter()
            .filter(|t| t.target != t.tag && t.r2() >= min_r2)
            .collect();
        if pairs.is_empty() {
            return Err(GwasError::build(format!(
                "{} reported no pairs with r² >= {}",
                tool.name(),
                min_r2
            )));
        }

        remove_existing(path)?;
        let mut conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE tags (SNP_A TEXT NOT NULL, SNP_B TEXT NOT NULL, R REAL NOT NULL, PHASE TEXT);
             CREATE TABLE alleles (snp TEXT PRIMARY KEY, a1 TEXT NOT NULL, a2 TEXT NOT NULL);",
        )?;
        create_meta_table(&conn)?;

        let tx = conn.transaction()?;
        {
            let mut insert =
                tx.prepare("INSERT INTO tags (SNP_A, SNP_B, R, PHASE) VALUES (?1, ?2, ?3, ?4)")?;
            for pair in &pairs {
                for tag in [pair.clone(), pair.mirrored()] {
                    let phase = tag.phase.as_ref().map(|p| p.to_string());
                    insert.execute(params![tag.target, tag.tag, tag.r, phase])?;
                }
            }
            let mut alleles =
                tx.prepare("INSERT OR REPLACE INTO alleles (snp, a1, a2) VALUES (?1, ?2, ?3)")?;
            for snv in &snvs {
                alleles.execute(params![snv.id, snv.a1, snv.a2])?;
            }
            let mut meta = tx.prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")?;
            meta.execute(params!["kind", "ldtags"])?;
            meta.execute(params![META_MIN_R2, min_r2.to_string()])?;
            meta.execute(params!["pairs", pairs.len().to_string()])?;
        }
        tx.commit()?;
        conn.execute_batch("CREATE INDEX idx_snp_a ON tags (SNP_A);")?;

        info!(
            "Built LD tag database {} ({} pairs, r² >= {})",
            path.display(),
            pairs.len(),
            min_r2
        );
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            min_r2,
        })
    }

    /// Open an existing database read-only
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GwasError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GwasError::configuration(format!(
                "LD tag database not found: {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        if read_meta(&conn, "kind")?.as_deref() != Some("ldtags") {
            return Err(GwasError::configuration(format!(
                "{} is not an LD tag database",
                path.display()
            )));
        }
        let min_r2 = read_meta(&conn, META_MIN_R2)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0);
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            min_r2,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// r² cutoff the database was built with
    pub fn min_r2(&self) -> f64 {
        self.min_r2
    }

    /// Number of stored directed pairs
    pub fn len(&self) -> Result<usize, GwasError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn is_empty(&self) -> Result<bool, GwasError> {
        Ok(self.len()? == 0)
    }
}

impl LdReference for TagDatabase {
    fn name(&self) -> &str {
        "tag-database"
    }

    fn tags(&self, targets: &[String], min_r2: f64) -> Result<Vec<LdTag>, GwasError> {
        validate_min_r2(min_r2)?;
        if min_r2 < self.min_r2 {
            warn!(
                "Requested r² {} is below the tag database cutoff {}; weaker pairs are not stored",
                min_r2, self.min_r2
            );
        }

        let mut by_target: HashMap<String, Vec<LdTag>> = HashMap::new();
        for batch in targets.chunks(LOOKUP_BATCH_SIZE) {
            let placeholders: Vec<_> = (2..=batch.len() + 1).map(|i| format!("?{}", i)).collect();
            let query = format!(
                "SELECT SNP_A, SNP_B, R, PHASE FROM tags WHERE R * R >= ?1 AND SNP_A IN ({}) ORDER BY ABS(R) DESC, rowid",
                placeholders.join(", ")
            );
            let mut stmt = self.conn.prepare(&query)?;
            let mut params: Vec<&dyn rusqlite::ToSql> = vec![&min_r2];
            params.extend(batch.iter().map(|s| s as &dyn rusqlite::ToSql));
            let rows = stmt.query_map(params.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?;
            for row in rows {
                let (target, tag, r, phase) = row?;
                let mut ld = LdTag::new(target.clone(), tag, r);
                ld.phase = phase.as_deref().and_then(AllelePhase::parse);
                by_target.entry(target).or_default().push(ld);
            }
        }

        let mut out = Vec::new();
        for target in targets {
            if let Some(tags) = by_target.remove(target) {
                out.extend(tags);
            }
        }
        debug!("Tag database: {} targets -> {} tags", targets.len(), out.len());
        Ok(out)
    }

    fn alleles(&self, id: &str) -> Result<Option<PanelAlleles>, GwasError> {
        let alleles = self
            .conn
            .query_row(
                "SELECT a1, a2 FROM alleles WHERE snp = ?1",
                [id],
                |row| {
                    Ok(PanelAlleles {
                        a1: row.get(0)?,
                        a2: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(alleles)
    }
}
