//! Query planner over the index sidecar
//!
//! An [`IndexQuery`] accumulates inclusion and exclusion predicates
//! (position ranges and rsid sets), then `initialise` freezes them into
//! an immutable [`Plan`]: the byte ranges of every surviving variant,
//! sorted ascending by file position and deduplicated.

use std::path::Path;
use std::str::FromStr;

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};

use crate::error::{Error, IndexError, Result, VariantError};
use crate::view::FileMetadata;

/// Closed genomic interval `<chr>:<pos1>-<pos2>`
///
/// Either bound may be omitted in the text form; an omitted lower bound
/// is 0 and an omitted upper bound is `u32::MAX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomicRange {
    pub chromosome: String,
    pub start: u32,
    pub end: u32,
}

impl GenomicRange {
    pub fn new(chromosome: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            chromosome: chromosome.into(),
            start,
            end,
        }
    }
}

impl FromStr for GenomicRange {
    type Err = Error;

    fn from_str(spec: &str) -> Result<Self> {
        let bad = || VariantError::InvalidRecord(format!("range spec \"{spec}\"")).into();
        let (chromosome, positions) = spec.split_once(':').ok_or_else(bad)?;
        let (start, end) = positions.split_once('-').ok_or_else(bad)?;
        let start = if start.is_empty() {
            0
        } else {
            start.parse().map_err(|_| bad())?
        };
        let end = if end.is_empty() {
            u32::MAX
        } else {
            end.parse().map_err(|_| bad())?
        };
        if end < start {
            return Err(bad());
        }
        Ok(Self::new(chromosome, start, end))
    }
}

/// Materialized read plan: `(file_start, size_in_bytes)` per variant,
/// strictly ascending by file position with no duplicates.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    entries: Vec<(u64, u64)>,
}

impl Plan {
    #[must_use]
    pub fn from_entries(entries: Vec<(u64, u64)>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn number_of_variants(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn locate_variant(&self, i: usize) -> (u64, u64) {
        self.entries[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.entries.iter().copied()
    }
}

/// Predicate builder and plan holder over an open index sidecar
pub struct IndexQuery {
    connection: Connection,
    table: String,
    metadata: Option<FileMetadata>,
    include_ranges: Vec<GenomicRange>,
    exclude_ranges: Vec<GenomicRange>,
    include_rsids: Vec<String>,
    exclude_rsids: Vec<String>,
    plan: Plan,
}

impl IndexQuery {
    /// Opens the sidecar read-only and loads its stored file metadata.
    ///
    /// `table` names the table (or view) holding the variant rows; it
    /// must carry the schema written at index creation.
    pub fn open(index_path: &Path, table: &str) -> Result<Self> {
        let connection = Connection::open_with_flags(
            index_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| IndexError::Corrupt(format!("\"{}\": {e}", index_path.display())))?;

        let metadata = Self::load_metadata(&connection)?;
        Ok(Self {
            connection,
            table: table.to_string(),
            metadata,
            include_ranges: Vec::new(),
            exclude_ranges: Vec::new(),
            include_rsids: Vec::new(),
            exclude_rsids: Vec::new(),
            plan: Plan::default(),
        })
    }

    fn load_metadata(connection: &Connection) -> Result<Option<FileMetadata>> {
        let mut stmt = match connection.prepare(
            "SELECT filename, file_size, last_write_time, first_1000_bytes FROM Metadata",
        ) {
            Ok(stmt) => stmt,
            // a bare table written by another tool is still queryable
            Err(_) => return Ok(None),
        };
        let mut rows = stmt.query([])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        Ok(Some(FileMetadata {
            filename: row.get(0)?,
            size: row.get::<_, i64>(1)? as u64,
            last_write_time: row.get(2)?,
            first_bytes: row.get(3)?,
        }))
    }

    /// Stored fingerprint of the data file, if the sidecar carries one
    #[must_use]
    pub fn file_metadata(&self) -> Option<&FileMetadata> {
        self.metadata.as_ref()
    }

    /// Verifies the stored fingerprint against the data file's current
    /// identity. Size and leading bytes are authoritative; the write
    /// time is advisory only.
    pub fn verify_metadata(&self, file: &FileMetadata) -> Result<()> {
        let Some(index) = &self.metadata else {
            return Err(IndexError::MetadataMissing.into());
        };
        if file.size != index.size {
            return Err(IndexError::Stale(format!(
                "Size of file \"{}\" ({} bytes) differs from that recorded in the index file ({} bytes).",
                file.filename, file.size, index.size
            ))
            .into());
        }
        if file.first_bytes != index.first_bytes {
            return Err(IndexError::Stale(format!(
                "File \"{}\" has different initial bytes than recorded in the index file \"{}\" - that can't be right.",
                file.filename, index.filename
            ))
            .into());
        }
        if file.last_write_time != index.last_write_time {
            log::debug!(
                "file \"{}\" write time {} differs from indexed {}, continuing",
                file.filename,
                file.last_write_time,
                index.last_write_time
            );
        }
        Ok(())
    }

    /// Includes variants inside the closed interval (repeatable; union).
    pub fn include_range(&mut self, range: GenomicRange) {
        self.include_ranges.push(range);
    }

    /// Excludes variants inside the closed interval (repeatable; union).
    pub fn exclude_range(&mut self, range: GenomicRange) {
        self.exclude_ranges.push(range);
    }

    /// Includes variants whose rsid matches any of `ids`.
    pub fn include_rsids(&mut self, ids: &[String]) {
        self.include_rsids.extend_from_slice(ids);
    }

    /// Excludes variants whose rsid matches any of `ids`.
    pub fn exclude_rsids(&mut self, ids: &[String]) {
        self.exclude_rsids.extend_from_slice(ids);
    }

    /// Freezes the accumulated predicates into the plan.
    ///
    /// With no inclusion predicate the base set is every variant; any
    /// variant matching an exclusion predicate is subtracted. The plan
    /// is sorted ascending by file position and deduplicated (the
    /// primary key can yield duplicate byte ranges across alternative
    /// allele representations).
    pub fn initialise<F: FnMut(usize)>(&mut self, mut progress: F) -> Result<()> {
        let mut clauses: Vec<String> = Vec::new();
        let mut bindings: Vec<Value> = Vec::new();

        if !self.include_ranges.is_empty() || !self.include_rsids.is_empty() {
            let mut parts: Vec<String> = Vec::new();
            for range in &self.include_ranges {
                parts.push("( chromosome == ? AND position BETWEEN ? AND ? )".into());
                bindings.push(Value::Text(range.chromosome.clone()));
                bindings.push(Value::Integer(i64::from(range.start)));
                bindings.push(Value::Integer(i64::from(range.end)));
            }
            if !self.include_rsids.is_empty() {
                parts.push(format!(
                    "rsid IN ( {} )",
                    placeholders(self.include_rsids.len())
                ));
                bindings.extend(self.include_rsids.iter().cloned().map(Value::Text));
            }
            clauses.push(format!("( {} )", parts.join(" OR ")));
        }

        for range in &self.exclude_ranges {
            clauses.push("NOT ( chromosome == ? AND position BETWEEN ? AND ? )".into());
            bindings.push(Value::Text(range.chromosome.clone()));
            bindings.push(Value::Integer(i64::from(range.start)));
            bindings.push(Value::Integer(i64::from(range.end)));
        }
        if !self.exclude_rsids.is_empty() {
            clauses.push(format!(
                "rsid NOT IN ( {} )",
                placeholders(self.exclude_rsids.len())
            ));
            bindings.extend(self.exclude_rsids.iter().cloned().map(Value::Text));
        }

        let mut sql = format!(
            "SELECT file_start_position, size_in_bytes FROM \"{}\"",
            self.table.replace('"', "\"\"")
        );
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY file_start_position");

        let mut stmt = self
            .connection
            .prepare(&sql)
            .map_err(|e| IndexError::Corrupt(format!("query over \"{}\": {e}", self.table)))?;
        let mut rows = stmt.query(rusqlite::params_from_iter(bindings))?;

        let mut entries: Vec<(u64, u64)> = Vec::new();
        while let Some(row) = rows.next()? {
            let start = row.get::<_, i64>(0)? as u64;
            let size = row.get::<_, i64>(1)? as u64;
            if entries.last() != Some(&(start, size)) {
                entries.push((start, size));
            }
            progress(entries.len());
        }
        self.plan = Plan::from_entries(entries);
        Ok(())
    }

    /// Variants in the materialized plan
    #[must_use]
    pub fn number_of_variants(&self) -> usize {
        self.plan.number_of_variants()
    }

    /// Byte range of the i-th planned variant
    #[must_use]
    pub fn locate_variant(&self, i: usize) -> (u64, u64) {
        self.plan.locate_variant(i)
    }

    /// A copy of the materialized plan, for attachment to a `View`
    #[must_use]
    pub fn plan(&self) -> Plan {
        self.plan.clone()
    }
}

fn placeholders(count: usize) -> String {
    let mut out = String::from("?");
    for _ in 1..count {
        out.push_str(", ?");
    }
    out
}
