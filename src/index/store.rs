//! Index sidecar builder
//!
//! Builds the `.bgi` SQLite sidecar under a temporary name and renames
//! it into place on success, so concurrent readers see either the old
//! index or the new one, never a partial file. Durability pragmas are
//! relaxed for the build connection: the recovery strategy for a crash
//! is to delete the temp file and rebuild.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use crate::error::{IndexError, Result};
use crate::view::View;

/// Variants inserted per transaction during a build
pub const CHUNK_SIZE: u64 = 10;

/// Default sidecar name for a data file
#[must_use]
pub fn default_index_path(bgen_path: &Path) -> PathBuf {
    let mut name = bgen_path.as_os_str().to_owned();
    name.push(".bgi");
    PathBuf::from(name)
}

fn temp_path(index_path: &Path) -> PathBuf {
    let mut name = index_path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Builds the index sidecar for `bgen_path` at `index_path`.
///
/// The `progress` callback receives `(variants_done, variants_expected)`
/// after each variant. Returns the number of variants indexed.
pub fn create_index<F>(
    bgen_path: &Path,
    index_path: &Path,
    clobber: bool,
    with_rowid: bool,
    progress: F,
) -> Result<u64>
where
    F: FnMut(u64, u64),
{
    let tmp = temp_path(index_path);
    if tmp.exists() {
        if !clobber {
            return Err(IndexError::Exists(tmp.display().to_string()).into());
        }
        fs::remove_file(&tmp)?;
    }

    match build_at(bgen_path, &tmp, with_rowid, progress) {
        Ok(count) => {
            fs::rename(&tmp, index_path)?;
            Ok(count)
        }
        Err(e) => {
            // never leave a partial index behind
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

fn build_at<F>(bgen_path: &Path, tmp: &Path, with_rowid: bool, mut progress: F) -> Result<u64>
where
    F: FnMut(u64, u64),
{
    let mut connection = Connection::open(tmp)?;
    connection.pragma_update(None, "locking_mode", "EXCLUSIVE")?;
    connection.pragma_update(None, "journal_mode", "MEMORY")?;
    connection.pragma_update(None, "synchronous", "OFF")?;

    create_tables(&connection, with_rowid)?;

    let mut view = View::open(bgen_path)?;
    let metadata = view.file_metadata().clone();
    connection.execute(
        "INSERT INTO Metadata( filename, file_size, last_write_time, first_1000_bytes, index_creation_time ) \
         VALUES( ?1, ?2, ?3, ?4, ?5 )",
        params![
            metadata.filename,
            metadata.size as i64,
            metadata.last_write_time,
            metadata.first_bytes,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;

    log::debug!(
        "indexing \"{}\" ({} variants expected)",
        metadata.filename,
        view.number_of_variants()
    );

    let expected = u64::from(view.number_of_variants());
    let mut count: u64 = 0;
    let mut file_pos = view.current_file_position()?;
    let mut last_seen: Option<crate::variant::Variant> = None;

    let result: Result<()> = (|| {
        let mut tx = connection.transaction()?;
        loop {
            let Some(variant) = view.read_variant()? else {
                break;
            };
            view.ignore_genotype_data_block()?;
            let file_end_pos = view.current_file_position()?;

            tx.execute(
                "INSERT INTO Variant( chromosome, position, rsid, number_of_alleles, allele1, allele2, file_start_position, size_in_bytes ) \
                 VALUES( ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8 )",
                params![
                    variant.chromosome,
                    i64::from(variant.position),
                    variant.rsid,
                    variant.alleles.len() as i64,
                    variant.alleles[0],
                    variant.alleles[1],
                    file_pos as i64,
                    (file_end_pos - file_pos) as i64,
                ],
            )?;
            last_seen = Some(variant);

            count += 1;
            progress(count, expected);
            if count % CHUNK_SIZE == 0 {
                tx.commit()?;
                tx = connection.transaction()?;
            }
            file_pos = file_end_pos;
        }
        tx.commit()?;
        Ok(())
    })();

    if let Err(e) = result {
        let identity = last_seen
            .map(|v| format!("\"{}\" \"{}\" {} {}", v.snp_id, v.rsid, v.chromosome, v.position))
            .unwrap_or_else(|| "(none)".into());
        return Err(IndexError::BuildFailed {
            message: e.to_string(),
            identity,
            position: file_pos,
            file_size: metadata.size,
        }
        .into());
    }

    Ok(count)
}

fn create_tables(connection: &Connection, with_rowid: bool) -> Result<()> {
    connection.execute(
        "CREATE TABLE Metadata (\
         filename TEXT NOT NULL,\
         file_size INT NOT NULL,\
         last_write_time INT NOT NULL,\
         first_1000_bytes BLOB NOT NULL,\
         index_creation_time TEXT NOT NULL\
         )",
        [],
    )?;

    let tag = if with_rowid { "" } else { " WITHOUT ROWID" };
    connection.execute(
        &format!(
            "CREATE TABLE Variant (\
             chromosome TEXT NOT NULL,\
             position INT NOT NULL,\
             rsid TEXT NOT NULL,\
             number_of_alleles INT NOT NULL,\
             allele1 TEXT NOT NULL,\
             allele2 TEXT NULL,\
             file_start_position INT NOT NULL,\
             size_in_bytes INT NOT NULL,\
             PRIMARY KEY (chromosome, position, rsid, allele1, allele2, file_start_position )\
             ){tag}"
        ),
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probability::SampleProbabilities;
    use crate::test_util::{self, SyntheticVariant};

    fn variants() -> Vec<SyntheticVariant> {
        vec![
            test_util::variant("SNP1", "rs1", "01", 100, &["A", "G"]).with_samples(vec![
                SampleProbabilities::diploid(vec![1.0, 0.0, 0.0]),
                SampleProbabilities::diploid(vec![0.0, 1.0, 0.0]),
                SampleProbabilities::diploid(vec![0.0, 0.0, 1.0]),
            ]),
            test_util::variant("SNP2", "rs2", "01", 200, &["C", "T"]).with_samples(vec![
                SampleProbabilities::diploid(vec![0.0, 1.0, 0.0]),
                SampleProbabilities::diploid(vec![0.0, 1.0, 0.0]),
                SampleProbabilities::diploid(vec![1.0, 0.0, 0.0]),
            ]),
        ]
    }

    #[test]
    fn test_create_index() {
        let dir = tempfile::tempdir().unwrap();
        let bgen = dir.path().join("f.bgen");
        test_util::write_layout2_file(&bgen, &["s1", "s2", "s3"], &variants());

        let bgi = default_index_path(&bgen);
        let count = create_index(&bgen, &bgi, false, false, |_, _| {}).unwrap();
        assert_eq!(count, 2);
        assert!(bgi.exists());

        let connection = Connection::open(&bgi).unwrap();
        let rows: i64 = connection
            .query_row("SELECT count(*) FROM Variant", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 2);

        let size: i64 = connection
            .query_row("SELECT file_size FROM Metadata", [], |row| row.get(0))
            .unwrap();
        assert_eq!(size as u64, std::fs::metadata(&bgen).unwrap().len());
    }

    #[test]
    fn test_index_rows_cover_whole_stream() {
        let dir = tempfile::tempdir().unwrap();
        let bgen = dir.path().join("f.bgen");
        test_util::write_layout2_file(&bgen, &["s1", "s2", "s3"], &variants());

        let bgi = default_index_path(&bgen);
        create_index(&bgen, &bgi, false, false, |_, _| {}).unwrap();

        let connection = Connection::open(&bgi).unwrap();
        let mut stmt = connection
            .prepare(
                "SELECT file_start_position, size_in_bytes FROM Variant \
                 ORDER BY file_start_position",
            )
            .unwrap();
        let spans: Vec<(i64, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();

        // contiguous coverage from the first variant to end of file
        let file_size = std::fs::metadata(&bgen).unwrap().len() as i64;
        assert_eq!(spans[0].0 + spans[0].1, spans[1].0);
        assert_eq!(spans[1].0 + spans[1].1, file_size);
    }

    #[test]
    fn test_leftover_temp_blocks_build() {
        let dir = tempfile::tempdir().unwrap();
        let bgen = dir.path().join("f.bgen");
        test_util::write_layout2_file(&bgen, &["s1", "s2", "s3"], &variants());

        let bgi = default_index_path(&bgen);
        let tmp = temp_path(&bgi);
        std::fs::write(&tmp, b"stale").unwrap();

        let err = create_index(&bgen, &bgi, false, false, |_, _| {}).unwrap_err();
        assert!(matches!(err, crate::Error::Index(IndexError::Exists(_))));

        // clobber discards the leftover and builds
        let count = create_index(&bgen, &bgi, true, false, |_, _| {}).unwrap();
        assert_eq!(count, 2);
        assert!(!tmp.exists());
    }

    #[test]
    fn test_failed_build_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let bgen = dir.path().join("f.bgen");
        // truncated mid-variant: valid header, then garbage tail
        let mut bytes = {
            let context = test_util::build_context(
                crate::context::Layout::V2,
                crate::context::Compression::Zlib,
                3,
                2,
                false,
                b"",
            );
            test_util::encode_file(&context, None, &variants())
        };
        bytes.truncate(bytes.len() - 7);
        std::fs::write(&bgen, bytes).unwrap();

        let bgi = default_index_path(&bgen);
        let result = create_index(&bgen, &bgi, false, false, |_, _| {});
        assert!(result.is_err());
        assert!(!temp_path(&bgi).exists());
        assert!(!bgi.exists());
    }

    #[test]
    fn test_progress_reports_every_variant() {
        let dir = tempfile::tempdir().unwrap();
        let bgen = dir.path().join("f.bgen");
        test_util::write_layout2_file(&bgen, &["s1", "s2", "s3"], &variants());

        let mut calls = Vec::new();
        let bgi = default_index_path(&bgen);
        create_index(&bgen, &bgi, false, false, |done, total| {
            calls.push((done, total));
        })
        .unwrap();
        assert_eq!(calls, vec![(1, 2), (2, 2)]);
    }
}
