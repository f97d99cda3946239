//! Discovery of the sequenced libraries of a run.
//!
//! A run lives in `<fastq_dir>/<run_id>/`, or zipped up in
//! `<fastq_dir>/<run_id>.zip` with the same folder inside the archive.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use walkdir::WalkDir;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no run folder or archive for {run_id} in {}", .fastq_dir.display())]
    NotFound { run_id: String, fastq_dir: PathBuf },

    #[error("cannot list {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("cannot open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read archive {}: {source}", .path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

type Result<T> = std::result::Result<T, RunError>;

/// Extracts the library id from a fastq file name.
///
/// Only read 1 files (`*_R1.fastq*`) count. Hidden files and files starting
/// with `unassigned_prefix` are skipped. The library id is everything up to
/// the first underscore.
fn library_id(file_name: &str, unassigned_prefix: &str) -> Option<String> {
    lazy_static! {
        static ref RE_READ1: Regex = Regex::new(r"^(?P<library>[^_]*)_(?:.*_)?R1\.fastq").unwrap();
    }
    if file_name.starts_with('.') || file_name.starts_with(unassigned_prefix) {
        return None;
    }
    RE_READ1
        .captures(file_name)
        .and_then(|c| c.name("library"))
        .map(|m| m.as_str().to_string())
}

fn from_dir(path: &Path, unassigned_prefix: &str) -> Result<BTreeSet<String>> {
    let mut ids = BTreeSet::new();
    for entry in WalkDir::new(path).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|source| RunError::Walk {
            path: path.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(id) = library_id(&entry.file_name().to_string_lossy(), unassigned_prefix) {
            ids.insert(id);
        }
    }
    Ok(ids)
}

fn from_zip(path: &Path, run_id: &str, unassigned_prefix: &str) -> Result<BTreeSet<String>> {
    let file = File::open(path).map_err(|source| RunError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let z = ZipArchive::new(file).map_err(|source| RunError::Zip {
        path: path.to_path_buf(),
        source,
    })?;

    // only files directly inside the run folder of the archive
    let folder = format!("{}/", run_id);
    let ids = z
        .file_names()
        .filter_map(|name| name.strip_prefix(&folder))
        .filter(|name| !name.is_empty() && !name.contains('/'))
        .filter_map(|name| library_id(name, unassigned_prefix))
        .collect();
    Ok(ids)
}

/// Returns the sorted, de-duplicated library ids of run `run_id` below `fastq_dir`.
///
/// The run folder is preferred over a zip archive of the same name.
pub fn library_ids(fastq_dir: &Path, run_id: &str, unassigned_prefix: &str) -> Result<Vec<String>> {
    let rundir = fastq_dir.join(run_id);
    let archive = fastq_dir.join(format!("{}.zip", run_id));

    let ids = if rundir.is_dir() {
        from_dir(&rundir, unassigned_prefix)?
    } else if archive.is_file() {
        debug!("{}: reading fastq names from {}", run_id, archive.display());
        from_zip(&archive, run_id, unassigned_prefix)?
    } else {
        return Err(RunError::NotFound {
            run_id: run_id.to_string(),
            fastq_dir: fastq_dir.to_path_buf(),
        });
    };

    if ids.is_empty() {
        warn!("{}: no read 1 fastq files found", run_id);
    }
    Ok(ids.into_iter().collect())
}
