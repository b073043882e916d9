//! Zip extraction into the data directory.

use crate::error::EtlError;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What an extraction wrote.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Every CSV file from the archive, now present in the destination. Sorted.
    pub csv_files: Vec<PathBuf>,
    pub written: usize,
    /// Entries already present with the same size.
    pub skipped: usize,
}

pub fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Extract every file entry of `archive_path` into `dest_dir`.
///
/// Entries whose names would land outside `dest_dir` are rejected.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<ExtractReport, EtlError> {
    let file = File::open(archive_path).map_err(|e| {
        EtlError::extraction(format!("cannot open {}: {}", archive_path.display(), e))
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| {
        EtlError::extraction(format!("{} is not a valid zip archive: {}", archive_path.display(), e))
    })?;

    let mut report = ExtractReport::default();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| EtlError::extraction(format!("entry {}: {}", i, e)))?;

        let relative = entry.enclosed_name().ok_or_else(|| {
            EtlError::extraction(format!("unsafe entry path '{}'", entry.name()))
        })?;
        let target = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| write_failure(&target, e))?;
            continue;
        }

        let already_there = fs::metadata(&target)
            .map(|m| m.is_file() && m.len() == entry.size())
            .unwrap_or(false);

        if already_there {
            debug!("Skipping {}, already extracted", target.display());
            report.skipped += 1;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| write_failure(parent, e))?;
            }
            let mut out = File::create(&target).map_err(|e| write_failure(&target, e))?;
            io::copy(&mut entry, &mut out).map_err(|e| {
                EtlError::extraction(format!("failed to extract '{}': {}", entry.name(), e))
            })?;
            report.written += 1;
        }

        if is_csv(&target) {
            report.csv_files.push(target);
        }
    }

    report.csv_files.sort();
    info!(
        "Extracted {} into {} ({} written, {} already present)",
        archive_path.display(),
        dest_dir.display(),
        report.written,
        report.skipped
    );
    Ok(report)
}

fn write_failure(path: &Path, err: io::Error) -> EtlError {
    EtlError::extraction(format!("cannot write {}: {}", path.display(), err))
}
