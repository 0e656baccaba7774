// prep-aio/src/extract.rs
// Zip extraction with a failure taxonomy that separates a broken container
// from ordinary I/O trouble.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

use prep_common::error::{PrepError, Result};
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

/// What an extraction produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Entry names as stored in the archive, in archive order.
    pub entries: Vec<String>,
    /// Entries skipped because their path would escape the target directory.
    pub skipped: Vec<String>,
}

impl ExtractReport {
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

fn classify(archive_path: &Path, err: ZipError) -> PrepError {
    let name = archive_path.display().to_string();
    match err {
        ZipError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            PrepError::CorruptArchive(name, format!("truncated archive: {e}"))
        }
        ZipError::Io(e) => PrepError::Extraction(format!("I/O error reading {name}: {e}")),
        other @ (ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_)) => {
            PrepError::CorruptArchive(name, other.to_string())
        }
        other => PrepError::Extraction(format!("Failed to read {name}: {other}")),
    }
}

/// Extracts every entry of the zip at `archive_path` below `target_dir`.
///
/// Fails with [`PrepError::CorruptArchive`] when the container is not a valid
/// zip and with [`PrepError::Extraction`] for any other I/O problem. Nothing
/// already written is rolled back.
pub fn extract_zip(archive_path: &Path, target_dir: &Path) -> Result<ExtractReport> {
    debug!(
        "Extracting ZIP '{}' to '{}'",
        archive_path.display(),
        target_dir.display()
    );
    fs::create_dir_all(target_dir).map_err(|e| {
        PrepError::Extraction(format!(
            "Failed to create target dir {}: {}",
            target_dir.display(),
            e
        ))
    })?;

    let file = File::open(archive_path).map_err(|e| {
        PrepError::Extraction(format!(
            "Failed to open archive {}: {}",
            archive_path.display(),
            e
        ))
    })?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| classify(archive_path, e))?;

    let mut report = ExtractReport {
        entries: archive.file_names().map(str::to_string).collect(),
        skipped: Vec::new(),
    };
    debug!(
        "Found {} entries in {}",
        report.entries.len(),
        archive_path.display()
    );

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| classify(archive_path, e))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe ZIP entry path: {}", entry.name());
            report.skipped.push(entry.name().to_string());
            continue;
        };
        let outpath = target_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| {
                PrepError::Extraction(format!(
                    "Failed to create {}: {}",
                    outpath.display(),
                    e
                ))
            })?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PrepError::Extraction(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let mut outfile = File::create(&outpath).map_err(|e| {
            PrepError::Extraction(format!("Failed to create {}: {}", outpath.display(), e))
        })?;
        io::copy(&mut entry, &mut outfile).map_err(|e| {
            if e.kind() == io::ErrorKind::InvalidData {
                // Bad compressed stream or CRC mismatch.
                PrepError::CorruptArchive(
                    archive_path.display().to_string(),
                    format!("entry {}: {e}", entry.name()),
                )
            } else {
                PrepError::Extraction(format!("Failed to write {}: {}", outpath.display(), e))
            }
        })?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&outpath, fs::Permissions::from_mode(mode)) {
                warn!("Failed set permissions on {}: {}", outpath.display(), e);
            }
        }
    }

    debug!("Finished ZIP extraction for {}", archive_path.display());
    Ok(report)
}
