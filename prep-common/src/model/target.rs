use std::fmt;
use std::path::PathBuf;

use crate::config::Config;

/// One dataset fetch: where the archive lives remotely and where it ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionTarget {
    /// Opaque handle of the hosted archive (a Drive file id).
    pub remote_id: String,
    pub archive_name: String,
    pub destination: PathBuf,
    pub marker: PathBuf,
    pub scratch_dir: PathBuf,
}

impl AcquisitionTarget {
    pub fn from_config(config: &Config) -> Self {
        Self {
            remote_id: config.dataset.remote_id.clone(),
            archive_name: config.dataset.archive_name.clone(),
            destination: config.dataset_dir(),
            marker: config.dataset_marker_path(),
            scratch_dir: config.scratch_dir(),
        }
    }

    /// Where the downloaded archive is expected inside the scratch dir.
    pub fn archive_path(&self) -> PathBuf {
        self.scratch_dir.join(&self.archive_name)
    }
}

/// A non-fatal problem removing transient files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Could not clean up {}: {}",
            self.path.display(),
            self.message
        )
    }
}
