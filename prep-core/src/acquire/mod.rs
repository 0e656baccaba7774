//! Dataset acquisition: fetch a remote zip once and unpack it in place.
//!
//! The run is a straight line of guarded steps
//! (`Init → WorkspaceReady → {AlreadyDone | Downloading} → Downloaded →
//! Extracting → {Extracted | Failed} → Cleaned`). Extraction goes to a hidden
//! staging sibling of the destination. Only once every entry was written are
//! the top-level entries renamed into the destination, the one holding the
//! marker last, so the idempotency check never sees a partial dataset.
//! Destination entries the archive does not contain are left alone.

pub mod fetcher;

use std::fmt;
use std::path::{Path, PathBuf};

use prep_aio::extract::{extract_zip, ExtractReport};
use prep_aio::fs as pfs;
use prep_common::error::{PrepError, Result};
use prep_common::model::{AcquisitionTarget, CleanupWarning};
use tracing::{debug, info, warn};

pub use fetcher::DriveFetcher;

/// Retrieves the archive of an [`AcquisitionTarget`].
pub trait Fetcher {
    /// Downloads the target's archive to `dest`.
    ///
    /// `Ok(false)` means the remote side resolved to nothing.
    fn fetch(&self, target: &AcquisitionTarget, dest: &Path) -> Result<bool>;
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn fetch(&self, target: &AcquisitionTarget, dest: &Path) -> Result<bool> {
        (**self).fetch(target, dest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireState {
    Init,
    WorkspaceReady,
    AlreadyDone,
    Downloading,
    Downloaded,
    Extracting,
    Extracted,
    Failed,
    Cleaned,
}

impl fmt::Display for AcquireState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AcquireState::Init => "init",
            AcquireState::WorkspaceReady => "workspace-ready",
            AcquireState::AlreadyDone => "already-done",
            AcquireState::Downloading => "downloading",
            AcquireState::Downloaded => "downloaded",
            AcquireState::Extracting => "extracting",
            AcquireState::Extracted => "extracted",
            AcquireState::Failed => "failed",
            AcquireState::Cleaned => "cleaned",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireSummary {
    pub archive_path: PathBuf,
    pub archive_entries: usize,
    /// Direct children of the destination after promotion.
    pub contents: Vec<String>,
    /// Files and directories below the destination, recursively.
    pub dataset_entries: usize,
    pub skipped_entries: Vec<String>,
    pub warnings: Vec<CleanupWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    AlreadyPresent,
    Acquired(AcquireSummary),
}

pub struct Acquirer<F> {
    target: AcquisitionTarget,
    fetcher: F,
    states: Vec<AcquireState>,
}

impl<F: Fetcher> Acquirer<F> {
    pub fn new(target: AcquisitionTarget, fetcher: F) -> Self {
        Self {
            target,
            fetcher,
            states: Vec::new(),
        }
    }

    /// States visited by the most recent [`Acquirer::run`].
    pub fn states(&self) -> &[AcquireState] {
        &self.states
    }

    fn enter(&mut self, state: AcquireState) {
        debug!("Acquisition state -> {}", state);
        self.states.push(state);
    }

    /// Creates the destination and scratch directories if they are missing.
    /// Problems are only logged; they surface in later steps.
    pub fn ensure_workspace(&self) {
        for dir in [&self.target.destination, &self.target.scratch_dir] {
            if let Err(e) = pfs::create_dir_all(dir) {
                warn!("Could not create {}: {}", dir.display(), e);
            }
        }
        debug!(
            "Workspace ready: {}, {}",
            self.target.destination.display(),
            self.target.scratch_dir.display()
        );
    }

    /// Destination exists, holds the marker path and is not empty.
    pub fn already_acquired(&self) -> bool {
        let dest = &self.target.destination;
        if !dest.is_dir() {
            return false;
        }
        if !self.target.marker.exists() {
            debug!("Marker {} not present", self.target.marker.display());
            return false;
        }
        pfs::is_non_empty_dir(dest)
    }

    /// Fetches the archive into the scratch directory. Single attempt.
    pub fn download(&self) -> Result<PathBuf> {
        let dest = self.target.archive_path();
        info!("Downloading dataset {}", self.target.archive_name);
        let failure = |reason: String| {
            PrepError::Download(
                self.target.archive_name.clone(),
                self.target.remote_id.clone(),
                reason,
            )
        };

        match self.fetcher.fetch(&self.target, &dest) {
            Ok(true) if dest.is_file() => {
                debug!("Dataset downloaded to {}", dest.display());
                Ok(dest)
            }
            Ok(true) => Err(failure(format!(
                "download finished but {} does not exist",
                dest.display()
            ))),
            Ok(false) => Err(failure(
                "remote resolution returned no result (check the dataset id)".to_string(),
            )),
            Err(e @ PrepError::Download(..)) => Err(e),
            Err(e) => Err(failure(e.to_string())),
        }
    }

    /// Extracts `archive` into a staging directory and promotes its entries
    /// into the destination. A corrupt archive leaves the destination
    /// untouched.
    pub fn extract(&self, archive: &Path) -> Result<(ExtractReport, Vec<CleanupWarning>)> {
        let dest = &self.target.destination;
        info!("Extracting dataset to {}", dest.display());

        let staging = pfs::staging_dir_for(dest)
            .map_err(|e| PrepError::Extraction(format!("Could not create staging dir: {e}")))?;
        let report = extract_zip(archive, staging.path())?;
        info!("Found {} files in the archive", report.entry_count());
        for name in &report.entries {
            debug!("  {}", name);
        }

        let marker_entry = self
            .target
            .marker
            .strip_prefix(dest)
            .ok()
            .and_then(|rel| rel.components().next())
            .map(|c| c.as_os_str());
        // Whatever was not promoted is removed when `staging` drops.
        let leftovers = pfs::promote_entries(staging.path(), dest, marker_entry).map_err(|e| {
            PrepError::Extraction(format!(
                "Could not move extracted files into {}: {e}",
                dest.display()
            ))
        })?;

        if !self.target.marker.exists() {
            warn!(
                "Archive did not produce {}; the next run will download again",
                self.target.marker.display()
            );
        }

        let warnings = leftovers
            .into_iter()
            .map(|path| CleanupWarning {
                message: "replaced dataset entry could not be removed".to_string(),
                path,
            })
            .collect();
        Ok((report, warnings))
    }

    /// Best-effort removal of the scratch directory.
    pub fn cleanup_workspace(&self) -> Option<CleanupWarning> {
        let scratch = &self.target.scratch_dir;
        if !scratch.exists() {
            return None;
        }
        match pfs::remove_directory_recursive(scratch) {
            Ok(()) => {
                info!("Cleaned up temporary files: {}", scratch.display());
                None
            }
            Err(e) => {
                warn!("Could not clean up temp folder {}: {}", scratch.display(), e);
                Some(CleanupWarning {
                    path: scratch.clone(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Runs the whole sequence. Download and extraction failures leave the
    /// scratch directory in place for inspection.
    pub fn run(&mut self) -> Result<AcquireOutcome> {
        self.states.clear();
        self.enter(AcquireState::Init);

        self.ensure_workspace();
        self.enter(AcquireState::WorkspaceReady);

        if self.already_acquired() {
            info!(
                "Dataset already exists in {}, skipping download",
                self.target.destination.display()
            );
            self.enter(AcquireState::AlreadyDone);
            return Ok(AcquireOutcome::AlreadyPresent);
        }

        self.enter(AcquireState::Downloading);
        let archive = match self.download() {
            Ok(path) => path,
            Err(e) => {
                self.enter(AcquireState::Failed);
                return Err(e);
            }
        };
        self.enter(AcquireState::Downloaded);

        self.enter(AcquireState::Extracting);
        let (report, mut warnings) = match self.extract(&archive) {
            Ok(done) => done,
            Err(e) => {
                self.enter(AcquireState::Failed);
                return Err(e);
            }
        };
        self.enter(AcquireState::Extracted);

        warnings.extend(self.cleanup_workspace());
        self.enter(AcquireState::Cleaned);

        let contents = pfs::list_entry_names(&self.target.destination).unwrap_or_default();
        let dataset_entries = pfs::count_entries(&self.target.destination);
        info!(
            "Dataset ready in {} ({} entries)",
            self.target.destination.display(),
            dataset_entries
        );
        Ok(AcquireOutcome::Acquired(AcquireSummary {
            archive_path: archive,
            archive_entries: report.entry_count(),
            contents,
            dataset_entries,
            skipped_entries: report.skipped,
            warnings,
        }))
    }
}
