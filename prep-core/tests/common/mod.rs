//! Shared helpers for prep-core integration tests

use std::cell::{Cell, RefCell};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use prep_common::config::Config;
use prep_common::error::{PrepError, Result};
use prep_common::model::AcquisitionTarget;
use prep_core::Fetcher;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// A throwaway project root.
#[allow(dead_code)]
pub struct TestWorkspace {
    #[allow(dead_code)]
    pub temp: TempDir,
    pub path: PathBuf,
}

#[allow(dead_code)]
impl TestWorkspace {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = temp.path().to_path_buf();
        Self { temp, path }
    }

    pub fn config(&self) -> Config {
        Config::with_root(&self.path)
    }

    /// Default dataset layout rooted in this workspace.
    pub fn target(&self) -> AcquisitionTarget {
        AcquisitionTarget::from_config(&self.config())
    }

    pub fn write_file(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.path.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    pub fn exists(&self, path: &str) -> bool {
        self.path.join(path).exists()
    }
}

/// Writes a zip at `path`. Names ending in `/` become directory entries.
#[allow(dead_code)]
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    let mut zip = ZipWriter::new(File::create(path).expect("Failed to create zip"));
    for (name, body) in entries {
        if name.ends_with('/') {
            zip.add_directory(name.trim_end_matches('/'), SimpleFileOptions::default())
                .expect("Failed to add directory");
        } else {
            zip.start_file(*name, SimpleFileOptions::default())
                .expect("Failed to start file");
            zip.write_all(body).expect("Failed to write entry");
        }
    }
    zip.finish().expect("Failed to finish zip");
}

/// What a [`FakeFetcher`] does when asked for the archive.
#[allow(dead_code)]
pub enum FetchBehavior {
    /// Copy these bytes to the requested destination.
    Bytes(Vec<u8>),
    /// Report success without writing anything.
    Claim,
    /// Resolve to nothing.
    NoResult,
    Fail(String),
}

#[allow(dead_code)]
pub struct FakeFetcher {
    pub behavior: FetchBehavior,
    pub calls: Cell<usize>,
    pub requested: RefCell<Vec<PathBuf>>,
}

#[allow(dead_code)]
impl FakeFetcher {
    pub fn new(behavior: FetchBehavior) -> Self {
        Self {
            behavior,
            calls: Cell::new(0),
            requested: RefCell::new(Vec::new()),
        }
    }

    /// Serves a freshly built zip with the given entries.
    pub fn serving_zip(scratch: &Path, entries: &[(&str, &[u8])]) -> Self {
        let source = scratch.join("served.zip");
        write_zip(&source, entries);
        let bytes = fs::read(&source).expect("Failed to read served zip");
        fs::remove_file(&source).expect("Failed to remove served zip");
        Self::new(FetchBehavior::Bytes(bytes))
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, _target: &AcquisitionTarget, dest: &Path) -> Result<bool> {
        self.calls.set(self.calls.get() + 1);
        self.requested.borrow_mut().push(dest.to_path_buf());
        match &self.behavior {
            FetchBehavior::Bytes(bytes) => {
                fs::write(dest, bytes)?;
                Ok(true)
            }
            FetchBehavior::Claim => Ok(true),
            FetchBehavior::NoResult => Ok(false),
            FetchBehavior::Fail(msg) => Err(PrepError::Validation(msg.clone())),
        }
    }
}
