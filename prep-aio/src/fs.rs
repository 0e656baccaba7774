/*
File: prep-aio/src/fs.rs
Purpose: Primitive synchronous filesystem operations.
*/
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use prep_common::error::{PrepError, Result};
use tempfile::TempDir;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Creates a directory and all its parent components if they are missing.
pub fn create_dir_all(path: &Path) -> Result<()> {
    debug!("Creating directory recursively: {}", path.display());
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        PrepError::from(e)
    })
}

/// Removes a directory and all its contents recursively.
pub fn remove_directory_recursive(path: &Path) -> Result<()> {
    debug!("Removing directory recursively: {}", path.display());
    fs::remove_dir_all(path).map_err(|e| {
        if e.kind() != io::ErrorKind::NotFound {
            error!("Failed remove dir_all {}: {}", path.display(), e);
        }
        PrepError::from(e)
    })
}

/// True when `path` is a directory with at least one entry. Unreadable or
/// missing directories count as empty.
pub fn is_non_empty_dir(path: &Path) -> bool {
    match fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_some(),
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Could not list {}: {}", path.display(), e);
            }
            false
        }
    }
}

/// Names of the direct children of `dir_path`, sorted.
/// Skips entries that cause errors during reading.
pub fn list_entry_names(dir_path: &Path) -> Result<Vec<String>> {
    debug!("Listing directory entries for: {}", dir_path.display());
    let read_dir = fs::read_dir(dir_path).map_err(|e| {
        error!("Failed to read directory {}: {}", dir_path.display(), e);
        PrepError::from(e)
    })?;
    let mut names = Vec::new();
    for entry_res in read_dir {
        match entry_res {
            Ok(entry) => names.push(entry.file_name().to_string_lossy().to_string()),
            Err(e) => warn!("Error reading entry in {}: {}", dir_path.display(), e),
        }
    }
    names.sort();
    Ok(names)
}

/// Counts every file and directory below `root` (not `root` itself).
pub fn count_entries(root: &Path) -> usize {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .count()
}

/// Creates a hidden scratch directory next to `dest`, on the same filesystem,
/// so its contents can later be renamed over `dest`. Deleted on drop.
pub fn staging_dir_for(dest: &Path) -> Result<TempDir> {
    let parent = dest.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "staging".to_string());
    create_dir_all(parent)?;
    tempfile::Builder::new()
        .prefix(&format!(".{name}.staging-"))
        .tempdir_in(parent)
        .map_err(|e| {
            error!("Failed to create staging dir next to {}: {}", dest.display(), e);
            PrepError::from(e)
        })
}

/// Moves the top-level entries of a fully populated `staged` directory into
/// `dest`, one rename per entry.
///
/// Entries of `dest` that the staged tree does not contain are left alone. A
/// same-named entry is moved aside, replaced and then deleted. `last` names
/// the entry promoted after all others. Returns the displaced entries that
/// could not be deleted.
pub fn promote_entries(staged: &Path, dest: &Path, last: Option<&OsStr>) -> Result<Vec<PathBuf>> {
    create_dir_all(dest)?;
    let mut names = fs::read_dir(staged)?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<io::Result<Vec<OsString>>>()?;
    names.sort();
    if let Some(pos) = last.and_then(|last| names.iter().position(|n| n.as_os_str() == last)) {
        let name = names.remove(pos);
        names.push(name);
    }

    let mut leftovers = Vec::new();
    for name in &names {
        if let Some(path) = replace_entry(&staged.join(name), &dest.join(name))? {
            leftovers.push(path);
        }
    }
    Ok(leftovers)
}

fn replace_entry(from: &Path, to: &Path) -> Result<Option<PathBuf>> {
    let displaced = match fs::symlink_metadata(to) {
        Ok(_) => {
            let aside = aside_path(to);
            debug!("Moving {} aside to {}", to.display(), aside.display());
            fs::rename(to, &aside)?;
            Some(aside)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    debug!("Promoting {} to {}", from.display(), to.display());
    if let Err(e) = fs::rename(from, to) {
        error!("Failed to move {} to {}: {}", from.display(), to.display(), e);
        if let Some(aside) = &displaced {
            if let Err(restore_err) = fs::rename(aside, to) {
                warn!(
                    "Could not restore {} from {}: {}",
                    to.display(),
                    aside.display(),
                    restore_err
                );
            }
        }
        return Err(PrepError::from(e));
    }

    let Some(aside) = displaced else {
        return Ok(None);
    };
    let removed = if fs::symlink_metadata(&aside).is_ok_and(|m| m.is_dir()) {
        fs::remove_dir_all(&aside)
    } else {
        fs::remove_file(&aside)
    };
    match removed {
        Ok(()) => Ok(None),
        Err(e) => {
            warn!("Could not remove {}: {}", aside.display(), e);
            Ok(Some(aside))
        }
    }
}

fn aside_path(path: &Path) -> PathBuf {
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    path.with_file_name(format!(".{}.old-{}", name, std::process::id()))
}
