use std::path::Path;

use prep_common::error::Result;
use prep_common::model::AcquisitionTarget;
use prep_net::{build_http_client, fetch_drive_file, warn_on_content_mismatch, HttpClient};
use tracing::debug;

use super::Fetcher;

/// Fetches targets whose remote id is a Google Drive file id.
pub struct DriveFetcher {
    client: HttpClient,
    show_progress: bool,
}

impl DriveFetcher {
    pub fn new(show_progress: bool) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            show_progress,
        })
    }
}

impl Fetcher for DriveFetcher {
    fn fetch(&self, target: &AcquisitionTarget, dest: &Path) -> Result<bool> {
        debug!(
            "Fetching Drive file {} to {}",
            target.remote_id,
            dest.display()
        );
        let fetched = fetch_drive_file(&self.client, &target.remote_id, dest, self.show_progress)?;
        if fetched.is_some() && target.archive_name.to_ascii_lowercase().ends_with(".zip") {
            warn_on_content_mismatch(dest, "zip");
        }
        Ok(fetched.is_some())
    }
}
