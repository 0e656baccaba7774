use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use prep_common::error::{PrepError, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use tracing::{debug, error, warn};

const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "prep dataset fetcher (Rust)";

/// Builds the blocking client used for every transfer. There is no overall
/// request timeout: dataset archives can take a long time to stream.
pub fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(None)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| PrepError::Validation(format!("Failed to build HTTP client: {e}")))
}

/// Sends a GET and classifies the status. `Ok(None)` means the server
/// answered that the resource does not exist or is not accessible.
pub fn get(client: &Client, url: &str) -> Result<Option<Response>> {
    let response = client.get(url).send().map_err(|e| {
        debug!("HTTP request failed for {url}: {e}");
        PrepError::Download(String::new(), url.to_string(), format!("request failed: {e}"))
    })?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);

    match status {
        s if s.is_success() => Ok(Some(response)),
        StatusCode::NOT_FOUND | StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
            warn!("Remote resource unavailable ({status}) at {url}");
            Ok(None)
        }
        _ => {
            let body_text = response
                .text()
                .unwrap_or_else(|_| "Failed to read response body".to_string());
            error!("HTTP error {} for URL {}: {}", status, url, body_text);
            Err(PrepError::Download(
                String::new(),
                url.to_string(),
                format!("HTTP error {status}"),
            ))
        }
    }
}

pub fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().to_ascii_lowercase().starts_with("text/html"))
}

/// Streams a response body to `final_path`, going through a hidden temporary
/// file next to it so that `final_path` only ever holds a complete transfer.
pub fn write_response(
    mut response: Response,
    final_path: &Path,
    show_progress: bool,
) -> Result<PathBuf> {
    let temp_filename = format!(
        ".{}.download",
        final_path.file_name().unwrap_or_default().to_string_lossy()
    );
    let temp_path = final_path.with_file_name(temp_filename);
    debug!("Downloading to temporary path: {}", temp_path.display());
    if temp_path.exists() {
        if let Err(e) = fs::remove_file(&temp_path) {
            warn!(
                "Could not remove existing temporary file {}: {}",
                temp_path.display(),
                e
            );
        }
    }

    let progress = progress_bar(response.content_length(), show_progress);
    let file = File::create(&temp_path).map_err(|e| {
        PrepError::Download(
            final_path.display().to_string(),
            response.url().to_string(),
            format!("failed to create temp file {}: {e}", temp_path.display()),
        )
    })?;
    let mut writer = progress.wrap_write(BufWriter::new(file));
    let url = response.url().to_string();
    let written = response.copy_to(&mut writer).map_err(|e| {
        PrepError::Download(
            final_path.display().to_string(),
            url.clone(),
            format!("transfer interrupted: {e}"),
        )
    })?;
    writer.flush()?;
    drop(writer);
    progress.finish_and_clear();
    debug!("Wrote {} bytes to {}", written, temp_path.display());

    fs::rename(&temp_path, final_path).map_err(|e| {
        PrepError::Download(
            final_path.display().to_string(),
            url,
            format!(
                "failed to move {} into place: {e}",
                temp_path.display()
            ),
        )
    })?;
    debug!("Moved download to final location: {}", final_path.display());
    Ok(final_path.to_path_buf())
}

fn progress_bar(len: Option<u64>, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    match len {
        Some(total) => {
            let bar = ProgressBar::new(total);
            let style = ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
            bar.set_style(style);
            bar
        }
        None => {
            let spinner = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner} {bytes} ({bytes_per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch(server: &mockito::ServerGuard, path: &str) -> Result<Option<Response>> {
        let client = build_http_client().unwrap();
        get(&client, &format!("{}{path}", server.url()))
    }

    #[test]
    fn unavailable_resources_are_no_result() {
        let mut server = mockito::Server::new();
        let _missing = server.mock("GET", "/missing").with_status(404).create();
        let _private = server.mock("GET", "/private").with_status(403).create();
        let _login = server.mock("GET", "/login").with_status(401).create();

        for path in ["/missing", "/private", "/login"] {
            assert!(fetch(&server, path).unwrap().is_none(), "{path}");
        }
    }

    #[test]
    fn other_error_statuses_are_download_failures() {
        let mut server = mockito::Server::new();
        let _boom = server.mock("GET", "/boom").with_status(500).create();

        let err = fetch(&server, "/boom").unwrap_err();
        assert!(matches!(err, PrepError::Download(..)), "{err:?}");
        assert!(err.to_string().contains("500"), "{err}");
    }

    #[test]
    fn html_is_detected_from_content_type() {
        let mut server = mockito::Server::new();
        let _page = server
            .mock("GET", "/page")
            .with_header("content-type", "text/html; charset=UTF-8")
            .with_body("<html></html>")
            .create();
        let _file = server
            .mock("GET", "/file")
            .with_header("content-type", "application/zip")
            .with_body("PK")
            .create();

        assert!(is_html(&fetch(&server, "/page").unwrap().unwrap()));
        assert!(!is_html(&fetch(&server, "/file").unwrap().unwrap()));
    }

    #[test]
    fn write_response_replaces_stale_temp_file_and_renames() {
        let mut server = mockito::Server::new();
        let _file = server
            .mock("GET", "/file")
            .with_header("content-type", "application/zip")
            .with_body("fresh archive")
            .create();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("DATASET.zip");
        let temp = dir.path().join(".DATASET.zip.download");
        fs::write(&temp, "left over from an interrupted run").unwrap();

        let response = fetch(&server, "/file").unwrap().unwrap();
        assert_eq!(write_response(response, &dest, false).unwrap(), dest);

        assert_eq!(fs::read_to_string(&dest).unwrap(), "fresh archive");
        assert!(!temp.exists());
    }

    #[test]
    fn unwritable_destination_leaves_no_file() {
        let mut server = mockito::Server::new();
        let _file = server.mock("GET", "/file").with_body("data").create();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing-dir").join("DATASET.zip");

        let response = fetch(&server, "/file").unwrap().unwrap();
        let err = write_response(response, &dest, false).unwrap_err();

        assert!(matches!(err, PrepError::Download(..)), "{err:?}");
        assert!(!dest.exists());
    }
}
