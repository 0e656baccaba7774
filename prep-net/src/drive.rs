//! Resolution of Google Drive file ids to downloadable content.
//!
//! Small files are served directly from the `uc` endpoint. Files above the
//! virus-scan threshold get an HTML interstitial instead, carrying either a
//! confirmation form (current) or a `confirm=` link (legacy). Both are
//! followed once; anything else is reported as "no result".

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use prep_common::error::Result;
use regex::Regex;
use reqwest::blocking::Client;
use tracing::{debug, warn};
use url::Url;

use crate::http::{self, is_html, write_response};
use crate::validation::validate_url;

pub const DRIVE_ENDPOINT: &str = "https://drive.google.com/uc";

pub fn direct_url(file_id: &str) -> String {
    format!("{DRIVE_ENDPOINT}?export=download&id={file_id}")
}

fn form_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<form[^>]*\saction="([^"]+)"[^>]*>(.*?)</form>"#)
            .expect("form pattern is valid")
    })
}

fn hidden_input_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<input[^>]*type="hidden"[^>]*>"#).expect("input pattern is valid")
    })
}

fn attr_re(name: &'static str) -> Regex {
    Regex::new(&format!(r#"(?i)\s{name}="([^"]*)""#)).expect("attribute pattern is valid")
}

fn confirm_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"confirm=([0-9A-Za-z_-]+)").expect("token pattern is valid"))
}

fn unescape(s: &str) -> String {
    s.replace("&amp;", "&")
}

/// Extracts the follow-up URL from a Drive interstitial page.
pub fn parse_interstitial(html: &str, file_id: &str) -> Option<String> {
    if let Some(form) = form_re().captures(html) {
        let action = unescape(&form[1]);
        let name_re = attr_re("name");
        let value_re = attr_re("value");
        let params: Vec<(String, String)> = hidden_input_re()
            .find_iter(&form[2])
            .filter_map(|input| {
                let tag = input.as_str();
                let name = name_re.captures(tag)?[1].to_string();
                let value = value_re
                    .captures(tag)
                    .map(|c| unescape(&c[1]))
                    .unwrap_or_default();
                Some((name, value))
            })
            .collect();
        if let Ok(url) = Url::parse_with_params(&action, &params) {
            debug!("Drive interstitial form resolved to {}", url);
            return Some(url.to_string());
        }
        debug!("Drive interstitial form action is not a URL: {}", action);
    }

    confirm_token_re().captures(html).map(|token| {
        debug!("Drive interstitial carries legacy confirm token");
        format!("{}&confirm={}", direct_url(file_id), &token[1])
    })
}

/// Fetches the Drive file `file_id` into `dest`.
///
/// Returns `Ok(None)` when Drive does not hand out the file (missing,
/// private, quota page). Transport problems are errors.
pub fn fetch_drive_file(
    client: &Client,
    file_id: &str,
    dest: &Path,
    show_progress: bool,
) -> Result<Option<PathBuf>> {
    let url = direct_url(file_id);
    validate_url(&url)?;
    debug!("Resolving Drive file {} via {}", file_id, url);
    fetch_with_confirmation(client, &url, file_id, dest, show_progress, |next| {
        validate_url(next).map(drop)
    })
}

/// GETs `url` and follows at most one interstitial. `check_next` vets the
/// follow-up URL before it is requested.
fn fetch_with_confirmation(
    client: &Client,
    url: &str,
    file_id: &str,
    dest: &Path,
    show_progress: bool,
    check_next: impl Fn(&str) -> Result<()>,
) -> Result<Option<PathBuf>> {
    let Some(response) = http::get(client, url)? else {
        return Ok(None);
    };
    if !is_html(&response) {
        return write_response(response, dest, show_progress).map(Some);
    }

    let page = response.text()?;
    let Some(next) = parse_interstitial(&page, file_id) else {
        warn!("Drive returned a page without a download link for {}", file_id);
        return Ok(None);
    };
    check_next(&next)?;

    let Some(response) = http::get(client, &next)? else {
        return Ok(None);
    };
    if is_html(&response) {
        warn!("Drive still answered with HTML after confirmation for {}", file_id);
        return Ok(None);
    }
    write_response(response, dest, show_progress).map(Some)
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    const FORM_PAGE: &str = r#"<!DOCTYPE html><html><head><title>Google Drive - Virus scan warning</title></head>
<body><div class="uc-main"><p class="uc-warning-caption">Google Drive can't scan this file for viruses.</p>
<form id="download-form" action="https://drive.usercontent.google.com/download" method="get">
<input type="submit" id="uc-download-link" class="goog-inline-block jfk-button jfk-button-action" value="Download anyway"/>
<input type="hidden" name="id" value="1F99QfUPzWKrR8JK-JBD4cKANcLoPf_ip">
<input type="hidden" name="export" value="download">
<input type="hidden" name="confirm" value="t">
<input type="hidden" name="uuid" value="0b0c9a4e-1111-2222-3333-444455556666">
</form></div></body></html>"#;

    #[test]
    fn direct_url_embeds_id() {
        assert_eq!(
            direct_url("abc"),
            "https://drive.google.com/uc?export=download&id=abc"
        );
    }

    #[test]
    fn form_interstitial_becomes_usercontent_url() {
        let next = parse_interstitial(FORM_PAGE, "ignored").unwrap();
        let url = Url::parse(&next).unwrap();
        assert_eq!(url.host_str(), Some("drive.usercontent.google.com"));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("id".into(), "1F99QfUPzWKrR8JK-JBD4cKANcLoPf_ip".into())));
        assert!(pairs.contains(&("confirm".into(), "t".into())));
        assert!(pairs.iter().any(|(k, _)| k == "uuid"));
        // The visible submit button is not a query parameter.
        assert!(!pairs.iter().any(|(_, v)| v == "Download anyway"));
    }

    #[test]
    fn legacy_confirm_link_is_followed() {
        let page = r#"<a id="uc-download-link" href="/uc?export=download&amp;confirm=Xy_9&amp;id=abc">Download anyway</a>"#;
        assert_eq!(
            parse_interstitial(page, "abc").unwrap(),
            "https://drive.google.com/uc?export=download&id=abc&confirm=Xy_9"
        );
    }

    #[test]
    fn error_page_has_no_result() {
        let page = "<html><body>Sorry, the file you have requested does not exist.</body></html>";
        assert_eq!(parse_interstitial(page, "abc"), None);
    }

    fn interstitial_for(base: &str) -> String {
        FORM_PAGE.replace("https://drive.usercontent.google.com", base)
    }

    fn fetch_from(server: &mockito::ServerGuard, dest: &Path) -> Result<Option<PathBuf>> {
        let client = crate::http::build_http_client().unwrap();
        let url = format!("{}/uc?export=download&id=abc", server.url());
        fetch_with_confirmation(&client, &url, "abc", dest, false, |_| Ok(()))
    }

    #[test]
    fn direct_response_is_written_to_dest() {
        let mut server = mockito::Server::new();
        let _file = server
            .mock("GET", "/uc")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/octet-stream")
            .with_body(b"PK\x03\x04payload")
            .create();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("DATASET.zip");

        assert_eq!(fetch_from(&server, &dest).unwrap(), Some(dest.clone()));
        assert_eq!(std::fs::read(&dest).unwrap(), b"PK\x03\x04payload");
    }

    #[test]
    fn interstitial_form_is_followed_once() {
        let mut server = mockito::Server::new();
        let page = interstitial_for(&server.url());
        let _page = server
            .mock("GET", "/uc")
            .match_query(Matcher::Any)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(page)
            .create();
        let download = server
            .mock("GET", "/download")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("confirm".into(), "t".into()),
                Matcher::UrlEncoded("id".into(), "1F99QfUPzWKrR8JK-JBD4cKANcLoPf_ip".into()),
            ]))
            .with_header("content-type", "application/octet-stream")
            .with_body("zip bytes")
            .expect(1)
            .create();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("DATASET.zip");

        assert_eq!(fetch_from(&server, &dest).unwrap(), Some(dest.clone()));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "zip bytes");
        download.assert();
    }

    #[test]
    fn html_after_confirmation_is_no_result() {
        let mut server = mockito::Server::new();
        let page = interstitial_for(&server.url());
        let _page = server
            .mock("GET", "/uc")
            .match_query(Matcher::Any)
            .with_header("content-type", "text/html")
            .with_body(page)
            .create();
        let _quota = server
            .mock("GET", "/download")
            .match_query(Matcher::Any)
            .with_header("content-type", "text/html")
            .with_body("<html>Too many users have viewed or downloaded this file</html>")
            .create();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("DATASET.zip");

        assert_eq!(fetch_from(&server, &dest).unwrap(), None);
        assert!(!dest.exists());
    }

    #[test]
    fn page_without_link_is_no_result() {
        let mut server = mockito::Server::new();
        let _page = server
            .mock("GET", "/uc")
            .match_query(Matcher::Any)
            .with_header("content-type", "text/html")
            .with_body("<html><body>Sorry, the file you have requested does not exist.</body></html>")
            .create();
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(fetch_from(&server, &dir.path().join("DATASET.zip")).unwrap(), None);
    }

    #[test]
    fn missing_file_is_no_result() {
        let mut server = mockito::Server::new();
        let _missing = server
            .mock("GET", "/uc")
            .match_query(Matcher::Any)
            .with_status(404)
            .create();
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(fetch_from(&server, &dir.path().join("DATASET.zip")).unwrap(), None);
    }

    #[test]
    fn rejected_follow_up_url_is_not_requested() {
        let mut server = mockito::Server::new();
        let page = interstitial_for(&server.url());
        let _page = server
            .mock("GET", "/uc")
            .match_query(Matcher::Any)
            .with_header("content-type", "text/html")
            .with_body(page)
            .create();
        let download = server
            .mock("GET", "/download")
            .match_query(Matcher::Any)
            .expect(0)
            .create();
        let client = crate::http::build_http_client().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/uc?export=download&id=abc", server.url());

        let err = fetch_with_confirmation(
            &client,
            &url,
            "abc",
            &dir.path().join("DATASET.zip"),
            false,
            |next| validate_url(next).map(drop),
        )
        .unwrap_err();

        assert!(matches!(err, prep_common::error::PrepError::Validation(_)), "{err:?}");
        download.assert();
    }
}
