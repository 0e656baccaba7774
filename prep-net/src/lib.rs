// prep-net/src/lib.rs
pub mod drive;
pub mod http;
pub mod validation;

pub use drive::{direct_url, fetch_drive_file, parse_interstitial};
pub use http::build_http_client;
pub use prep_common::error::{PrepError, Result};
pub use reqwest::blocking::Client as HttpClient;
pub use validation::{sniff_extension, validate_url, warn_on_content_mismatch};
