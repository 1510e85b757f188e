//! Blocking workbook download into a self-deleting temporary file.

use crate::config::EnrollmentConfig;
use crate::error::{EnrollmentError, Result};
use reqwest::blocking::Client;
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// HTTP client with the configured timeout and user agent
pub fn build_client(config: &EnrollmentConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.download_timeout())
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| EnrollmentError::Configuration {
            message: format!("Failed to build HTTP client: {}", e),
        })
}

fn download_error(end_year: u16, url: &str, error: reqwest::Error) -> EnrollmentError {
    EnrollmentError::DownloadFailed {
        year: end_year,
        url: url.to_string(),
        reason: error.to_string(),
        source: Some(error),
    }
}

/// Reject payloads too small to be a real workbook (usually an HTML error page)
pub fn check_payload_size(end_year: u16, bytes: u64, floor: u64) -> Result<()> {
    if bytes < floor {
        return Err(EnrollmentError::PayloadTooSmall {
            year: end_year,
            bytes,
            floor,
        });
    }
    Ok(())
}

/// File suffix calamine needs to pick the right reader
pub fn workbook_suffix(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    if path.ends_with(".xls") {
        ".xls"
    } else if path.ends_with(".xlsb") {
        ".xlsb"
    } else {
        ".xlsx"
    }
}

/// Download `url` into a temporary file that is removed when dropped
pub fn download_workbook(
    client: &Client,
    url: &str,
    end_year: u16,
    min_payload_bytes: u64,
) -> Result<NamedTempFile> {
    info!("Downloading {} enrollment workbook from {}", end_year, url);

    let response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| download_error(end_year, url, e))?;

    let bytes = response
        .bytes()
        .map_err(|e| download_error(end_year, url, e))?;
    check_payload_size(end_year, bytes.len() as u64, min_payload_bytes)?;

    let mut file = tempfile::Builder::new()
        .prefix(&format!("nv_enr_{}_", end_year))
        .suffix(workbook_suffix(url))
        .tempfile()?;
    file.write_all(&bytes)?;
    file.flush()?;

    debug!(
        "Saved {} bytes for {} to {}",
        bytes.len(),
        end_year,
        file.path().display()
    );
    Ok(file)
}
