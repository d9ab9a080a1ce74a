//! Terraform release downloads from releases.hashicorp.com.
//!
//! A release at `<base>/<version>/` consists of one zip artifact per
//! platform key plus a `terraform_<version>_SHA256SUMS` file listing the
//! expected digest of each artifact. The [`Fetcher`] trait is the narrow
//! seam the installer consumes; [`ReleaseClient`] is the real
//! implementation.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use std::fmt;

use crate::http::{HttpClient, NonRetryableError};
use crate::platform::Platform;
use crate::version::Version;

/// Default release server.
pub const DEFAULT_BASE_URL: &str = "https://releases.hashicorp.com/terraform";

/// Fetch-level errors callers classify by variant.
#[derive(Debug)]
pub enum FetchError {
    /// The requested version does not exist upstream.
    NotFound(String),
    /// No artifact is published for the current platform.
    UnsupportedPlatform(String),
    /// Transient network failure; safe to retry the command.
    NetworkFailure(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound(msg) => write!(f, "{}", msg),
            FetchError::UnsupportedPlatform(msg) => write!(f, "{}", msg),
            FetchError::NetworkFailure(msg) => write!(f, "network failure: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// A downloaded release artifact and its expected digest.
#[derive(Debug)]
pub struct Download {
    pub bytes: Vec<u8>,
    /// Hex-encoded SHA-256 digest from the release's SHA256SUMS file.
    pub sha256: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download the artifact for `version` on `platform` together with its
    /// expected checksum.
    async fn fetch(&self, version: &Version, platform: &Platform) -> Result<Download>;
}

/// Fetcher backed by the HashiCorp release server.
pub struct ReleaseClient {
    http: HttpClient,
    base_url: String,
}

impl ReleaseClient {
    pub fn new(http: HttpClient) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    /// Override the release server, e.g. for a mirror or tests.
    pub fn with_base_url(http: HttpClient, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { http, base_url }
    }

    fn artifact_name(version: &Version, key: &str) -> String {
        format!("terraform_{}_{}.zip", version, key)
    }

    fn sums_url(&self, version: &Version) -> String {
        format!(
            "{}/{}/terraform_{}_SHA256SUMS",
            self.base_url, version, version
        )
    }

    fn artifact_url(&self, version: &Version, artifact: &str) -> String {
        format!("{}/{}/{}", self.base_url, version, artifact)
    }
}

#[async_trait]
impl Fetcher for ReleaseClient {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, version: &Version, platform: &Platform) -> Result<Download> {
        let key = platform.release_key().ok_or_else(|| {
            FetchError::UnsupportedPlatform(format!(
                "no terraform release artifact for {}/{}",
                platform.os, platform.arch
            ))
        })?;
        let artifact = Self::artifact_name(version, &key);

        let sums = self
            .http
            .get_text(&self.sums_url(version))
            .await
            .map_err(|e| classify_fetch_error(e, version))?;

        let sha256 = parse_sha256sums(&sums, &artifact).ok_or_else(|| {
            FetchError::UnsupportedPlatform(format!(
                "terraform {} has no {} artifact",
                version, key
            ))
        })?;
        debug!("Expected digest for {}: {}", artifact, sha256);

        info!("Downloading {}...", artifact);
        let bytes = self
            .http
            .get_bytes(&self.artifact_url(version, &artifact))
            .await
            .map_err(|e| classify_fetch_error(e, version))?;

        Ok(Download { bytes, sha256 })
    }
}

/// Map an HTTP-level error to the fetch taxonomy. The release server
/// answers 403 (not 404) for versions that do not exist, so both count as
/// not-found here. Other client errors keep their original classification
/// so callers do not mistake them for transient failures.
fn classify_fetch_error(error: anyhow::Error, version: &Version) -> anyhow::Error {
    match error.downcast_ref::<NonRetryableError>() {
        Some(NonRetryableError::NotFound(_)) | Some(NonRetryableError::Forbidden(_)) => {
            FetchError::NotFound(format!("terraform {} does not exist upstream", version)).into()
        }
        Some(NonRetryableError::ClientError(_)) => error,
        None => FetchError::NetworkFailure(error.to_string()).into(),
    }
}

/// Find the digest for `artifact` in a SHA256SUMS file (lines of
/// `<hex digest>  <file name>`).
fn parse_sha256sums(sums: &str, artifact: &str) -> Option<String> {
    sums.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let digest = fields.next()?;
        let name = fields.next()?;
        (name == artifact).then(|| digest.to_string())
    })
}
