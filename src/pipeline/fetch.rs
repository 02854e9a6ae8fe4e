//! Image fetching: one URL → one file on disk, with retry and backoff.
//!
//! The network is reached through the [`ImageSource`] trait so the retry,
//! validation and persistence logic can be exercised without sockets. The
//! production implementation, [`HttpImageSource`], wraps one shared
//! `reqwest::Client` (connection pool, default headers, timeout) that every
//! worker borrows through an `Arc`.
//!
//! ## Retry Strategy
//!
//! Any failure (network, non-2xx, short body, write error) is retried. The
//! delay before attempt `n` (0-based) is `retry_backoff_ms * 2^(n-1)`; with
//! the default 1000 ms base and 3 retries the waits are 1 s → 2 s → 4 s.
//!
//! ## Never overwrite
//!
//! A file that already exists is reported as success without a request. When
//! the name depends on the content type the check is repeated after the
//! response arrives, and the final write uses create-new semantics, so a file
//! that appears in the meantime is kept and the late writer backs off.

use crate::config::LocalizerConfig;
use crate::error::{FetchError, LocalizeError};
use crate::pipeline::naming::{NamePlan, ResolvedName};
use crate::pipeline::recompress;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// A downloaded response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    /// Value of the `Content-Type` header, if any.
    pub content_type: Option<String>,
}

/// Where image bytes come from.
///
/// Implementations return `Err` for transport failures and non-2xx statuses;
/// payload validation happens in [`Fetcher`].
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedImage, FetchError>;
}

/// [`ImageSource`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpImageSource {
    /// Build the client once per run: browser-like headers, per-request timeout.
    pub fn new(config: &LocalizerConfig) -> Result<Self, LocalizeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("image/webp,image/apng,image/*,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| LocalizeError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn map_err(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            FetchError::Network {
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn get(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(|e| self.map_err(e))?;

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each following one.
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Total number of attempts, including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before 0-based `attempt`. The first attempt never waits.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u64.saturating_pow(attempt - 1);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// An image that is available locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedImage {
    pub name: ResolvedName,
    /// Absolute (or root-relative) path of the stored file.
    pub local_path: PathBuf,
    /// Bytes written by this run; `None` when an existing file was reused.
    pub bytes_written: Option<usize>,
    /// Attempts used; 0 when no request was made.
    pub attempts: u32,
    /// JPEG quality when the payload was recompressed.
    pub quality: Option<u8>,
}

impl DownloadedImage {
    fn existing(name: ResolvedName, local_path: PathBuf) -> Self {
        Self {
            name,
            local_path,
            bytes_written: None,
            attempts: 0,
            quality: None,
        }
    }

    /// Whether the file was already present and left untouched.
    pub fn skipped_existing(&self) -> bool {
        self.bytes_written.is_none()
    }
}

/// Result of fetching one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Success(DownloadedImage),
    Failure(FetchError),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success(_))
    }
}

/// Downloads, validates, shrinks and stores images.
///
/// Cheap to share: one instance serves every worker of a run.
pub struct Fetcher {
    source: Arc<dyn ImageSource>,
    policy: RetryPolicy,
    request_delay: Duration,
    min_payload_bytes: usize,
    /// `None` disables recompression.
    max_image_bytes: Option<usize>,
}

impl Fetcher {
    pub fn new(source: Arc<dyn ImageSource>, config: &LocalizerConfig) -> Self {
        Self {
            source,
            policy: RetryPolicy {
                max_retries: config.max_retries,
                backoff_ms: config.retry_backoff_ms,
            },
            request_delay: Duration::from_millis(config.request_delay_ms),
            min_payload_bytes: config.min_payload_bytes,
            max_image_bytes: config.recompress.then(|| config.max_image_bytes()),
        }
    }

    /// Fetch `url` into `folder` under the name decided by `plan`.
    ///
    /// Always returns an outcome; the error of the last attempt is kept on
    /// failure.
    pub async fn fetch(&self, url: &str, plan: &NamePlan, folder: &Path) -> DownloadOutcome {
        if let Some(name) = find_existing(plan, folder).await {
            info!("Image already present, skipping: {}", name.file_name);
            let path = folder.join(&name.file_name);
            return DownloadOutcome::Success(DownloadedImage::existing(name, path));
        }

        let mut last_err: Option<FetchError> = None;

        for attempt in 0..self.policy.attempts() {
            if attempt > 0 {
                let backoff = self.policy.delay_for(attempt);
                info!(
                    "Retrying {} ({}/{}) after {}ms",
                    url,
                    attempt,
                    self.policy.max_retries,
                    backoff.as_millis()
                );
                sleep(backoff).await;
            }

            match self.try_once(url, plan, folder).await {
                Ok(mut image) => {
                    image.attempts = attempt + 1;
                    return DownloadOutcome::Success(image);
                }
                Err(e) => {
                    warn!("Download failed {} (attempt {}): {}", url, attempt + 1, e);
                    last_err = Some(e);
                }
            }
        }

        let err = last_err.unwrap_or_else(|| FetchError::Network {
            detail: "no attempt was made".to_string(),
        });
        error!(
            "Giving up on {} after {} attempts: {}",
            url,
            self.policy.attempts(),
            err
        );
        DownloadOutcome::Failure(err)
    }

    async fn try_once(
        &self,
        url: &str,
        plan: &NamePlan,
        folder: &Path,
    ) -> Result<DownloadedImage, FetchError> {
        if !self.request_delay.is_zero() {
            sleep(self.request_delay).await;
        }

        info!("Downloading: {}", url);
        let fetched = self.source.get(url).await?;

        if fetched.bytes.len() < self.min_payload_bytes {
            return Err(FetchError::PayloadTooSmall {
                len: fetched.bytes.len(),
                min: self.min_payload_bytes,
            });
        }

        let name = plan.finalize(fetched.content_type.as_deref());
        let path = folder.join(&name.file_name);
        if path_exists(&path).await {
            debug!("{} appeared during download; keeping it", name.file_name);
            return Ok(DownloadedImage::existing(name, path));
        }

        let is_svg = fetched
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("svg"));

        let (bytes, quality) = match self.max_image_bytes {
            Some(max) if !is_svg => shrink(fetched.bytes, max).await,
            _ => (fetched.bytes, None),
        };

        tokio::fs::create_dir_all(folder)
            .await
            .map_err(|e| FetchError::Write {
                path: folder.to_path_buf(),
                detail: e.to_string(),
            })?;

        match write_new(&path, &bytes).await {
            Ok(()) => {
                info!("Downloaded: {} ({} bytes)", name.file_name, bytes.len());
                Ok(DownloadedImage {
                    name,
                    local_path: path,
                    bytes_written: Some(bytes.len()),
                    attempts: 1,
                    quality,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!("{} written concurrently; keeping it", name.file_name);
                Ok(DownloadedImage::existing(name, path))
            }
            Err(e) => Err(FetchError::Write {
                path,
                detail: e.to_string(),
            }),
        }
    }
}

/// Run recompression off the async workers; any failure keeps the original.
async fn shrink(bytes: Vec<u8>, max: usize) -> (Vec<u8>, Option<u8>) {
    let original: Arc<[u8]> = bytes.into();
    let for_task = Arc::clone(&original);
    match tokio::task::spawn_blocking(move || recompress::reduce(&for_task, max)).await {
        Ok(reduced) => (reduced.bytes, reduced.quality),
        Err(e) => {
            warn!("Recompression task failed ({e}); storing original bytes");
            (original.to_vec(), None)
        }
    }
}

async fn find_existing(plan: &NamePlan, folder: &Path) -> Option<ResolvedName> {
    for candidate in plan.candidates() {
        if path_exists(&folder.join(&candidate.file_name)).await {
            return Some(candidate);
        }
    }
    None
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Create `path` exclusively and write `bytes`; a partial file is removed.
async fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        let _ = tokio::fs::remove_file(path).await;
        return Err(e);
    }
    Ok(())
}
