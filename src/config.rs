//! Configuration types for image localisation.
//!
//! All run behaviour is controlled through [`LocalizerConfig`], built via its
//! [`LocalizerConfigBuilder`]. The root folder is not part of the config: it
//! is passed to [`crate::localize::localize_dir`] so one config can be reused
//! across several trees.

use crate::error::LocalizeError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Browser-like user agent; some image hosts reject obvious bot clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Configuration for a localisation run.
///
/// Built via [`LocalizerConfig::builder()`] or using
/// [`LocalizerConfig::default()`].
///
/// # Example
/// ```rust
/// use md_image_localizer::LocalizerConfig;
///
/// let config = LocalizerConfig::builder()
///     .max_workers(8)
///     .max_retries(2)
///     .max_image_kb(300)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_workers, 8);
/// ```
#[derive(Clone)]
pub struct LocalizerConfig {
    /// Number of concurrent downloads per document. Default: 5.
    ///
    /// Bounds the number of outstanding connections. Documents themselves are
    /// processed one after another.
    pub max_workers: usize,

    /// Extra attempts after the first failed download. Default: 3.
    pub max_retries: u32,

    /// Base backoff in milliseconds, doubled per retry. Default: 1000.
    ///
    /// With the default the waits are 1 s → 2 s → 4 s.
    pub retry_backoff_ms: u64,

    /// Size budget for stored raster images, in KiB. Default: 500.
    pub max_image_kb: usize,

    /// Re-encode raster images above the budget. Default: true.
    pub recompress: bool,

    /// Per-request connect + read timeout in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Fixed delay before every request, in milliseconds. Default: 500.
    pub request_delay_ms: u64,

    /// Bodies shorter than this are rejected. Default: 100.
    pub min_payload_bytes: usize,

    /// Name of the image folder created beside each document. Default: "images".
    pub images_dir_name: String,

    /// Document extensions to discover, without the dot. Default: `["md"]`.
    pub extensions: Vec<String>,

    /// `User-Agent` header sent with every request.
    pub user_agent: String,

    /// Optional progress observer. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            max_retries: 3,
            retry_backoff_ms: 1000,
            max_image_kb: 500,
            recompress: true,
            request_timeout_secs: 30,
            request_delay_ms: 500,
            min_payload_bytes: 100,
            images_dir_name: "images".to_string(),
            extensions: vec!["md".to_string()],
            user_agent: DEFAULT_USER_AGENT.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for LocalizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalizerConfig")
            .field("max_workers", &self.max_workers)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("max_image_kb", &self.max_image_kb)
            .field("recompress", &self.recompress)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("request_delay_ms", &self.request_delay_ms)
            .field("min_payload_bytes", &self.min_payload_bytes)
            .field("images_dir_name", &self.images_dir_name)
            .field("extensions", &self.extensions)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn LocalizeProgressCallback>"),
            )
            .finish()
    }
}

impl LocalizerConfig {
    /// Create a new builder for `LocalizerConfig`.
    pub fn builder() -> LocalizerConfigBuilder {
        LocalizerConfigBuilder {
            config: Self::default(),
        }
    }

    /// The size budget in bytes.
    pub fn max_image_bytes(&self) -> usize {
        self.max_image_kb.saturating_mul(1024)
    }

    /// Whether `ext` (without the dot) names a document to process.
    pub fn matches_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

/// Builder for [`LocalizerConfig`].
#[derive(Debug)]
pub struct LocalizerConfigBuilder {
    config: LocalizerConfig,
}

impl LocalizerConfigBuilder {
    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.max_workers = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_image_kb(mut self, kb: usize) -> Self {
        self.config.max_image_kb = kb;
        self
    }

    pub fn recompress(mut self, v: bool) -> Self {
        self.config.recompress = v;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn request_delay_ms(mut self, ms: u64) -> Self {
        self.config.request_delay_ms = ms;
        self
    }

    pub fn min_payload_bytes(mut self, n: usize) -> Self {
        self.config.min_payload_bytes = n;
        self
    }

    pub fn images_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.images_dir_name = name.into();
        self
    }

    /// Replace the extension list. Leading dots are stripped.
    pub fn extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.extensions = exts
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<LocalizerConfig, LocalizeError> {
        let c = &self.config;
        if c.max_workers == 0 {
            return Err(LocalizeError::InvalidConfig(
                "max_workers must be ≥ 1".into(),
            ));
        }
        let dir = c.images_dir_name.as_str();
        if dir.is_empty() || dir == "." || dir == ".." || dir.contains(['/', '\\']) {
            return Err(LocalizeError::InvalidConfig(format!(
                "images_dir_name must be a single folder name, got '{dir}'"
            )));
        }
        if c.extensions.is_empty() {
            return Err(LocalizeError::InvalidConfig(
                "at least one document extension is required".into(),
            ));
        }
        Ok(self.config)
    }
}
