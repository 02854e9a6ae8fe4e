//! In-memory image sources shared by the pipeline's unit tests.

use crate::config::LocalizerConfig;
use crate::error::FetchError;
use crate::pipeline::fetch::{FetchedImage, ImageSource};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Replays scripted responses per URL; the last one repeats forever.
/// Unknown URLs answer 404.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    script: Mutex<HashMap<String, VecDeque<Result<FetchedImage, FetchError>>>>,
    calls: AtomicUsize,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) fn with(self, url: &str, responses: Vec<Result<FetchedImage, FetchError>>) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into());
        self
    }

    /// Hold every request open for `latency` so overlap can be observed.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let mut script = self.script.lock().unwrap();
        let queue = script
            .get_mut(url)
            .ok_or(FetchError::HttpStatus { status: 404 })?;
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl ImageSource for ScriptedSource {
    async fn get(&self, url: &str) -> Result<FetchedImage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let response = self.next_response(url);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

/// A successful body of `len` bytes.
pub(crate) fn body(len: usize, content_type: &str) -> Result<FetchedImage, FetchError> {
    Ok(FetchedImage {
        bytes: vec![7u8; len],
        content_type: Some(content_type.to_string()),
    })
}

/// Default config without the politeness delay or backoff waits.
pub(crate) fn fast_config() -> LocalizerConfig {
    LocalizerConfig::builder()
        .request_delay_ms(0)
        .retry_backoff_ms(0)
        .build()
        .unwrap()
}
