//! Integration tests for the reqwest-backed image source against a local server.

mod common;

use common::image_server;
use md_image_localizer::pipeline::naming::resolve;
use md_image_localizer::{
    localize_dir, FetchError, HttpImageSource, ImageSource, LocalizerConfig, DEFAULT_USER_AGENT,
};
use std::time::Instant;

fn png_body() -> Vec<u8> {
    (0..512).map(|i| (i % 253) as u8).collect()
}

fn config() -> LocalizerConfig {
    LocalizerConfig::builder()
        .request_delay_ms(0)
        .retry_backoff_ms(0)
        .max_retries(0)
        .build()
        .unwrap()
}

#[tokio::test]
async fn non_success_status_is_http_error() {
    let server = image_server::start(png_body());
    let source = HttpImageSource::new(&config()).unwrap();

    let err = source.get(&server.url("missing.png")).await.unwrap_err();

    assert_eq!(err, FetchError::HttpStatus { status: 404 });
}

#[tokio::test]
async fn success_returns_body_and_content_type() {
    let server = image_server::start(png_body());
    let source = HttpImageSource::new(&config()).unwrap();

    let fetched = source.get(&server.url("ok.png")).await.unwrap();

    assert_eq!(fetched.bytes, png_body());
    assert_eq!(fetched.content_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn configured_user_agent_is_sent() {
    let server = image_server::start(png_body());
    let source = HttpImageSource::new(&config()).unwrap();

    source.get(&server.url("ok.png")).await.unwrap();

    assert_eq!(server.user_agents(), vec![DEFAULT_USER_AGENT.to_string()]);
}

#[tokio::test]
async fn stalled_response_maps_to_timeout() {
    let server = image_server::start(png_body());
    let cfg = LocalizerConfig::builder()
        .request_timeout_secs(1)
        .build()
        .unwrap();
    let source = HttpImageSource::new(&cfg).unwrap();

    let start = Instant::now();
    let err = source.get(&server.url("slow.png")).await.unwrap_err();

    assert_eq!(err, FetchError::Timeout { secs: 1 });
    assert!(start.elapsed() < image_server::STALL);
}

#[tokio::test]
async fn run_over_http_localises_and_names_by_content_type() {
    let server = image_server::start(png_body());
    let dir = tempfile::tempdir().unwrap();
    let ok = server.url("ok.png");
    let render = server.url("render");
    let gone = server.url("missing.png");
    let doc = dir.path().join("a.md");
    std::fs::write(&doc, format!("![a]({ok})\n![r]({render})\n![g]({gone})\n")).unwrap();

    let out = localize_dir(dir.path(), &config()).await.unwrap();

    let ok_local = resolve(&ok, "images").finalize(None).relative_path;
    let render_local = resolve(&render, "images").finalize(Some("image/webp")).relative_path;
    assert!(render_local.ends_with(".webp"));
    assert_eq!(
        std::fs::read_to_string(&doc).unwrap(),
        format!("![a]({ok_local})\n![r]({render_local})\n![g]({gone})\n")
    );
    assert_eq!(std::fs::read(dir.path().join(&ok_local)).unwrap(), png_body());
    assert_eq!(out.stats.images_downloaded, 2);
    assert_eq!(out.stats.images_failed, 1);
}
