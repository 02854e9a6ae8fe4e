//! CLI binary for md-image-localizer.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `LocalizerConfig`, owns the logging setup and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md_image_localizer::{
    localize_dir, LocalizeProgressCallback, LocalizerConfig, ProgressCallback, RunOutput,
};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over documents, one log line per
/// document and per failed image. Image events arrive out of order from
/// concurrent downloads.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time and reference count of documents in progress.
    documents: Mutex<HashMap<PathBuf, (Instant, usize)>>,
    images: AtomicUsize,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` reports the document count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Looking for documents…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            documents: Mutex::new(HashMap::new()),
            images: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} docs  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Localising");
        self.bar.reset_eta();
    }
}

impl LocalizeProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_documents: usize) {
        self.activate_bar(total_documents);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanning {total_documents} documents for remote images…"))
        ));
    }

    fn on_document_start(&self, path: &Path, _index: usize, references: usize) {
        if let Ok(mut docs) = self.documents.lock() {
            docs.insert(path.to_path_buf(), (Instant::now(), references));
        }
        self.bar.set_message(file_label(path));
    }

    fn on_image_complete(&self, _url: &str, _relative_path: &str) {
        self.images.fetch_add(1, Ordering::SeqCst);
    }

    fn on_image_error(&self, url: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar
            .println(format!("    {} {}  {}", red("✗"), dim(&truncate(url, 60)), red(error)));
    }

    fn on_document_complete(&self, path: &Path, replaced: usize, failed: usize) {
        let (elapsed_ms, references) = self
            .documents
            .lock()
            .ok()
            .and_then(|mut docs| docs.remove(path))
            .map(|(t, refs)| (t.elapsed().as_millis(), refs))
            .unwrap_or((0, 0));

        if references > 0 {
            let mark = if failed == 0 { green("✓") } else { cyan("⚠") };
            let detail = if failed == 0 {
                format!("{replaced} replaced")
            } else {
                format!("{replaced} replaced, {failed} kept remote")
            };
            self.bar.println(format!(
                "  {} {}  {}  {}",
                mark,
                path.display(),
                dim(&detail),
                dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
            ));
        }
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_documents: usize, images_downloaded: usize) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        if errors == 0 {
            eprintln!(
                "{} {} documents scanned, {} images downloaded",
                green("✔"),
                bold(&total_documents.to_string()),
                bold(&images_downloaded.to_string())
            );
        } else {
            eprintln!(
                "{} {} documents scanned, {} images downloaded  ({} failed)",
                cyan("⚠"),
                bold(&total_documents.to_string()),
                bold(&images_downloaded.to_string()),
                red(&errors.to_string())
            );
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Shorten to `max` characters, marking the cut with an ellipsis.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{head}\u{2026}")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Localise every .md file under notes/
  mdimg notes/

  # Fewer parallel downloads, more patience
  mdimg --workers 2 --retries 5 --timeout 60 notes/

  # Also process .markdown files, store images in assets/
  mdimg --ext md,markdown --images-dir assets docs/

  # Keep images byte-for-byte
  mdimg --no-recompress notes/

  # Machine-readable report
  mdimg --json notes/ > report.json

ENVIRONMENT VARIABLES:
  Every flag can be set through MDIMG_<FLAG>, e.g. MDIMG_WORKERS=8.
  RUST_LOG overrides the console log filter (e.g. RUST_LOG=md_image_localizer=debug).

BEHAVIOUR:
  Images are stored in an images/ folder beside each document and named
  <stem>_<hash>.<ext>, where <hash> is derived from the URL. Existing files
  are never overwritten, so running twice downloads nothing new. Images that
  fail after all retries keep their remote link.
"#;

/// Download remote images referenced by Markdown files and rewrite the links.
#[derive(Parser, Debug)]
#[command(
    name = "mdimg",
    version,
    about = "Download remote images referenced by Markdown files and rewrite the links",
    long_about = "Walk a folder, download every remote image referenced by its Markdown \
documents (![alt](url) and <img src=...>), store them beside each document and rewrite \
the references to the local copies.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Root folder to scan recursively.
    root: PathBuf,

    /// Concurrent downloads per document.
    #[arg(short, long, env = "MDIMG_WORKERS", default_value_t = 5)]
    workers: usize,

    /// Extra attempts per image after the first failure.
    #[arg(short, long, env = "MDIMG_RETRIES", default_value_t = 3)]
    retries: u32,

    /// Size budget per raster image in KiB.
    #[arg(long, env = "MDIMG_MAX_KB", default_value_t = 500)]
    max_kb: usize,

    /// Per-request timeout in seconds.
    #[arg(long, env = "MDIMG_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Delay before every request in milliseconds.
    #[arg(long, env = "MDIMG_DELAY_MS", default_value_t = 500)]
    delay_ms: u64,

    /// Document extensions to process, comma-separated.
    #[arg(long = "ext", env = "MDIMG_EXT", value_delimiter = ',', default_value = "md")]
    extensions: Vec<String>,

    /// Name of the image folder created beside each document.
    #[arg(long, env = "MDIMG_IMAGES_DIR", default_value = "images")]
    images_dir: String,

    /// Store images exactly as downloaded.
    #[arg(long, env = "MDIMG_NO_RECOMPRESS")]
    no_recompress: bool,

    /// Plain-text log file; falls back to stderr only when it cannot be opened.
    #[arg(long, env = "MDIMG_LOG_FILE", default_value = "md_image_localizer.log")]
    log_file: PathBuf,

    /// Output the run report as JSON on stdout.
    #[arg(long, env = "MDIMG_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MDIMG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MDIMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MDIMG_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level console logs when the progress bar is active; the
    // log file still receives everything at INFO or above.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    init_logging(&cli, show_progress);

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn LocalizeProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = localize_dir(&cli.root, &config)
        .await
        .context("Localisation failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output, show_progress);
    }

    Ok(())
}

/// Console layer on stderr plus a plain-text file layer.
fn init_logging(cli: &Cli, show_progress: bool) {
    let console_level = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    let file_level = if cli.verbose { "debug" } else { "info" };

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console_level));
    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cli.log_file);

    let (file_layer, file_error) = match log_file {
        Ok(file) => {
            let layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(EnvFilter::new(file_level));
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    match file_error {
        Some(e) if !cli.quiet => eprintln!(
            "{} cannot open log file {} ({}); logging to stderr only",
            cyan("⚠"),
            cli.log_file.display(),
            e
        ),
        Some(_) => {}
        None => tracing::debug!("Logging to {}", cli.log_file.display()),
    }
}

/// Map CLI args to `LocalizerConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<LocalizerConfig> {
    let mut builder = LocalizerConfig::builder()
        .max_workers(cli.workers)
        .max_retries(cli.retries)
        .max_image_kb(cli.max_kb)
        .recompress(!cli.no_recompress)
        .request_timeout_secs(cli.timeout)
        .request_delay_ms(cli.delay_ms)
        .images_dir_name(cli.images_dir.as_str())
        .extensions(&cli.extensions);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(output: &RunOutput, show_progress: bool) {
    let stats = &output.stats;

    // The callback already printed the final tick line.
    if !show_progress {
        eprintln!(
            "Scanned {} documents in {}ms",
            stats.documents_found, stats.duration_ms
        );
    }
    eprintln!(
        "   {} downloaded  /  {} already present  /  {} failed  /  {} documents updated",
        bold(&stats.images_downloaded.to_string()),
        dim(&stats.images_skipped.to_string()),
        if stats.images_failed == 0 {
            dim("0")
        } else {
            red(&stats.images_failed.to_string())
        },
        bold(&stats.documents_rewritten.to_string()),
    );

    for doc in output.failed_documents() {
        eprintln!(
            "  {} {}  {}",
            red("✗"),
            doc.path.display(),
            red(doc.error.as_deref().unwrap_or("unknown error"))
        );
    }
}
