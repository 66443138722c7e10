//! CLI binary for edgequake-office2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_office2pdf::{
    convert_batch, convert_file, create_text_document, BatchReport, ConversionConfig,
    ConversionJob, ConversionProgressCallback, ConversionReport, ConvertError, EngineSession,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback for `batch`: one bar, one log line per
/// document.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_document_start(&self, _index: usize, _total: usize, source: &Path) {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());
        self.bar.set_message(name);
    }

    fn on_document_complete(&self, index: usize, total: usize, report: &ConversionReport) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            report.destination.display(),
            dim(&format!(
                "{:.1}s, {}",
                report.duration_ms as f64 / 1000.0,
                report.close
            )),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        // First line only; the full diagnostic is in the final report.
        let first = error.lines().next().unwrap_or(error);
        let msg = if first.chars().count() > 100 {
            format!("{}\u{2026}", first.chars().take(99).collect::<String>())
        } else {
            first.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            red("✗"),
            index,
            total,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total: usize, _succeeded: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Start the engine once, headless, listening on the default port
  soffice --headless --invisible --accept="socket,host=127.0.0.1,port=2002;urp;"

  # Convert one presentation
  office2pdf convert slides.odp slides.pdf

  # Keep shadows, lossless images
  office2pdf --keep-shadows --lossless convert deck.pptx deck.pdf

  # Convert many files into a directory, stop at the first failure
  office2pdf --fail-fast batch *.odp *.docx --out-dir pdf/

  # Create a text document from scratch, with a watermark
  office2pdf --watermark "watermark test" text hello.pdf --body "Hello world!"

  # Machine-readable report
  office2pdf --json convert report.odt report.pdf

ENVIRONMENT VARIABLES:
  OFFICE2PDF_ENDPOINT         Engine bridge (host:port or socket,host=…,port=…;urp)
  OFFICE2PDF_CALL_TIMEOUT     Per-call timeout in seconds
  RUST_LOG                    Override log filter (e.g. edgequake_office2pdf=debug)

EXIT STATUS:
  0 when every document converted (a vetoed close still counts as success),
  1 otherwise. The failing stage (connect, load, transform, export, close)
  is named in the error message.
"#;

/// Convert office documents to PDF through a running office engine.
#[derive(Parser, Debug)]
#[command(
    name = "office2pdf",
    version,
    about = "Convert office documents to PDF through a running office engine",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    opts: GlobalOpts,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one document.
    Convert {
        /// Source document (.odp, .pptx, .odt, .docx, …).
        input: PathBuf,
        /// Destination PDF; overwritten if it exists.
        output: PathBuf,
    },

    /// Convert several documents over one engine session.
    Batch {
        /// Source documents.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Directory for the PDFs (named after each input's stem).
        #[arg(short, long, env = "OFFICE2PDF_OUT_DIR")]
        out_dir: PathBuf,
    },

    /// Create a new text document and export it.
    Text {
        /// Destination PDF.
        output: PathBuf,
        /// Body text of the document.
        #[arg(long, default_value = "Hello world!")]
        body: String,
    },
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Engine bridge endpoint.
    #[arg(
        long,
        global = true,
        env = "OFFICE2PDF_ENDPOINT",
        default_value = "127.0.0.1:2002"
    )]
    endpoint: String,

    /// Seconds to wait for the bridge connection.
    #[arg(long, global = true, env = "OFFICE2PDF_CONNECT_TIMEOUT", default_value_t = 10)]
    connect_timeout: u64,

    /// Seconds to wait for any single engine call.
    #[arg(long, global = true, env = "OFFICE2PDF_CALL_TIMEOUT", default_value_t = 120)]
    call_timeout: u64,

    /// Leave presentation shape shadows as they are.
    #[arg(long, global = true, env = "OFFICE2PDF_KEEP_SHADOWS")]
    keep_shadows: bool,

    /// Lossless image compression for presentations.
    #[arg(long, global = true, env = "OFFICE2PDF_LOSSLESS")]
    lossless: bool,

    /// JPEG quality for presentations, passed to the filter as-is.
    #[arg(
        long,
        global = true,
        env = "OFFICE2PDF_QUALITY",
        default_value_t = 80,
        allow_negative_numbers = true
    )]
    quality: i32,

    /// Watermark text for text-document exports.
    #[arg(long, global = true, env = "OFFICE2PDF_WATERMARK")]
    watermark: Option<String>,

    /// Stop a batch at the first failed document.
    #[arg(long, global = true, env = "OFFICE2PDF_FAIL_FAST")]
    fail_fast: bool,

    /// Print reports as JSON on stdout.
    #[arg(long, global = true, env = "OFFICE2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "OFFICE2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "OFFICE2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "OFFICE2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = &cli.opts;

    // ── Logging setup ────────────────────────────────────────────────────
    // The batch progress bar replaces INFO-level library logs.
    let is_batch = matches!(cli.command, Command::Batch { .. });
    let show_progress = is_batch && !opts.quiet && !opts.no_progress && !opts.json;
    let filter = if opts.verbose {
        "debug"
    } else if opts.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(opts, progress_cb)?;

    // ── Connect ──────────────────────────────────────────────────────────
    let session = EngineSession::connect(&config)
        .await
        .map_err(|e| with_stage(e, "Connecting to the office engine"))?;

    // ── Run ──────────────────────────────────────────────────────────────
    match &cli.command {
        Command::Convert { input, output } => {
            let report = convert_file(&session, input, output, &config)
                .await
                .map_err(|e| with_stage(e, &format!("Converting {}", input.display())))?;
            print_report(&report, opts)?;
        }
        Command::Text { output, body } => {
            let report = create_text_document(&session, body, output, &config)
                .await
                .map_err(|e| with_stage(e, "Creating text document"))?;
            print_report(&report, opts)?;
        }
        Command::Batch { inputs, out_dir } => {
            let jobs = ConversionJob::into_dir(inputs, out_dir);
            let report = convert_batch(&session, &jobs, &config).await;
            print_batch(&report, opts)?;
            report.into_result().context("Batch conversion failed")?;
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(opts: &GlobalOpts, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .endpoint(opts.endpoint.as_str())
        .connect_timeout_secs(opts.connect_timeout)
        .call_timeout_secs(opts.call_timeout)
        .remove_shadows(!opts.keep_shadows)
        .lossless_compression(opts.lossless)
        .quality(opts.quality)
        .fail_fast(opts.fail_fast);

    if let Some(ref w) = opts.watermark {
        builder = builder.watermark(w.as_str());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Wrap a pipeline error so the message names the failing stage.
fn with_stage(e: ConvertError, what: &str) -> anyhow::Error {
    let stage = e.stage();
    if let Some(kind) = e.bridge_error().and_then(|b| b.fault_kind()) {
        tracing::debug!("Engine raised {}", kind.type_name());
    }
    anyhow::Error::new(e).context(format!("{what} failed at the {stage} stage"))
}

fn print_report(report: &ConversionReport, opts: &GlobalOpts) -> Result<()> {
    if opts.json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !opts.quiet {
        eprintln!(
            "{}  {}  →  {}  {}",
            green("✔"),
            report.source.display(),
            bold(&report.destination.display().to_string()),
            dim(&format!("{}ms", report.duration_ms)),
        );
        if !report.transform.skipped {
            eprintln!(
                "   {} shadows removed across {} shapes",
                report.transform.shadows_cleared, report.transform.shapes_visited
            );
        }
        if report.close == edgequake_office2pdf::CloseOutcome::VetoedPendingExternalClose {
            eprintln!(
                "   {} close was vetoed; the engine keeps the document open",
                yellow("⚠")
            );
        }
    }
    Ok(())
}

fn print_batch(report: &BatchReport, opts: &GlobalOpts) -> Result<()> {
    if opts.json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialise report")?;
        println!("{json}");
        return Ok(());
    }
    if opts.quiet {
        return Ok(());
    }

    for failure in &report.failed {
        eprintln!(
            "{} {} ({} stage)\n   {}",
            red("✗"),
            failure.source.display(),
            failure.stage,
            failure.error.replace('\n', "\n   ")
        );
    }
    if let Some(ref reason) = report.aborted {
        eprintln!(
            "{} batch stopped: {} ({} not attempted)",
            yellow("⚠"),
            reason,
            report.skipped.len()
        );
    }
    eprintln!(
        "{}  {}/{} documents converted  {}",
        if report.is_success() {
            green("✔")
        } else {
            red("✘")
        },
        bold(&report.converted.len().to_string()),
        report.total(),
        dim(&format!("{}ms", report.total_duration_ms)),
    );
    Ok(())
}
