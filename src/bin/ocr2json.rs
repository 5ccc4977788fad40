//! CLI binary for edgequake-ocr.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, drives one extraction and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_ocr::engine::{initialize_ocr_engine, initialize_pdf_engine};
use edgequake_ocr::pipeline::input::resolve_input;
use edgequake_ocr::{
    DocumentKind, ExtractionConfig, ExtractionOutput, ExtractionProgressCallback, Extractor,
    NoopProgressCallback, OcrBackend, OcrError, RemoteStructurer, RunStatus,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
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
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that shows the pipeline's status line and logs a line per page.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Starting");
        bar.set_message("Starting...");
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_status(&self, status: RunStatus, message: &str) {
        self.bar.set_prefix(status.to_string());
        self.bar.set_message(message.to_string());
    }

    fn on_page_recognized(&self, page_num: usize, total_pages: usize, chars: usize) {
        let mark = if chars == 0 { dim("·") } else { green("✓") };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            mark,
            page_num,
            total_pages,
            dim(&format!("{chars:>6} chars")),
        ));
    }

    fn on_run_finished(&self, status: RunStatus) {
        self.bar.finish_and_clear();
        match status {
            RunStatus::Done => eprintln!("{} Extraction complete", green("✔")),
            _ => eprintln!("{} Extraction failed", red("✘")),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the normalised text of a scan
  ocr2json receipt.jpg

  # Multi-page PDF, JSON payload to stdout
  ocr2json --json statement.pdf

  # Structure into key-value JSON with Gemini and save the download file
  ocr2json --structure --output-dir out/ invoice.pdf

  # Transcribe with a vision model instead of Tesseract
  ocr2json --ocr-engine vision --vision-model gpt-4.1-mini scan.png

  # From a URL
  ocr2json https://example.com/form.pdf -o form.json

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default structuring provider)
  OPENAI_API_KEY          OpenAI API key (default vision OCR provider)
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium, skips the download
  PDFIUM_FETCH_CACHE_DIR  Override the pdfium cache directory
  TESSDATA_PREFIX         Tesseract language data directory

SETUP:
  PDFium (~30 MB) is downloaded on the first PDF and cached under
  ~/.cache/edgequake-ocr/pdfium-7690/. Image inputs never need it.
  Tesseract OCR (the default engine) needs libtesseract and the English
  language data installed. --ocr-engine vision sends page images to the
  configured LLM provider instead.
"#;

/// Extract text from images and PDFs with OCR, optionally structured as JSON.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2json",
    version,
    about = "Extract text from images and PDFs with OCR, optionally structured as JSON",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image/PDF path or HTTP/HTTPS URL.
    input: String,

    /// Write the JSON payload to this file.
    #[arg(short, long, env = "OCR2JSON_OUTPUT", conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Write the JSON payload into this directory as ocr-output-<unix-ms>.json.
    #[arg(long, env = "OCR2JSON_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Send the text to an LLM and extract key-value JSON.
    #[arg(long, env = "OCR2JSON_STRUCTURE")]
    structure: bool,

    /// Structuring provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "OCR2JSON_PROVIDER")]
    provider: Option<String>,

    /// Structuring model ID. Default: gemini-1.5-flash.
    #[arg(long, env = "OCR2JSON_MODEL")]
    model: Option<String>,

    /// Path to a text file with a custom structuring prompt containing {text}.
    #[arg(long, env = "OCR2JSON_PROMPT")]
    prompt: Option<PathBuf>,

    /// OCR engine. Vision sends page images to an LLM provider.
    #[arg(long, env = "OCR2JSON_OCR_ENGINE", value_enum, default_value = "tesseract")]
    ocr_engine: OcrEngineArg,

    /// Tesseract data directory containing eng.traineddata.
    #[arg(long, env = "OCR2JSON_TESSDATA")]
    tessdata: Option<PathBuf>,

    /// Provider for --ocr-engine vision.
    #[arg(long, env = "OCR2JSON_VISION_PROVIDER")]
    vision_provider: Option<String>,

    /// Model for --ocr-engine vision. Default: gpt-4.1-nano.
    #[arg(long, env = "OCR2JSON_VISION_MODEL")]
    vision_model: Option<String>,

    /// PDF page render scale (0.5–4.0).
    #[arg(long, env = "OCR2JSON_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Cap on either edge of a rendered page, in pixels.
    #[arg(long, env = "OCR2JSON_MAX_PIXELS", default_value_t = 4096)]
    max_pixels: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "OCR2JSON_PASSWORD")]
    password: Option<String>,

    /// Print the JSON payload instead of plain text.
    #[arg(long, env = "OCR2JSON_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "OCR2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Fail instead of downloading PDFium when it is not installed.
    #[arg(long, env = "OCR2JSON_NO_ENGINE_DOWNLOAD")]
    no_engine_download: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR2JSON_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "OCR2JSON_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Timeout for each LLM call (structuring, vision OCR) in seconds.
    #[arg(long, env = "OCR2JSON_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OcrEngineArg {
    Tesseract,
    Vision,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the status line; INFO logs would tear it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    // ── Resolve input and config ─────────────────────────────────────────
    let document = resolve_input(&cli.input, cli.download_timeout)
        .await
        .context("Failed to read input")?;
    let config = build_config(&cli).await?;

    // ── Initialise engines ───────────────────────────────────────────────
    let ocr = initialize_ocr_engine(&config)
        .await
        .map_err(|e| with_hint(e, &cli, "Failed to initialise the OCR engine"))?;

    let mut extractor = match document.kind() {
        DocumentKind::Image => Extractor::image_only(ocr, config.clone()),
        DocumentKind::Pdf => {
            let initialized = if cli.quiet {
                initialize_pdf_engine(&config, None).await
            } else {
                let dl_bar = download_bar();
                let bar = dl_bar.clone();
                let on_download = move |downloaded: u64, total: Option<u64>| {
                    if let Some(t) = total {
                        if bar.length() != Some(t) {
                            bar.set_length(t);
                        }
                    }
                    bar.set_position(downloaded);
                };
                let pdf = initialize_pdf_engine(&config, Some(&on_download)).await;
                dl_bar.finish_and_clear();
                pdf
            };
            let pdf = initialized.context("Failed to initialise the PDF engine")?;
            Extractor::new(pdf, ocr, config.clone())
        }
    };

    if config.structure {
        let structurer = RemoteStructurer::from_config(&config)
            .context("Failed to set up the structuring provider")?;
        extractor = extractor.with_structurer(Arc::new(structurer));
    }
    if extractor.has_structurer() {
        tracing::info!(
            "Structuring with {}/{}",
            config.structuring_provider(),
            config.structuring_model()
        );
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let result = if show_progress {
        extractor.extract(&document, &CliProgressCallback::new()).await
    } else {
        extractor.extract(&document, &NoopProgressCallback).await
    };
    let output = result.map_err(|e| with_hint(e, &cli, "Extraction failed"))?;

    if let Some(ref e) = output.structuring_error {
        if !cli.quiet {
            eprintln!("{} {}", yellow("⚠"), e);
        }
    }

    // ── Write outputs ────────────────────────────────────────────────────
    let written = if let Some(ref path) = cli.output {
        output.write_to_file(path).context("Failed to write output")?;
        Some(path.clone())
    } else if let Some(ref dir) = cli.output_dir {
        Some(output.write_to_dir(dir).context("Failed to write output")?)
    } else {
        None
    };

    if cli.json {
        let json =
            serde_json::to_string_pretty(&output.payload()).context("Failed to serialise output")?;
        println!("{json}");
    } else if written.is_none() {
        print_text(&output)?;
    }

    if !cli.quiet {
        eprintln!(
            "   {}/{} pages with text  {}  {}ms{}",
            output.stats.pages_with_text,
            output.stats.page_count,
            dim(&format!("{} chars", output.stats.text_chars)),
            output.stats.total_duration_ms,
            written
                .map(|p| format!("  →  {}", bold(&p.display().to_string())))
                .unwrap_or_default(),
        );
    }

    Ok(())
}

/// Setup advice for engine failures, `None` for problems with the input.
fn failure_hint(e: &OcrError, engine: &OcrEngineArg) -> Option<&'static str> {
    if !e.is_engine_failure() {
        return None;
    }
    Some(match (e, engine) {
        (OcrError::RasterisationFailed { .. }, _) => {
            "Try a lower --scale or --max-pixels, or another PDFium via PDFIUM_LIB_PATH."
        }
        (OcrError::EngineUnavailable { engine, .. }, _) if engine == "PDF" => {
            "Set PDFIUM_LIB_PATH to an installed PDFium, or allow the one-time download."
        }
        (_, OcrEngineArg::Tesseract) => {
            "Check that libtesseract and eng.traineddata are installed (see --tessdata)."
        }
        (_, OcrEngineArg::Vision) => {
            "Check the vision provider's API key, --vision-model and --api-timeout."
        }
    })
}

fn with_hint(e: OcrError, cli: &Cli, context: &'static str) -> anyhow::Error {
    if !cli.quiet {
        if let Some(hint) = failure_hint(&e, &cli.ocr_engine) {
            eprintln!("{} {}", yellow("hint:"), hint);
        }
    }
    anyhow::Error::new(e).context(context)
}

/// Structured value when there is one, otherwise the normalised text.
fn print_text(output: &ExtractionOutput) -> Result<()> {
    let body = match &output.structured {
        Some(structured) => serde_json::to_string_pretty(&structured.to_json())
            .context("Failed to serialise structured output")?,
        None => output.text.clone(),
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(body.as_bytes())
        .context("Failed to write to stdout")?;
    handle.write_all(b"\n").ok();
    Ok(())
}

fn download_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    bar.set_prefix("PDF engine");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli) -> Result<ExtractionConfig> {
    let ocr_backend = match cli.ocr_engine {
        OcrEngineArg::Tesseract => OcrBackend::Tesseract {
            tessdata_dir: cli.tessdata.clone(),
        },
        OcrEngineArg::Vision => OcrBackend::Vision {
            provider_name: cli.vision_provider.clone(),
            model: cli.vision_model.clone(),
        },
    };

    let mut builder = ExtractionConfig::builder()
        .render_scale(cli.scale)
        .max_rendered_pixels(cli.max_pixels)
        .ocr_backend(ocr_backend)
        .structure(cli.structure)
        .llm_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .allow_engine_download(!cli.no_engine_download);

    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read structuring prompt from {:?}", path))?;
        builder = builder.structuring_prompt(prompt);
    }
    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p);
    }
    if let Some(ref m) = cli.model {
        builder = builder.model(m);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }

    builder.build().context("Invalid configuration")
}
