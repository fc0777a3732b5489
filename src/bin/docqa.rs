//! CLI binary for edgequake-docqa.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `SearchConfig`, loads the PDF once, and answers one question or keeps
//! reading questions from stdin.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docqa::{
    AnswerSearchEngine, DocumentSession, InferenceBackend, ProgressCallback, SearchConfig,
    SearchMode, SearchProgressCallback, SearchResult,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar per search, one log line per failed page.
///
/// A fresh bar is created on every `on_search_start` so the same callback
/// serves every question in interactive mode.
struct CliProgressCallback {
    bar: Mutex<Option<ProgressBar>>,
    page_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
            page_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(ref bar) = *guard {
                f(bar);
            }
        }
    }
}

impl SearchProgressCallback for CliProgressCallback {
    fn on_search_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = ProgressBar::new(total_pages as u64);
        bar.set_style(style);
        bar.set_prefix("Searching");
        bar.enable_steady_tick(Duration::from_millis(80));

        self.errors.store(0, Ordering::SeqCst);
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(bar);
        }
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut t) = self.page_started.lock() {
            *t = Some(Instant::now());
        }
        self.with_bar(|bar| bar.set_message(format!("page {page_num}")));
    }

    fn on_page_done(&self, pages_done: usize, _pages_total: usize) {
        self.with_bar(|bar| bar.set_position(pages_done as u64));
    }

    fn on_page_error(&self, page_num: usize, error: &str) {
        let elapsed_ms = self
            .page_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.with_bar(|bar| {
            bar.println(format!(
                "  {} Page {:>3}  {}  {}",
                red("✗"),
                page_num,
                red(&msg),
                dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
            ))
        });
    }

    fn on_search_complete(&self, pages_scanned: usize, total_pages: usize, answers: usize) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
            }
        }
        let failed = self.errors.load(Ordering::SeqCst);
        let mark = if failed == 0 { green("✔") } else { cyan("⚠") };
        let mut line = format!(
            "{} {} pages searched, {} answers",
            mark,
            bold(&format!("{pages_scanned}/{total_pages}")),
            bold(&answers.to_string())
        );
        if failed > 0 {
            line.push_str(&format!("  ({} failed)", red(&failed.to_string())));
        }
        eprintln!("{line}");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ask one question
  docqa invoice.pdf -q "What is the invoice number?"

  # Keep asking questions about the same document
  docqa report.pdf

  # Scan every page and list every candidate
  docqa --mode thorough -q "Who signed the contract?" contract.pdf

  # Download from a URL
  docqa https://example.com/form.pdf -q "What is the due date?"

  # Use a vision LLM instead of the document-QA model
  docqa --backend vlm --model gpt-4.1-mini -q "What is the total amount?" receipt.pdf

  # Page count and size only (no API key needed)
  docqa --inspect-only document.pdf

  # Raw model output for page 1, no filtering
  docqa --probe -q "What is the date?" letter.pdf

  # JSON output
  docqa --json -q "What is the policy number?" policy.pdf > answers.json

EXAMPLE QUESTIONS:
  What is the invoice number?      What is the total amount?
  When is the due date?            Who is the sender?
  What is the customer's address?  What is the account number?

MODES:
  quick     Stop at the first page with an answer scoring above the stop
            threshold (default 0.05). Fast on long documents.
  thorough  Search every page and rank everything found.

ENVIRONMENT VARIABLES:
  HF_TOKEN                Token for the hosted document-QA endpoint
  OPENAI_API_KEY          OpenAI API key (vlm backend)
  ANTHROPIC_API_KEY       Anthropic API key (vlm backend)
  GEMINI_API_KEY          Google Gemini API key (vlm backend)
  EDGEQUAKE_LLM_PROVIDER  Override provider for the vlm backend
  EDGEQUAKE_MODEL         Override model ID for the vlm backend
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Override the log filter
"#;

/// Ask questions about a PDF and get answers with confidence and page numbers.
#[derive(Parser, Debug)]
#[command(
    name = "docqa",
    version,
    about = "Ask questions about PDF documents",
    long_about = "Ask natural-language questions about a PDF (local file or URL). Each page is \
rendered and searched with a document question-answering model; answers come back ranked by \
confidence with the page they were found on.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Question to answer. Without it, questions are read from stdin.
    #[arg(short, long, env = "DOCQA_QUESTION")]
    question: Option<String>,

    /// quick: stop at the first confident answer; thorough: search every page.
    #[arg(long, env = "DOCQA_MODE", value_enum, default_value = "quick")]
    mode: ModeArg,

    /// Answering backend.
    #[arg(long, env = "DOCQA_BACKEND", value_enum, default_value = "docqa")]
    backend: BackendArg,

    /// Document-QA endpoint URL (docqa backend).
    #[arg(long, env = "DOCQA_ENDPOINT")]
    endpoint: Option<String>,

    /// Model ID. docqa default: impira/layoutlm-document-qa; vlm default: gpt-4.1-nano.
    #[arg(long, env = "DOCQA_MODEL")]
    model: Option<String>,

    /// LLM provider for the vlm backend: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "DOCQA_PROVIDER")]
    provider: Option<String>,

    /// Candidate answers requested per page.
    #[arg(long, env = "DOCQA_TOP_K", default_value_t = 3,
          value_parser = clap::value_parser!(u64).range(1..))]
    top_k: u64,

    /// Longest edge in pixels of the image sent to the model.
    #[arg(long, env = "DOCQA_MAX_DIMENSION", default_value_t = 1000,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_dimension: u32,

    /// Candidates scoring at or below this are dropped.
    #[arg(long, env = "DOCQA_INCLUSION_THRESHOLD", default_value_t = 0.01)]
    inclusion_threshold: f64,

    /// In quick mode, a candidate above this ends the search.
    #[arg(long, env = "DOCQA_STOP_THRESHOLD", default_value_t = 0.05)]
    stop_threshold: f64,

    /// Rendering DPI (72–400).
    #[arg(long, env = "DOCQA_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCQA_PASSWORD")]
    password: Option<String>,

    /// Retries per inference call on a transient failure.
    #[arg(long, env = "DOCQA_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCQA_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call inference timeout in seconds.
    #[arg(long, env = "DOCQA_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Output the SearchResult as JSON.
    #[arg(long, env = "DOCQA_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCQA_NO_PROGRESS")]
    no_progress: bool,

    /// Print page count and first-page size only, no inference.
    #[arg(long)]
    inspect_only: bool,

    /// Print the raw model output for page 1 (no resize, no filtering).
    #[arg(long)]
    probe: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCQA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except answers and errors.
    #[arg(long, env = "DOCQA_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Quick,
    Thorough,
}

impl From<ModeArg> for SearchMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Quick => SearchMode::Quick,
            ModeArg::Thorough => SearchMode::Thorough,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Docqa,
    Vlm,
}

impl From<BackendArg> for InferenceBackend {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Docqa => InferenceBackend::DocQa,
            BackendArg::Vlm => InferenceBackend::Vlm,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would tear through the progress bar, so they are
    // muted while it is shown.
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn SearchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Load ─────────────────────────────────────────────────────────────
    let spinner = (!cli.quiet && !cli.json).then(|| {
        let s = ProgressBar::new_spinner();
        s.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        s.set_prefix("Loading");
        s.set_message(cli.input.clone());
        s.enable_steady_tick(Duration::from_millis(80));
        s
    });

    let loaded = edgequake_docqa::open(&cli.input, &config).await;
    if let Some(s) = spinner {
        s.finish_and_clear();
    }
    let session = loaded.context("Failed to load PDF")?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = session
            .info()
            .context("Loaded document has no pages")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize info")?
            );
        } else {
            println!("File:         {}", info.name);
            println!("Pages:        {}", info.page_count);
            println!(
                "Page 1 size:  {}×{} px @ {} DPI",
                info.first_page_size.0, info.first_page_size.1, config.dpi
            );
        }
        return Ok(());
    }

    if !cli.quiet && !cli.json {
        if let Some(info) = session.info() {
            eprintln!(
                "{} {} {}",
                green("✔"),
                bold(&info.name),
                dim(&format!("({} pages)", info.page_count))
            );
        }
    }

    let engine = AnswerSearchEngine::from_config(&config)
        .await
        .context("Failed to set up the inference backend")?;

    // ── Probe mode ───────────────────────────────────────────────────────
    if cli.probe {
        let question = cli
            .question
            .as_deref()
            .context("--probe needs a question (-q)")?;
        let raw = engine
            .probe(session.pages(), question)
            .await
            .context("Probe failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&raw).context("Failed to serialise output")?
            );
        } else {
            println!("{} raw answers from {} on page 1:", raw.len(), engine.client_name());
            for r in &raw {
                println!("  {:.6}  {:?}", r.score, r.answer);
            }
        }
        return Ok(());
    }

    // ── One-shot ─────────────────────────────────────────────────────────
    if let Some(ref question) = cli.question {
        let result = session
            .search(question, config.mode, &engine)
            .await
            .context("Search failed")?;
        print_result(&result, &cli)?;
        return Ok(());
    }

    // ── Interactive ──────────────────────────────────────────────────────
    interactive(&session, &engine, &config, &cli).await
}

/// Read questions from stdin until EOF or `quit`.
async fn interactive(
    session: &DocumentSession,
    engine: &AnswerSearchEngine,
    config: &SearchConfig,
    cli: &Cli,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    if !cli.quiet {
        eprintln!(
            "{}",
            dim("Ask a question about the document (empty line to skip, Ctrl-D or 'quit' to exit).")
        );
    }

    loop {
        if !cli.quiet {
            eprint!("{} ", cyan("?"));
        }
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let question = line.trim();
        if matches!(question, "quit" | "exit") {
            break;
        }
        if question.is_empty() {
            eprintln!("{}", yellow("Please enter a question first."));
            continue;
        }

        match session.search(question, config.mode, engine).await {
            Ok(result) => print_result(&result, cli)?,
            Err(e) => eprintln!("{} {}", red("✘"), e),
        }
    }
    Ok(())
}

fn print_result(result: &SearchResult, cli: &Cli) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(result).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    if result.is_empty() {
        println!("No answers found for: {}", bold(&result.question));
        if !cli.quiet {
            println!();
            println!("Tips:");
            println!("  - Rephrase the question using words that appear in the document");
            println!("  - Ask for a specific field, e.g. \"What is the invoice number?\"");
            if result.stats.mode == SearchMode::Quick {
                println!("  - Try --mode thorough to search every page");
            }
            println!("  - Lower --inclusion-threshold to see weaker candidates");
            println!("  - Check the PDF is not a blank or image-less scan (--inspect-only)");
        }
    } else {
        for (i, a) in result.answers.iter().enumerate() {
            println!(
                "{}",
                bold(&format!(
                    "Answer {} - Page {} (Confidence: {})",
                    i + 1,
                    a.page,
                    a.confidence_percent()
                ))
            );
            println!("{}", a.text);
            println!();
        }
    }

    if !cli.quiet && !result.failures.is_empty() {
        eprintln!(
            "{} {} pages could not be searched:",
            cyan("⚠"),
            result.failures.len()
        );
        for f in &result.failures {
            eprintln!("  {}", dim(&f.to_string()));
        }
    }
    if !cli.quiet && cli.no_progress {
        eprintln!(
            "Searched {}/{} pages in {}ms{}",
            result.stats.pages_scanned,
            result.stats.total_pages,
            result.stats.total_duration_ms,
            if result.stats.stopped_early {
                " (stopped early)"
            } else {
                ""
            }
        );
    }
    Ok(())
}

/// Map CLI args to `SearchConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<SearchConfig> {
    let mut builder = SearchConfig::builder()
        .mode(cli.mode.into())
        .backend(cli.backend.into())
        .dpi(cli.dpi)
        .top_k(cli.top_k as usize)
        .max_image_dimension(cli.max_dimension)
        .inclusion_threshold(cli.inclusion_threshold)
        .stop_threshold(cli.stop_threshold)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref endpoint) = cli.endpoint {
        builder = builder.endpoint(endpoint);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
