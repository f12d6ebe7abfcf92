//! CLI binary for adscope.
//!
//! A thin shim over the library crate: maps CLI flags to `AnalysisConfig`,
//! runs a one-shot analysis or the HTTP service, and prints results.

use adscope::{analyze, server, AnalysisConfig, ImageDetail};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a website and print the report
  adscope analyze example.com

  # JSON report, proposal written to a file
  adscope analyze https://example.com --json -o proposal.txt

  # Faster, cheaper run: low image detail, no company research
  adscope analyze example.com --detail low --no-research

  # Run the HTTP service
  adscope serve --bind 0.0.0.0:8787

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY        OpenAI API key (preferred when several keys are set)
  ANTHROPIC_API_KEY     Anthropic API key
  GEMINI_API_KEY        Google Gemini API key
  ADSCOPE_PROVIDER      Override provider (openai, anthropic, gemini, ollama)
  ADSCOPE_MODEL         Override model ID
  ADSCOPE_BIND          Listen address for `serve`

SETUP:
  1. Set an API key:   export OPENAI_API_KEY=sk-...
  2. Analyse:          adscope analyze example.com

  A Chromium/Chrome installation is discovered automatically; point
  the --chrome flag at an executable to use a specific one.
"#;

/// Analyse websites for advertising placement using vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "adscope",
    version,
    about = "Website ad-placement analysis: screenshot, vision-LLM zone classification, sales proposal",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "ADSCOPE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the report itself.
    #[arg(short, long, global = true, env = "ADSCOPE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse one website and print the report.
    Analyze {
        /// Website address; `https://` is assumed when no scheme is given.
        url: String,

        /// Output the full report as JSON instead of formatted text.
        #[arg(long)]
        json: bool,

        /// Write the proposal text to this file as well.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        tuning: Tuning,
    },

    /// Run the HTTP analysis service.
    Serve {
        /// Listen address.
        #[arg(long, env = "ADSCOPE_BIND", default_value = "0.0.0.0:8787")]
        bind: SocketAddr,

        #[command(flatten)]
        tuning: Tuning,
    },
}

/// Pipeline knobs shared by both subcommands.
#[derive(clap::Args, Debug)]
struct Tuning {
    /// Inference model ID (e.g. gpt-4o-mini, gpt-4o).
    #[arg(long, env = "ADSCOPE_MODEL")]
    model: Option<String>,

    /// Inference provider: openai, anthropic, gemini, ollama.
    #[arg(long, env = "ADSCOPE_PROVIDER")]
    provider: Option<String>,

    /// Navigation attempts per capture.
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Per-attempt navigation timeout in seconds.
    #[arg(long, default_value_t = 20)]
    nav_timeout: u64,

    /// Per-inference-call timeout in seconds.
    #[arg(long, default_value_t = 45)]
    api_timeout: u64,

    /// Vision image detail: high or low.
    #[arg(long, value_enum, default_value = "high")]
    detail: DetailArg,

    /// Also block images during capture (faster, blinder).
    #[arg(long)]
    block_images: bool,

    /// Skip the supplementary company-research call.
    #[arg(long)]
    no_research: bool,

    /// Chromium/Chrome executable to use.
    #[arg(long, env = "ADSCOPE_CHROME")]
    chrome: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum DetailArg {
    High,
    Low,
}

impl From<DetailArg> for ImageDetail {
    fn from(v: DetailArg) -> Self {
        match v {
            DetailArg::High => ImageDetail::High,
            DetailArg::Low => ImageDetail::Low,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "adscope=debug,info"
    } else if cli.quiet {
        "error"
    } else {
        "adscope=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Analyze {
            url,
            json,
            output,
            tuning,
        } => run_analyze(&url, json, output, tuning, cli.quiet).await,
        Command::Serve { bind, tuning } => run_serve(bind, tuning).await,
    }
}

async fn run_analyze(
    url: &str,
    json: bool,
    output: Option<PathBuf>,
    tuning: Tuning,
    quiet: bool,
) -> Result<()> {
    let config = build_config(&tuning)?;

    let spinner = if quiet || json {
        None
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("Analysing {url}…"));
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    };

    let result = analyze(url, &config).await;

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    let report = result.context("Analysis failed")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else {
        print_report(&report, quiet);
    }

    if let Some(path) = output {
        std::fs::write(&path, report.proposal.text.as_bytes())
            .with_context(|| format!("Failed to write proposal to {}", path.display()))?;
        if !quiet {
            eprintln!("{} proposal written to {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    Ok(())
}

fn print_report(report: &adscope::AnalysisReport, quiet: bool) {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let _ = writeln!(out, "{}", bold(&format!("Analysis of {}", report.url)));
    let _ = writeln!(
        out,
        "Language: {}   zones: {}   emails: {}",
        report.language,
        report.zones.len(),
        report.contact.emails.len()
    );
    let _ = writeln!(out);

    for zone in &report.zones {
        let marker = if zone.available {
            green("free")
        } else {
            dim("occupied")
        };
        let size = if zone.size_hint.is_empty() {
            String::new()
        } else {
            format!(" {}", dim(&zone.size_hint))
        };
        let _ = writeln!(
            out,
            "  {} {:<8} [{:?}]{}  {}",
            cyan("▸"),
            zone.name,
            zone.priority,
            size,
            zone.reason
        );
    }

    if !report.contact.emails.is_empty() {
        let emails: Vec<&str> = report.contact.emails.iter().map(String::as_str).collect();
        let _ = writeln!(out, "\nContacts: {}", emails.join(", "));
    }
    if let Some(ref company) = report.contact.company_name {
        let _ = writeln!(out, "Company:  {company}");
    }
    if let Some(ref insights) = report.owner_info {
        let _ = writeln!(out, "\n{}\n{insights}", bold("Research"));
    }

    let _ = writeln!(out, "\n{}\n{}", bold("Proposal"), report.proposal.text);

    if !quiet {
        let t = &report.timings;
        eprintln!(
            "\n{}",
            dim(&format!(
                "probe {}ms · capture {}ms ({} attempts, {} blocked) · vision {}ms · scrape {}ms · compose {}ms · total {}ms",
                t.probe_ms,
                t.capture_ms,
                report.capture.attempts,
                report.capture.blocked_requests,
                t.vision_ms,
                t.scrape_ms,
                t.compose_ms,
                t.total_ms
            ))
        );
    }
}

async fn run_serve(bind: SocketAddr, tuning: Tuning) -> Result<()> {
    let config = build_config(&tuning)?;
    let state = server::AppState::new(config).context("Failed to initialise server state")?;
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    eprintln!("{} adscope listening on http://{bind}", green("✔"));

    axum::serve(listener, app)
        .await
        .context("Server terminated")?;
    Ok(())
}

/// Map CLI tuning flags to `AnalysisConfig`.
fn build_config(tuning: &Tuning) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .max_nav_retries(tuning.retries)
        .nav_timeout_secs(tuning.nav_timeout)
        .api_timeout_secs(tuning.api_timeout)
        .image_detail(tuning.detail.clone().into())
        .block_images(tuning.block_images)
        .company_research(!tuning.no_research);

    if let Some(ref model) = tuning.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = tuning.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref chrome) = tuning.chrome {
        builder = builder.browser(std::sync::Arc::new(
            adscope::pipeline::chromium::ChromiumEngine {
                executable: Some(chrome.clone()),
            },
        ));
    }

    builder.build().context("Invalid configuration")
}
