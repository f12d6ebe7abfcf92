//! The pipeline orchestrator.
//!
//! Sequences the stages, enforces the gate discipline, and assembles the
//! final [`AnalysisReport`]:
//!
//! * normalize and probe are **hard gates** — failure aborts immediately
//!   before any expensive work;
//! * capture failure aborts with the full attempt history;
//! * optimize **never** aborts;
//! * vision failure aborts (no proposal can be composed without zones);
//! * scrape and compose degrade inside their own modules and never abort.
//!
//! Vision and scrape have no data dependency on each other, so they run
//! concurrently; assembly waits on both. Every external call carries its own
//! deadline (probe, per-navigation-attempt, per-inference-call, scrape) —
//! there is no ambient whole-request cancellation, only per-stage budgets
//! chosen to sum below a serverless-style platform ceiling.

use crate::config::AnalysisConfig;
use crate::error::AnalyzeError;
use crate::inference::resolve_inference;
use crate::output::{AnalysisReport, CaptureStats, StageTimings};
use crate::pipeline::capture::{self, BrowserEngine};
use crate::pipeline::chromium::ChromiumEngine;
use crate::pipeline::compose::{self, ComposeInput};
use crate::pipeline::normalize::normalize;
use crate::pipeline::{optimize, probe, scrape, vision};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Analyse a website end to end.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(AnalyzeError)` only for the fatal stages (invalid input,
/// unreachable target, capture exhaustion, unusable vision output, missing
/// provider). Contact scraping and proposal composition degrade instead of
/// failing.
pub async fn analyze(
    raw_url: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, AnalyzeError> {
    let total_start = Instant::now();
    let mut timings = StageTimings::default();

    // ── Gate 1: normalise ────────────────────────────────────────────────
    let url = normalize(raw_url)?;
    info!("analysis started for {}", url.as_str());

    // Resolve the inference client before any network work: a missing
    // credential must fail in milliseconds, not after a browser launch.
    let inference = resolve_inference(config)?;

    // ── Gate 2: reachability probe ───────────────────────────────────────
    let probe_start = Instant::now();
    let reachability = probe::probe(&url, config).await?;
    timings.probe_ms = elapsed_ms(probe_start);
    debug!(
        "probe ok (status {:?}) in {}ms",
        reachability.http_status, timings.probe_ms
    );

    // ── Capture ──────────────────────────────────────────────────────────
    let engine = resolve_engine(config);
    let capture_start = Instant::now();
    let captured = capture::capture(engine.as_ref(), &url, config).await?;
    timings.capture_ms = elapsed_ms(capture_start);

    let capture_stats = CaptureStats {
        attempts: captured.attempts,
        load_time_ms: captured.load_time_ms,
        blocked_requests: captured.blocked_requests,
    };

    // ── Optimize (never aborts) ──────────────────────────────────────────
    let optimize_start = Instant::now();
    let image = optimize::optimize(captured.image, config);
    timings.optimize_ms = elapsed_ms(optimize_start);

    // ── Vision ∥ scrape ──────────────────────────────────────────────────
    let (vision_outcome, scrape_outcome) = tokio::join!(
        timed(vision::analyze_screenshot(&inference, &url, &image, config)),
        timed(scrape::scrape(&url, config)),
    );
    let (vision_result, vision_ms) = vision_outcome;
    let (contact, scrape_ms) = scrape_outcome;
    timings.vision_ms = vision_ms;
    timings.scrape_ms = scrape_ms;

    let analysis = vision_result?;

    // ── Research (optional enrichment) ───────────────────────────────────
    let owner_info = match contact.company_name.as_deref() {
        Some(company) if config.company_research => {
            let research_start = Instant::now();
            let insights = compose::research_company(
                &inference,
                company,
                url.as_str(),
                analysis.language,
                config,
            )
            .await;
            timings.research_ms = elapsed_ms(research_start);
            insights
        }
        _ => None,
    };

    // ── Compose (degradation-only) ───────────────────────────────────────
    let compose_start = Instant::now();
    let proposal = compose::compose(
        &inference,
        ComposeInput {
            url: url.as_str(),
            zones: &analysis.zones,
            language: analysis.language,
            company_name: contact.company_name.as_deref(),
            owner_info: owner_info.as_deref(),
        },
        config,
    )
    .await;
    timings.compose_ms = elapsed_ms(compose_start);

    // ── Assemble ─────────────────────────────────────────────────────────
    let screenshot = format!("data:image/jpeg;base64,{}", STANDARD.encode(&image.bytes));
    timings.total_ms = elapsed_ms(total_start);

    info!(
        "analysis complete for {}: {} zones, {} emails, {}ms total",
        url.as_str(),
        analysis.zones.len(),
        contact.emails.len(),
        timings.total_ms
    );

    Ok(AnalysisReport {
        url: url.as_str().to_string(),
        screenshot,
        zones: analysis.zones,
        language: analysis.language,
        contact,
        owner_info,
        proposal,
        capture: capture_stats,
        timings,
        oversized_image: image.oversized,
    })
}

/// The configured engine, or a fresh chromium engine by default.
fn resolve_engine(config: &AnalysisConfig) -> Arc<dyn BrowserEngine> {
    match &config.browser {
        Some(engine) => Arc::clone(engine),
        None => Arc::new(ChromiumEngine::default()),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Await a future and report its wall-clock alongside the output.
async fn timed<F: Future>(future: F) -> (F::Output, u64) {
    let start = Instant::now();
    let output = future.await;
    (output, elapsed_ms(start))
}
