//! # adscope
//!
//! Analyse a website for advertising placement: capture a screenshot with a
//! headless browser, ask a vision LLM which page zones can carry ads, scrape
//! contact/company metadata, and draft a personalised sales proposal.
//!
//! ## Why this crate?
//!
//! Judging ad inventory by parsing HTML alone fails on real pages — layout,
//! occupancy ("is that slot already an ad?"), and visual prominence only
//! exist after rendering. Instead this crate renders the page, lets a vision
//! model look at it as a media buyer would, and combines the result with
//! independently scraped contact data into a ready-to-send proposal.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Normalize  repair & validate the user-typed address
//!  ├─ 2. Probe      bounded HEAD/GET before paying for a browser launch
//!  ├─ 3. Capture    headless chromium, resource blocking, bounded retries
//!  ├─ 4. Optimize   keep the screenshot under the API payload budget
//!  ├─ 5. Vision     zone classification (runs concurrently with 6)
//!  ├─ 6. Scrape     e-mails + company name from the raw HTML
//!  └─ 7. Compose    research + proposal draft, degradation-only
//! ```
//!
//! Stages 1–2 are hard gates, 3 and 5 abort with classified errors, 4, 6 and
//! 7 never fail the pipeline. Every external call carries its own deadline.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use adscope::{analyze, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = AnalysisConfig::default();
//!     let report = analyze("example.com", &config).await?;
//!     for zone in report.available_zones() {
//!         println!("{} ({:?}): {}", zone.name, zone.priority, zone.reason);
//!     }
//!     println!("---\n{}", report.proposal.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `adscope` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when embedding only the library:
//! ```toml
//! adscope = { version = "0.4", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod export;
pub mod inference;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod server;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::analyze;
pub use config::{AnalysisConfig, AnalysisConfigBuilder, ImageDetail};
pub use error::{AnalyzeError, Attempt, UnreachableKind};
pub use inference::{InferenceClient, InferenceError, InferenceReply};
pub use output::{
    AdZone, AnalysisReport, CaptureStats, Language, Proposal, ScrapedContact, StageTimings,
    ZonePriority,
};
pub use pipeline::capture::{BrowserEngine, BrowserSession, EngineError, ResourceClass};
pub use server::{router, AppState};
pub use store::{AnalysisStore, MemoryStore, StoredAnalysis};
