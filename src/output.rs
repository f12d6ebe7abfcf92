//! Result types returned by an analysis run.
//!
//! [`AnalysisReport`] is assembled once per request and discarded with it —
//! there is no durable persistence; the ephemeral export store holds only a
//! short-lived copy keyed by `analysis_id`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Detected page language. Drives the proposal template choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    #[default]
    En,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Ru => "ru",
            Language::En => "en",
        }
    }

    /// Tolerant parse: anything that is not recognisably Russian is English.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "ru" | "rus" | "russian" => Language::Ru,
            _ => Language::En,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Priority tier the vision model assigns to a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZonePriority {
    High,
    Medium,
    Low,
}

/// A candidate advertising placement on the page.
///
/// Zero or more per analysis; duplicates are possible (the model may report
/// both a left and a right sidebar under the same name) and tolerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdZone {
    /// Zone name from the fixed taxonomy (Header, Sidebar, Content, Footer,
    /// Popup). Unknown names are kept as-is rather than rejected.
    pub name: String,
    /// Whether the slot is free (true) or already occupied by an ad.
    pub available: bool,
    /// Recommended banner size, e.g. "728x90". Empty when the model omits it.
    #[serde(default)]
    pub size_hint: String,
    pub priority: ZonePriority,
    /// Model rationale: where the zone sits and why it is (un)suitable.
    #[serde(default)]
    pub reason: String,
}

/// Contact and company metadata scraped from the page HTML.
///
/// Produced on a best-effort basis; every field may be empty and the
/// scraper never fails the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapedContact {
    /// Deduplicated (case-sensitively) e-mail addresses; every entry
    /// contains an `@`.
    pub emails: BTreeSet<String>,
    pub company_name: Option<String>,
    pub page_title: Option<String>,
    pub description: Option<String>,
}

/// The generated sales proposal.
#[derive(Debug, Clone, Serialize)]
pub struct Proposal {
    /// Proposal body. Never contains a literal `*` — the composer strips
    /// them after generation.
    pub text: String,
    pub language: Language,
}

/// Capture metadata surfaced alongside the screenshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CaptureStats {
    /// Navigation attempts spent (1-based; ≤ configured max).
    pub attempts: u32,
    /// Wall-clock of the successful navigation, excluding settle time.
    pub load_time_ms: u64,
    /// Requests aborted by resource-class interception.
    pub blocked_requests: u64,
}

/// Per-stage wall-clock breakdown in milliseconds.
///
/// `vision_ms` and `scrape_ms` overlap in real time (the stages run
/// concurrently), so the fields do not sum to `total_ms`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageTimings {
    pub probe_ms: u64,
    pub capture_ms: u64,
    pub optimize_ms: u64,
    pub vision_ms: u64,
    pub scrape_ms: u64,
    pub research_ms: u64,
    pub compose_ms: u64,
    pub total_ms: u64,
}

/// Everything one analysis run produced.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// The canonical absolute URL that was analysed.
    pub url: String,
    /// The optimised screenshot as a `data:image/jpeg;base64,…` URL.
    pub screenshot: String,
    pub zones: Vec<AdZone>,
    pub language: Language,
    pub contact: ScrapedContact,
    /// Free-text company research blurb from the supplementary inference
    /// call; `None` when no company name was found or research is disabled.
    pub owner_info: Option<String>,
    pub proposal: Proposal,
    pub capture: CaptureStats,
    pub timings: StageTimings,
    /// True when the optimiser could not bring the screenshot under the
    /// byte budget; the inference API may reject the payload downstream.
    pub oversized_image: bool,
}

impl AnalysisReport {
    /// Zones the model marked as free for placement.
    pub fn available_zones(&self) -> impl Iterator<Item = &AdZone> {
        self.zones.iter().filter(|z| z.available)
    }
}
