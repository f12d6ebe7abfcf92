//! Configuration for a website analysis run.
//!
//! Every knob of the pipeline lives in [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. Keeping every setting in one struct makes it
//! trivial to share a config across the CLI and the HTTP service, and to diff
//! two runs when their outputs differ.
//!
//! The defaults consolidate the timeout/retry constants that matter under a
//! serverless-style wall-clock ceiling: every external call carries its own
//! deadline, and the sum of the defaults stays below a ~60 s budget even in
//! the worst case (probe 8 s + 3 × 20 s navigation is already the dominant
//! term, which is why navigation waits for DOM content only).

use crate::error::AnalyzeError;
use crate::inference::InferenceClient;
use crate::pipeline::capture::{BrowserEngine, ResourceClass};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Image detail level requested from the vision model.
///
/// `High` lets GPT-4-class models tile the screenshot and read small UI text
/// (navigation labels, sidebar widgets); `Low` forces a single overview tile
/// at a fraction of the token cost. Zone classification usually survives
/// `Low`, occupancy judgement ("is this slot already an ad?") often does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    #[default]
    High,
    Low,
}

impl ImageDetail {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageDetail::High => "high",
            ImageDetail::Low => "low",
        }
    }
}

/// Configuration for a single website analysis.
///
/// Built via [`AnalysisConfig::builder()`] or [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use adscope::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .viewport(1280, 800)
///     .max_nav_retries(3)
///     .model("gpt-4o-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Viewport width in pixels. Default: 1280.
    pub viewport_width: u32,

    /// Viewport height in pixels. Default: 800.
    ///
    /// The screenshot is clipped to the viewport, not the full page:
    /// below-the-fold content is traded for bounded payload size and capture
    /// speed, and the prime ad slots are above the fold anyway.
    pub viewport_height: u32,

    /// Maximum navigation attempts per capture (the first try counts).
    /// Default: 3.
    pub max_nav_retries: u32,

    /// Per-attempt navigation deadline in seconds. Default: 20.
    pub nav_timeout_secs: u64,

    /// Fixed delay between navigation attempts in milliseconds. Default: 2000.
    ///
    /// Fixed rather than exponential: the retry budget is 3 attempts against
    /// a wall-clock ceiling, so there is nothing to gain from growing waits.
    pub retry_delay_ms: u64,

    /// Settle delay after a successful navigation in milliseconds.
    /// Default: 2000. Gives client-side rendering a moment to paint before
    /// the screenshot.
    pub settle_ms: u64,

    /// JPEG quality of the captured screenshot (1–100). Default: 70.
    pub screenshot_quality: u8,

    /// Resource classes the browser aborts during navigation.
    /// Default: fonts, stylesheets, media.
    ///
    /// Zone classification needs layout and text, not fonts or media; many
    /// pages never reach network-idle because of trackers, so the less we
    /// fetch the more reliably navigation completes in budget.
    pub blocked_resources: Vec<ResourceClass>,

    /// Also block images during capture. Default: false.
    ///
    /// Cuts load time further but the vision model then judges empty image
    /// slots; only worth enabling for very heavy pages.
    pub block_images: bool,

    /// Reachability probe deadline in milliseconds. Default: 8000.
    pub probe_timeout_ms: u64,

    /// Contact-scrape HTML fetch deadline in seconds. Default: 10.
    pub scrape_timeout_secs: u64,

    /// Per-inference-call deadline in seconds. Default: 45.
    pub api_timeout_secs: u64,

    /// Screenshot byte budget before optimisation kicks in. Default: 5 MB
    /// (a conservative margin below typical inference-API payload limits).
    pub max_image_bytes: usize,

    /// Starting JPEG quality for re-encoding oversized screenshots.
    /// Default: 80.
    pub optimizer_base_quality: u8,

    /// Bounding box for the optimiser's downscale pass (never upscales).
    /// Default: 1280 × 1024.
    pub max_image_dimensions: (u32, u32),

    /// Image detail level for the vision call. Default: [`ImageDetail::High`].
    pub image_detail: ImageDetail,

    /// Max tokens for the zone-classification reply. Default: 2000.
    pub vision_max_tokens: usize,

    /// Max tokens for the generated proposal. Default: 1500.
    pub proposal_max_tokens: usize,

    /// Sampling temperature for proposal generation. Default: 0.7.
    /// (The vision call uses a fixed low temperature internally — occupancy
    /// judgement should be deterministic, prose should not.)
    pub proposal_temperature: f32,

    /// Run the supplementary company-research inference call when a company
    /// name was scraped. Default: true.
    pub company_research: bool,

    /// Inference model identifier, e.g. "gpt-4o-mini". If `None`, uses the
    /// provider default.
    pub model: Option<String>,

    /// Inference provider name (e.g. "openai", "anthropic"). If `None` along
    /// with `inference`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed inference client. Takes precedence over
    /// `provider_name`. Used by tests to inject mocks.
    pub inference: Option<Arc<dyn InferenceClient>>,

    /// Pre-constructed browser engine. Defaults to the bundled chromium
    /// engine when `None`. Used by tests to inject mocks.
    pub browser: Option<Arc<dyn BrowserEngine>>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1280,
            viewport_height: 800,
            max_nav_retries: 3,
            nav_timeout_secs: 20,
            retry_delay_ms: 2000,
            settle_ms: 2000,
            screenshot_quality: 70,
            blocked_resources: vec![
                ResourceClass::Font,
                ResourceClass::Stylesheet,
                ResourceClass::Media,
            ],
            block_images: false,
            probe_timeout_ms: 8000,
            scrape_timeout_secs: 10,
            api_timeout_secs: 45,
            max_image_bytes: 5 * 1024 * 1024,
            optimizer_base_quality: 80,
            max_image_dimensions: (1280, 1024),
            image_detail: ImageDetail::default(),
            vision_max_tokens: 2000,
            proposal_max_tokens: 1500,
            proposal_temperature: 0.7,
            company_research: true,
            model: None,
            provider_name: None,
            inference: None,
            browser: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("viewport_width", &self.viewport_width)
            .field("viewport_height", &self.viewport_height)
            .field("max_nav_retries", &self.max_nav_retries)
            .field("nav_timeout_secs", &self.nav_timeout_secs)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("settle_ms", &self.settle_ms)
            .field("screenshot_quality", &self.screenshot_quality)
            .field("blocked_resources", &self.blocked_resources)
            .field("block_images", &self.block_images)
            .field("probe_timeout_ms", &self.probe_timeout_ms)
            .field("scrape_timeout_secs", &self.scrape_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("image_detail", &self.image_detail)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field(
                "inference",
                &self.inference.as_ref().map(|_| "<dyn InferenceClient>"),
            )
            .field(
                "browser",
                &self.browser.as_ref().map(|_| "<dyn BrowserEngine>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resource classes to abort, including images when enabled.
    pub fn effective_blocked_resources(&self) -> Vec<ResourceClass> {
        let mut blocked = self.blocked_resources.clone();
        if self.block_images && !blocked.contains(&ResourceClass::Image) {
            blocked.push(ResourceClass::Image);
        }
        blocked
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width.clamp(320, 3840);
        self.config.viewport_height = height.clamp(240, 2160);
        self
    }

    pub fn max_nav_retries(mut self, n: u32) -> Self {
        self.config.max_nav_retries = n.max(1);
        self
    }

    pub fn nav_timeout_secs(mut self, secs: u64) -> Self {
        self.config.nav_timeout_secs = secs.max(1);
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn settle_ms(mut self, ms: u64) -> Self {
        self.config.settle_ms = ms;
        self
    }

    pub fn screenshot_quality(mut self, quality: u8) -> Self {
        self.config.screenshot_quality = quality.clamp(1, 100);
        self
    }

    pub fn blocked_resources(mut self, classes: Vec<ResourceClass>) -> Self {
        self.config.blocked_resources = classes;
        self
    }

    pub fn block_images(mut self, v: bool) -> Self {
        self.config.block_images = v;
        self
    }

    pub fn probe_timeout_ms(mut self, ms: u64) -> Self {
        self.config.probe_timeout_ms = ms.max(100);
        self
    }

    pub fn scrape_timeout_secs(mut self, secs: u64) -> Self {
        self.config.scrape_timeout_secs = secs.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.config.max_image_bytes = bytes.max(1024);
        self
    }

    pub fn optimizer_base_quality(mut self, quality: u8) -> Self {
        self.config.optimizer_base_quality = quality.clamp(10, 100);
        self
    }

    pub fn max_image_dimensions(mut self, width: u32, height: u32) -> Self {
        self.config.max_image_dimensions = (width.max(100), height.max(100));
        self
    }

    pub fn image_detail(mut self, detail: ImageDetail) -> Self {
        self.config.image_detail = detail;
        self
    }

    pub fn vision_max_tokens(mut self, n: usize) -> Self {
        self.config.vision_max_tokens = n;
        self
    }

    pub fn proposal_max_tokens(mut self, n: usize) -> Self {
        self.config.proposal_max_tokens = n;
        self
    }

    pub fn proposal_temperature(mut self, t: f32) -> Self {
        self.config.proposal_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn company_research(mut self, v: bool) -> Self {
        self.config.company_research = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn inference(mut self, client: Arc<dyn InferenceClient>) -> Self {
        self.config.inference = Some(client);
        self
    }

    pub fn browser(mut self, engine: Arc<dyn BrowserEngine>) -> Self {
        self.config.browser = Some(engine);
        self
    }

    /// Build the configuration, validating cross-field constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalyzeError> {
        let c = &self.config;
        if c.max_nav_retries == 0 {
            return Err(AnalyzeError::InvalidConfig(
                "max_nav_retries must be ≥ 1".into(),
            ));
        }
        if c.screenshot_quality == 0 || c.screenshot_quality > 100 {
            return Err(AnalyzeError::InvalidConfig(format!(
                "screenshot_quality must be 1–100, got {}",
                c.screenshot_quality
            )));
        }
        if c.max_image_bytes < 1024 {
            return Err(AnalyzeError::InvalidConfig(
                "max_image_bytes must be at least 1 KiB".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AnalysisConfig::builder().build().unwrap();
        assert_eq!(config.max_nav_retries, 3);
        assert_eq!(config.max_image_bytes, 5 * 1024 * 1024);
        assert_eq!(config.image_detail, ImageDetail::High);
    }

    #[test]
    fn builder_clamps_out_of_range() {
        let config = AnalysisConfig::builder()
            .viewport(1, 1)
            .screenshot_quality(200)
            .max_nav_retries(0)
            .build()
            .unwrap();
        assert_eq!(config.viewport_width, 320);
        assert_eq!(config.screenshot_quality, 100);
        assert_eq!(config.max_nav_retries, 1);
    }

    #[test]
    fn block_images_extends_blocked_classes() {
        let config = AnalysisConfig::builder().block_images(true).build().unwrap();
        assert!(config
            .effective_blocked_resources()
            .contains(&ResourceClass::Image));

        let config = AnalysisConfig::default();
        assert!(!config
            .effective_blocked_resources()
            .contains(&ResourceClass::Image));
    }
}
