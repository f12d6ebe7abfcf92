//! Page capture: drive the browser capability to produce a screenshot.
//!
//! The browser automation engine is an external collaborator behind two
//! small traits: [`BrowserEngine`] launches a [`BrowserSession`]
//! ({navigate, screenshot, intercept-requests}). The bundled implementation
//! lives in [`crate::pipeline::chromium`]; tests substitute spy engines.
//!
//! ## Retry discipline
//!
//! Navigation is retried up to `max_nav_retries` times with a fixed
//! inter-attempt delay, and every failure is recorded in an explicit
//! [`Attempt`] list — the terminal [`AnalyzeError::CaptureFailed`] carries
//! the complete history, not just the last message.
//!
//! ## The close invariant
//!
//! The session is owned exclusively by the `capture` invocation that
//! launched it and is closed exactly once on every exit path — success,
//! retry exhaustion, or screenshot failure. The retry loop runs in a helper
//! that only borrows the session, so the single `close` call sits at one
//! place after the borrow ends instead of being duplicated per error arm.

use crate::config::AnalysisConfig;
use crate::error::{AnalyzeError, Attempt};
use crate::pipeline::normalize::NormalizedUrl;
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Resource classes that can be aborted during navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    Font,
    Stylesheet,
    Media,
    Image,
}

/// Options handed to [`BrowserEngine::launch`].
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub blocked_resources: Vec<ResourceClass>,
}

impl LaunchOptions {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            blocked_resources: config.effective_blocked_resources(),
        }
    }
}

/// Error at the engine boundary (launch, navigation, screenshot, close).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

/// One live browser instance. Never shared across requests and never reused
/// between capture invocations; retries within one capture reuse the same
/// session.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate to `url`, waiting for the main document only (not network
    /// idle), bounded by `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), EngineError>;

    /// Capture a viewport-bounded JPEG screenshot at the given quality.
    async fn screenshot(&mut self, quality: u8) -> Result<Vec<u8>, EngineError>;

    /// Requests aborted by resource-class interception so far.
    fn blocked_request_count(&self) -> u64;

    /// Tear the browser down. Called exactly once by the capture layer.
    async fn close(&mut self) -> Result<(), EngineError>;
}

/// Launches browser sessions.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, EngineError>;
}

/// A successful capture.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    /// JPEG screenshot bytes.
    pub image: Vec<u8>,
    /// Navigation attempts spent (1-based).
    pub attempts: u32,
    /// Requests aborted by interception.
    pub blocked_requests: u64,
    /// Wall-clock of the successful navigation, excluding settle time.
    pub load_time_ms: u64,
}

/// Capture a screenshot of `url`, retrying navigation within one session.
pub async fn capture(
    engine: &dyn BrowserEngine,
    url: &NormalizedUrl,
    config: &AnalysisConfig,
) -> Result<CaptureOutcome, AnalyzeError> {
    let options = LaunchOptions::from_config(config);
    let mut session = engine
        .launch(&options)
        .await
        .map_err(|e| AnalyzeError::Engine(format!("browser launch failed: {e}")))?;

    let outcome = drive(session.as_mut(), url, config).await;

    // The single close site. A close failure after a successful capture is
    // logged, not surfaced: the screenshot is already in hand.
    if let Err(close_err) = session.close().await {
        warn!("browser close failed: {close_err}");
    }

    outcome
}

/// The navigation/screenshot loop. Borrows the session so the caller keeps
/// sole responsibility for closing it.
async fn drive(
    session: &mut dyn BrowserSession,
    url: &NormalizedUrl,
    config: &AnalysisConfig,
) -> Result<CaptureOutcome, AnalyzeError> {
    let mut attempts: Vec<Attempt> = Vec::new();
    let nav_timeout = Duration::from_secs(config.nav_timeout_secs);

    for index in 1..=config.max_nav_retries {
        if index > 1 {
            sleep(Duration::from_millis(config.retry_delay_ms)).await;
        }

        let attempt_start = Instant::now();
        match session.navigate(url.as_str(), nav_timeout).await {
            Ok(()) => {
                let load_time_ms = attempt_start.elapsed().as_millis() as u64;
                debug!(
                    "navigation succeeded on attempt {index} in {load_time_ms}ms, settling {}ms",
                    config.settle_ms
                );

                // Let client-side rendering paint before the shot.
                sleep(Duration::from_millis(config.settle_ms)).await;

                let image = session
                    .screenshot(config.screenshot_quality)
                    .await
                    .map_err(|e| AnalyzeError::Engine(format!("screenshot failed: {e}")))?;

                let blocked_requests = session.blocked_request_count();
                info!(
                    "captured {} bytes ({} requests blocked, attempt {index})",
                    image.len(),
                    blocked_requests
                );

                return Ok(CaptureOutcome {
                    image,
                    attempts: index,
                    blocked_requests,
                    load_time_ms,
                });
            }
            Err(e) => {
                warn!(
                    "navigation attempt {index}/{} failed: {e}",
                    config.max_nav_retries
                );
                attempts.push(Attempt {
                    index,
                    error: e.to_string(),
                });
            }
        }
    }

    Err(AnalyzeError::CaptureFailed { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::normalize;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Spy session: scripted navigation results, counted close calls.
    struct SpySession {
        /// `Ok` after this many failures; `None` means always fail.
        succeed_after: Option<u32>,
        nav_calls: Arc<AtomicU32>,
        close_calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl BrowserSession for SpySession {
        async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<(), EngineError> {
            let call = self.nav_calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.succeed_after {
                Some(failures) if call > failures => Ok(()),
                _ => Err(EngineError(format!("navigation timed out (call {call})"))),
            }
        }

        async fn screenshot(&mut self, _quality: u8) -> Result<Vec<u8>, EngineError> {
            Ok(vec![0xFF, 0xD8, 0xFF, 0xE0])
        }

        fn blocked_request_count(&self) -> u64 {
            7
        }

        async fn close(&mut self) -> Result<(), EngineError> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SpyEngine {
        succeed_after: Option<u32>,
        nav_calls: Arc<AtomicU32>,
        close_calls: Arc<AtomicU32>,
    }

    impl SpyEngine {
        fn new(succeed_after: Option<u32>) -> Self {
            Self {
                succeed_after,
                nav_calls: Arc::new(AtomicU32::new(0)),
                close_calls: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    #[async_trait]
    impl BrowserEngine for SpyEngine {
        async fn launch(
            &self,
            _options: &LaunchOptions,
        ) -> Result<Box<dyn BrowserSession>, EngineError> {
            Ok(Box::new(SpySession {
                succeed_after: self.succeed_after,
                nav_calls: Arc::clone(&self.nav_calls),
                close_calls: Arc::clone(&self.close_calls),
            }))
        }
    }

    fn fast_config() -> AnalysisConfig {
        AnalysisConfig::builder()
            .retry_delay_ms(0)
            .settle_ms(0)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn failing_host_exhausts_exactly_max_retries_and_closes_once() {
        let engine = SpyEngine::new(None);
        let url = normalize("https://always-failing.example").unwrap();
        let config = fast_config();

        let result = capture(&engine, &url, &config).await;

        match result {
            Err(AnalyzeError::CaptureFailed { attempts }) => {
                assert_eq!(attempts.len(), 3);
                assert_eq!(attempts[0].index, 1);
                assert_eq!(attempts[2].index, 3);
            }
            other => panic!("expected CaptureFailed, got {other:?}"),
        }
        assert_eq!(engine.nav_calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_on_a_later_attempt_and_closes_once() {
        let engine = SpyEngine::new(Some(1));
        let url = normalize("https://flaky.example").unwrap();
        let config = fast_config();

        let outcome = capture(&engine, &url, &config).await.unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.blocked_requests, 7);
        assert_eq!(outcome.image, vec![0xFF, 0xD8, 0xFF, 0xE0]);
        assert_eq!(engine.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_attempt_success_records_one_attempt() {
        let engine = SpyEngine::new(Some(0));
        let url = normalize("https://healthy.example").unwrap();
        let config = fast_config();

        let outcome = capture(&engine, &url, &config).await.unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(engine.nav_calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.close_calls.load(Ordering::SeqCst), 1);
    }

    /// A screenshot failure must still close the session.
    struct BrokenShotSession {
        close_calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl BrowserSession for BrokenShotSession {
        async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<(), EngineError> {
            Ok(())
        }

        async fn screenshot(&mut self, _quality: u8) -> Result<Vec<u8>, EngineError> {
            Err(EngineError("renderer crashed".into()))
        }

        fn blocked_request_count(&self) -> u64 {
            0
        }

        async fn close(&mut self) -> Result<(), EngineError> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct BrokenShotEngine {
        close_calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl BrowserEngine for BrokenShotEngine {
        async fn launch(
            &self,
            _options: &LaunchOptions,
        ) -> Result<Box<dyn BrowserSession>, EngineError> {
            Ok(Box::new(BrokenShotSession {
                close_calls: Arc::clone(&self.close_calls),
            }))
        }
    }

    #[tokio::test]
    async fn screenshot_failure_still_closes_once() {
        let close_calls = Arc::new(AtomicU32::new(0));
        let engine = BrokenShotEngine {
            close_calls: Arc::clone(&close_calls),
        };
        let url = normalize("https://render-crash.example").unwrap();
        let config = fast_config();

        let result = capture(&engine, &url, &config).await;
        assert!(matches!(result, Err(AnalyzeError::Engine(_))));
        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
    }
}
