//! Chromium-backed implementation of the browser capability.
//!
//! One [`ChromiumSession`] owns one headless Chromium process: the browser
//! handle, the event-handler task that pumps the CDP websocket, and (when
//! resource blocking is on) an interception task answering
//! `Fetch.requestPaused` events. Blocked resource classes are aborted with
//! `BlockedByClient`; everything else is continued untouched.
//!
//! `navigate` resolves once the main document navigation commits — not at
//! network idle, which tracker-heavy pages may never reach. The capture
//! layer adds its own settle delay before the screenshot.

use crate::pipeline::capture::{BrowserEngine, BrowserSession, EngineError, LaunchOptions, ResourceClass};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Launches a fresh headless Chromium per capture.
#[derive(Debug, Clone, Default)]
pub struct ChromiumEngine {
    /// Explicit browser executable; auto-discovered when `None`.
    pub executable: Option<PathBuf>,
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, EngineError> {
        let mut builder = BrowserConfig::builder()
            .window_size(options.viewport_width, options.viewport_height)
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--hide-scrollbars");
        if let Some(ref path) = self.executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(EngineError)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| EngineError(format!("chromium launch: {e}")))?;

        // The handler future pumps the CDP websocket; without it no command
        // ever completes.
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| EngineError(format!("new page: {e}")))?;

        let blocked_count = Arc::new(AtomicU64::new(0));
        let intercept_task = if options.blocked_resources.is_empty() {
            None
        } else {
            Some(
                install_interception(
                    &page,
                    options.blocked_resources.clone(),
                    Arc::clone(&blocked_count),
                )
                .await?,
            )
        };

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            intercept_task,
            blocked_count,
        }))
    }
}

/// Enable Fetch-domain interception and spawn the pause-event responder.
async fn install_interception(
    page: &Page,
    blocked_classes: Vec<ResourceClass>,
    counter: Arc<AtomicU64>,
) -> Result<JoinHandle<()>, EngineError> {
    let mut paused_events = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| EngineError(format!("fetch listener: {e}")))?;

    let responder_page = page.clone();
    let task = tokio::spawn(async move {
        while let Some(event) = paused_events.next().await {
            let request_id = event.request_id.clone();
            if is_blocked(&event.resource_type, &blocked_classes) {
                counter.fetch_add(1, Ordering::Relaxed);
                trace!("aborting {:?} request", event.resource_type);
                if let Err(e) = responder_page
                    .execute(FailRequestParams::new(
                        request_id,
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                {
                    trace!("failRequest: {e}");
                }
            } else if let Err(e) = responder_page
                .execute(ContinueRequestParams::new(request_id))
                .await
            {
                trace!("continueRequest: {e}");
            }
        }
    });

    page.execute(EnableParams {
        patterns: Some(vec![RequestPattern {
            url_pattern: Some("*".to_string()),
            resource_type: None,
            request_stage: None,
        }]),
        handle_auth_requests: None,
    })
    .await
    .map_err(|e| EngineError(format!("fetch enable: {e}")))?;

    Ok(task)
}

/// Map a CDP resource type onto the blocked-class list.
fn is_blocked(resource_type: &ResourceType, blocked: &[ResourceClass]) -> bool {
    let class = match resource_type {
        ResourceType::Font => ResourceClass::Font,
        ResourceType::Stylesheet => ResourceClass::Stylesheet,
        ResourceType::Media => ResourceClass::Media,
        ResourceType::Image => ResourceClass::Image,
        _ => return false,
    };
    blocked.contains(&class)
}

/// One live Chromium instance plus its service tasks.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    intercept_task: Option<JoinHandle<()>>,
    blocked_count: Arc<AtomicU64>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), EngineError> {
        debug!("navigating to {url} (deadline {}s)", timeout.as_secs());
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(EngineError(format!("navigation failed: {e}"))),
            Err(_) => Err(EngineError(format!(
                "navigation timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }

    async fn screenshot(&mut self, quality: u8) -> Result<Vec<u8>, EngineError> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Jpeg)
                    .quality(i64::from(quality))
                    .full_page(false)
                    .build(),
            )
            .await
            .map_err(|e| EngineError(format!("screenshot: {e}")))
    }

    fn blocked_request_count(&self) -> u64 {
        self.blocked_count.load(Ordering::Relaxed)
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        if let Some(task) = self.intercept_task.take() {
            task.abort();
        }
        let result = self
            .browser
            .close()
            .await
            .map_err(|e| EngineError(format!("browser close: {e}")));
        self.handler_task.abort();
        result.map(|_| ())
    }
}

impl Drop for ChromiumSession {
    // Backstop only: the capture layer always calls close(). A dropped
    // session must still not leave the websocket pump running.
    fn drop(&mut self) {
        self.handler_task.abort();
        if let Some(task) = self.intercept_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_mapping_covers_blockable_classes() {
        let blocked = vec![ResourceClass::Font, ResourceClass::Media];
        assert!(is_blocked(&ResourceType::Font, &blocked));
        assert!(is_blocked(&ResourceType::Media, &blocked));
        assert!(!is_blocked(&ResourceType::Stylesheet, &blocked));
        assert!(!is_blocked(&ResourceType::Document, &blocked));
        assert!(!is_blocked(&ResourceType::Xhr, &blocked));
    }

    #[test]
    fn images_blocked_only_when_listed() {
        assert!(!is_blocked(&ResourceType::Image, &[]));
        assert!(is_blocked(&ResourceType::Image, &[ResourceClass::Image]));
    }
}
