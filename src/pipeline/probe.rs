//! Reachability probe: a cheap pre-flight check before browser launch.
//!
//! Launching a headless browser costs seconds of the execution budget; a
//! HEAD request costs milliseconds. Probing first means an unreachable host
//! fails fast with a classified error instead of burning the whole budget in
//! the capture retry loop.
//!
//! HTTP error statuses count as *reachable* — a 403 or a 500 still proves a
//! server answers, and the page may well render. Only network-level failures
//! (DNS, TCP, TLS, deadline) are fatal here. Some servers reject HEAD
//! outright, so a HEAD-level network failure falls back once to GET with the
//! response body dropped immediately; beyond that single fallback the probe
//! is never retried.

use crate::config::AnalysisConfig;
use crate::error::{AnalyzeError, UnreachableKind};
use crate::pipeline::normalize::NormalizedUrl;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Desktop-browser User-Agent. Bot-shaped agents get blocked or served
/// stub pages by CDNs, which would misclassify perfectly reachable hosts.
pub const PROBE_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Outcome of a successful probe.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReachabilityResult {
    pub reachable: bool,
    /// Status of whichever request got an answer (HEAD, or GET on fallback).
    pub http_status: Option<u16>,
}

/// Probe the target with a bounded HEAD, falling back once to GET.
///
/// Any network-level failure of both requests aborts the pipeline with
/// [`AnalyzeError::Unreachable`] carrying the classified failure kind.
pub async fn probe(
    url: &NormalizedUrl,
    config: &AnalysisConfig,
) -> Result<ReachabilityResult, AnalyzeError> {
    let client = reqwest::Client::builder()
        .user_agent(PROBE_USER_AGENT)
        .timeout(Duration::from_millis(config.probe_timeout_ms))
        .build()
        .map_err(|e| AnalyzeError::Internal(format!("probe client: {e}")))?;

    match client.head(url.as_str()).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            debug!("HEAD {} -> {}", url.as_str(), status);
            Ok(ReachabilityResult {
                reachable: true,
                http_status: Some(status),
            })
        }
        Err(head_err) => {
            debug!(
                "HEAD {} failed ({head_err}), falling back to GET",
                url.as_str()
            );
            match client.get(url.as_str()).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    // Dropping the response cancels the body transfer; the
                    // probe must not download content.
                    drop(response);
                    debug!("GET {} -> {}", url.as_str(), status);
                    Ok(ReachabilityResult {
                        reachable: true,
                        http_status: Some(status),
                    })
                }
                Err(get_err) => {
                    let kind = classify(&get_err);
                    warn!(
                        "probe failed for {}: {kind:?} ({get_err})",
                        url.as_str()
                    );
                    Err(AnalyzeError::Unreachable {
                        kind,
                        detail: describe_chain(&get_err),
                    })
                }
            }
        }
    }
}

/// Classify a `reqwest::Error` into an [`UnreachableKind`].
///
/// reqwest's predicates only distinguish timeout/connect/etc.; the concrete
/// cause (DNS vs refused vs TLS) lives in the `source` chain text, so the
/// chain is matched against a fixed substring table.
pub fn classify(error: &reqwest::Error) -> UnreachableKind {
    classify_chain(&describe_chain(error).to_lowercase(), error.is_timeout())
}

/// Substring table over the flattened error chain.
fn classify_chain(chain: &str, is_timeout: bool) -> UnreachableKind {
    let dns_failure = chain.contains("dns error")
        || chain.contains("failed to lookup address")
        || chain.contains("name or service not known")
        || chain.contains("no such host")
        || chain.contains("nodename nor servname");

    if dns_failure {
        return if is_timeout || chain.contains("timed out") {
            UnreachableKind::DnsTimeout
        } else {
            UnreachableKind::DnsNotFound
        };
    }
    if is_timeout || chain.contains("timed out") || chain.contains("timeout") {
        return UnreachableKind::Timeout;
    }
    if chain.contains("connection refused") {
        return UnreachableKind::ConnectionRefused;
    }
    if chain.contains("certificate")
        || chain.contains("handshake")
        || chain.contains("tls")
        || chain.contains("ssl")
    {
        return UnreachableKind::Ssl;
    }
    UnreachableKind::Unknown
}

/// Flatten an error and its `source` chain into one string.
fn describe_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}
