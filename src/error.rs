//! Error types for the adscope library.
//!
//! Only *fatal* conditions live in [`AnalyzeError`] — conditions that abort
//! the whole analysis (bad input, unreachable target, capture exhaustion,
//! unusable vision output). Contact scraping and proposal composition never
//! produce a variant here: both degrade to empty/placeholder results inside
//! their own modules, because contact info and prose are enrichments while
//! the zone classification is the core deliverable.
//!
//! Every variant maps to an HTTP status ([`AnalyzeError::http_status`]) and a
//! single friendly sentence ([`AnalyzeError::user_message`]); diagnostic
//! detail (attempt histories, raw engine errors) stays in the variant fields
//! for operator logs.

use serde::Serialize;
use thiserror::Error;

/// Network-level failure classes the reachability probe distinguishes.
///
/// HTTP error statuses (4xx/5xx) are *not* failures at this level — a server
/// that answers at all is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreachableKind {
    /// No response within the probe deadline.
    Timeout,
    /// DNS resolution found no such host.
    DnsNotFound,
    /// DNS resolution itself timed out.
    DnsTimeout,
    /// TCP connection actively refused.
    ConnectionRefused,
    /// TLS handshake or certificate failure.
    Ssl,
    /// Anything the substring table could not classify.
    Unknown,
}

/// One navigation attempt inside the capture retry loop.
///
/// The full `Vec<Attempt>` travels inside [`AnalyzeError::CaptureFailed`] so
/// the terminal error carries deterministic per-attempt diagnostics instead
/// of only the last failure.
#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    /// 1-based attempt number.
    pub index: u32,
    /// Stringified navigation error for this attempt.
    pub error: String,
}

/// All fatal errors returned by the adscope library.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// The input string could not be turned into an absolute http(s) URL.
    #[error("Invalid URL '{input}': {reason}\nInclude the full address, e.g. https://example.com")]
    InvalidUrl { input: String, reason: String },

    /// The reachability probe could not get any response from the target.
    #[error("Target is unreachable ({kind:?}): {detail}")]
    Unreachable {
        kind: UnreachableKind,
        detail: String,
    },

    /// Every navigation attempt failed; the attempt history is complete.
    #[error("Failed to load the page after {} attempts", attempts.len())]
    CaptureFailed { attempts: Vec<Attempt> },

    /// The browser engine failed outside the navigation retry loop
    /// (launch, interception setup, screenshot).
    #[error("Browser engine error: {0}")]
    Engine(String),

    /// The vision inference call itself failed (API error or deadline).
    #[error("Vision analysis failed: {0}")]
    AnalysisFailed(String),

    /// The vision reply arrived but was structurally unusable.
    #[error("Vision analysis returned an unusable response: {0}")]
    InvalidAnalysis(String),

    /// No inference provider could be resolved (missing API key etc.).
    #[error("Inference provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalyzeError {
    /// HTTP status the server surface answers with for this error.
    ///
    /// Capture exhaustion is 504 when the attempt history is dominated by
    /// timeouts (the target is slow, retrying may help) and 500 otherwise.
    pub fn http_status(&self) -> u16 {
        match self {
            AnalyzeError::InvalidUrl { .. } => 400,
            AnalyzeError::ProviderNotConfigured { .. } => 400,
            AnalyzeError::InvalidConfig(_) => 400,
            AnalyzeError::Unreachable { .. } => 504,
            AnalyzeError::CaptureFailed { attempts } => {
                let timeouts = attempts
                    .iter()
                    .filter(|a| a.error.to_lowercase().contains("timed out"))
                    .count();
                if timeouts * 2 >= attempts.len().max(1) {
                    504
                } else {
                    500
                }
            }
            AnalyzeError::Engine(_)
            | AnalyzeError::AnalysisFailed(_)
            | AnalyzeError::InvalidAnalysis(_)
            | AnalyzeError::Internal(_) => 500,
        }
    }

    /// Single friendly sentence for the end user.
    ///
    /// Timeout-class messages include a retry suggestion; diagnostic detail
    /// is deliberately withheld here and logged instead.
    pub fn user_message(&self) -> String {
        match self {
            AnalyzeError::InvalidUrl { .. } => {
                "The URL appears to be invalid. Please include the full address starting with \
                 http:// or https://."
                    .to_string()
            }
            AnalyzeError::Unreachable { kind, .. } => match kind {
                UnreachableKind::Timeout => {
                    "The website did not respond in time. Please try again in a moment or check \
                     the URL."
                        .to_string()
                }
                UnreachableKind::DnsNotFound => {
                    "We could not resolve that domain. Please confirm the URL is correct and \
                     publicly accessible."
                        .to_string()
                }
                UnreachableKind::DnsTimeout => {
                    "Domain name resolution timed out. Please try again in a moment.".to_string()
                }
                UnreachableKind::ConnectionRefused => {
                    "We were unable to reach the website. The server may be offline or blocking \
                     requests."
                        .to_string()
                }
                UnreachableKind::Ssl => {
                    "A secure connection to the website could not be established (certificate \
                     problem)."
                        .to_string()
                }
                UnreachableKind::Unknown => {
                    "We were unable to reach the website. Please try again or use a different URL."
                        .to_string()
                }
            },
            AnalyzeError::CaptureFailed { .. } => {
                "We were unable to load the website. Please try again in a moment or choose a \
                 lighter page."
                    .to_string()
            }
            AnalyzeError::ProviderNotConfigured { .. } => {
                "The inference API credential is not configured.".to_string()
            }
            AnalyzeError::AnalysisFailed(_) | AnalyzeError::InvalidAnalysis(_) => {
                "The screenshot could not be analysed. Please try again.".to_string()
            }
            AnalyzeError::Engine(_)
            | AnalyzeError::InvalidConfig(_)
            | AnalyzeError::Internal(_) => {
                "An internal error occurred. Please try again.".to_string()
            }
        }
    }
}
