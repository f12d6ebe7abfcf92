//! Proposal composition: turn zones + company data into a sales draft.
//!
//! Two degradation rules shape this module. First, the cost-saving
//! short-circuit: with zero available zones there is nothing to sell, so a
//! fixed sentence in the detected language is returned and the inference
//! capability is not invoked at all. Second, composition never fails the
//! pipeline: an inference error yields a fixed placeholder instead of
//! propagating — the zone classification upstream is the deliverable, the
//! prose is an enrichment.
//!
//! The generated text is passed through a deterministic sanitiser that
//! strips literal `*` characters. The prompt already forbids them, but the
//! invariant "a proposal never contains an asterisk" holds at the code
//! level, not as a best-effort instruction.

use crate::config::AnalysisConfig;
use crate::inference::{complete_with_deadline, InferenceClient};
use crate::output::{AdZone, Language, Proposal};
use crate::prompts;
use edgequake_llm::{ChatMessage, CompletionOptions};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

static RE_MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// Everything the composer needs from the earlier stages.
#[derive(Debug, Clone, Copy)]
pub struct ComposeInput<'a> {
    pub url: &'a str,
    pub zones: &'a [AdZone],
    pub language: Language,
    pub company_name: Option<&'a str>,
    pub owner_info: Option<&'a str>,
}

/// Research the company behind the site via a supplementary inference call.
///
/// Returns `None` when the call fails or yields nothing — research is
/// strictly optional flavour for the proposal prompt.
pub async fn research_company(
    inference: &Arc<dyn InferenceClient>,
    company: &str,
    url: &str,
    language: Language,
    config: &AnalysisConfig,
) -> Option<String> {
    let messages = vec![ChatMessage::user(prompts::research_prompt(
        company, url, language,
    ))];
    let options = CompletionOptions {
        temperature: Some(0.3),
        max_tokens: Some(500),
        ..Default::default()
    };

    match complete_with_deadline(inference, &messages, &options, config.api_timeout_secs).await {
        Ok(reply) => {
            let insights = reply.text.trim().to_string();
            if insights.is_empty() {
                None
            } else {
                debug!("company research: {} chars", insights.len());
                Some(insights)
            }
        }
        Err(e) => {
            warn!("company research failed: {e}");
            None
        }
    }
}

/// Compose the proposal. Infallible by design.
pub async fn compose(
    inference: &Arc<dyn InferenceClient>,
    input: ComposeInput<'_>,
    config: &AnalysisConfig,
) -> Proposal {
    let available: Vec<&AdZone> = input.zones.iter().filter(|z| z.available).collect();

    if available.is_empty() {
        debug!("no available zones; skipping the proposal call");
        return Proposal {
            text: prompts::no_zones_sentence(input.language).to_string(),
            language: input.language,
        };
    }

    let prompt = prompts::proposal_prompt(
        input.url,
        input.company_name,
        input.owner_info,
        &available,
        input.language,
    );
    let messages = vec![ChatMessage::user(prompt)];
    let options = CompletionOptions {
        temperature: Some(config.proposal_temperature),
        max_tokens: Some(config.proposal_max_tokens),
        ..Default::default()
    };

    let text = match complete_with_deadline(
        inference,
        &messages,
        &options,
        config.api_timeout_secs,
    )
    .await
    {
        Ok(reply) => sanitize(&reply.text),
        Err(e) => {
            warn!("proposal generation failed: {e}");
            prompts::proposal_fallback(input.language).to_string()
        }
    };

    // A model that returns only markup would otherwise produce an empty
    // proposal after sanitising.
    let text = if text.is_empty() {
        prompts::proposal_fallback(input.language).to_string()
    } else {
        text
    };

    Proposal {
        text,
        language: input.language,
    }
}

/// Strip literal asterisks and tidy the whitespace the removal leaves behind.
fn sanitize(raw: &str) -> String {
    let without_stars: String = raw.chars().filter(|&c| c != '*').collect();
    let cleaned: Vec<String> = without_stars
        .lines()
        .map(|line| RE_MULTI_SPACE.replace_all(line.trim_end(), " ").into_owned())
        .collect();
    cleaned.join("\n").trim().to_string()
}
