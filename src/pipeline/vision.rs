//! Vision analysis: ask the model which zones of the screenshot can carry ads.
//!
//! This is the most failure-prone link in the pipeline — the external model
//! is non-deterministic and its output schema is advisory, not a contract.
//! The decoder is therefore strict on structure (a zones array must exist,
//! every entry must carry a name and a priority) but tolerant of minor
//! variance: a bare top-level array is accepted alongside the object-wrapped
//! form, markdown fences are stripped, prose around the JSON is recovered by
//! balanced-brace extraction, and missing optional fields default instead of
//! failing.

use crate::config::AnalysisConfig;
use crate::error::AnalyzeError;
use crate::inference::{complete_with_deadline, InferenceClient};
use crate::output::{AdZone, Language, ZonePriority};
use crate::pipeline::normalize::NormalizedUrl;
use crate::pipeline::optimize::OptimizedImage;
use crate::prompts;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Occupancy judgement should be reproducible, so the vision call runs at a
/// fixed low temperature regardless of the proposal temperature.
const VISION_TEMPERATURE: f32 = 0.2;

/// Zones plus the detected page language.
#[derive(Debug, Clone)]
pub struct VisionAnalysis {
    pub zones: Vec<AdZone>,
    pub language: Language,
}

/// Run the zone-classification call against the optimised screenshot.
pub async fn analyze_screenshot(
    inference: &Arc<dyn InferenceClient>,
    url: &NormalizedUrl,
    image: &OptimizedImage,
    config: &AnalysisConfig,
) -> Result<VisionAnalysis, AnalyzeError> {
    let attachment = ImageData::new(STANDARD.encode(&image.bytes), "image/jpeg")
        .with_detail(config.image_detail.as_str());

    let messages = vec![
        ChatMessage::system(prompts::VISION_SYSTEM_PROMPT),
        ChatMessage::user_with_images(prompts::vision_user_prompt(url.as_str()), vec![attachment]),
    ];
    let options = CompletionOptions {
        temperature: Some(VISION_TEMPERATURE),
        max_tokens: Some(config.vision_max_tokens),
        ..Default::default()
    };

    let reply = complete_with_deadline(inference, &messages, &options, config.api_timeout_secs)
        .await
        .map_err(|e| AnalyzeError::AnalysisFailed(e.to_string()))?;

    let analysis = decode_analysis(&reply.text)?;
    info!(
        "vision analysis: {} zones, language {}",
        analysis.zones.len(),
        analysis.language
    );
    Ok(analysis)
}

/// Decode the raw model reply into a [`VisionAnalysis`].
///
/// Accepts `{"zones": [...], "language": "..."}`, a bare `[...]` array
/// (older reply shape), fenced variants of both, and JSON embedded in
/// prose. Rejects with [`AnalyzeError::InvalidAnalysis`] only when no
/// structurally usable JSON can be found.
pub fn decode_analysis(raw: &str) -> Result<VisionAnalysis, AnalyzeError> {
    let stripped = strip_code_fences(raw.trim());

    let value: Value = match serde_json::from_str(stripped) {
        Ok(v) => v,
        Err(parse_err) => {
            let recovered = extract_balanced(stripped, '{', '}')
                .or_else(|| extract_balanced(stripped, '[', ']'))
                .ok_or_else(|| {
                    AnalyzeError::InvalidAnalysis(format!("response is not JSON: {parse_err}"))
                })?;
            debug!("recovered embedded JSON from a prose reply");
            serde_json::from_str(recovered).map_err(|e| {
                AnalyzeError::InvalidAnalysis(format!("recovered fragment is not JSON: {e}"))
            })?
        }
    };

    let (zones_value, language) = match &value {
        Value::Array(_) => (value.clone(), Language::default()),
        Value::Object(map) => {
            let zones = map.get("zones").cloned().ok_or_else(|| {
                AnalyzeError::InvalidAnalysis("reply object carries no 'zones' array".into())
            })?;
            let language = map
                .get("language")
                .and_then(Value::as_str)
                .map(Language::from_code)
                .unwrap_or_default();
            (zones, language)
        }
        _ => {
            return Err(AnalyzeError::InvalidAnalysis(
                "reply is neither a zones array nor an object".into(),
            ))
        }
    };

    let entries = zones_value.as_array().ok_or_else(|| {
        AnalyzeError::InvalidAnalysis("'zones' is not an array".into())
    })?;

    let zones = entries
        .iter()
        .map(decode_zone)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(VisionAnalysis { zones, language })
}

/// Decode one zone entry. Name and priority are mandatory; everything else
/// defaults.
fn decode_zone(entry: &Value) -> Result<AdZone, AnalyzeError> {
    let obj = entry.as_object().ok_or_else(|| {
        AnalyzeError::InvalidAnalysis(format!("zone entry is not an object: {entry}"))
    })?;

    // Older replies used "zone" instead of "name".
    let name = obj
        .get("name")
        .or_else(|| obj.get("zone"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AnalyzeError::InvalidAnalysis("zone entry is missing a name".into()))?;

    let priority_str = obj
        .get("priority")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AnalyzeError::InvalidAnalysis(format!("zone '{name}' is missing a priority"))
        })?;
    let priority = match priority_str.trim().to_lowercase().as_str() {
        "high" => ZonePriority::High,
        "low" => ZonePriority::Low,
        // Unknown tiers degrade to medium rather than failing the analysis.
        _ => ZonePriority::Medium,
    };

    Ok(AdZone {
        name: name.to_string(),
        available: obj.get("available").and_then(Value::as_bool).unwrap_or(true),
        size_hint: obj
            .get("size")
            .or_else(|| obj.get("size_hint"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        priority,
        reason: obj
            .get("reason")
            .or_else(|| obj.get("description"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```\s*$").unwrap());

/// Strip a single outer ```json fence the model sometimes adds despite the
/// prompt.
fn strip_code_fences(input: &str) -> &str {
    match RE_OUTER_FENCES.captures(input) {
        Some(caps) => caps.get(1).map_or(input, |m| m.as_str()),
        None => input,
    }
}

/// Extract the first balanced `open…close` substring, string-literal aware.
fn extract_balanced(input: &str, open: char, close: char) -> Option<&str> {
    let start = input.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in input[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&input[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_object_wrapped_zones() {
        let analysis =
            decode_analysis(r#"{"zones":[{"name":"Header","priority":"high"}]}"#).unwrap();
        assert_eq!(analysis.zones.len(), 1);
        assert_eq!(analysis.zones[0].name, "Header");
        assert_eq!(analysis.zones[0].priority, ZonePriority::High);
        // Missing optional fields default.
        assert!(analysis.zones[0].available);
        assert!(analysis.zones[0].size_hint.is_empty());
        assert_eq!(analysis.language, Language::En);
    }

    #[test]
    fn decodes_bare_array() {
        let analysis =
            decode_analysis(r#"[{"name":"Header","priority":"high"}]"#).unwrap();
        assert_eq!(analysis.zones.len(), 1);
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            decode_analysis("not json"),
            Err(AnalyzeError::InvalidAnalysis(_))
        ));
    }

    #[test]
    fn rejects_zone_without_priority() {
        let result = decode_analysis(r#"{"zones":[{"name":"Header"}]}"#);
        assert!(matches!(result, Err(AnalyzeError::InvalidAnalysis(_))));
    }

    #[test]
    fn rejects_object_without_zones() {
        let result = decode_analysis(r#"{"language":"en"}"#);
        assert!(matches!(result, Err(AnalyzeError::InvalidAnalysis(_))));
    }

    #[test]
    fn accepts_legacy_zone_key_and_detects_language() {
        let analysis = decode_analysis(
            r#"{"zones":[{"zone":"Sidebar","priority":"medium","available":false,
                "size":"300x250","description":"right column, already occupied"}],
                "language":"ru"}"#,
        )
        .unwrap();
        let zone = &analysis.zones[0];
        assert_eq!(zone.name, "Sidebar");
        assert!(!zone.available);
        assert_eq!(zone.size_hint, "300x250");
        assert!(zone.reason.contains("occupied"));
        assert_eq!(analysis.language, Language::Ru);
    }

    #[test]
    fn strips_markdown_fences() {
        let fenced = "```json\n{\"zones\":[{\"name\":\"Footer\",\"priority\":\"low\"}]}\n```";
        let analysis = decode_analysis(fenced).unwrap();
        assert_eq!(analysis.zones[0].priority, ZonePriority::Low);
    }

    #[test]
    fn recovers_json_embedded_in_prose() {
        let chatty = r#"Sure! Here is the analysis you asked for:
            {"zones":[{"name":"Content","priority":"high"}],"language":"en"}
            Let me know if you need anything else."#;
        let analysis = decode_analysis(chatty).unwrap();
        assert_eq!(analysis.zones[0].name, "Content");
    }

    #[test]
    fn unknown_priority_degrades_to_medium() {
        let analysis =
            decode_analysis(r#"{"zones":[{"name":"Header","priority":"urgent"}]}"#).unwrap();
        assert_eq!(analysis.zones[0].priority, ZonePriority::Medium);
    }

    #[test]
    fn balanced_extraction_ignores_braces_in_strings() {
        let input = r#"note {"a":"closing } inside","b":[1,2]} trailing"#;
        let extracted = extract_balanced(input, '{', '}').unwrap();
        assert_eq!(extracted, r#"{"a":"closing } inside","b":[1,2]}"#);
    }

    #[test]
    fn duplicate_zone_names_are_tolerated() {
        let analysis = decode_analysis(
            r#"{"zones":[
                {"name":"Sidebar","priority":"high"},
                {"name":"Sidebar","priority":"low"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(analysis.zones.len(), 2);
    }
}
